//! 容器启动器

use crate::error::{BootstrapError, BootstrapResult};
use crate::logging::{init_logging, LoggingConfig};
use crate::settings::{SettingsLoader, DEFAULT_ENV_PREFIX};
use di_abstractions::{Catalog, ContainerConfig, InjectableContext};
use di_impl::Container;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 容器启动器
///
/// 使用建造者模式组合日志、设置来源、自定义上下文和目录，最后启动容器。
pub struct ContainerBootstrapper {
    /// 设置来源
    settings: SettingsLoader,
    /// 显式配置，设置后忽略所有设置来源
    config: Option<ContainerConfig>,
    /// 日志配置，未设置时不安装订阅者
    logging: Option<LoggingConfig>,
    /// 自定义作用域上下文
    contexts: Vec<Arc<dyn InjectableContext>>,
    /// 待启动的目录
    catalog: Catalog,
}

impl ContainerBootstrapper {
    /// 创建新的容器启动器
    pub fn new() -> Self {
        Self {
            settings: SettingsLoader::new(),
            config: None,
            logging: None,
            contexts: Vec::new(),
            catalog: Catalog::new(),
        }
    }

    /// 添加 TOML 配置文件
    pub fn add_config_toml<P: AsRef<Path>>(mut self, path: P) -> BootstrapResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BootstrapError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }

        info!("添加 TOML 配置文件: {}", path.display());
        self.settings = self.settings.toml_file(path);
        Ok(self)
    }

    /// 添加 JSON 配置文件
    pub fn add_config_json<P: AsRef<Path>>(mut self, path: P) -> BootstrapResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BootstrapError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }

        info!("添加 JSON 配置文件: {}", path.display());
        self.settings = self.settings.json_file(path);
        Ok(self)
    }

    /// 添加环境变量配置源
    pub fn add_config_env_vars<S: Into<String>>(mut self, prefix: S) -> Self {
        let prefix = prefix.into();
        info!("添加环境变量配置源，前缀: {}", prefix);
        self.settings = self.settings.env_prefix(prefix);
        self
    }

    /// 使用显式配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 注册自定义作用域上下文
    pub fn with_context(mut self, context: Arc<dyn InjectableContext>) -> Self {
        debug!("注册自定义上下文: {}", context.scope());
        self.contexts.push(context);
        self
    }

    /// 合并目录，保持声明顺序
    pub fn add_catalog(mut self, catalog: Catalog) -> Self {
        debug!("合并目录，定义数: {}", catalog.len());
        self.catalog = self.catalog.merge(catalog);
        self
    }

    /// 自动配置开发环境
    pub fn auto_configure_development(mut self) -> Self {
        info!("自动配置开发环境");

        if Path::new("./container.dev.toml").exists() {
            self.settings = self.settings.toml_file("./container.dev.toml");
            debug!("添加开发环境配置: container.dev.toml");
        }
        if Path::new("./container.Development.json").exists() {
            self.settings = self.settings.json_file("./container.Development.json");
            debug!("添加开发环境配置: container.Development.json");
        }

        self.settings = self.settings.env_prefix(DEFAULT_ENV_PREFIX);
        self.logging = Some(LoggingConfig::development());
        self
    }

    /// 自动配置生产环境
    pub fn auto_configure_production(mut self) -> Self {
        info!("自动配置生产环境");

        if Path::new("./container.prod.toml").exists() {
            self.settings = self.settings.toml_file("./container.prod.toml");
            debug!("添加生产环境配置: container.prod.toml");
        }
        if Path::new("./container.Production.json").exists() {
            self.settings = self.settings.json_file("./container.Production.json");
            debug!("添加生产环境配置: container.Production.json");
        }

        self.settings = self.settings.env_prefix(DEFAULT_ENV_PREFIX);
        self.logging = Some(LoggingConfig::production());
        self
    }

    /// 解析最终生效的容器配置
    pub fn resolve_config(&self) -> BootstrapResult<ContainerConfig> {
        match &self.config {
            Some(config) => Ok(config.clone()),
            None => self.settings.load(),
        }
    }

    /// 启动容器
    pub fn bootstrap(self) -> BootstrapResult<Container> {
        if let Some(logging) = &self.logging {
            init_logging(logging)?;
        }

        info!("开始启动容器");
        let config = self.resolve_config()?;
        debug!("容器配置: {:?}", config);

        let builder = self
            .contexts
            .into_iter()
            .fold(Container::builder().config(config), |builder, context| {
                builder.with_context(context)
            });
        let container = builder.start(self.catalog)?;

        info!("容器启动完成");
        Ok(container)
    }
}

impl Default for ContainerBootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerBootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBootstrapper")
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("logging", &self.logging)
            .field("contexts", &self.contexts.len())
            .field("catalog", &self.catalog.len())
            .finish()
    }
}
