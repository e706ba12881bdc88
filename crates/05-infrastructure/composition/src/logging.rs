//! 日志初始化

use crate::error::{BootstrapError, BootstrapResult};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 过滤指令，例如 `di_impl=debug,info`；设置后取代 `level`
    pub filter: Option<String>,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            filter: None,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            filter: None,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            filter: None,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 使用过滤指令
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }
}

/// 安装全局 fmt 订阅者
///
/// 进程内只能安装一次；已有全局订阅者时返回 `Ok(false)`，便于测试中重复启动容器。
pub fn init_logging(config: &LoggingConfig) -> BootstrapResult<bool> {
    let filter = config
        .filter
        .as_deref()
        .map(EnvFilter::try_new)
        .transpose()
        .map_err(|e| BootstrapError::Logging {
            message: format!("无效的过滤指令: {}", e),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    let installed = match (filter, config.json_format) {
        (Some(filter), true) => builder.with_env_filter(filter).json().try_init(),
        (Some(filter), false) => builder.with_env_filter(filter).try_init(),
        (None, true) => builder.with_max_level(config.level).json().try_init(),
        (None, false) => builder.with_max_level(config.level).try_init(),
    };

    match installed {
        Ok(()) => {
            info!("日志系统初始化完成");
            Ok(true)
        }
        Err(e) => {
            debug!("跳过日志初始化: {}", e);
            Ok(false)
        }
    }
}
