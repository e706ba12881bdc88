//! # 容器组合层
//!
//! 负责把日志、容器设置和构建期目录组合起来，启动一个可运行的 [`Container`]。
//!
//! ## 主要功能
//!
//! - **容器启动器**: 使用构建者模式组装设置来源、自定义上下文和目录
//! - **设置加载**: 默认值、TOML、JSON、环境变量按优先级合并为 `ContainerConfig`
//! - **日志初始化**: 基于 `tracing-subscriber` 的 fmt / JSON 输出
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{ContainerBootstrapper, LoggingConfig};
//! use di_abstractions::Catalog;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let container = ContainerBootstrapper::new()
//!         .with_logging(LoggingConfig::development())
//!         .add_config_toml("./container.toml")?
//!         .add_config_env_vars("ARC_")
//!         .add_catalog(Catalog::new())
//!         .bootstrap()?;
//!
//!     println!("已注册 Bean: {}", container.stats().registered_beans);
//!
//!     container.stop()?;
//!     Ok(())
//! }
//! ```

pub mod bootstrapper;
pub mod error;
pub mod logging;
pub mod settings;

pub use bootstrapper::ContainerBootstrapper;
pub use error::{BootstrapError, BootstrapResult};
pub use logging::{init_logging, LoggingConfig};
pub use settings::{SettingsLoader, SettingsSource, CONTAINER_SECTION, DEFAULT_ENV_PREFIX};

// 重新导出容器类型
pub use di_impl::Container;

#[cfg(test)]
mod tests {
    mod bootstrap_tests;
}
