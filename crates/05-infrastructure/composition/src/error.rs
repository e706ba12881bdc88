//! 启动错误

use infrastructure_common::ContainerError;
use std::path::PathBuf;
use thiserror::Error;

/// 容器启动过程中的错误
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// 配置文件不存在
    #[error("配置文件不存在: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    /// 配置文件读取失败
    #[error("读取配置文件失败 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML 配置解析失败 {}: {source}", path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// JSON 解析失败
    #[error("JSON 配置解析失败 {}: {source}", path.display())]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 合并后的设置无法绑定到容器配置
    #[error("容器配置无效: {source}")]
    InvalidSetting {
        #[source]
        source: serde_json::Error,
    },

    /// 日志初始化失败
    #[error("日志初始化失败: {message}")]
    Logging { message: String },

    /// 容器启动失败
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// 启动结果类型
pub type BootstrapResult<T> = Result<T, BootstrapError>;
