//! 容器设置加载
//!
//! 按优先级从低到高合并：默认值、TOML 文件、JSON 文件、带前缀的环境变量。
//! 所有来源先转换为 JSON 值再合并，最后绑定到 [`ContainerConfig`]。

use crate::error::{BootstrapError, BootstrapResult};
use di_abstractions::ContainerConfig;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "ARC_";

/// 配置文件中容器设置所在的节
pub const CONTAINER_SECTION: &str = "container";

/// 设置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// TOML 文件
    Toml(PathBuf),
    /// JSON 文件
    Json(PathBuf),
    /// 环境变量
    Environment { prefix: String },
}

impl SettingsSource {
    fn precedence(&self) -> u8 {
        match self {
            Self::Toml(_) => 0,
            Self::Json(_) => 1,
            Self::Environment { .. } => 2,
        }
    }
}

/// 设置加载器
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    sources: Vec<SettingsSource>,
}

impl SettingsLoader {
    /// 创建不含任何来源的加载器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 TOML 文件
    pub fn toml_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(SettingsSource::Toml(path.into()));
        self
    }

    /// 添加 JSON 文件
    pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(SettingsSource::Json(path.into()));
        self
    }

    /// 添加环境变量来源
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(SettingsSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// 已登记的来源
    pub fn sources(&self) -> &[SettingsSource] {
        &self.sources
    }

    /// 从进程环境加载
    pub fn load(&self) -> BootstrapResult<ContainerConfig> {
        self.load_with_env(std::env::vars())
    }

    /// 使用给定的环境变量集合加载
    pub fn load_with_env<I, K, V>(&self, vars: I) -> BootstrapResult<ContainerConfig>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        let mut merged = serde_json::to_value(ContainerConfig::default())
            .map_err(|source| BootstrapError::InvalidSetting { source })?;

        let mut ordered: Vec<&SettingsSource> = self.sources.iter().collect();
        ordered.sort_by_key(|source| source.precedence());

        for source in ordered {
            let layer = match source {
                SettingsSource::Toml(path) => read_toml(path)?,
                SettingsSource::Json(path) => read_json(path)?,
                SettingsSource::Environment { prefix } => environment_layer(prefix, &vars),
            };
            debug!("合并设置来源: {:?}", source);
            merge_values(&mut merged, container_section(layer));
        }

        serde_json::from_value(merged).map_err(|source| BootstrapError::InvalidSetting { source })
    }
}

fn read_file(path: &Path) -> BootstrapResult<String> {
    if !path.exists() {
        return Err(BootstrapError::ConfigFileNotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_toml(path: &Path) -> BootstrapResult<Value> {
    let content = read_file(path)?;
    let table: toml::Table = toml::from_str(&content).map_err(|source| BootstrapError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_value(table).map_err(|source| BootstrapError::InvalidSetting { source })
}

fn read_json(path: &Path) -> BootstrapResult<Value> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|source| BootstrapError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// 文件包含 `[container]` 节时只取该节
fn container_section(layer: Value) -> Value {
    match layer {
        Value::Object(mut map) if matches!(map.get(CONTAINER_SECTION), Some(Value::Object(_))) => {
            map.remove(CONTAINER_SECTION).unwrap_or(Value::Object(Map::new()))
        }
        other => other,
    }
}

/// `ARC_EAGER_STARTUP=false` 映射为 `eager_startup: false`
fn environment_layer(prefix: &str, vars: &[(String, String)]) -> Value {
    let mut layer = Map::new();
    for (key, value) in vars {
        if let Some(name) = key.strip_prefix(prefix) {
            let name = name.trim_start_matches('_').to_lowercase();
            if !name.is_empty() {
                layer.insert(name, parse_env_value(value));
            }
        }
    }
    Value::Object(layer)
}

fn parse_env_value(value: &str) -> Value {
    if let Ok(bool_val) = value.parse::<bool>() {
        Value::Bool(bool_val)
    } else if let Ok(int_val) = value.parse::<u64>() {
        Value::Number(int_val.into())
    } else if let Ok(int_val) = value.parse::<i64>() {
        Value::Number(int_val.into())
    } else {
        Value::String(value.to_string())
    }
}

fn merge_values(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, overlay) => *target = overlay,
    }
}
