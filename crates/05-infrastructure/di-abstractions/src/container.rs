//! 容器配置与统计
//!
//! 容器运行时本身在实现层，这里只定义与具体实现无关的配置和统计快照。

use serde::{Deserialize, Serialize};

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 启动时是否立即实例化标记为 startup 的 Bean
    pub eager_startup: bool,
    /// 启动时是否静态解析所有声明的注入点
    pub validate_injection_points: bool,
    /// 启动时是否检测静态循环依赖
    pub enable_circular_dependency_detection: bool,
    /// 运行期嵌套创建的最大深度
    pub max_resolution_depth: usize,
    /// 是否发送容器初始化/关闭事件
    pub fire_lifecycle_events: bool,
    /// 不对未绑定任何 Bean 的拦截器发出警告
    pub quiet_unused_interceptors: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            eager_startup: true,
            validate_injection_points: true,
            enable_circular_dependency_detection: true,
            max_resolution_depth: 64,
            fire_lifecycle_events: true,
            quiet_unused_interceptors: false,
        }
    }
}

impl ContainerConfig {
    /// 测试用配置：关闭生命周期事件和启动实例化
    pub fn minimal() -> Self {
        Self {
            eager_startup: false,
            fire_lifecycle_events: false,
            ..Self::default()
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    /// 已注册 Bean 数量
    pub registered_beans: usize,
    /// 已注册拦截器数量
    pub registered_interceptors: usize,
    /// 已注册观察者数量
    pub registered_observers: usize,
    /// 已创建实例数量
    pub created_instances: u64,
    /// 已销毁实例数量
    pub destroyed_instances: u64,
    /// 活跃单例数量
    pub active_singletons: usize,
    /// 已发送事件数量
    pub fired_events: u64,
}

/// 容器初始化完成事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInitialized;

/// 容器即将关闭事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerShutdown;
