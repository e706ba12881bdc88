//! 作用域与拦截阶段

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Bean 作用域类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// 单例模式 - 容器生命周期内只创建一个实例
    Singleton,
    /// 依赖模式 - 每个使用点创建一个实例，随所有者一起销毁
    Dependent,
    /// 请求模式 - 在一次活动请求边界内共享实例
    Request,
    /// 自定义作用域，必须在构建容器时注册对应的上下文实现
    Custom(Cow<'static, str>),
}

impl ScopeKind {
    /// 创建自定义作用域
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom(name.into())
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        match self {
            ScopeKind::Singleton => "Singleton",
            ScopeKind::Dependent => "Dependent",
            ScopeKind::Request => "Request",
            ScopeKind::Custom(name) => name,
        }
    }

    /// 是否为依赖作用域
    pub fn is_dependent(&self) -> bool {
        matches!(self, ScopeKind::Dependent)
    }

    /// 是否需要活动边界才能访问
    pub fn requires_active_boundary(&self) -> bool {
        !matches!(self, ScopeKind::Singleton | ScopeKind::Dependent)
    }
}

impl Default for ScopeKind {
    fn default() -> Self {
        Self::Dependent
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

/// 拦截阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InterceptionPhase {
    /// 包裹构造（构造函数或生产者）
    AroundConstruct,
    /// 包裹构造后回调
    PostConstruct,
    /// 包裹业务方法调用
    AroundInvoke,
    /// 包裹销毁前回调
    PreDestroy,
}

impl InterceptionPhase {
    /// 全部阶段
    pub const ALL: [InterceptionPhase; 4] = [
        InterceptionPhase::AroundConstruct,
        InterceptionPhase::PostConstruct,
        InterceptionPhase::AroundInvoke,
        InterceptionPhase::PreDestroy,
    ];
}

impl fmt::Display for InterceptionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterceptionPhase::AroundConstruct => "AroundConstruct",
            InterceptionPhase::PostConstruct => "PostConstruct",
            InterceptionPhase::AroundInvoke => "AroundInvoke",
            InterceptionPhase::PreDestroy => "PreDestroy",
        };
        f.write_str(name)
    }
}
