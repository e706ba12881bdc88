//! 显式异常契约
//!
//! 每个被拦截的方法（以及生命周期回调、观察者方法）都携带一个在构建期确定的
//! 异常契约：允许抛出的异常种类集合。未受检种类总是被允许。

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 异常种类
///
/// 以名称区分；可以声明父种类，形成种类层次。
#[derive(Clone, Copy)]
pub struct ExceptionKind {
    name: &'static str,
    unchecked: bool,
    parent: Option<&'static ExceptionKind>,
}

impl ExceptionKind {
    /// 受检异常种类
    pub const fn checked(name: &'static str) -> Self {
        Self {
            name,
            unchecked: false,
            parent: None,
        }
    }

    /// 未受检异常种类
    pub const fn unchecked(name: &'static str) -> Self {
        Self {
            name,
            unchecked: true,
            parent: None,
        }
    }

    /// 声明父种类
    pub const fn extends(mut self, parent: &'static ExceptionKind) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 种类名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 父种类
    pub fn parent(&self) -> Option<&'static ExceptionKind> {
        self.parent
    }

    /// 是否为未受检种类（自身或任一祖先标记为未受检）
    pub fn is_unchecked(&self) -> bool {
        self.unchecked || self.parent.map_or(false, ExceptionKind::is_unchecked)
    }

    /// 是否为 `other` 或其子种类
    pub fn is_a(&self, other: &ExceptionKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind.name == other.name {
                return true;
            }
            current = kind.parent;
        }
        false
    }
}

impl PartialEq for ExceptionKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ExceptionKind {}

impl Hash for ExceptionKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionKind")
            .field("name", &self.name)
            .field("unchecked", &self.is_unchecked())
            .finish()
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 根受检种类
pub static EXCEPTION: ExceptionKind = ExceptionKind::checked("Exception");

/// 根未受检种类
pub static RUNTIME_EXCEPTION: ExceptionKind =
    ExceptionKind::unchecked("RuntimeException").extends(&EXCEPTION);

/// 异常契约
#[derive(Debug, Clone, Default)]
pub struct ExceptionContract {
    declared: Cow<'static, [&'static ExceptionKind]>,
}

impl ExceptionContract {
    /// 空契约：只允许未受检种类
    pub const EMPTY: ExceptionContract = ExceptionContract {
        declared: Cow::Borrowed(&[]),
    };

    /// 由静态声明创建
    pub const fn declared(kinds: &'static [&'static ExceptionKind]) -> Self {
        Self {
            declared: Cow::Borrowed(kinds),
        }
    }

    /// 由运行期列表创建
    pub fn from_kinds(kinds: Vec<&'static ExceptionKind>) -> Self {
        Self {
            declared: Cow::Owned(kinds),
        }
    }

    /// 声明的种类
    pub fn kinds(&self) -> &[&'static ExceptionKind] {
        &self.declared
    }

    /// 契约是否允许该种类原样传播
    pub fn permits(&self, kind: &ExceptionKind) -> bool {
        kind.is_unchecked() || self.declared.iter().any(|declared| kind.is_a(declared))
    }
}

/// 被拦截方法的构建期元数据
#[derive(Debug, Clone)]
pub struct MethodMetadata {
    declaring_type: &'static str,
    name: &'static str,
    contract: ExceptionContract,
}

impl MethodMetadata {
    /// 创建方法元数据
    pub const fn new(
        declaring_type: &'static str,
        name: &'static str,
        contract: ExceptionContract,
    ) -> Self {
        Self {
            declaring_type,
            name,
            contract,
        }
    }

    /// 声明方法的类型名称
    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    /// 方法名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 异常契约
    pub fn contract(&self) -> &ExceptionContract {
        &self.contract
    }
}

impl fmt::Display for MethodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}
