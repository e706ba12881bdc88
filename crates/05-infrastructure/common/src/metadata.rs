//! 元数据定义
//!
//! 提供 Bean 标识、类型键、限定符和拦截器绑定等显式标签数据

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bean 唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeanId(Arc<str>);

impl BeanId {
    /// 创建新的 Bean 标识
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// 获取字符串形式
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeanId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BeanId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 类型键
///
/// 标识 Bean 可以满足的类型。既可以是具体类型，也可以是 `dyn Trait` 能力集。
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 从类型获取类型键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 观察所有事件使用的通配类型键
    pub fn any() -> Self {
        Self::of::<dyn std::any::Any>()
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        let trimmed = self.name.trim_start_matches("dyn ");
        trimmed.rsplit("::").next().unwrap_or(trimmed)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 限定符
///
/// 用于在同类型候选 Bean 之间做区分。成员值参与相等比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qualifier {
    name: String,
    members: BTreeMap<String, String>,
}

impl Qualifier {
    /// `@Default` 限定符名称
    pub const DEFAULT: &'static str = "Default";
    /// `@Any` 限定符名称
    pub const ANY: &'static str = "Any";
    /// `@Named` 限定符名称
    pub const NAMED: &'static str = "Named";

    /// 创建新的限定符
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// 添加成员值
    pub fn with_member(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }

    /// `@Default`
    pub fn default_qualifier() -> Self {
        Self::new(Self::DEFAULT)
    }

    /// `@Any`
    pub fn any() -> Self {
        Self::new(Self::ANY)
    }

    /// `@Named("value")`
    pub fn named(value: impl Into<String>) -> Self {
        Self::new(Self::NAMED).with_member("value", value)
    }

    /// 限定符名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 成员值
    pub fn member(&self, key: &str) -> Option<&str> {
        self.members.get(key).map(String::as_str)
    }

    fn is_builtin_marker(&self) -> bool {
        self.name == Self::ANY || self.name == Self::NAMED
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.members.is_empty() {
            let members = self
                .members
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "({})", members)?;
        }
        Ok(())
    }
}

/// 限定符集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifierSet(BTreeSet<Qualifier>);

impl QualifierSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// 添加限定符
    pub fn insert(&mut self, qualifier: Qualifier) -> bool {
        self.0.insert(qualifier)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 限定符数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否包含指定限定符
    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.0.contains(qualifier)
    }

    /// 当前集合是否包含 `required` 中的全部限定符
    pub fn contains_all(&self, required: &QualifierSet) -> bool {
        required.0.is_subset(&self.0)
    }

    /// 遍历限定符
    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }

    /// Bean 的有效限定符
    ///
    /// 总是包含 `@Any`；除 `@Named` 外没有其他限定符时补充 `@Default`。
    pub fn effective_for_bean(&self) -> Self {
        let mut effective = self.clone();
        if self.iter().all(Qualifier::is_builtin_marker) {
            effective.insert(Qualifier::default_qualifier());
        }
        effective.insert(Qualifier::any());
        effective
    }

    /// 注入点所需的有效限定符，未声明时要求 `@Default`
    pub fn effective_required(&self) -> Self {
        if self.is_empty() {
            Self::from_iter([Qualifier::default_qualifier()])
        } else {
            self.clone()
        }
    }

    /// 事件携带的有效限定符
    ///
    /// 总是包含 `@Any`；未声明任何限定符时补充 `@Default`。
    pub fn effective_for_event(&self) -> Self {
        let mut effective = self.clone();
        if self.is_empty() {
            effective.insert(Qualifier::default_qualifier());
        }
        effective.insert(Qualifier::any());
        effective
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[Qualifier]> for QualifierSet {
    fn from(value: &[Qualifier]) -> Self {
        value.iter().cloned().collect()
    }
}

impl fmt::Display for QualifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{}]", joined)
    }
}

/// 拦截器绑定
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterceptorBinding(String);

impl InterceptorBinding {
    /// 创建新的拦截器绑定
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 绑定名称
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterceptorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// 拦截器绑定集合
pub type BindingSet = BTreeSet<InterceptorBinding>;
