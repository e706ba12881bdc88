//! 解析抽象接口
//!
//! 注入点、类型安全解析以及解析链上的循环检测。

use crate::bean::{BeanDefinition, ErasedHandle};
use crate::creational::CreationalContext;
use infrastructure_common::{
    BeanId, InvocationError, InvocationResult, Qualifier, QualifierSet, ResolutionResult, TypeKey,
};
use std::fmt;
use std::sync::Arc;

/// 注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    required: TypeKey,
    qualifiers: QualifierSet,
    owner: Option<String>,
}

impl InjectionPoint {
    /// 创建注入点
    pub fn new(required: TypeKey, qualifiers: QualifierSet) -> Self {
        Self {
            required,
            qualifiers,
            owner: None,
        }
    }

    /// 需要类型 `T` 的注入点
    pub fn of<T>(qualifiers: &[Qualifier]) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::new(TypeKey::of::<T>(), QualifierSet::from(qualifiers))
    }

    /// 设置注入点所有者描述
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// 需要的类型
    pub fn required(&self) -> TypeKey {
        self.required
    }

    /// 需要的限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// 所有者描述
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{} -> {} {}", owner, self.required, self.qualifiers),
            None => write!(f, "{} {}", self.required, self.qualifiers),
        }
    }
}

/// Bean 解析器 trait
///
/// 按类型和限定符选择唯一的 Bean。
pub trait BeanResolver: Send + Sync {
    /// 解析唯一的 Bean
    fn resolve(&self, required: TypeKey, qualifiers: &QualifierSet) -> ResolutionResult<Arc<BeanDefinition>>;

    /// 返回所有满足条件的 Bean，按声明顺序
    fn select_all(&self, required: TypeKey, qualifiers: &QualifierSet) -> Vec<Arc<BeanDefinition>>;

    /// 解析注入点
    fn resolve_point(&self, point: &InjectionPoint) -> ResolutionResult<Arc<BeanDefinition>> {
        self.resolve(point.required(), point.qualifiers())
    }
}

/// 依赖提供者 trait
///
/// 为注入点提供类型化句柄；依赖作用域的实例挂到创建期上下文上。
pub trait DependencyProvider: Send + Sync {
    /// 提供注入点对应的句柄，内容为 `Arc<T>`
    fn provide(
        &self,
        point: &InjectionPoint,
        ctx: &mut CreationalContext<'_>,
    ) -> InvocationResult<ErasedHandle>;
}

/// 解析上下文
///
/// 记录当前正在创建的 Bean 链，用于检测运行期循环依赖。
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// 当前解析链
    pub resolution_chain: Vec<BeanId>,
    /// 最大递归深度
    pub max_depth: usize,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new(max_depth: usize) -> Self {
        Self {
            resolution_chain: Vec::new(),
            max_depth,
        }
    }

    /// 添加 Bean 到解析链
    pub fn push_bean(&mut self, bean: &BeanId) -> InvocationResult<()> {
        if self.resolution_chain.contains(bean) {
            return Err(InvocationError::CircularDependency {
                chain: self.describe_with(bean),
            });
        }
        if self.resolution_chain.len() >= self.max_depth {
            return Err(InvocationError::illegal_state(format!(
                "解析深度超过上限 {}: {}",
                self.max_depth,
                self.describe_with(bean)
            )));
        }
        self.resolution_chain.push(bean.clone());
        Ok(())
    }

    /// 从解析链中移除 Bean
    pub fn pop_bean(&mut self) {
        self.resolution_chain.pop();
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }

    fn describe_with(&self, next: &BeanId) -> String {
        self.resolution_chain
            .iter()
            .chain(std::iter::once(next))
            .map(BeanId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(64)
    }
}
