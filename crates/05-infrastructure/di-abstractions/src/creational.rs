//! 创建期上下文
//!
//! 一次创建（构造、生产者调用或观察者通知）期间注入的依赖作用域实例都记录在这里，
//! 创建完成后交给所有者，所有者销毁时一并销毁。

use crate::context::ContextualInstance;
use crate::resolver::{DependencyProvider, InjectionPoint, ResolveContext};
use infrastructure_common::{InvocationError, InvocationResult, Qualifier};
use std::sync::Arc;

/// 创建期上下文
pub struct CreationalContext<'a> {
    provider: &'a dyn DependencyProvider,
    resolve: ResolveContext,
    dependents: Vec<Arc<ContextualInstance>>,
}

impl<'a> CreationalContext<'a> {
    /// 创建新的上下文
    pub fn new(provider: &'a dyn DependencyProvider, resolve: ResolveContext) -> Self {
        Self {
            provider,
            resolve,
            dependents: Vec::new(),
        }
    }

    /// 注入类型为 `T` 的依赖
    pub fn inject<T>(&mut self, qualifiers: &[Qualifier]) -> InvocationResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let point = InjectionPoint::of::<T>(qualifiers);
        let handle = self.inject_point(&point)?;
        handle
            .downcast::<Arc<T>>()
            .map(|typed| *typed)
            .map_err(|_| {
                InvocationError::illegal_state(format!("注入点 {} 得到的句柄类型不匹配", point))
            })
    }

    /// 注入指定注入点，返回类型擦除的句柄
    pub fn inject_point(&mut self, point: &InjectionPoint) -> InvocationResult<crate::bean::ErasedHandle> {
        let provider = self.provider;
        provider.provide(point, self)
    }

    /// 记录一个依赖作用域实例
    pub fn add_dependent(&mut self, instance: Arc<ContextualInstance>) {
        self.dependents.push(instance);
    }

    /// 取出记录的依赖作用域实例
    pub fn take_dependents(&mut self) -> Vec<Arc<ContextualInstance>> {
        std::mem::take(&mut self.dependents)
    }

    /// 当前记录的依赖作用域实例数量
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// 解析上下文
    pub fn resolve_context(&mut self) -> &mut ResolveContext {
        &mut self.resolve
    }

    /// 依赖提供者
    pub fn provider(&self) -> &'a dyn DependencyProvider {
        self.provider
    }
}
