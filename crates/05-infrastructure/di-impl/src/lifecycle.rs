//! 生命周期执行器
//!
//! 通过拦截链执行构造、构造后回调和销毁前回调，并对冒出的异常应用包装策略。

use crate::interception::InterceptorChains;
use crate::registry::DefaultBeanRegistry;
use di_abstractions::{
    BeanDefinition, BeanRegistry, ContextualInstance, CreationalContext, Instance, Value,
};
use infrastructure_common::{ExceptionContract, InterceptionPhase, InvocationError, InvocationResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 生命周期计数
#[derive(Debug, Default)]
pub struct LifecycleStats {
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl LifecycleStats {
    /// 已创建实例数量
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// 已销毁实例数量
    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }
}

/// 生命周期执行器
#[derive(Debug)]
pub struct LifecycleExecutor {
    registry: Arc<DefaultBeanRegistry>,
    chains: Arc<InterceptorChains>,
    stats: LifecycleStats,
}

impl LifecycleExecutor {
    /// 创建执行器
    pub fn new(registry: Arc<DefaultBeanRegistry>, chains: Arc<InterceptorChains>) -> Self {
        Self {
            registry,
            chains,
            stats: LifecycleStats::default(),
        }
    }

    /// 计数
    pub fn stats(&self) -> &LifecycleStats {
        &self.stats
    }

    /// 通过构造拦截链创建原始实例
    ///
    /// `construct` 是链末端的构造函数或生产者调用；构造拦截器重复 `proceed` 时会再次调用。
    pub fn construct<F>(
        &self,
        bean: &BeanDefinition,
        ctx: &mut CreationalContext<'_>,
        mut construct: F,
    ) -> InvocationResult<Instance>
    where
        F: FnMut(&mut CreationalContext<'_>) -> InvocationResult<Instance>,
    {
        let instance = match self.chains.chain(bean.id(), InterceptionPhase::AroundConstruct) {
            Some(chain) if !chain.is_empty() => {
                let value = chain.execute(None, None, bean.construct_contract(), || {
                    construct(ctx).map(|instance| Box::new(instance) as Value)
                })?;
                *value.downcast::<Instance>().map_err(|_| {
                    InvocationError::illegal_state(format!(
                        "构造拦截器为 {} 返回了不匹配的结果类型",
                        bean.id()
                    ))
                })?
            }
            _ => construct(ctx).map_err(|error| {
                di_abstractions::apply_exception_policy(error, bean.construct_contract())
            })?,
        };

        self.stats.created.fetch_add(1, Ordering::Relaxed);
        debug!("创建实例: {} ({})", bean.id(), bean.scope());
        Ok(instance)
    }

    /// 通过构造后拦截链执行构造后回调
    pub fn post_construct(&self, bean: &BeanDefinition, instance: &Instance) -> InvocationResult<()> {
        self.run_callback(bean, instance, InterceptionPhase::PostConstruct)
    }

    /// 通过销毁前拦截链执行销毁前回调
    pub fn pre_destroy(&self, bean: &BeanDefinition, instance: &Instance) -> InvocationResult<()> {
        self.run_callback(bean, instance, InterceptionPhase::PreDestroy)
    }

    fn run_callback(
        &self,
        bean: &BeanDefinition,
        instance: &Instance,
        phase: InterceptionPhase,
    ) -> InvocationResult<()> {
        let callback = match phase {
            InterceptionPhase::PostConstruct => bean.post_construct(),
            _ => bean.pre_destroy(),
        };
        let contract = callback.map_or(&ExceptionContract::EMPTY, |callback| callback.contract());
        let invoke = || match callback {
            Some(callback) => callback.invoke(instance),
            None => Ok(()),
        };

        match self.chains.chain(bean.id(), phase) {
            Some(chain) if !chain.is_empty() => chain
                .execute(Some(instance), None, contract, || {
                    invoke().map(|()| Box::new(()) as Value)
                })
                .map(drop),
            _ => invoke().map_err(|error| di_abstractions::apply_exception_policy(error, contract)),
        }
    }

    /// 销毁上下文实例
    ///
    /// 先执行销毁前拦截链，再按深度优先后序销毁依赖作用域实例。每个实例只销毁一次；
    /// 所有步骤都会执行，返回第一个错误。
    pub fn destroy(&self, instance: &Arc<ContextualInstance>) -> InvocationResult<()> {
        if !instance.mark_destroyed() {
            return Ok(());
        }

        let mut first_error = None;

        match self.registry.bean(instance.bean()) {
            Some(bean) => {
                if let Err(error) = self.pre_destroy(bean, instance.instance()) {
                    warn!("销毁 {} 时回调失败: {}", instance.bean(), error);
                    first_error.get_or_insert(error);
                }
            }
            None => {
                first_error.get_or_insert(InvocationError::illegal_state(format!(
                    "销毁的实例属于未知 Bean: {}",
                    instance.bean()
                )));
            }
        }

        if let Err(error) = self.destroy_all(instance.take_dependents()) {
            first_error.get_or_insert(error);
        }

        self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
        debug!("销毁实例: {} ({})", instance.bean(), instance.id());
        first_error.map_or(Ok(()), Err)
    }

    /// 依次销毁多个实例，返回第一个错误
    pub fn destroy_all(&self, instances: Vec<Arc<ContextualInstance>>) -> InvocationResult<()> {
        let mut first_error = None;
        for instance in instances {
            if let Err(error) = self.destroy(&instance) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
