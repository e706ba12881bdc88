//! 拦截链构建
//!
//! 每个 (Bean, 阶段) 的拦截链在容器启动时构建一次，之后只读并被该 Bean 的所有实例共享。

use di_abstractions::{BeanDefinition, InterceptionChain, InterceptorDefinition};
use infrastructure_common::{BeanId, InterceptionPhase};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 拦截链构建器
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    interceptors: Vec<Arc<InterceptorDefinition>>,
}

impl ChainBuilder {
    /// 以声明顺序的拦截器创建构建器
    pub fn new(interceptors: &[Arc<InterceptorDefinition>]) -> Self {
        Self {
            interceptors: interceptors.to_vec(),
        }
    }

    /// 适用于 Bean 指定阶段的拦截器，按 (优先级, 声明顺序) 排序
    pub fn applicable(
        &self,
        bean: &BeanDefinition,
        phase: InterceptionPhase,
    ) -> Vec<Arc<InterceptorDefinition>> {
        let mut matched: Vec<(usize, &Arc<InterceptorDefinition>)> = self
            .interceptors
            .iter()
            .enumerate()
            .filter(|(_, interceptor)| {
                interceptor.applies_to(phase)
                    && interceptor
                        .bindings()
                        .iter()
                        .any(|binding| bean.bindings().contains(binding))
            })
            .collect();
        matched.sort_by_key(|(index, interceptor)| (interceptor.priority_value(), *index));
        matched
            .into_iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect()
    }

    /// 构建拦截链
    pub fn build_chain(&self, bean: &BeanDefinition, phase: InterceptionPhase) -> InterceptionChain {
        InterceptionChain::new(bean.id().clone(), phase, &self.applicable(bean, phase))
    }

    /// 为全部 Bean 的全部阶段构建拦截链
    pub fn build_all(&self, beans: &[Arc<BeanDefinition>]) -> InterceptorChains {
        let mut chains = HashMap::new();
        for bean in beans {
            for phase in InterceptionPhase::ALL {
                let chain = self.build_chain(bean, phase);
                if !chain.is_empty() {
                    debug!(
                        "构建拦截链: {} {} -> {:?}",
                        bean.id(),
                        phase,
                        chain.interceptor_ids()
                    );
                }
                chains.insert((bean.id().clone(), phase), Arc::new(chain));
            }
        }
        InterceptorChains { chains }
    }
}

/// 已构建的拦截链
#[derive(Debug, Default)]
pub struct InterceptorChains {
    chains: HashMap<(BeanId, InterceptionPhase), Arc<InterceptionChain>>,
}

impl InterceptorChains {
    /// 获取拦截链
    pub fn chain(&self, bean: &BeanId, phase: InterceptionPhase) -> Option<&Arc<InterceptionChain>> {
        self.chains.get(&(bean.clone(), phase))
    }

    /// Bean 是否在指定阶段被拦截
    pub fn is_intercepted(&self, bean: &BeanId, phase: InterceptionPhase) -> bool {
        self.chain(bean, phase).map_or(false, |chain| !chain.is_empty())
    }
}
