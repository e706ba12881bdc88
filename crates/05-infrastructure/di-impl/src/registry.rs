//! Bean 注册表实现

use di_abstractions::{BeanDefinition, BeanRegistry, Catalog, ContainerConfig, InterceptorDefinition, ObserverMethod};
use infrastructure_common::{
    BeanId, DefinitionError, DefinitionResult, Qualifier, ScopeKind, TypeKey,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 默认 Bean 注册表
///
/// 由目录一次性构建，之后只读。
#[derive(Debug, Default)]
pub struct DefaultBeanRegistry {
    beans: Vec<Arc<BeanDefinition>>,
    by_id: HashMap<BeanId, usize>,
    by_type: HashMap<TypeKey, Vec<usize>>,
    by_qualifier: HashMap<Qualifier, Vec<usize>>,
    interceptors: Vec<Arc<InterceptorDefinition>>,
    observers: Vec<Arc<ObserverMethod>>,
}

impl DefaultBeanRegistry {
    /// 由目录构建注册表
    ///
    /// `scopes` 为已注册上下文实现的作用域；依赖作用域总是可用。
    pub fn build(
        catalog: Catalog,
        scopes: &[ScopeKind],
        config: &ContainerConfig,
    ) -> DefinitionResult<Self> {
        let mut registry = Self::default();

        let mut interceptor_ids = HashSet::new();
        for interceptor in catalog.interceptors {
            if !interceptor_ids.insert(interceptor.id().to_string()) {
                return Err(DefinitionError::DuplicateInterceptorId {
                    id: interceptor.id().to_string(),
                });
            }
            registry.interceptors.push(Arc::new(interceptor));
        }

        let mut observer_ids = HashSet::new();
        for observer in catalog.observers {
            if !observer_ids.insert(observer.id().to_string()) {
                return Err(DefinitionError::DuplicateObserverId {
                    id: observer.id().to_string(),
                });
            }
            registry.observers.push(Arc::new(observer));
        }

        for bean in catalog.beans {
            registry.register(bean, scopes)?;
        }

        if !config.quiet_unused_interceptors {
            registry.warn_unused_interceptors();
        }

        info!(
            "Bean 注册表构建完成: {} 个 Bean, {} 个拦截器, {} 个观察者",
            registry.beans.len(),
            registry.interceptors.len(),
            registry.observers.len()
        );
        Ok(registry)
    }

    fn register(&mut self, bean: BeanDefinition, scopes: &[ScopeKind]) -> DefinitionResult<()> {
        let id = bean.id().clone();
        if self.by_id.contains_key(&id) {
            return Err(DefinitionError::DuplicateBeanId { id });
        }
        if bean.types().is_empty() {
            return Err(DefinitionError::NoExposedTypes { bean: id });
        }
        if bean.creation().is_none() {
            return Err(DefinitionError::MissingCreationStrategy { bean: id });
        }
        if !bean.scope().is_dependent() && !scopes.contains(bean.scope()) {
            return Err(DefinitionError::MissingContext {
                bean: id,
                scope: bean.scope().clone(),
            });
        }
        if let Some(binding) = bean.bindings().iter().find(|binding| {
            !self
                .interceptors
                .iter()
                .any(|interceptor| interceptor.bindings().contains(*binding))
        }) {
            return Err(DefinitionError::UnboundInterceptorBinding {
                bean: id,
                binding: binding.clone(),
            });
        }

        let index = self.beans.len();
        for bean_type in bean.types() {
            self.by_type.entry(bean_type.key()).or_default().push(index);
        }
        for qualifier in bean.effective_qualifiers().iter() {
            self.by_qualifier
                .entry(qualifier.clone())
                .or_default()
                .push(index);
        }
        debug!("注册 Bean: {} ({}, {})", id, bean.implementation(), bean.scope());
        self.by_id.insert(id, index);
        self.beans.push(Arc::new(bean));
        Ok(())
    }

    fn warn_unused_interceptors(&self) {
        for interceptor in &self.interceptors {
            let used = self.beans.iter().any(|bean| {
                bean.bindings()
                    .iter()
                    .any(|binding| interceptor.bindings().contains(binding))
            });
            if !used {
                warn!("拦截器 {} 没有绑定到任何 Bean", interceptor.id());
            }
        }
    }

    /// 带有指定有效限定符的 Bean，按声明顺序
    pub fn beans_with_qualifier(&self, qualifier: &Qualifier) -> Vec<Arc<BeanDefinition>> {
        self.by_qualifier
            .get(qualifier)
            .map(|indices| indices.iter().map(|&i| Arc::clone(&self.beans[i])).collect())
            .unwrap_or_default()
    }
}

impl BeanRegistry for DefaultBeanRegistry {
    fn bean(&self, id: &BeanId) -> Option<&Arc<BeanDefinition>> {
        self.by_id.get(id).map(|&index| &self.beans[index])
    }

    fn beans(&self) -> &[Arc<BeanDefinition>] {
        &self.beans
    }

    fn beans_of_type(&self, key: TypeKey) -> Vec<Arc<BeanDefinition>> {
        self.by_type
            .get(&key)
            .map(|indices| indices.iter().map(|&i| Arc::clone(&self.beans[i])).collect())
            .unwrap_or_default()
    }

    fn interceptors(&self) -> &[Arc<InterceptorDefinition>] {
        &self.interceptors
    }

    fn observers(&self) -> &[Arc<ObserverMethod>] {
        &self.observers
    }
}
