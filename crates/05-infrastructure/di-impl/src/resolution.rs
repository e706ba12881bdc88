//! 解析引擎
//!
//! 纯函数式的类型安全解析：相同的注册表和输入总是得到相同的 Bean。

use crate::registry::DefaultBeanRegistry;
use di_abstractions::{BeanDefinition, BeanRegistry, BeanResolver};
use infrastructure_common::{QualifierSet, ResolutionError, ResolutionResult, TypeKey};
use std::sync::Arc;
use tracing::trace;

/// 默认 Bean 解析器
#[derive(Debug, Clone)]
pub struct DefaultBeanResolver {
    registry: Arc<DefaultBeanRegistry>,
}

impl DefaultBeanResolver {
    /// 创建解析器
    pub fn new(registry: Arc<DefaultBeanRegistry>) -> Self {
        Self { registry }
    }
}

impl BeanResolver for DefaultBeanResolver {
    fn resolve(
        &self,
        required: TypeKey,
        qualifiers: &QualifierSet,
    ) -> ResolutionResult<Arc<BeanDefinition>> {
        let mut candidates = self.select_all(required, qualifiers);

        if candidates.len() > 1 && candidates.iter().any(|bean| !bean.is_fallback()) {
            candidates.retain(|bean| !bean.is_fallback());
        }

        if candidates.len() > 1 {
            let defaults: Vec<_> = candidates
                .iter()
                .filter(|bean| bean.is_default_candidate())
                .cloned()
                .collect();
            if defaults.len() == 1 {
                candidates = defaults;
            }
        }

        match candidates.len() {
            0 => Err(ResolutionError::Unsatisfied {
                required,
                qualifiers: qualifiers.effective_required(),
            }),
            1 => {
                let bean = candidates.remove(0);
                trace!("解析 {} {} -> {}", required, qualifiers, bean.id());
                Ok(bean)
            }
            _ => Err(ResolutionError::Ambiguous {
                required,
                qualifiers: qualifiers.effective_required(),
                candidates: candidates.iter().map(|bean| bean.id().clone()).collect(),
            }),
        }
    }

    fn select_all(&self, required: TypeKey, qualifiers: &QualifierSet) -> Vec<Arc<BeanDefinition>> {
        let required_qualifiers = qualifiers.effective_required();
        self.registry
            .beans_of_type(required)
            .into_iter()
            .filter(|bean| bean.effective_qualifiers().contains_all(&required_qualifiers))
            .collect()
    }
}
