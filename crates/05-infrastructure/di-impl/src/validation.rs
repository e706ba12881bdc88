//! 启动校验
//!
//! 在容器可用之前静态检查目录：注入点可解析、无循环依赖、作用域兼容、
//! 被拦截的 Bean 暴露的每个类型都有生成的包装类型。

use crate::interception::InterceptorChains;
use crate::registry::DefaultBeanRegistry;
use crate::resolution::DefaultBeanResolver;
use di_abstractions::{BeanRegistry, BeanResolver, ContainerConfig};
use infrastructure_common::{BeanId, DefinitionError, DefinitionResult, InterceptionPhase, ScopeKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 依赖图节点
#[derive(Debug, Clone)]
pub struct DependencyGraphNode {
    /// Bean 标识
    pub bean: BeanId,
    /// 直接依赖，按声明顺序
    pub dependencies: Vec<BeanId>,
}

/// 启动校验器
pub struct StartupValidator<'a> {
    registry: &'a DefaultBeanRegistry,
    resolver: &'a DefaultBeanResolver,
    chains: &'a InterceptorChains,
    config: &'a ContainerConfig,
}

impl<'a> StartupValidator<'a> {
    /// 创建校验器
    pub fn new(
        registry: &'a DefaultBeanRegistry,
        resolver: &'a DefaultBeanResolver,
        chains: &'a InterceptorChains,
        config: &'a ContainerConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            chains,
            config,
        }
    }

    /// 执行全部校验
    pub fn validate(&self) -> DefinitionResult<()> {
        self.validate_references()?;
        self.validate_wrappers()?;

        let graph = self.build_dependency_graph()?;
        self.validate_scopes(&graph)?;
        if self.config.enable_circular_dependency_detection {
            detect_circular_dependencies(&graph)?;
        }

        debug!("启动校验通过: {} 个 Bean", graph.len());
        Ok(())
    }

    fn validate_references(&self) -> DefinitionResult<()> {
        for bean in self.registry.beans() {
            if let Some(declaring) = bean.declaring_bean() {
                if !self.registry.contains(declaring) {
                    return Err(DefinitionError::UnknownDeclaringBean {
                        bean: bean.id().clone(),
                        declaring: declaring.clone(),
                    });
                }
            }
        }

        for observer in self.registry.observers() {
            if let Some(owner) = observer.owner() {
                if !self.registry.contains(owner) {
                    return Err(DefinitionError::UnknownObserverOwner {
                        observer: observer.id().to_string(),
                        owner: owner.clone(),
                    });
                }
            }
            if self.config.validate_injection_points {
                for point in observer.injection_points() {
                    self.resolver.resolve_point(point).map_err(|source| {
                        DefinitionError::InvalidInjectionPoint {
                            owner: point.to_string(),
                            source,
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    fn validate_wrappers(&self) -> DefinitionResult<()> {
        for bean in self.registry.beans() {
            if !self.chains.is_intercepted(bean.id(), InterceptionPhase::AroundInvoke) {
                continue;
            }
            if let Some(unwrapped) = bean.types().iter().find(|t| !t.has_wrapper()) {
                return Err(DefinitionError::MissingWrapper {
                    bean: bean.id().clone(),
                    type_name: unwrapped.key().name(),
                });
            }
        }
        Ok(())
    }

    /// 构建依赖图
    ///
    /// 边来自静态注入点和生产者的声明 Bean。关闭注入点校验时，无法解析的注入点不产生边。
    pub fn build_dependency_graph(&self) -> DefinitionResult<Vec<DependencyGraphNode>> {
        let mut graph = Vec::with_capacity(self.registry.beans().len());
        for bean in self.registry.beans() {
            let mut dependencies = Vec::new();
            if let Some(declaring) = bean.declaring_bean() {
                dependencies.push(declaring.clone());
            }
            for point in bean.injection_points() {
                match self.resolver.resolve_point(point) {
                    Ok(dependency) => dependencies.push(dependency.id().clone()),
                    Err(source) if self.config.validate_injection_points => {
                        return Err(DefinitionError::InvalidInjectionPoint {
                            owner: point.to_string(),
                            source,
                        });
                    }
                    Err(_) => {}
                }
            }
            graph.push(DependencyGraphNode {
                bean: bean.id().clone(),
                dependencies,
            });
        }
        Ok(graph)
    }

    fn validate_scopes(&self, graph: &[DependencyGraphNode]) -> DefinitionResult<()> {
        for node in graph {
            let Some(bean) = self.registry.bean(&node.bean) else {
                continue;
            };
            if *bean.scope() != ScopeKind::Singleton {
                continue;
            }
            for dependency in &node.dependencies {
                let Some(target) = self.registry.bean(dependency) else {
                    continue;
                };
                if target.scope().requires_active_boundary() {
                    return Err(DefinitionError::ScopeMismatch {
                        bean: bean.id().clone(),
                        scope: bean.scope().clone(),
                        dependency: dependency.clone(),
                        dependency_scope: target.scope().clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 使用深度优先搜索检测循环依赖
pub fn detect_circular_dependencies(graph: &[DependencyGraphNode]) -> DefinitionResult<()> {
    let nodes: HashMap<&BeanId, &DependencyGraphNode> =
        graph.iter().map(|node| (&node.bean, node)).collect();
    let mut visited = HashSet::new();
    let mut visiting = Vec::new();

    for node in graph {
        if !visited.contains(&node.bean) {
            dfs_check(&node.bean, &nodes, &mut visited, &mut visiting)?;
        }
    }
    Ok(())
}

fn dfs_check<'g>(
    current: &'g BeanId,
    nodes: &HashMap<&'g BeanId, &'g DependencyGraphNode>,
    visited: &mut HashSet<&'g BeanId>,
    visiting: &mut Vec<&'g BeanId>,
) -> DefinitionResult<()> {
    if let Some(start) = visiting.iter().position(|bean| *bean == current) {
        let chain = visiting[start..]
            .iter()
            .chain(std::iter::once(&current))
            .map(|bean| bean.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(DefinitionError::CircularDependency { chain });
    }
    if visited.contains(current) {
        return Ok(());
    }

    visiting.push(current);
    if let Some(&node) = nodes.get(current) {
        for dependency in &node.dependencies {
            dfs_check(dependency, nodes, visited, visiting)?;
        }
    }
    visiting.pop();
    visited.insert(current);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(bean: &str, dependencies: &[&str]) -> DependencyGraphNode {
        DependencyGraphNode {
            bean: BeanId::new(bean),
            dependencies: dependencies.iter().map(|d| BeanId::new(*d)).collect(),
        }
    }

    #[test]
    fn test_cycle_is_reported_with_chain() {
        let graph = vec![node("a", &["b"]), node("b", &["c"]), node("c", &["a"])];

        match detect_circular_dependencies(&graph) {
            Err(DefinitionError::CircularDependency { chain }) => {
                assert_eq!(chain, "a -> b -> c -> a");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let graph = vec![
            node("top", &["left", "right"]),
            node("left", &["bottom"]),
            node("right", &["bottom"]),
            node("bottom", &[]),
        ];

        assert!(detect_circular_dependencies(&graph).is_ok());
    }
}
