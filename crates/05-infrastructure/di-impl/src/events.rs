//! 观察者注册表与事件分发
//!
//! 观察者顺序在构建时按 (优先级, 声明顺序) 固定；分发是同步的，
//! 全部观察者执行完毕后 `dispatch` 才返回。

use di_abstractions::{Event, EventContext, ObserverMethod};
use infrastructure_common::{InvocationResult, QualifierSet, TypeKey};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// 观察者注册表
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    ordered: Vec<Arc<ObserverMethod>>,
    by_type: HashMap<TypeKey, Vec<usize>>,
}

impl ObserverRegistry {
    /// 由声明顺序的观察者构建注册表
    pub fn new(observers: &[Arc<ObserverMethod>]) -> Self {
        let mut indexed: Vec<(usize, &Arc<ObserverMethod>)> = observers.iter().enumerate().collect();
        indexed.sort_by_key(|(index, observer)| (observer.priority(), *index));

        let ordered: Vec<_> = indexed
            .into_iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        let mut by_type: HashMap<TypeKey, Vec<usize>> = HashMap::new();
        for (position, observer) in ordered.iter().enumerate() {
            by_type.entry(observer.observed()).or_default().push(position);
        }

        Self { ordered, by_type }
    }

    /// 按分发顺序排列的全部观察者
    pub fn observers(&self) -> &[Arc<ObserverMethod>] {
        &self.ordered
    }

    /// 匹配事件类型闭包与有效限定符的观察者，按分发顺序
    ///
    /// 观察者声明的限定符必须全部出现在事件的有效限定符中。
    pub fn resolve(&self, types: &[TypeKey], qualifiers: &QualifierSet) -> Vec<Arc<ObserverMethod>> {
        let positions: BTreeSet<usize> = types
            .iter()
            .filter_map(|key| self.by_type.get(key))
            .flatten()
            .copied()
            .collect();

        positions
            .into_iter()
            .map(|position| &self.ordered[position])
            .filter(|observer| qualifiers.contains_all(observer.qualifiers()))
            .cloned()
            .collect()
    }
}

/// 事件分发器
#[derive(Debug, Default)]
pub struct EventDispatcher {
    registry: ObserverRegistry,
    fired: AtomicU64,
}

impl EventDispatcher {
    /// 创建分发器
    pub fn new(registry: ObserverRegistry) -> Self {
        Self {
            registry,
            fired: AtomicU64::new(0),
        }
    }

    /// 观察者注册表
    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    /// 已发送事件数量
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// 分发事件
    ///
    /// `notify` 负责准备观察者所需的实例并执行通知；任一观察者失败时中止后续分发。
    pub fn dispatch<F>(&self, event: &Event<'_>, mut notify: F) -> InvocationResult<()>
    where
        F: FnMut(&ObserverMethod, &EventContext<'_>) -> InvocationResult<()>,
    {
        self.fired.fetch_add(1, Ordering::Relaxed);

        let qualifiers = event.declared_qualifiers().effective_for_event();
        let observers = self.registry.resolve(event.types(), &qualifiers);
        debug!(
            "分发事件 {:?} 到 {} 个观察者",
            event.types().first(),
            observers.len()
        );

        let context = EventContext::new(event.payload(), &qualifiers);
        for observer in observers {
            trace!("通知观察者: {}", observer.id());
            notify(observer.as_ref(), &context)?;
        }
        Ok(())
    }
}
