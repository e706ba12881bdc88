//! 上下文管理
//!
//! 单例上下文在容器生命周期内始终活动；线程边界上下文（请求作用域及自定义作用域）
//! 只在当前线程显式激活后可用。依赖作用域没有存储，由容器直接创建并挂到所有者上。

use di_abstractions::{ContextualInstance, CreateFn, InjectableContext};
use dashmap::DashMap;
use infrastructure_common::{BeanId, InvocationError, InvocationResult, ScopeKind};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// 正在进行的单例创建
///
/// 记录每个 Bean 由哪个线程创建、每个线程在等待哪个 Bean，构成等待图。
#[derive(Debug, Default)]
struct CreationTracker {
    creators: HashMap<BeanId, ThreadId>,
    waiting: HashMap<ThreadId, BeanId>,
}

impl CreationTracker {
    /// 登记当前线程将等待 `bean`；等待会闭合成环时返回循环依赖错误
    fn wait_for(&mut self, bean: &BeanId, me: ThreadId) -> InvocationResult<()> {
        let Some(&creator) = self.creators.get(bean) else {
            return Ok(());
        };
        if creator == me {
            return Err(InvocationError::CircularDependency {
                chain: describe(&[bean.clone(), bean.clone()]),
            });
        }

        let mut path = vec![bean.clone()];
        let mut current = creator;
        while path.len() <= self.creators.len() {
            let Some(next) = self.waiting.get(&current) else {
                break;
            };
            path.push(next.clone());
            match self.creators.get(next) {
                Some(&holder) if holder == me => {
                    let mut chain = Vec::with_capacity(path.len() + 1);
                    chain.push(next.clone());
                    chain.extend(path);
                    return Err(InvocationError::CircularDependency {
                        chain: describe(&chain),
                    });
                }
                Some(&holder) => current = holder,
                None => break,
            }
        }

        self.waiting.insert(me, bean.clone());
        Ok(())
    }

    fn claim(&mut self, bean: &BeanId, me: ThreadId) {
        self.waiting.remove(&me);
        self.creators.insert(bean.clone(), me);
    }

    fn release(&mut self, bean: &BeanId, me: ThreadId) {
        self.waiting.remove(&me);
        if self.creators.get(bean) == Some(&me) {
            self.creators.remove(bean);
        }
    }
}

fn describe(chain: &[BeanId]) -> String {
    chain
        .iter()
        .map(BeanId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// 单例上下文
///
/// 首次访问时创建实例；并发的首次访问只有一个线程执行创建，其余线程等待并得到同一实例。
/// 两个线程互相等待对方正在创建的单例时，后发现的一方得到循环依赖错误而不是阻塞。
#[derive(Debug, Default)]
pub struct SingletonContext {
    instances: DashMap<BeanId, Arc<OnceCell<Arc<ContextualInstance>>>>,
    creation_order: Mutex<Vec<Arc<ContextualInstance>>>,
    creations: Mutex<CreationTracker>,
}

impl SingletonContext {
    /// 创建单例上下文
    pub fn new() -> Self {
        Self::default()
    }
}

impl InjectableContext for SingletonContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Singleton
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(&self, bean: &BeanId) -> InvocationResult<Option<Arc<ContextualInstance>>> {
        Ok(self
            .instances
            .get(bean)
            .and_then(|cell| cell.get().cloned()))
    }

    fn get_or_create(
        &self,
        bean: &BeanId,
        create: &mut CreateFn<'_>,
    ) -> InvocationResult<Arc<ContextualInstance>> {
        // 先取出 cell 再初始化，创建期间不持有分片锁
        let cell = Arc::clone(self.instances.entry(bean.clone()).or_default().value());
        if let Some(instance) = cell.get() {
            return Ok(Arc::clone(instance));
        }

        let me = thread::current().id();
        self.creations.lock().wait_for(bean, me)?;

        let mut created = false;
        let result = cell.get_or_try_init(|| {
            self.creations.lock().claim(bean, me);
            let instance = create()?;
            created = true;
            Ok::<_, InvocationError>(instance)
        });
        self.creations.lock().release(bean, me);
        let instance = result?.clone();

        if created {
            debug!("创建单例: {}", bean);
            self.creation_order.lock().push(Arc::clone(&instance));
        }
        Ok(instance)
    }

    fn remove(&self, bean: &BeanId) -> Option<Arc<ContextualInstance>> {
        let (_, cell) = self.instances.remove(bean)?;
        let instance = cell.get().cloned()?;
        self.creation_order
            .lock()
            .retain(|it| !Arc::ptr_eq(it, &instance));
        Some(instance)
    }

    fn drain(&self) -> Vec<Arc<ContextualInstance>> {
        let mut drained = std::mem::take(&mut *self.creation_order.lock());
        self.instances.clear();
        drained.reverse();
        drained
    }

    fn len(&self) -> usize {
        self.creation_order.lock().len()
    }
}

#[derive(Debug, Default)]
struct BoundaryStore {
    instances: HashMap<BeanId, Arc<ContextualInstance>>,
    order: Vec<Arc<ContextualInstance>>,
}

impl BoundaryStore {
    fn into_destruction_order(mut self) -> Vec<Arc<ContextualInstance>> {
        self.order.reverse();
        self.order
    }
}

/// 线程边界上下文
///
/// 每个线程各自激活和结束自己的边界，边界之间互不可见。
#[derive(Debug)]
pub struct ThreadBoundContext {
    scope: ScopeKind,
    boundaries: DashMap<ThreadId, BoundaryStore>,
}

impl ThreadBoundContext {
    /// 为指定作用域创建上下文
    pub fn new(scope: ScopeKind) -> Self {
        Self {
            scope,
            boundaries: DashMap::new(),
        }
    }

    /// 请求作用域上下文
    pub fn request() -> Self {
        Self::new(ScopeKind::Request)
    }

    fn not_active(&self) -> InvocationError {
        InvocationError::ContextNotActive {
            scope: self.scope.clone(),
        }
    }
}

impl InjectableContext for ThreadBoundContext {
    fn scope(&self) -> ScopeKind {
        self.scope.clone()
    }

    fn is_active(&self) -> bool {
        self.boundaries.contains_key(&thread::current().id())
    }

    fn get(&self, bean: &BeanId) -> InvocationResult<Option<Arc<ContextualInstance>>> {
        let store = self
            .boundaries
            .get(&thread::current().id())
            .ok_or_else(|| self.not_active())?;
        Ok(store.instances.get(bean).cloned())
    }

    fn get_or_create(
        &self,
        bean: &BeanId,
        create: &mut CreateFn<'_>,
    ) -> InvocationResult<Arc<ContextualInstance>> {
        if let Some(existing) = self.get(bean)? {
            return Ok(existing);
        }

        // 创建过程可能再次访问本上下文，期间不能持有边界的锁
        let instance = create()?;

        let mut store = self
            .boundaries
            .get_mut(&thread::current().id())
            .ok_or_else(|| self.not_active())?;
        debug!("创建 {} 实例: {}", self.scope, bean);
        store.instances.insert(bean.clone(), Arc::clone(&instance));
        store.order.push(Arc::clone(&instance));
        Ok(instance)
    }

    fn remove(&self, bean: &BeanId) -> Option<Arc<ContextualInstance>> {
        let mut store = self.boundaries.get_mut(&thread::current().id())?;
        let instance = store.instances.remove(bean)?;
        store.order.retain(|it| !Arc::ptr_eq(it, &instance));
        Some(instance)
    }

    fn drain(&self) -> Vec<Arc<ContextualInstance>> {
        let threads: Vec<ThreadId> = self.boundaries.iter().map(|entry| *entry.key()).collect();
        threads
            .into_iter()
            .filter_map(|thread| self.boundaries.remove(&thread))
            .flat_map(|(_, store)| store.into_destruction_order())
            .collect()
    }

    fn activate(&self) -> bool {
        let thread = thread::current().id();
        if self.boundaries.contains_key(&thread) {
            return false;
        }
        self.boundaries.insert(thread, BoundaryStore::default());
        debug!("激活作用域 {}: {:?}", self.scope, thread);
        true
    }

    fn deactivate(&self) -> Vec<Arc<ContextualInstance>> {
        let thread = thread::current().id();
        match self.boundaries.remove(&thread) {
            Some((_, store)) => {
                debug!("结束作用域 {}: {:?}", self.scope, thread);
                store.into_destruction_order()
            }
            None => Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.boundaries
            .get(&thread::current().id())
            .map_or(0, |store| store.instances.len())
    }
}

/// 上下文管理器
///
/// 按作用域持有上下文实现。
pub struct ContextManager {
    singleton: Arc<SingletonContext>,
    contexts: HashMap<ScopeKind, Arc<dyn InjectableContext>>,
}

impl ContextManager {
    /// 创建包含单例和请求上下文的管理器
    pub fn new() -> Self {
        let singleton = Arc::new(SingletonContext::new());
        let mut contexts: HashMap<ScopeKind, Arc<dyn InjectableContext>> = HashMap::new();
        contexts.insert(ScopeKind::Singleton, singleton.clone());
        contexts.insert(ScopeKind::Request, Arc::new(ThreadBoundContext::request()));
        Self { singleton, contexts }
    }

    /// 注册上下文实现，替换同一作用域已有的实现
    ///
    /// 单例上下文不可替换。
    pub fn register(&mut self, context: Arc<dyn InjectableContext>) {
        let scope = context.scope();
        if scope == ScopeKind::Singleton || scope.is_dependent() {
            return;
        }
        debug!("注册上下文: {}", scope);
        self.contexts.insert(scope, context);
    }

    /// 单例上下文
    pub fn singleton(&self) -> &SingletonContext {
        &self.singleton
    }

    /// 指定作用域的上下文
    pub fn context(&self, scope: &ScopeKind) -> Option<&Arc<dyn InjectableContext>> {
        self.contexts.get(scope)
    }

    /// 有上下文实现的作用域
    pub fn scopes(&self) -> Vec<ScopeKind> {
        self.contexts.keys().cloned().collect()
    }

    /// 单例之外的上下文
    pub fn bounded(&self) -> impl Iterator<Item = &Arc<dyn InjectableContext>> {
        self.contexts
            .iter()
            .filter(|(scope, _)| **scope != ScopeKind::Singleton)
            .map(|(_, context)| context)
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}
