//! 作用域上下文抽象
//!
//! 每种作用域由一个上下文实现管理其实例的存储和可见性。

use crate::bean::Instance;
use chrono::{DateTime, Utc};
use infrastructure_common::{BeanId, InvocationResult, ScopeKind};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// 上下文实例
///
/// Bean 定义的一个活动实例，连同它创建时注入的依赖作用域实例。
pub struct ContextualInstance {
    id: Uuid,
    bean: BeanId,
    scope: ScopeKind,
    instance: Instance,
    dependents: Mutex<Vec<Arc<ContextualInstance>>>,
    destroyed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl ContextualInstance {
    /// 创建上下文实例
    pub fn new(
        bean: BeanId,
        scope: ScopeKind,
        instance: Instance,
        dependents: Vec<Arc<ContextualInstance>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bean,
            scope,
            instance,
            dependents: Mutex::new(dependents),
            destroyed: AtomicBool::new(false),
            created_at: Utc::now(),
        }
    }

    /// 实例标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 所属 Bean
    pub fn bean(&self) -> &BeanId {
        &self.bean
    }

    /// 作用域
    pub fn scope(&self) -> &ScopeKind {
        &self.scope
    }

    /// 实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 创建时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 追加依赖作用域实例
    pub fn add_dependent(&self, dependent: Arc<ContextualInstance>) {
        self.dependents.lock().push(dependent);
    }

    /// 取出全部依赖作用域实例
    pub fn take_dependents(&self) -> Vec<Arc<ContextualInstance>> {
        std::mem::take(&mut *self.dependents.lock())
    }

    /// 依赖作用域实例数量
    pub fn dependent_count(&self) -> usize {
        self.dependents.lock().len()
    }

    /// 标记为已销毁；只有第一次调用返回 `true`
    pub fn mark_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    /// 是否已销毁
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ContextualInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualInstance")
            .field("id", &self.id)
            .field("bean", &self.bean)
            .field("scope", &self.scope)
            .field("dependents", &self.dependent_count())
            .field("destroyed", &self.is_destroyed())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// 实例创建函数
pub type CreateFn<'f> = dyn FnMut() -> InvocationResult<Arc<ContextualInstance>> + 'f;

/// 可注入上下文 trait
///
/// 非依赖作用域的上下文保证同一活动边界内每个 Bean 最多一个实例，
/// 并发首次访问时也只创建一次。
pub trait InjectableContext: Send + Sync {
    /// 管理的作用域
    fn scope(&self) -> ScopeKind;

    /// 当前线程是否处于活动边界内
    fn is_active(&self) -> bool;

    /// 获取已有实例
    fn get(&self, bean: &BeanId) -> InvocationResult<Option<Arc<ContextualInstance>>>;

    /// 获取已有实例，不存在时调用 `create` 创建
    fn get_or_create(
        &self,
        bean: &BeanId,
        create: &mut CreateFn<'_>,
    ) -> InvocationResult<Arc<ContextualInstance>>;

    /// 移除实例，返回被移除的实例供调用方销毁
    fn remove(&self, bean: &BeanId) -> Option<Arc<ContextualInstance>>;

    /// 移除当前边界内全部实例，按创建顺序的逆序返回
    fn drain(&self) -> Vec<Arc<ContextualInstance>>;

    /// 在当前线程开启活动边界；不支持手动激活的上下文返回 `false`
    fn activate(&self) -> bool {
        false
    }

    /// 结束当前线程的活动边界，返回需要销毁的实例（创建顺序的逆序）
    fn deactivate(&self) -> Vec<Arc<ContextualInstance>> {
        Vec::new()
    }

    /// 当前边界内实例数量
    fn len(&self) -> usize;

    /// 当前边界内是否没有实例
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
