//! 容器运行时
//!
//! 容器句柄可以克隆，所有访问都通过句柄进行，不依赖进程级全局状态。

use crate::contexts::ContextManager;
use crate::events::{EventDispatcher, ObserverRegistry};
use crate::interception::{ChainBuilder, InterceptorChains};
use crate::lifecycle::LifecycleExecutor;
use crate::registry::DefaultBeanRegistry;
use crate::resolution::DefaultBeanResolver;
use crate::validation::StartupValidator;
use di_abstractions::{
    apply_exception_policy, BeanDefinition, BeanRegistry, BeanResolver, BoundInterception, Catalog,
    ContainerConfig, ContainerInitialized, ContainerShutdown, ContainerStats, ContextualInstance,
    CreationStrategy, CreationalContext, DependencyProvider, ErasedHandle, Event, EventContext,
    InjectableContext, InjectionPoint, Instance, ObserverMethod, ResolveContext,
};
use infrastructure_common::{
    ContainerResult, InterceptionPhase, InvocationError, InvocationResult, Qualifier, QualifierSet,
    ScopeKind, TypeKey,
};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 容器构建器
pub struct ContainerBuilder {
    config: ContainerConfig,
    contexts: ContextManager,
}

impl ContainerBuilder {
    /// 创建构建器，包含单例和请求上下文
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            contexts: ContextManager::new(),
        }
    }

    /// 设置容器配置
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 注册自定义作用域的上下文实现
    pub fn with_context(mut self, context: Arc<dyn InjectableContext>) -> Self {
        self.contexts.register(context);
        self
    }

    /// 由目录启动容器
    ///
    /// 目录无效时返回定义错误，不会得到可用的容器。
    pub fn start(self, catalog: Catalog) -> ContainerResult<Container> {
        info!("启动容器: {} 个定义", catalog.len());

        let registry = Arc::new(DefaultBeanRegistry::build(
            catalog,
            &self.contexts.scopes(),
            &self.config,
        )?);
        let resolver = DefaultBeanResolver::new(Arc::clone(&registry));
        let chains = Arc::new(ChainBuilder::new(registry.interceptors()).build_all(registry.beans()));
        StartupValidator::new(&registry, &resolver, &chains, &self.config).validate()?;

        let events = EventDispatcher::new(ObserverRegistry::new(registry.observers()));
        let lifecycle = LifecycleExecutor::new(Arc::clone(&registry), Arc::clone(&chains));
        let container = Container {
            inner: Arc::new(ContainerInner {
                config: self.config,
                registry,
                resolver,
                chains,
                contexts: self.contexts,
                lifecycle,
                events,
                running: AtomicBool::new(true),
                stopping: AtomicBool::new(false),
            }),
        };

        if let Err(error) = container.inner.initialize() {
            warn!("容器初始化失败: {}", error);
            container.inner.stopping.store(true, Ordering::Release);
            container.inner.running.store(false, Ordering::Release);
            if let Err(cleanup) = container.inner.shutdown() {
                warn!("初始化失败后的清理出错: {}", cleanup);
            }
            return Err(error.into());
        }

        info!("容器启动完成: {:?}", container.stats());
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 容器句柄
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    config: ContainerConfig,
    registry: Arc<DefaultBeanRegistry>,
    resolver: DefaultBeanResolver,
    chains: Arc<InterceptorChains>,
    contexts: ContextManager,
    lifecycle: LifecycleExecutor,
    events: EventDispatcher,
    running: AtomicBool,
    /// 只有第一个调用 `stop` 的线程执行关闭
    stopping: AtomicBool,
}

impl Container {
    /// 创建容器构建器
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// 使用默认上下文启动容器
    pub fn start(catalog: Catalog, config: ContainerConfig) -> ContainerResult<Self> {
        ContainerBuilder::new().config(config).start(catalog)
    }

    /// 停止容器
    ///
    /// 先发送关闭事件，再结束所有活动边界，最后按创建顺序的逆序销毁单例。
    /// 之后的所有访问都返回 [`InvocationError::ContainerNotRunning`]。
    pub fn stop(&self) -> ContainerResult<()> {
        let inner = &self.inner;
        if !inner.running.load(Ordering::Acquire)
            || inner
                .stopping
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Ok(());
        }

        let mut first_error = None;
        if inner.config.fire_lifecycle_events {
            if let Err(error) = inner.fire(&Event::new(&ContainerShutdown)) {
                first_error.get_or_insert(error);
            }
        }

        inner.running.store(false, Ordering::Release);
        if let Err(error) = inner.shutdown() {
            first_error.get_or_insert(error);
        }

        info!("容器已停止: {:?}", self.stats());
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// 容器是否在运行
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Bean 注册表
    pub fn registry(&self) -> &DefaultBeanRegistry {
        &self.inner.registry
    }

    /// 拦截链
    pub fn chains(&self) -> &InterceptorChains {
        &self.inner.chains
    }

    /// 解析类型为 `T` 的 Bean，返回实例句柄
    ///
    /// 解析错误在这里返回；实例在 [`InstanceHandle::get`] 时按作用域规则创建。
    pub fn instance<T>(&self, qualifiers: &[Qualifier]) -> InvocationResult<InstanceHandle<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner.ensure_running()?;
        let bean = self
            .inner
            .resolver
            .resolve(TypeKey::of::<T>(), &QualifierSet::from(qualifiers))?;
        Ok(InstanceHandle::new(self.clone(), bean))
    }

    /// 所有满足条件的 Bean 的实例句柄，按声明顺序
    pub fn select_all<T>(&self, qualifiers: &[Qualifier]) -> InvocationResult<Vec<InstanceHandle<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner.ensure_running()?;
        Ok(self
            .inner
            .resolver
            .select_all(TypeKey::of::<T>(), &QualifierSet::from(qualifiers))
            .into_iter()
            .map(|bean| InstanceHandle::new(self.clone(), bean))
            .collect())
    }

    /// 同步发送事件
    pub fn fire_event<E>(&self, payload: &E, qualifiers: &[Qualifier]) -> InvocationResult<()>
    where
        E: Any + Send + Sync,
    {
        self.fire(Event::new(payload).qualifiers(qualifiers))
    }

    /// 同步发送事件，全部匹配的观察者执行完毕后返回
    pub fn fire(&self, event: Event<'_>) -> InvocationResult<()> {
        self.inner.ensure_running()?;
        self.inner.fire(&event)
    }

    /// 在当前线程激活作用域边界；已激活时返回 `false`
    pub fn activate_scope(&self, scope: &ScopeKind) -> InvocationResult<bool> {
        self.inner.ensure_running()?;
        Ok(self.inner.bounded_context(scope)?.activate())
    }

    /// 结束当前线程的作用域边界并销毁其中的实例
    pub fn terminate_scope(&self, scope: &ScopeKind) -> InvocationResult<()> {
        let context = self.inner.bounded_context(scope)?;
        self.inner.lifecycle.destroy_all(context.deactivate())
    }

    /// 激活请求作用域
    pub fn activate_request(&self) -> InvocationResult<bool> {
        self.activate_scope(&ScopeKind::Request)
    }

    /// 结束请求作用域
    pub fn terminate_request(&self) -> InvocationResult<()> {
        self.terminate_scope(&ScopeKind::Request)
    }

    /// 激活作用域边界，返回的守卫在结束或释放时终止边界
    ///
    /// 边界已由调用方激活时，守卫不会终止它。
    pub fn scope_guard(&self, scope: ScopeKind) -> InvocationResult<ScopeGuard> {
        let owns_boundary = self.activate_scope(&scope)?;
        Ok(ScopeGuard {
            container: self.clone(),
            scope,
            owns_boundary,
        })
    }

    /// 在请求作用域内执行
    pub fn with_request<R>(&self, work: impl FnOnce() -> R) -> InvocationResult<R> {
        let guard = self.scope_guard(ScopeKind::Request)?;
        let result = work();
        guard.end()?;
        Ok(result)
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        let inner = &self.inner;
        ContainerStats {
            registered_beans: inner.registry.beans().len(),
            registered_interceptors: inner.registry.interceptors().len(),
            registered_observers: inner.registry.observers().len(),
            created_instances: inner.lifecycle.stats().created(),
            destroyed_instances: inner.lifecycle.stats().destroyed(),
            active_singletons: inner.contexts.singleton().len(),
            fired_events: inner.events.fired(),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("running", &self.is_running())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ContainerInner {
    fn ensure_running(&self) -> InvocationResult<()> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(InvocationError::ContainerNotRunning)
        }
    }

    fn resolve_context(&self) -> ResolveContext {
        ResolveContext::new(self.config.max_resolution_depth)
    }

    fn initialize(&self) -> InvocationResult<()> {
        if self.config.eager_startup {
            for bean in self.registry.beans().iter().filter(|bean| bean.is_startup()) {
                debug!("实例化启动 Bean: {}", bean.id());
                let instance = self.obtain(bean, &mut self.resolve_context())?;
                if bean.scope().is_dependent() {
                    self.lifecycle.destroy(&instance)?;
                }
            }
        }
        if self.config.fire_lifecycle_events {
            self.fire(&Event::new(&ContainerInitialized))?;
        }
        Ok(())
    }

    fn shutdown(&self) -> InvocationResult<()> {
        let mut first_error = None;
        for context in self.contexts.bounded() {
            if let Err(error) = self.lifecycle.destroy_all(context.drain()) {
                first_error.get_or_insert(error);
            }
        }
        if let Err(error) = self.lifecycle.destroy_all(self.contexts.singleton().drain()) {
            first_error.get_or_insert(error);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn bounded_context(&self, scope: &ScopeKind) -> InvocationResult<&Arc<dyn InjectableContext>> {
        self.contexts
            .context(scope)
            .filter(|_| scope.requires_active_boundary())
            .ok_or_else(|| {
                InvocationError::illegal_state(format!("作用域 {} 没有可激活的上下文", scope))
            })
    }

    /// 获取 Bean 的上下文实例，依赖作用域总是新建
    fn obtain(
        &self,
        bean: &Arc<BeanDefinition>,
        resolve: &mut ResolveContext,
    ) -> InvocationResult<Arc<ContextualInstance>> {
        resolve.push_bean(bean.id())?;
        let result = self.obtain_in_scope(bean, resolve);
        resolve.pop_bean();
        result
    }

    fn obtain_in_scope(
        &self,
        bean: &Arc<BeanDefinition>,
        resolve: &ResolveContext,
    ) -> InvocationResult<Arc<ContextualInstance>> {
        let scope = bean.scope();
        if scope.is_dependent() {
            return self.create(bean, resolve.clone());
        }

        let context = self.contexts.context(scope).ok_or_else(|| {
            InvocationError::illegal_state(format!("作用域 {} 没有上下文实现", scope))
        })?;
        if !context.is_active() {
            return Err(InvocationError::ContextNotActive {
                scope: scope.clone(),
            });
        }
        context.get_or_create(bean.id(), &mut || self.create(bean, resolve.clone()))
    }

    /// 创建上下文实例
    ///
    /// 构造或构造后回调失败时，立即销毁这次创建中已注入的依赖作用域实例。
    fn create(
        &self,
        bean: &Arc<BeanDefinition>,
        resolve: ResolveContext,
    ) -> InvocationResult<Arc<ContextualInstance>> {
        let mut ctx = CreationalContext::new(self, resolve);
        match self.construct_instance(bean, &mut ctx) {
            Ok(instance) => Ok(Arc::new(ContextualInstance::new(
                bean.id().clone(),
                bean.scope().clone(),
                instance,
                ctx.take_dependents(),
            ))),
            Err(error) => {
                debug!("创建 {} 失败: {}", bean.id(), error);
                if let Err(cleanup) = self.lifecycle.destroy_all(ctx.take_dependents()) {
                    warn!("清理 {} 的依赖实例失败: {}", bean.id(), cleanup);
                }
                Err(error)
            }
        }
    }

    fn construct_instance(
        &self,
        bean: &Arc<BeanDefinition>,
        ctx: &mut CreationalContext<'_>,
    ) -> InvocationResult<Instance> {
        let instance = self
            .lifecycle
            .construct(bean, ctx, |ctx| self.invoke_creation(bean, ctx))?;
        self.lifecycle.post_construct(bean, &instance)?;
        Ok(instance)
    }

    fn invoke_creation(
        &self,
        bean: &BeanDefinition,
        ctx: &mut CreationalContext<'_>,
    ) -> InvocationResult<Instance> {
        match bean.creation() {
            Some(CreationStrategy::Constructor(constructor)) => constructor(ctx),
            Some(CreationStrategy::Producer { declaring, produce }) => {
                let declaring_bean = self.registry.bean(declaring).cloned().ok_or_else(|| {
                    InvocationError::illegal_state(format!("生产者的声明 Bean 不存在: {}", declaring))
                })?;
                let owner = self.obtain(&declaring_bean, ctx.resolve_context())?;
                let produced = produce(owner.instance(), ctx);

                // 依赖作用域的声明 Bean 只为这次生产存在
                if declaring_bean.scope().is_dependent() {
                    let destroyed = self.lifecycle.destroy(&owner);
                    return produced.and_then(|instance| destroyed.map(|()| instance));
                }
                produced
            }
            None => Err(InvocationError::illegal_state(format!(
                "Bean {} 没有创建策略",
                bean.id()
            ))),
        }
    }

    /// 把上下文实例转换为请求类型的句柄；被拦截的 Bean 总是返回包装实例
    fn materialize(
        &self,
        bean: &BeanDefinition,
        required: TypeKey,
        instance: &ContextualInstance,
    ) -> InvocationResult<ErasedHandle> {
        let bean_type = bean.bean_type(required).ok_or_else(|| {
            InvocationError::illegal_state(format!("Bean {} 没有暴露类型 {}", bean.id(), required))
        })?;
        let handle = bean_type.cast(instance.instance()).ok_or_else(|| {
            InvocationError::illegal_state(format!("Bean {} 的实例无法转换为 {}", bean.id(), required))
        })?;

        match self.chains.chain(bean.id(), InterceptionPhase::AroundInvoke) {
            Some(chain) if !chain.is_empty() => {
                let interception =
                    BoundInterception::new(Arc::clone(chain), Arc::clone(instance.instance()));
                bean_type.wrap(handle, interception).ok_or_else(|| {
                    InvocationError::illegal_state(format!(
                        "Bean {} 的类型 {} 没有生成的包装类型",
                        bean.id(),
                        required
                    ))
                })
            }
            _ => Ok(handle),
        }
    }

    fn destroy_contextual(&self, bean: &BeanDefinition) -> InvocationResult<()> {
        let context = self.contexts.context(bean.scope()).ok_or_else(|| {
            InvocationError::illegal_state(format!("作用域 {} 没有上下文实现", bean.scope()))
        })?;
        if !context.is_active() {
            return Err(InvocationError::ContextNotActive {
                scope: bean.scope().clone(),
            });
        }
        match context.get(bean.id())? {
            Some(instance) => {
                let result = self.lifecycle.destroy(&instance);
                context.remove(bean.id());
                result
            }
            None => Ok(()),
        }
    }

    fn fire(&self, event: &Event<'_>) -> InvocationResult<()> {
        self.events
            .dispatch(event, |observer, context| self.notify(observer, context))
    }

    /// 通知单个观察者
    ///
    /// 为观察者参数创建的依赖作用域实例以及依赖作用域的所属 Bean 实例，
    /// 在观察者返回后立即销毁。
    fn notify(&self, observer: &ObserverMethod, event: &EventContext<'_>) -> InvocationResult<()> {
        let mut ctx = CreationalContext::new(self, self.resolve_context());
        let mut transient_owner = None;

        let owner = match observer.owner() {
            Some(owner_id) => {
                let bean = self.registry.bean(owner_id).cloned().ok_or_else(|| {
                    InvocationError::illegal_state(format!("观察者所属 Bean 不存在: {}", owner_id))
                })?;
                let instance = self.obtain(&bean, ctx.resolve_context())?;
                if bean.scope().is_dependent() {
                    transient_owner = Some(Arc::clone(&instance));
                }
                Some(instance)
            }
            None => None,
        };

        let result = observer
            .notify(owner.as_ref().map(|it| it.instance()), event, &mut ctx)
            .map_err(|error| apply_exception_policy(error, observer.contract()));

        let mut disposable = ctx.take_dependents();
        disposable.extend(transient_owner);
        let destroyed = self.lifecycle.destroy_all(disposable);
        result.and(destroyed)
    }
}

impl DependencyProvider for ContainerInner {
    fn provide(
        &self,
        point: &InjectionPoint,
        ctx: &mut CreationalContext<'_>,
    ) -> InvocationResult<ErasedHandle> {
        self.ensure_running()?;
        let bean = self.resolver.resolve_point(point)?;
        let instance = self.obtain(&bean, ctx.resolve_context())?;
        if bean.scope().is_dependent() {
            ctx.add_dependent(Arc::clone(&instance));
        }
        self.materialize(&bean, point.required(), &instance)
    }
}

/// 实例句柄
///
/// 依赖作用域的 Bean 每个句柄最多持有一个实例，调用 [`InstanceHandle::destroy`] 时销毁。
pub struct InstanceHandle<T: ?Sized> {
    container: Container,
    bean: Arc<BeanDefinition>,
    dependent: Mutex<Option<Arc<ContextualInstance>>>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> InstanceHandle<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn new(container: Container, bean: Arc<BeanDefinition>) -> Self {
        Self {
            container,
            bean,
            dependent: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// 按作用域规则获取或创建实例
    pub fn get(&self) -> InvocationResult<Arc<T>> {
        let inner = &self.container.inner;
        inner.ensure_running()?;

        let instance = if self.bean.scope().is_dependent() {
            let mut slot = self.dependent.lock();
            match slot.as_ref() {
                Some(existing) if !existing.is_destroyed() => Arc::clone(existing),
                _ => {
                    let created = inner.obtain(&self.bean, &mut inner.resolve_context())?;
                    *slot = Some(Arc::clone(&created));
                    created
                }
            }
        } else {
            inner.obtain(&self.bean, &mut inner.resolve_context())?
        };

        let handle = inner.materialize(&self.bean, TypeKey::of::<T>(), &instance)?;
        handle.downcast::<Arc<T>>().map(|typed| *typed).map_err(|_| {
            InvocationError::illegal_state(format!(
                "Bean {} 的句柄类型不是 {}",
                self.bean.id(),
                std::any::type_name::<T>()
            ))
        })
    }

    /// 销毁句柄对应的实例
    ///
    /// 依赖作用域销毁本句柄持有的实例；其他作用域销毁并移除当前边界内的实例。
    pub fn destroy(&self) -> InvocationResult<()> {
        let inner = &self.container.inner;
        if self.bean.scope().is_dependent() {
            return match self.dependent.lock().take() {
                Some(instance) => inner.lifecycle.destroy(&instance),
                None => Ok(()),
            };
        }
        inner.ensure_running()?;
        inner.destroy_contextual(&self.bean)
    }

    /// Bean 定义
    pub fn bean(&self) -> &BeanDefinition {
        &self.bean
    }

    /// 当前是否可以获取实例
    pub fn is_available(&self) -> bool {
        let inner = &self.container.inner;
        if !self.container.is_running() {
            return false;
        }
        let scope = self.bean.scope();
        !scope.requires_active_boundary()
            || inner
                .contexts
                .context(scope)
                .map_or(false, |context| context.is_active())
    }
}

impl<T: ?Sized> fmt::Debug for InstanceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("bean", self.bean.id())
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// 作用域守卫
///
/// 释放时结束它激活的作用域边界。
pub struct ScopeGuard {
    container: Container,
    scope: ScopeKind,
    owns_boundary: bool,
}

impl ScopeGuard {
    /// 作用域
    pub fn scope(&self) -> &ScopeKind {
        &self.scope
    }

    /// 结束边界并返回销毁过程中的第一个错误
    pub fn end(mut self) -> InvocationResult<()> {
        if !std::mem::take(&mut self.owns_boundary) {
            return Ok(());
        }
        self.container.terminate_scope(&self.scope)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.owns_boundary {
            if let Err(error) = self.container.terminate_scope(&self.scope) {
                warn!("结束作用域 {} 时出错: {}", self.scope, error);
            }
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("scope", &self.scope)
            .field("owns_boundary", &self.owns_boundary)
            .finish()
    }
}
