//! 拦截器抽象
//!
//! 拦截器定义、调用上下文、拦截链及其执行。链的构建由实现层负责。

use crate::bean::Instance;
use infrastructure_common::{
    BeanId, BindingSet, ExceptionContract, InterceptionPhase, InterceptorBinding,
    InvocationError, InvocationResult, MethodMetadata,
};
use serde_json::{Map, Value as JsonValue};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 拦截链中传递的类型擦除返回值
pub type Value = Box<dyn Any + Send>;

/// 拦截器 trait
///
/// 可以调用 [`InvocationContext::proceed`] 继续执行下一环节，也可以直接返回以短路调用。
pub trait Interceptor: Send + Sync {
    /// 拦截一次调用
    fn intercept(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult<Value>;
}

/// 闭包拦截器
struct FnInterceptor<F>(F);

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut InvocationContext<'_>) -> InvocationResult<Value> + Send + Sync,
{
    fn intercept(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult<Value> {
        (self.0)(ctx)
    }
}

/// 拦截器定义
#[derive(Clone)]
pub struct InterceptorDefinition {
    id: String,
    bindings: BindingSet,
    priority: i32,
    phases: BTreeSet<InterceptionPhase>,
    handler: Arc<dyn Interceptor>,
}

impl InterceptorDefinition {
    /// 创建拦截器定义，默认只作用于业务方法调用
    pub fn new(id: impl Into<String>, handler: Arc<dyn Interceptor>) -> Self {
        Self {
            id: id.into(),
            bindings: BindingSet::new(),
            priority: 0,
            phases: BTreeSet::from([InterceptionPhase::AroundInvoke]),
            handler,
        }
    }

    /// 由闭包创建拦截器定义
    pub fn from_fn<F>(id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext<'_>) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Self::new(id, Arc::new(FnInterceptor(handler)))
    }

    /// 添加拦截器绑定
    pub fn binding(mut self, binding: InterceptorBinding) -> Self {
        self.bindings.insert(binding);
        self
    }

    /// 设置优先级，数值越小越先执行
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 设置作用阶段
    pub fn phases(mut self, phases: &[InterceptionPhase]) -> Self {
        self.phases = phases.iter().copied().collect();
        self
    }

    /// 拦截器标识
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 绑定集合
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// 优先级
    pub fn priority_value(&self) -> i32 {
        self.priority
    }

    /// 是否作用于指定阶段
    pub fn applies_to(&self, phase: InterceptionPhase) -> bool {
        self.phases.contains(&phase)
    }

    /// 拦截逻辑
    pub fn handler(&self) -> &Arc<dyn Interceptor> {
        &self.handler
    }
}

impl fmt::Debug for InterceptorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorDefinition")
            .field("id", &self.id)
            .field("bindings", &self.bindings)
            .field("priority", &self.priority)
            .field("phases", &self.phases)
            .finish()
    }
}

/// 调用上下文
///
/// 一次拦截链执行期间在各环节之间传递。
pub struct InvocationContext<'a> {
    phase: InterceptionPhase,
    bean: &'a BeanId,
    method: Option<&'a MethodMetadata>,
    target: Option<&'a Instance>,
    links: &'a [Arc<dyn Interceptor>],
    position: usize,
    terminal: &'a mut (dyn FnMut() -> InvocationResult<Value> + 'a),
    data: Map<String, JsonValue>,
}

impl<'a> InvocationContext<'a> {
    /// 当前阶段
    pub fn phase(&self) -> InterceptionPhase {
        self.phase
    }

    /// 目标 Bean
    pub fn bean(&self) -> &BeanId {
        self.bean
    }

    /// 被调用的方法，仅业务方法调用阶段存在
    pub fn method(&self) -> Option<&MethodMetadata> {
        self.method
    }

    /// 目标实例；构造阶段在 `proceed` 返回前不存在
    pub fn target(&self) -> Option<&Instance> {
        self.target
    }

    /// 上下文数据
    pub fn data(&self) -> &Map<String, JsonValue> {
        &self.data
    }

    /// 可变上下文数据
    pub fn data_mut(&mut self) -> &mut Map<String, JsonValue> {
        &mut self.data
    }

    /// 调用下一个环节；最后一个环节调用真实目标
    ///
    /// 同一环节可以多次调用 `proceed`，每次都重新执行其后的所有环节和目标。
    pub fn proceed(&mut self) -> InvocationResult<Value> {
        let position = self.position;
        match self.links.get(position) {
            Some(link) => {
                let link = Arc::clone(link);
                self.position = position + 1;
                let result = link.intercept(self);
                self.position = position;
                result
            }
            None => (self.terminal)(),
        }
    }
}

/// 拦截链
///
/// 每个 (Bean, 阶段) 构建一次，被该 Bean 的所有实例共享。
#[derive(Clone)]
pub struct InterceptionChain {
    bean: BeanId,
    phase: InterceptionPhase,
    interceptor_ids: Vec<String>,
    links: Vec<Arc<dyn Interceptor>>,
}

impl InterceptionChain {
    /// 由已排序的拦截器定义创建拦截链
    pub fn new(bean: BeanId, phase: InterceptionPhase, ordered: &[Arc<InterceptorDefinition>]) -> Self {
        Self {
            bean,
            phase,
            interceptor_ids: ordered.iter().map(|d| d.id().to_string()).collect(),
            links: ordered.iter().map(|d| Arc::clone(d.handler())).collect(),
        }
    }

    /// 空链
    pub fn empty(bean: BeanId, phase: InterceptionPhase) -> Self {
        Self::new(bean, phase, &[])
    }

    /// 所属 Bean
    pub fn bean(&self) -> &BeanId {
        &self.bean
    }

    /// 阶段
    pub fn phase(&self) -> InterceptionPhase {
        self.phase
    }

    /// 按执行顺序排列的拦截器标识
    pub fn interceptor_ids(&self) -> &[String] {
        &self.interceptor_ids
    }

    /// 是否为空链
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// 执行拦截链
    ///
    /// `terminal` 是链末端的真实目标调用，环节重复 `proceed` 时会被再次调用。
    /// 从任一环节冒出的错误都经过异常包装策略。
    pub fn execute<F>(
        &self,
        target: Option<&Instance>,
        method: Option<&MethodMetadata>,
        contract: &ExceptionContract,
        mut terminal: F,
    ) -> InvocationResult<Value>
    where
        F: FnMut() -> InvocationResult<Value>,
    {
        trace!(
            "执行拦截链: bean={}, phase={}, interceptors={:?}",
            self.bean,
            self.phase,
            self.interceptor_ids
        );

        let mut ctx = InvocationContext {
            phase: self.phase,
            bean: &self.bean,
            method,
            target,
            links: &self.links,
            position: 0,
            terminal: &mut terminal,
            data: Map::new(),
        };

        ctx.proceed()
            .map_err(|error| apply_exception_policy(error, contract))
    }
}

impl fmt::Debug for InterceptionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionChain")
            .field("bean", &self.bean)
            .field("phase", &self.phase)
            .field("interceptors", &self.interceptor_ids)
            .finish()
    }
}

/// 异常包装策略
///
/// 契约允许的种类与未受检种类原样传播；其他受检种类包装为
/// [`InvocationError::Interception`]，原始异常作为原因。
pub fn apply_exception_policy(error: InvocationError, contract: &ExceptionContract) -> InvocationError {
    match error {
        InvocationError::Exception(exception) if !contract.permits(exception.kind()) => {
            InvocationError::Interception { cause: exception }
        }
        other => other,
    }
}

/// 绑定到具体实例的业务方法拦截
///
/// 生成的包装类型持有它，并通过 [`BoundInterception::invoke`] 路由每个方法调用。
#[derive(Clone)]
pub struct BoundInterception {
    chain: Arc<InterceptionChain>,
    target: Instance,
}

impl BoundInterception {
    /// 创建绑定
    pub fn new(chain: Arc<InterceptionChain>, target: Instance) -> Self {
        Self { chain, target }
    }

    /// 业务方法拦截链
    pub fn chain(&self) -> &InterceptionChain {
        &self.chain
    }

    /// 通过拦截链调用业务方法
    ///
    /// 拦截器重复 `proceed` 时 `call` 会被再次调用。
    pub fn invoke<R, F>(&self, method: &MethodMetadata, mut call: F) -> InvocationResult<R>
    where
        R: Send + 'static,
        F: FnMut() -> InvocationResult<R>,
    {
        let value = self.chain.execute(
            Some(&self.target),
            Some(method),
            method.contract(),
            move || call().map(|result| Box::new(result) as Value),
        )?;

        value.downcast::<R>().map(|result| *result).map_err(|_| {
            InvocationError::illegal_state(format!("拦截器为 {} 返回了不匹配的结果类型", method))
        })
    }
}

impl fmt::Debug for BoundInterception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundInterception")
            .field("chain", &self.chain)
            .finish()
    }
}
