//! 观察者方法与事件

use crate::bean::Instance;
use crate::creational::CreationalContext;
use crate::resolver::InjectionPoint;
use infrastructure_common::{
    BeanId, ExceptionContract, InvocationError, InvocationResult, Qualifier, QualifierSet, TypeKey,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 观察者默认优先级
pub const DEFAULT_OBSERVER_PRIORITY: i32 = 2500;

/// 观察者通知函数
///
/// 第一个参数为所属 Bean 的实例，静态观察者为 `None`。
pub type NotifyFn = Arc<
    dyn Fn(Option<&Instance>, &EventContext<'_>, &mut CreationalContext<'_>) -> InvocationResult<()>
        + Send
        + Sync,
>;

/// 观察者看到的事件
pub struct EventContext<'a> {
    payload: &'a (dyn Any + Send + Sync),
    qualifiers: &'a QualifierSet,
}

impl<'a> EventContext<'a> {
    /// 创建事件上下文
    pub fn new(payload: &'a (dyn Any + Send + Sync), qualifiers: &'a QualifierSet) -> Self {
        Self { payload, qualifiers }
    }

    /// 以具体类型读取事件载荷
    pub fn payload<E: Any>(&self) -> Option<&'a E> {
        self.payload.downcast_ref::<E>()
    }

    /// 类型擦除的事件载荷
    pub fn raw_payload(&self) -> &'a (dyn Any + Send + Sync) {
        self.payload
    }

    /// 事件的有效限定符
    pub fn qualifiers(&self) -> &'a QualifierSet {
        self.qualifiers
    }
}

/// 观察者方法
#[derive(Clone)]
pub struct ObserverMethod {
    id: String,
    owner: Option<BeanId>,
    observed: TypeKey,
    qualifiers: QualifierSet,
    priority: i32,
    contract: ExceptionContract,
    injection_points: Vec<InjectionPoint>,
    notify: NotifyFn,
}

impl ObserverMethod {
    /// 观察事件类型 `E`
    pub fn observing<E: Any>(id: impl Into<String>) -> ObserverMethodBuilder {
        Self::observing_type(id, TypeKey::of::<E>())
    }

    /// 观察指定类型键
    pub fn observing_type(id: impl Into<String>, observed: TypeKey) -> ObserverMethodBuilder {
        ObserverMethodBuilder {
            id: id.into(),
            observed,
            qualifiers: QualifierSet::new(),
            priority: DEFAULT_OBSERVER_PRIORITY,
            contract: ExceptionContract::EMPTY,
            injection_points: Vec::new(),
        }
    }

    /// 观察者标识
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 所属 Bean，静态观察者为 `None`
    pub fn owner(&self) -> Option<&BeanId> {
        self.owner.as_ref()
    }

    /// 观察的类型
    pub fn observed(&self) -> TypeKey {
        self.observed
    }

    /// 要求的限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// 优先级，数值越小越先通知
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// 异常契约
    pub fn contract(&self) -> &ExceptionContract {
        &self.contract
    }

    /// 额外参数的注入点
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    /// 通知观察者
    pub fn notify(
        &self,
        owner: Option<&Instance>,
        event: &EventContext<'_>,
        ctx: &mut CreationalContext<'_>,
    ) -> InvocationResult<()> {
        (self.notify)(owner, event, ctx)
    }
}

impl fmt::Debug for ObserverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverMethod")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("observed", &self.observed)
            .field("qualifiers", &self.qualifiers)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 观察者方法构建器
pub struct ObserverMethodBuilder {
    id: String,
    observed: TypeKey,
    qualifiers: QualifierSet,
    priority: i32,
    contract: ExceptionContract,
    injection_points: Vec<InjectionPoint>,
}

impl ObserverMethodBuilder {
    /// 添加要求的限定符
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 设置优先级
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 设置异常契约
    pub fn throws(mut self, contract: ExceptionContract) -> Self {
        self.contract = contract;
        self
    }

    /// 声明一个额外参数的注入点
    pub fn injects<I: ?Sized + 'static>(mut self, qualifiers: &[Qualifier]) -> Self {
        let point = InjectionPoint::of::<I>(qualifiers).owned_by(format!("observer {}", self.id));
        self.injection_points.push(point);
        self
    }

    /// 静态观察者，按具体类型接收载荷
    pub fn notify<E, F>(self, callback: F) -> ObserverMethod
    where
        E: Any,
        F: Fn(&E, &mut CreationalContext<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.notify_event(move |event: &EventContext<'_>, ctx: &mut CreationalContext<'_>| {
            let payload = event.payload::<E>().ok_or_else(|| {
                InvocationError::illegal_state(format!(
                    "事件载荷类型不是 {}",
                    std::any::type_name::<E>()
                ))
            })?;
            callback(payload, ctx)
        })
    }

    /// 静态观察者，接收类型擦除的事件
    pub fn notify_event<F>(self, callback: F) -> ObserverMethod
    where
        F: Fn(&EventContext<'_>, &mut CreationalContext<'_>) -> InvocationResult<()>
            + Send
            + Sync
            + 'static,
    {
        let notify: NotifyFn = Arc::new(
            move |_: Option<&Instance>, event: &EventContext<'_>, ctx: &mut CreationalContext<'_>| {
                callback(event, ctx)
            },
        );
        self.finish(None, notify)
    }

    /// 所属 Bean `B` 上的观察者方法
    pub fn notify_bean<B, E, F>(self, owner: impl Into<BeanId>, callback: F) -> ObserverMethod
    where
        B: Any + Send + Sync,
        E: Any,
        F: Fn(&B, &E, &mut CreationalContext<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        let owner = owner.into();
        let owner_name = owner.clone();
        let notify: NotifyFn = Arc::new(
            move |instance: Option<&Instance>,
                  event: &EventContext<'_>,
                  ctx: &mut CreationalContext<'_>| {
                let bean = instance
                    .and_then(|it| it.downcast_ref::<B>())
                    .ok_or_else(|| {
                        InvocationError::illegal_state(format!(
                            "观察者所属 Bean {} 的实例类型不是 {}",
                            owner_name,
                            std::any::type_name::<B>()
                        ))
                    })?;
                let payload = event.payload::<E>().ok_or_else(|| {
                    InvocationError::illegal_state(format!(
                        "事件载荷类型不是 {}",
                        std::any::type_name::<E>()
                    ))
                })?;
                callback(bean, payload, ctx)
            },
        );
        self.finish(Some(owner), notify)
    }

    fn finish(self, owner: Option<BeanId>, notify: NotifyFn) -> ObserverMethod {
        ObserverMethod {
            id: self.id,
            owner,
            observed: self.observed,
            qualifiers: self.qualifiers,
            priority: self.priority,
            contract: self.contract,
            injection_points: self.injection_points,
            notify,
        }
    }
}

/// 发送的事件
///
/// 事件的类型闭包包含载荷的具体类型、`dyn Any` 以及发送方声明的额外类型。
pub struct Event<'a> {
    payload: &'a (dyn Any + Send + Sync),
    types: Vec<TypeKey>,
    qualifiers: QualifierSet,
}

impl<'a> Event<'a> {
    /// 创建事件
    pub fn new<E: Any + Send + Sync>(payload: &'a E) -> Self {
        Self {
            payload,
            types: vec![TypeKey::of::<E>(), TypeKey::any()],
            qualifiers: QualifierSet::new(),
        }
    }

    /// 添加限定符
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 添加多个限定符
    pub fn qualifiers(mut self, qualifiers: &[Qualifier]) -> Self {
        for qualifier in qualifiers {
            self.qualifiers.insert(qualifier.clone());
        }
        self
    }

    /// 声明载荷同时属于的额外类型
    pub fn with_type(mut self, key: TypeKey) -> Self {
        if !self.types.contains(&key) {
            self.types.push(key);
        }
        self
    }

    /// 载荷
    pub fn payload(&self) -> &'a (dyn Any + Send + Sync) {
        self.payload
    }

    /// 类型闭包
    pub fn types(&self) -> &[TypeKey] {
        &self.types
    }

    /// 发送时声明的限定符
    pub fn declared_qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("types", &self.types)
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[test]
    fn test_event_type_closure() {
        let ping = Ping;
        let event = Event::new(&ping).with_type(TypeKey::of::<str>());

        assert_eq!(
            event.types(),
            &[TypeKey::of::<Ping>(), TypeKey::any(), TypeKey::of::<str>()]
        );
    }

    #[test]
    fn test_builder_defaults() {
        let observer = ObserverMethod::observing::<Ping>("on_ping")
            .injects::<String>(&[])
            .notify::<Ping, _>(|_, _| Ok(()));

        assert_eq!(observer.priority(), DEFAULT_OBSERVER_PRIORITY);
        assert!(observer.owner().is_none());
        assert_eq!(observer.injection_points().len(), 1);
        assert_eq!(
            observer.injection_points()[0].owner(),
            Some("observer on_ping")
        );
    }
}
