//! Bean 定义
//!
//! Bean 定义由外部描述符生产者在构建期创建，注册后不可变。

use crate::creational::CreationalContext;
use crate::interceptor::BoundInterception;
use crate::resolver::InjectionPoint;
use infrastructure_common::{
    BeanId, BindingSet, ExceptionContract, InterceptorBinding, InvocationResult, Qualifier,
    QualifierSet, ScopeKind, TypeKey,
};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除后的 Bean 实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 类型擦除后的类型化句柄，内容总是 `Arc<T>`
pub type ErasedHandle = Box<dyn Any + Send + Sync>;

/// 将实例转换为某个暴露类型的句柄
pub type CastFn = Arc<dyn Fn(&Instance) -> Option<ErasedHandle> + Send + Sync>;

/// 用生成的包装类型包裹句柄
pub type WrapFn = Arc<dyn Fn(ErasedHandle, BoundInterception) -> Option<ErasedHandle> + Send + Sync>;

/// 构造函数
pub type ConstructorFn =
    Arc<dyn Fn(&mut CreationalContext<'_>) -> InvocationResult<Instance> + Send + Sync>;

/// 生产者函数，第一个参数为声明 Bean 的实例
pub type ProducerFn =
    Arc<dyn Fn(&Instance, &mut CreationalContext<'_>) -> InvocationResult<Instance> + Send + Sync>;

/// 生命周期回调函数
pub type CallbackFn = Arc<dyn Fn(&Instance) -> InvocationResult<()> + Send + Sync>;

/// Bean 暴露的类型
#[derive(Clone)]
pub struct BeanType {
    key: TypeKey,
    cast: CastFn,
    wrap: Option<WrapFn>,
}

impl BeanType {
    /// 类型键
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// 转换为类型化句柄
    pub fn cast(&self, instance: &Instance) -> Option<ErasedHandle> {
        (self.cast)(instance)
    }

    /// 是否有生成的包装类型
    pub fn has_wrapper(&self) -> bool {
        self.wrap.is_some()
    }

    /// 使用包装类型包裹句柄
    pub fn wrap(&self, handle: ErasedHandle, interception: BoundInterception) -> Option<ErasedHandle> {
        self.wrap.as_ref().and_then(|wrap| wrap(handle, interception))
    }
}

impl fmt::Debug for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanType")
            .field("key", &self.key)
            .field("has_wrapper", &self.has_wrapper())
            .finish()
    }
}

/// 创建策略
#[derive(Clone)]
pub enum CreationStrategy {
    /// 构造函数
    Constructor(ConstructorFn),
    /// 声明 Bean 上的生产者方法
    Producer {
        declaring: BeanId,
        produce: ProducerFn,
    },
}

impl fmt::Debug for CreationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStrategy::Constructor(_) => f.write_str("Constructor(<function>)"),
            CreationStrategy::Producer { declaring, .. } => f
                .debug_struct("Producer")
                .field("declaring", declaring)
                .field("produce", &"<function>")
                .finish(),
        }
    }
}

/// 生命周期回调
#[derive(Clone)]
pub struct LifecycleCallback {
    callback: CallbackFn,
    contract: ExceptionContract,
}

impl LifecycleCallback {
    /// 创建回调
    pub fn new(callback: CallbackFn, contract: ExceptionContract) -> Self {
        Self { callback, contract }
    }

    /// 执行回调
    pub fn invoke(&self, instance: &Instance) -> InvocationResult<()> {
        (self.callback)(instance)
    }

    /// 回调的异常契约
    pub fn contract(&self) -> &ExceptionContract {
        &self.contract
    }
}

impl fmt::Debug for LifecycleCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallback")
            .field("contract", &self.contract)
            .field("callback", &"<function>")
            .finish()
    }
}

/// Bean 定义
#[derive(Debug, Clone)]
pub struct BeanDefinition {
    id: BeanId,
    implementation: TypeKey,
    scope: ScopeKind,
    qualifiers: QualifierSet,
    effective_qualifiers: QualifierSet,
    types: Vec<BeanType>,
    bindings: BindingSet,
    creation: Option<CreationStrategy>,
    construct_contract: ExceptionContract,
    post_construct: Option<LifecycleCallback>,
    pre_destroy: Option<LifecycleCallback>,
    injection_points: Vec<InjectionPoint>,
    default_candidate: bool,
    fallback: bool,
    startup: bool,
}

impl BeanDefinition {
    /// 创建实现类型为 `T` 的 Bean 定义构建器
    pub fn builder<T>(id: impl Into<BeanId>) -> BeanDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(id.into())
    }

    /// Bean 标识
    pub fn id(&self) -> &BeanId {
        &self.id
    }

    /// 实现类型
    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    /// 作用域
    pub fn scope(&self) -> &ScopeKind {
        &self.scope
    }

    /// 声明的限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// 有效限定符（含 `@Any`，必要时含 `@Default`）
    pub fn effective_qualifiers(&self) -> &QualifierSet {
        &self.effective_qualifiers
    }

    /// 暴露的类型
    pub fn types(&self) -> &[BeanType] {
        &self.types
    }

    /// 查找暴露的类型
    pub fn bean_type(&self, key: TypeKey) -> Option<&BeanType> {
        self.types.iter().find(|t| t.key == key)
    }

    /// 是否暴露指定类型
    pub fn exposes(&self, key: TypeKey) -> bool {
        self.bean_type(key).is_some()
    }

    /// 拦截器绑定
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// 创建策略
    pub fn creation(&self) -> Option<&CreationStrategy> {
        self.creation.as_ref()
    }

    /// 构造的异常契约
    pub fn construct_contract(&self) -> &ExceptionContract {
        &self.construct_contract
    }

    /// 构造后回调
    pub fn post_construct(&self) -> Option<&LifecycleCallback> {
        self.post_construct.as_ref()
    }

    /// 销毁前回调
    pub fn pre_destroy(&self) -> Option<&LifecycleCallback> {
        self.pre_destroy.as_ref()
    }

    /// 静态声明的注入点
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    /// 是否为唯一默认候选
    pub fn is_default_candidate(&self) -> bool {
        self.default_candidate
    }

    /// 是否为后备 Bean（存在其他候选时被丢弃）
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// 是否在启动时立即实例化
    pub fn is_startup(&self) -> bool {
        self.startup
    }

    /// 是否为生产者 Bean 的声明 Bean
    pub fn declaring_bean(&self) -> Option<&BeanId> {
        match &self.creation {
            Some(CreationStrategy::Producer { declaring, .. }) => Some(declaring),
            _ => None,
        }
    }
}

/// Bean 定义构建器
pub struct BeanDefinitionBuilder<T> {
    id: BeanId,
    scope: ScopeKind,
    qualifiers: QualifierSet,
    types: Vec<BeanType>,
    bindings: BindingSet,
    creation: Option<CreationStrategy>,
    construct_contract: ExceptionContract,
    post_construct: Option<LifecycleCallback>,
    pre_destroy: Option<LifecycleCallback>,
    injection_points: Vec<InjectionPoint>,
    default_candidate: bool,
    fallback: bool,
    startup: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BeanDefinitionBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn new(id: BeanId) -> Self {
        Self {
            id,
            scope: ScopeKind::default(),
            qualifiers: QualifierSet::new(),
            types: Vec::new(),
            bindings: BindingSet::new(),
            creation: None,
            construct_contract: ExceptionContract::EMPTY,
            post_construct: None,
            pre_destroy: None,
            injection_points: Vec::new(),
            default_candidate: false,
            fallback: false,
            startup: false,
            _marker: PhantomData,
        }
    }

    /// 设置作用域
    pub fn scope(mut self, scope: ScopeKind) -> Self {
        self.scope = scope;
        self
    }

    /// 添加限定符
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 添加 `@Named` 限定符
    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualifier(Qualifier::named(name))
    }

    /// 添加拦截器绑定
    pub fn binding(mut self, binding: InterceptorBinding) -> Self {
        self.bindings.insert(binding);
        self
    }

    /// 暴露实现类型本身
    pub fn exposes_self(self) -> Self {
        self.exposes::<T, _>(|it| it)
    }

    /// 暴露一个能力类型，`upcast` 负责把实现转换为该类型
    pub fn exposes<I, F>(mut self, upcast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.types.retain(|t| t.key != TypeKey::of::<I>());
        self.types.push(BeanType {
            key: TypeKey::of::<I>(),
            cast: Self::cast_fn(upcast),
            wrap: None,
        });
        self
    }

    /// 暴露一个带生成包装类型的能力类型
    ///
    /// 当 Bean 存在适用的业务方法拦截器时，解析结果总是 `wrap` 产生的包装实例。
    pub fn exposes_intercepted<I, F, W>(mut self, upcast: F, wrap: W) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
        W: Fn(Arc<I>, BoundInterception) -> Arc<I> + Send + Sync + 'static,
    {
        let wrap_fn: WrapFn = Arc::new(move |handle: ErasedHandle, interception: BoundInterception| {
            let delegate = handle.downcast::<Arc<I>>().ok()?;
            Some(Box::new(wrap(*delegate, interception)) as ErasedHandle)
        });
        self.types.retain(|t| t.key != TypeKey::of::<I>());
        self.types.push(BeanType {
            key: TypeKey::of::<I>(),
            cast: Self::cast_fn(upcast),
            wrap: Some(wrap_fn),
        });
        self
    }

    fn cast_fn<I, F>(upcast: F) -> CastFn
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        Arc::new(move |instance: &Instance| {
            let concrete = Arc::clone(instance).downcast::<T>().ok()?;
            Some(Box::new(upcast(concrete)) as ErasedHandle)
        })
    }

    /// 使用构造函数创建实例
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&mut CreationalContext<'_>) -> InvocationResult<T> + Send + Sync + 'static,
    {
        self.creation = Some(CreationStrategy::Constructor(Arc::new(move |ctx: &mut CreationalContext<'_>| {
            constructor(ctx).map(|it| Arc::new(it) as Instance)
        })));
        self
    }

    /// 使用声明 Bean `D` 上的生产者方法创建实例
    pub fn producer<D, F>(mut self, declaring: impl Into<BeanId>, produce: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&D, &mut CreationalContext<'_>) -> InvocationResult<T> + Send + Sync + 'static,
    {
        let declaring = declaring.into();
        let declaring_name = declaring.clone();
        let produce_fn: ProducerFn = Arc::new(move |owner: &Instance, ctx: &mut CreationalContext<'_>| {
            let owner = owner.downcast_ref::<D>().ok_or_else(|| {
                infrastructure_common::InvocationError::illegal_state(format!(
                    "生产者声明 Bean {} 的实例类型不是 {}",
                    declaring_name,
                    std::any::type_name::<D>()
                ))
            })?;
            produce(owner, ctx).map(|it| Arc::new(it) as Instance)
        });
        self.creation = Some(CreationStrategy::Producer {
            declaring,
            produce: produce_fn,
        });
        self
    }

    /// 设置构造的异常契约
    pub fn construct_contract(mut self, contract: ExceptionContract) -> Self {
        self.construct_contract = contract;
        self
    }

    /// 设置构造后回调
    pub fn post_construct<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.post_construct = Some(LifecycleCallback::new(
            Self::callback_fn(callback),
            ExceptionContract::EMPTY,
        ));
        self
    }

    /// 设置销毁前回调
    pub fn pre_destroy<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.pre_destroy = Some(LifecycleCallback::new(
            Self::callback_fn(callback),
            ExceptionContract::EMPTY,
        ));
        self
    }

    fn callback_fn<F>(callback: F) -> CallbackFn
    where
        F: Fn(&T) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Arc::new(move |instance: &Instance| match instance.downcast_ref::<T>() {
            Some(it) => callback(it),
            None => Err(infrastructure_common::InvocationError::illegal_state(format!(
                "回调目标类型不是 {}",
                std::any::type_name::<T>()
            ))),
        })
    }

    /// 声明一个静态注入点
    pub fn injects<I>(mut self, qualifiers: &[Qualifier]) -> Self
    where
        I: ?Sized + 'static,
    {
        self.injection_points
            .push(InjectionPoint::of::<I>(qualifiers).owned_by(self.id.as_str()));
        self
    }

    /// 标记为唯一默认候选
    pub fn default_candidate(mut self) -> Self {
        self.default_candidate = true;
        self
    }

    /// 标记为后备 Bean
    pub fn fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// 启动时立即实例化
    pub fn startup(mut self) -> Self {
        self.startup = true;
        self
    }

    /// 构建 Bean 定义
    pub fn build(self) -> BeanDefinition {
        let effective_qualifiers = self.qualifiers.effective_for_bean();
        BeanDefinition {
            id: self.id,
            implementation: TypeKey::of::<T>(),
            scope: self.scope,
            qualifiers: self.qualifiers,
            effective_qualifiers,
            types: self.types,
            bindings: self.bindings,
            creation: self.creation,
            construct_contract: self.construct_contract,
            post_construct: self.post_construct,
            pre_destroy: self.pre_destroy,
            injection_points: self.injection_points,
            default_candidate: self.default_candidate,
            fallback: self.fallback,
            startup: self.startup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Debug)]
    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_builder_exposes_types() {
        let bean = BeanDefinition::builder::<English>("english")
            .scope(ScopeKind::Singleton)
            .exposes_self()
            .exposes::<dyn Greeter, _>(|it| it)
            .constructor(|_| Ok(English))
            .build();

        assert_eq!(bean.id().as_str(), "english");
        assert!(bean.exposes(TypeKey::of::<English>()));
        assert!(bean.exposes(TypeKey::of::<dyn Greeter>()));
        assert!(bean
            .effective_qualifiers()
            .contains(&Qualifier::default_qualifier()));
    }

    #[test]
    fn test_cast_produces_typed_handle() {
        let bean = BeanDefinition::builder::<English>("english")
            .exposes::<dyn Greeter, _>(|it| it)
            .build();
        let instance: Instance = Arc::new(English);

        let handle = bean
            .bean_type(TypeKey::of::<dyn Greeter>())
            .and_then(|t| t.cast(&instance))
            .unwrap();
        let greeter = handle.downcast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_callback_rejects_foreign_instance() {
        let bean = BeanDefinition::builder::<English>("english")
            .pre_destroy(|_| Ok(()))
            .build();
        let foreign: Instance = Arc::new(42_u32);

        assert!(bean.pre_destroy().unwrap().invoke(&foreign).is_err());
    }
}
