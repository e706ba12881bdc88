//! 生成的包装类型与容器协作的集成测试

use component_macros::intercepted;
use di_abstractions::{BeanDefinition, Catalog, ContainerConfig, InterceptorDefinition, InvocationContext};
use di_impl::Container;
use infrastructure_common::{
    ExceptionKind, InterceptorBinding, InvocationError, InvocationResult, ScopeKind, EXCEPTION,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub static NOT_FOUND: ExceptionKind = ExceptionKind::checked("NotFound").extends(&EXCEPTION);
pub static TIMEOUT: ExceptionKind = ExceptionKind::checked("Timeout").extends(&EXCEPTION);

#[intercepted]
pub trait Repository: Send + Sync {
    #[throws(NOT_FOUND)]
    fn find(&self, id: u64) -> InvocationResult<String>;

    fn save(&self, id: u64, value: String) -> InvocationResult<()>;

    fn name(&self) -> &'static str
    where
        Self: Sized,
    {
        "repository"
    }
}

/// 内存仓储
#[derive(Default)]
struct MemoryRepository {
    rows: Mutex<HashMap<u64, String>>,
}

impl Repository for MemoryRepository {
    fn find(&self, id: u64) -> InvocationResult<String> {
        if id == 0 {
            return Err(InvocationError::raise(&TIMEOUT, "storage timed out"));
        }
        self.rows
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| InvocationError::raise(&NOT_FOUND, format!("row {id}")))
    }

    fn save(&self, id: u64, value: String) -> InvocationResult<()> {
        self.rows.lock().insert(id, value);
        Ok(())
    }
}

fn catalog(log: Arc<Mutex<Vec<String>>>) -> Catalog {
    Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("audit", move |ctx: &mut InvocationContext<'_>| {
                let method = ctx.method().map(|m| m.to_string()).unwrap_or_default();
                let result = ctx.proceed();
                log.lock().push(format!("{method}:{}", result.is_ok()));
                result
            })
            .binding(InterceptorBinding::new("Audited")),
        )
        .bean(
            BeanDefinition::builder::<MemoryRepository>("repository")
                .scope(ScopeKind::Singleton)
                .binding(InterceptorBinding::new("Audited"))
                .exposes_intercepted::<dyn Repository, _, _>(|it| it, RepositorySubclass::wrap)
                .constructor(|_| Ok(MemoryRepository::default()))
                .build(),
        )
}

#[test]
fn test_generated_wrapper_routes_through_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::start(catalog(log.clone()), ContainerConfig::default()).unwrap();
    let repository = container.instance::<dyn Repository>(&[]).unwrap().get().unwrap();

    repository.save(1, "alpha".to_string()).unwrap();
    assert_eq!(repository.find(1).unwrap(), "alpha");

    assert_eq!(
        *log.lock(),
        vec!["Repository::save:true", "Repository::find:true"]
    );
}

#[test]
fn test_generated_wrapper_applies_declared_contract() {
    let container =
        Container::start(catalog(Arc::new(Mutex::new(Vec::new()))), ContainerConfig::default())
            .unwrap();
    let repository = container.instance::<dyn Repository>(&[]).unwrap().get().unwrap();

    let declared = repository.find(42).unwrap_err();
    assert_eq!(declared.as_exception().unwrap().kind(), &NOT_FOUND);

    let undeclared = repository.find(0).unwrap_err();
    assert_eq!(undeclared.interception_cause().unwrap().kind(), &TIMEOUT);
}

#[test]
fn test_wrapper_shares_the_contextual_instance() {
    let container =
        Container::start(catalog(Arc::new(Mutex::new(Vec::new()))), ContainerConfig::default())
            .unwrap();

    let writer = container.instance::<dyn Repository>(&[]).unwrap().get().unwrap();
    let reader = container.instance::<dyn Repository>(&[]).unwrap().get().unwrap();

    writer.save(7, "shared".to_string()).unwrap();
    assert_eq!(reader.find(7).unwrap(), "shared");
}

#[test]
fn test_unbound_bean_is_not_wrapped() {
    let container = Container::start(
        Catalog::new().bean(
            BeanDefinition::builder::<MemoryRepository>("repository")
                .exposes_intercepted::<dyn Repository, _, _>(|it| it, RepositorySubclass::wrap)
                .exposes_self()
                .constructor(|_| Ok(MemoryRepository::default()))
                .build(),
        ),
        ContainerConfig::default(),
    )
    .unwrap();

    let concrete = container.instance::<MemoryRepository>(&[]).unwrap().get().unwrap();
    assert_eq!(concrete.name(), "repository");

    let error = container
        .instance::<dyn Repository>(&[])
        .unwrap()
        .get()
        .unwrap()
        .find(0)
        .unwrap_err();
    // 没有拦截链时不经过包装策略
    assert_eq!(error.as_exception().unwrap().kind(), &TIMEOUT);
}

#[test]
fn test_generated_wrapper_supports_repeated_proceed() {
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("retry", |ctx: &mut InvocationContext<'_>| {
                match ctx.proceed() {
                    Err(error) if error.as_exception().is_some() => ctx.proceed(),
                    other => other,
                }
            })
            .binding(InterceptorBinding::new("Audited")),
        )
        .bean(
            BeanDefinition::builder::<FlakyRepository>("repository")
                .scope(ScopeKind::Singleton)
                .binding(InterceptorBinding::new("Audited"))
                .exposes_intercepted::<dyn Repository, _, _>(|it| it, RepositorySubclass::wrap)
                .constructor(|_| Ok(FlakyRepository::default()))
                .build(),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();
    let repository = container.instance::<dyn Repository>(&[]).unwrap().get().unwrap();

    repository.save(3, "retried".to_string()).unwrap();
    assert_eq!(repository.find(3).unwrap(), "retried");
}

/// 第一次写入超时的仓储
#[derive(Default)]
struct FlakyRepository {
    inner: MemoryRepository,
    attempts: Mutex<u32>,
}

impl Repository for FlakyRepository {
    fn find(&self, id: u64) -> InvocationResult<String> {
        self.inner.find(id)
    }

    fn save(&self, id: u64, value: String) -> InvocationResult<()> {
        let mut attempts = self.attempts.lock();
        *attempts += 1;
        if *attempts == 1 {
            return Err(InvocationError::raise(&TIMEOUT, "write timed out"));
        }
        self.inner.save(id, value)
    }
}
