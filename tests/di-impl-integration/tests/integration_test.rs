//! 容器端到端场景测试：拦截、异常包装、事件和并发

use di_abstractions::{
    BeanDefinition, BoundInterception, Catalog, ContainerConfig, InterceptorDefinition,
    InvocationContext, ObserverMethod, Value,
};
use di_impl::Container;
use infrastructure_common::{
    ContainerError, DefinitionError, ExceptionContract, ExceptionKind, InterceptionPhase,
    InterceptorBinding, InvocationError, InvocationResult, MethodMetadata, Qualifier, ScopeKind,
    EXCEPTION, RUNTIME_EXCEPTION,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

static MY_EXCEPTION: ExceptionKind = ExceptionKind::checked("MyException").extends(&EXCEPTION);
static MY_OTHER_EXCEPTION: ExceptionKind =
    ExceptionKind::checked("MyOtherException").extends(&EXCEPTION);

trait Gateway: Send + Sync {
    fn call(&self, failure: Option<&'static ExceptionKind>) -> InvocationResult<String>;
}

struct RemoteGateway {
    calls: Arc<AtomicUsize>,
}

impl Gateway for RemoteGateway {
    fn call(&self, failure: Option<&'static ExceptionKind>) -> InvocationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match failure {
            Some(kind) => Err(InvocationError::raise(kind, "remote failure")),
            None => Ok("remote".to_string()),
        }
    }
}

static GATEWAY_CALL: MethodMetadata =
    MethodMetadata::new("Gateway", "call", ExceptionContract::declared(&[&MY_EXCEPTION]));

/// 手写的包装类型，与宏生成的代码形状一致
struct GatewaySubclass {
    delegate: Arc<dyn Gateway>,
    interception: BoundInterception,
}

impl Gateway for GatewaySubclass {
    fn call(&self, failure: Option<&'static ExceptionKind>) -> InvocationResult<String> {
        let delegate = Arc::clone(&self.delegate);
        self.interception
            .invoke(&GATEWAY_CALL, move || delegate.call(failure))
    }
}

fn gateway_bean(binding: &str, calls: Arc<AtomicUsize>) -> BeanDefinition {
    BeanDefinition::builder::<RemoteGateway>("gateway")
        .scope(ScopeKind::Singleton)
        .binding(InterceptorBinding::new(binding))
        .exposes_intercepted::<dyn Gateway, _, _>(
            |it| it,
            |delegate, interception| {
                Arc::new(GatewaySubclass {
                    delegate,
                    interception,
                }) as Arc<dyn Gateway>
            },
        )
        .constructor(move |_| {
            Ok(RemoteGateway {
                calls: calls.clone(),
            })
        })
        .build()
}

fn recording(id: &'static str, priority: i32, log: Arc<Mutex<Vec<String>>>) -> InterceptorDefinition {
    InterceptorDefinition::from_fn(id, move |ctx: &mut InvocationContext<'_>| {
        let method = ctx.method().map(|m| m.to_string()).unwrap_or_default();
        log.lock().push(format!("{id}:before:{method}"));
        let result = ctx.proceed();
        log.lock().push(format!("{id}:after"));
        result
    })
    .binding(InterceptorBinding::new("Logged"))
    .priority(priority)
}

#[test]
fn test_declared_exception_passes_through_interceptors() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let catalog = Catalog::new()
        .interceptor(recording("trace", 10, log.clone()))
        .bean(gateway_bean("Logged", Arc::new(AtomicUsize::new(0))));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();
    let gateway = container.instance::<dyn Gateway>(&[]).unwrap().get().unwrap();

    let error = gateway.call(Some(&MY_EXCEPTION)).unwrap_err();
    let exception = error.as_exception().expect("declared exception must pass through");
    assert_eq!(exception.kind(), &MY_EXCEPTION);
    assert_eq!(exception.message(), "remote failure");
    assert_eq!(
        *log.lock(),
        vec!["trace:before:Gateway::call".to_string(), "trace:after".to_string()]
    );
}

#[test]
fn test_undeclared_checked_exception_is_wrapped() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let catalog = Catalog::new()
        .interceptor(recording("trace", 10, log))
        .bean(gateway_bean("Logged", Arc::new(AtomicUsize::new(0))));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();
    let gateway = container.instance::<dyn Gateway>(&[]).unwrap().get().unwrap();

    let error = gateway.call(Some(&MY_OTHER_EXCEPTION)).unwrap_err();
    assert!(error.as_exception().is_none());
    assert_eq!(error.interception_cause().unwrap().kind(), &MY_OTHER_EXCEPTION);

    let unchecked = gateway.call(Some(&RUNTIME_EXCEPTION)).unwrap_err();
    assert_eq!(unchecked.as_exception().unwrap().kind(), &RUNTIME_EXCEPTION);

    assert_eq!(gateway.call(None).unwrap(), "remote");
}

#[test]
fn test_interceptors_nest_in_priority_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let catalog = Catalog::new()
        .interceptor(recording("inner", 200, log.clone()))
        .interceptor(recording("outer", 100, log.clone()))
        .bean(gateway_bean("Logged", Arc::new(AtomicUsize::new(0))));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    container
        .instance::<dyn Gateway>(&[])
        .unwrap()
        .get()
        .unwrap()
        .call(None)
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "outer:before:Gateway::call".to_string(),
            "inner:before:Gateway::call".to_string(),
            "inner:after".to_string(),
            "outer:after".to_string(),
        ]
    );
}

#[test]
fn test_interceptor_can_short_circuit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("cache", |_: &mut InvocationContext<'_>| {
                Ok(Box::new("cached".to_string()) as Value)
            })
            .binding(InterceptorBinding::new("Cached")),
        )
        .bean(gateway_bean("Cached", calls.clone()));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();
    let gateway = container.instance::<dyn Gateway>(&[]).unwrap().get().unwrap();

    assert_eq!(gateway.call(Some(&MY_OTHER_EXCEPTION)).unwrap(), "cached");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_interceptor_exception_follows_method_contract() {
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("guard", |ctx: &mut InvocationContext<'_>| {
                if ctx.data().is_empty() {
                    return Err(InvocationError::raise(&MY_OTHER_EXCEPTION, "rejected"));
                }
                ctx.proceed()
            })
            .binding(InterceptorBinding::new("Guarded")),
        )
        .bean(gateway_bean("Guarded", Arc::new(AtomicUsize::new(0))));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();
    let gateway = container.instance::<dyn Gateway>(&[]).unwrap().get().unwrap();

    let error = gateway.call(None).unwrap_err();
    assert_eq!(error.interception_cause().unwrap().message(), "rejected");
}

#[test]
fn test_interceptors_share_invocation_data() {
    let seen = Arc::new(Mutex::new(None));
    let reader = seen.clone();
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("stamp", |ctx: &mut InvocationContext<'_>| {
                ctx.data_mut()
                    .insert("trace-id".to_string(), serde_json::json!("t-1"));
                ctx.proceed()
            })
            .binding(InterceptorBinding::new("Logged"))
            .priority(1),
        )
        .interceptor(
            InterceptorDefinition::from_fn("read", move |ctx: &mut InvocationContext<'_>| {
                *reader.lock() = ctx.data().get("trace-id").cloned();
                ctx.proceed()
            })
            .binding(InterceptorBinding::new("Logged"))
            .priority(2),
        )
        .bean(gateway_bean("Logged", Arc::new(AtomicUsize::new(0))));
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    container
        .instance::<dyn Gateway>(&[])
        .unwrap()
        .get()
        .unwrap()
        .call(None)
        .unwrap();
    assert_eq!(*seen.lock(), Some(serde_json::json!("t-1")));
}

#[test]
fn test_intercepted_type_without_wrapper_fails_start() {
    let catalog = Catalog::new()
        .interceptor(recording("trace", 10, Arc::new(Mutex::new(Vec::new()))))
        .bean(
            BeanDefinition::builder::<RemoteGateway>("gateway")
                .binding(InterceptorBinding::new("Logged"))
                .exposes::<dyn Gateway, _>(|it| it)
                .constructor(|_| {
                    Ok(RemoteGateway {
                        calls: Arc::new(AtomicUsize::new(0)),
                    })
                })
                .build(),
        );

    assert!(matches!(
        Container::start(catalog, ContainerConfig::default()),
        Err(ContainerError::Definition {
            source: DefinitionError::MissingWrapper { .. }
        })
    ));
}

#[test]
fn test_lifecycle_phases_are_intercepted() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let phase_log = log.clone();
    let callback_log = log.clone();
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("lifecycle", move |ctx: &mut InvocationContext<'_>| {
                phase_log.lock().push(format!("{:?}", ctx.phase()));
                ctx.proceed()
            })
            .binding(InterceptorBinding::new("Tracked"))
            .phases(&[
                InterceptionPhase::AroundConstruct,
                InterceptionPhase::PostConstruct,
                InterceptionPhase::PreDestroy,
            ]),
        )
        .bean(
            BeanDefinition::builder::<RemoteGateway>("gateway")
                .scope(ScopeKind::Singleton)
                .binding(InterceptorBinding::new("Tracked"))
                .exposes_self()
                .constructor(|_| {
                    Ok(RemoteGateway {
                        calls: Arc::new(AtomicUsize::new(0)),
                    })
                })
                .post_construct(move |_| {
                    callback_log.lock().push("post-construct".to_string());
                    Ok(())
                })
                .build(),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    container.instance::<RemoteGateway>(&[]).unwrap().get().unwrap();
    container.stop().unwrap();

    assert_eq!(
        *log.lock(),
        vec!["AroundConstruct", "PostConstruct", "post-construct", "PreDestroy"]
    );
}

/// 下单事件
struct OrderPlaced {
    order: u32,
}

/// 依赖作用域的审计记录，作为观察者的额外参数注入
struct AuditTrail {
    id: Uuid,
}

#[test]
fn test_observer_parameter_is_destroyed_after_notification() {
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::new(Mutex::new(Vec::new()));
    let (on_destroy, on_receive) = (destroyed.clone(), received.clone());

    let catalog = Catalog::new()
        .bean(
            BeanDefinition::builder::<AuditTrail>("audit-trail")
                .exposes_self()
                .constructor(|_| Ok(AuditTrail { id: Uuid::new_v4() }))
                .pre_destroy(move |trail| {
                    on_destroy.lock().push(trail.id);
                    Ok(())
                })
                .build(),
        )
        .observer(
            ObserverMethod::observing::<OrderPlaced>("audit-orders")
                .injects::<AuditTrail>(&[])
                .notify::<OrderPlaced, _>(move |event, ctx| {
                    let trail = ctx.inject::<AuditTrail>(&[])?;
                    on_receive.lock().push((event.order, trail.id));
                    Ok(())
                }),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    container.fire_event(&OrderPlaced { order: 7 }, &[]).unwrap();
    container.fire_event(&OrderPlaced { order: 8 }, &[]).unwrap();

    let received = received.lock();
    assert_eq!(received.len(), 2);
    assert_ne!(received[0].1, received[1].1);
    assert_eq!(
        *destroyed.lock(),
        received.iter().map(|(_, id)| *id).collect::<Vec<_>>()
    );
}

#[test]
fn test_observer_ordering_and_qualifiers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let observer = |id: &'static str, priority: i32, qualifier: Option<&str>| {
        let log = log.clone();
        let builder = ObserverMethod::observing::<OrderPlaced>(id).priority(priority);
        let builder = match qualifier {
            Some(name) => builder.qualifier(Qualifier::new(name)),
            None => builder,
        };
        builder.notify::<OrderPlaced, _>(move |_, _| {
            log.lock().push(id);
            Ok(())
        })
    };
    let catalog = Catalog::new()
        .observer(observer("late", 3000, None))
        .observer(observer("urgent", 100, Some("Urgent")))
        .observer(observer("early", 100, None));
    let container = Container::start(catalog, ContainerConfig::minimal()).unwrap();

    container.fire_event(&OrderPlaced { order: 1 }, &[]).unwrap();
    assert_eq!(*log.lock(), vec!["early", "late"]);

    log.lock().clear();
    container
        .fire_event(&OrderPlaced { order: 2 }, &[Qualifier::new("Urgent")])
        .unwrap();
    assert_eq!(*log.lock(), vec!["urgent", "early", "late"]);
    assert_eq!(container.stats().fired_events, 2);
}

/// 持有观察者方法的单例
struct OrderLedger {
    orders: Mutex<Vec<u32>>,
}

#[test]
fn test_bean_observer_uses_contextual_owner() {
    let catalog = Catalog::new()
        .bean(
            BeanDefinition::builder::<OrderLedger>("ledger")
                .scope(ScopeKind::Singleton)
                .exposes_self()
                .constructor(|_| {
                    Ok(OrderLedger {
                        orders: Mutex::new(Vec::new()),
                    })
                })
                .build(),
        )
        .observer(
            ObserverMethod::observing::<OrderPlaced>("ledger-record").notify_bean::<OrderLedger, OrderPlaced, _>(
                "ledger",
                |ledger, event, _| {
                    ledger.orders.lock().push(event.order);
                    Ok(())
                },
            ),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    container.fire_event(&OrderPlaced { order: 1 }, &[]).unwrap();
    container.fire_event(&OrderPlaced { order: 2 }, &[]).unwrap();

    let ledger = container.instance::<OrderLedger>(&[]).unwrap().get().unwrap();
    assert_eq!(*ledger.orders.lock(), vec![1, 2]);
}

#[test]
fn test_failing_observer_aborts_dispatch() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = reached.clone();
    let catalog = Catalog::new()
        .observer(
            ObserverMethod::observing::<OrderPlaced>("reject")
                .priority(1)
                .notify::<OrderPlaced, _>(|_, _| {
                    Err(InvocationError::raise(&MY_OTHER_EXCEPTION, "rejected"))
                }),
        )
        .observer(
            ObserverMethod::observing::<OrderPlaced>("after").priority(2).notify::<OrderPlaced, _>(
                move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            ),
        );
    let container = Container::start(catalog, ContainerConfig::minimal()).unwrap();

    let error = container.fire_event(&OrderPlaced { order: 1 }, &[]).unwrap_err();
    assert_eq!(error.interception_cause().unwrap().kind(), &MY_OTHER_EXCEPTION);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
}

#[test]
fn test_observer_declared_exception_passes_through() {
    let catalog = Catalog::new().observer(
        ObserverMethod::observing::<OrderPlaced>("reject")
            .throws(ExceptionContract::from_kinds(vec![&MY_EXCEPTION]))
            .notify::<OrderPlaced, _>(|_, _| Err(InvocationError::raise(&MY_EXCEPTION, "declared"))),
    );
    let container = Container::start(catalog, ContainerConfig::minimal()).unwrap();

    let error = container.fire_event(&OrderPlaced { order: 1 }, &[]).unwrap_err();
    assert_eq!(error.as_exception().unwrap().kind(), &MY_EXCEPTION);
}

/// 构造较慢的单例
struct SlowSingleton;

#[test]
fn test_concurrent_singleton_creation_runs_once() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let chain_runs = Arc::new(AtomicUsize::new(0));
    let (counter, runs) = (constructed.clone(), chain_runs.clone());
    let catalog = Catalog::new()
        .interceptor(
            InterceptorDefinition::from_fn("construct-counter", move |ctx: &mut InvocationContext<'_>| {
                runs.fetch_add(1, Ordering::SeqCst);
                ctx.proceed()
            })
            .phases(&[InterceptionPhase::AroundConstruct])
            .binding(InterceptorBinding::new("Counted")),
        )
        .bean(
            BeanDefinition::builder::<SlowSingleton>("slow")
                .scope(ScopeKind::Singleton)
                .binding(InterceptorBinding::new("Counted"))
                .exposes_self()
                .constructor(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(SlowSingleton)
                })
                .build(),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    let instances: Vec<Arc<SlowSingleton>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                scope.spawn(move || container.instance::<SlowSingleton>(&[]).unwrap().get().unwrap())
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(chain_runs.load(Ordering::SeqCst), 1);
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

/// 依赖作用域所有者
#[derive(Debug)]
struct Owner {
    child: Arc<Child>,
}

/// 依赖作用域子对象
#[derive(Debug)]
struct Child;

#[test]
fn test_dependent_cascade_destroys_owner_then_children() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (owner_log, child_log) = (log.clone(), log.clone());
    let catalog = Catalog::new()
        .bean(
            BeanDefinition::builder::<Child>("child")
                .exposes_self()
                .constructor(|_| Ok(Child))
                .pre_destroy(move |_| {
                    child_log.lock().push("child");
                    Ok(())
                })
                .build(),
        )
        .bean(
            BeanDefinition::builder::<Owner>("owner")
                .exposes_self()
                .injects::<Child>(&[])
                .constructor(|ctx| {
                    Ok(Owner {
                        child: ctx.inject::<Child>(&[])?,
                    })
                })
                .pre_destroy(move |_| {
                    owner_log.lock().push("owner");
                    Ok(())
                })
                .build(),
        );
    let container = Container::start(catalog, ContainerConfig::default())?;

    let handle = container.instance::<Owner>(&[])?;
    let owner = handle.get()?;
    assert!(Arc::strong_count(&owner.child) >= 1);

    handle.destroy()?;
    assert_eq!(*log.lock(), vec!["owner", "child"]);

    container.stop()?;
    assert_eq!(log.lock().len(), 2);
    Ok(())
}

#[test]
fn test_failed_construction_destroys_injected_dependents() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    let catalog = Catalog::new()
        .bean(
            BeanDefinition::builder::<Child>("child")
                .exposes_self()
                .constructor(|_| Ok(Child))
                .pre_destroy(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build(),
        )
        .bean(
            BeanDefinition::builder::<Owner>("owner")
                .scope(ScopeKind::Singleton)
                .exposes_self()
                .injects::<Child>(&[])
                .constructor(|ctx| {
                    ctx.inject::<Child>(&[])?;
                    Err(InvocationError::raise(&MY_EXCEPTION, "constructor failed"))
                })
                .build(),
        );
    let container = Container::start(catalog, ContainerConfig::default()).unwrap();

    let error = container.instance::<Owner>(&[]).unwrap().get().unwrap_err();
    assert_eq!(error.interception_cause().unwrap().kind(), &MY_EXCEPTION);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    // 失败的单例没有被缓存
    assert!(container.instance::<Owner>(&[]).unwrap().get().is_err());
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}
