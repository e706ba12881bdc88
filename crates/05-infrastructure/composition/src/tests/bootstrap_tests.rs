//! 容器启动器测试

use crate::{BootstrapError, ContainerBootstrapper};
use di_abstractions::{BeanDefinition, Catalog, ContainerConfig};
use di_impl::ThreadBoundContext;
use infrastructure_common::{ContainerError, DefinitionError, ScopeKind};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Debug)]
struct Clock {
    ticks: AtomicUsize,
}

fn clock_catalog(constructed: Arc<AtomicUsize>) -> Catalog {
    Catalog::new().bean(
        BeanDefinition::builder::<Clock>("clock")
            .scope(ScopeKind::Singleton)
            .startup()
            .exposes_self()
            .constructor(move |_| {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(Clock {
                    ticks: AtomicUsize::new(0),
                })
            })
            .build(),
    )
}

fn toml_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_bootstrap_with_defaults() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let container = ContainerBootstrapper::new()
        .add_catalog(clock_catalog(constructed.clone()))
        .bootstrap()
        .unwrap();

    assert!(container.is_running());
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    let clock = container.instance::<Clock>(&[]).unwrap().get().unwrap();
    clock.ticks.fetch_add(1, Ordering::SeqCst);
    assert_eq!(container.stats().registered_beans, 1);

    container.stop().unwrap();
    assert!(!container.is_running());
}

#[test]
fn test_settings_file_controls_startup() {
    let settings = toml_file("[container]\neager_startup = false\n");
    let constructed = Arc::new(AtomicUsize::new(0));

    let container = ContainerBootstrapper::new()
        .add_config_toml(settings.path())
        .unwrap()
        .add_catalog(clock_catalog(constructed.clone()))
        .bootstrap()
        .unwrap();

    assert!(!container.config().eager_startup);
    assert_eq!(constructed.load(Ordering::SeqCst), 0);
    container.stop().unwrap();
}

#[test]
fn test_explicit_config_wins_over_sources() {
    let settings = toml_file("max_resolution_depth = 4\n");
    let bootstrapper = ContainerBootstrapper::new()
        .add_config_toml(settings.path())
        .unwrap()
        .with_config(ContainerConfig::minimal());

    assert_eq!(bootstrapper.resolve_config().unwrap(), ContainerConfig::minimal());
}

#[test]
fn test_missing_config_file_is_rejected_early() {
    let result = ContainerBootstrapper::new().add_config_json("/nonexistent/container.json");
    assert!(matches!(
        result,
        Err(BootstrapError::ConfigFileNotFound { .. })
    ));
}

#[test]
fn test_catalogs_are_merged_in_order() {
    let container = ContainerBootstrapper::new()
        .with_config(ContainerConfig::minimal())
        .add_catalog(clock_catalog(Arc::new(AtomicUsize::new(0))))
        .add_catalog(clock_catalog(Arc::new(AtomicUsize::new(0))))
        .bootstrap();

    assert!(matches!(
        container,
        Err(BootstrapError::Container(ContainerError::Definition {
            source: DefinitionError::DuplicateBeanId { .. }
        }))
    ));
}

#[test]
fn test_custom_context_is_registered() {
    let conversation = ScopeKind::custom("Conversation");
    let catalog = Catalog::new().bean(
        BeanDefinition::builder::<Clock>("conversation-clock")
            .scope(conversation.clone())
            .exposes_self()
            .constructor(|_| {
                Ok(Clock {
                    ticks: AtomicUsize::new(0),
                })
            })
            .build(),
    );

    let container = ContainerBootstrapper::new()
        .with_context(Arc::new(ThreadBoundContext::new(conversation.clone())))
        .add_catalog(catalog)
        .bootstrap()
        .unwrap();

    let guard = container.scope_guard(conversation).unwrap();
    container.instance::<Clock>(&[]).unwrap().get().unwrap();
    guard.end().unwrap();
    container.stop().unwrap();
}
