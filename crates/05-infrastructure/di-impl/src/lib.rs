//! # 依赖注入具体实现
//!
//! 提供容器运行时及其组成部分：Bean 注册表、类型安全解析、作用域上下文、
//! 拦截链构建、生命周期执行、事件分发和启动校验。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use di_abstractions::{BeanDefinition, Catalog, ContainerConfig};
//! use di_impl::Container;
//! use infrastructure_common::ScopeKind;
//!
//! let catalog = Catalog::new().bean(
//!     BeanDefinition::builder::<Clock>("clock")
//!         .scope(ScopeKind::Singleton)
//!         .exposes_self()
//!         .constructor(|_| Ok(Clock::default()))
//!         .build(),
//! );
//! let container = Container::start(catalog, ContainerConfig::default())?;
//! let clock = container.instance::<Clock>(&[])?.get()?;
//! container.stop()?;
//! ```

pub mod container;
pub mod contexts;
pub mod events;
pub mod interception;
pub mod lifecycle;
pub mod registry;
pub mod resolution;
pub mod validation;

pub use container::*;
pub use contexts::*;
pub use events::*;
pub use interception::*;
pub use lifecycle::*;
pub use registry::*;
pub use resolution::*;
pub use validation::*;
