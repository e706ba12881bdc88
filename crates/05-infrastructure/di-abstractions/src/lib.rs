//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义 Bean 目录模型和容器各组件之间的接口。
//!
//! ## 核心接口
//!
//! - [`BeanDefinition`] - Bean 定义及其类型化构建器
//! - [`InterceptorDefinition`] / [`Interceptor`] - 拦截器定义与拦截逻辑
//! - [`InterceptionChain`] / [`BoundInterception`] - 拦截链及其执行
//! - [`ObserverMethod`] / [`Event`] - 观察者方法与事件
//! - [`InjectableContext`] / [`ContextualInstance`] - 作用域上下文
//! - [`BeanRegistry`] / [`BeanResolver`] / [`DependencyProvider`] - 注册表与解析
//! - [`CreationalContext`] - 创建期上下文，持有依赖实例
//! - [`Catalog`] - 外部提供的完整目录

pub mod bean;
pub mod catalog;
pub mod container;
pub mod context;
pub mod creational;
pub mod interceptor;
pub mod observer;
pub mod registry;
pub mod resolver;

pub use bean::*;
pub use catalog::*;
pub use container::*;
pub use context::*;
pub use creational::*;
pub use interceptor::*;
pub use observer::*;
pub use registry::*;
pub use resolver::*;
