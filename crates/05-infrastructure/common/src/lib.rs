//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn DI 容器各层共享的元数据与错误类型。
//!
//! ## 核心类型
//!
//! - [`BeanId`] / [`TypeKey`] - Bean 标识与类型键
//! - [`Qualifier`] / [`QualifierSet`] - 限定符
//! - [`InterceptorBinding`] - 拦截器绑定
//! - [`ScopeKind`] / [`InterceptionPhase`] - 作用域与拦截阶段
//! - [`ExceptionKind`] / [`ExceptionContract`] - 显式声明的异常契约
//! - [`InvocationError`] / [`DefinitionError`] - 错误分类
//!
//! ## 设计原则
//!
//! - 所有解析与排序算法只依赖显式标签数据，不做运行时反射
//! - 元数据在构建期生成，之后不可变

pub mod errors;
pub mod exception;
pub mod lifecycle;
pub mod metadata;

pub use errors::*;
pub use exception::*;
pub use lifecycle::*;
pub use metadata::*;
