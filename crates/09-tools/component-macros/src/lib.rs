//! # Component Macros
//!
//! 这个 crate 提供构建期生成拦截包装类型的过程宏。
//!
//! ## 核心宏
//!
//! - [`intercepted`] - 为能力 trait 生成拦截包装类型
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use component_macros::intercepted;
//! use infrastructure_common::{ExceptionKind, InvocationResult, EXCEPTION};
//!
//! pub static NOT_FOUND: ExceptionKind = ExceptionKind::checked("NotFound").extends(&EXCEPTION);
//!
//! #[intercepted]
//! pub trait Repository: Send + Sync {
//!     #[throws(NOT_FOUND)]
//!     fn find(&self, id: u64) -> InvocationResult<String>;
//! }
//!
//! // 生成 RepositorySubclass::wrap，可直接交给 exposes_intercepted
//! let bean = BeanDefinition::builder::<SqlRepository>("repository")
//!     .exposes_intercepted::<dyn Repository, _, _>(|it| it, RepositorySubclass::wrap)
//!     .constructor(|_| Ok(SqlRepository::default()))
//!     .build();
//! ```

use proc_macro::TokenStream;

mod intercepted;
mod utils;

// Re-exports are not allowed in proc-macro crates

/// 拦截包装类型生成宏
///
/// 作用于能力 trait，生成 `<Trait>Subclass`：它持有委托实例和
/// `di_abstractions::BoundInterception`，并把每个方法调用路由到业务方法拦截链。
///
/// # 要求
///
/// - trait 必须声明 `Send + Sync` 约束，不能有泛型参数、关联类型或关联常量
/// - 方法以 `&self` 为接收者并返回 `InvocationResult<T>`
/// - 参数类型实现 `Clone` 且不是可变引用；拦截器每次 `proceed` 都会克隆参数
/// - 带有 `where Self: Sized` 的方法不经过拦截，必须提供默认实现
///
/// # 参数
///
/// - `name = "CustomName"` - 自定义包装类型名称
///
/// # 方法属性
///
/// - `#[throws(KIND, ...)]` - 方法声明的受检异常种类，决定异常包装策略
///
/// # 示例
///
/// ```rust,ignore
/// #[intercepted(name = "AuditedGreeter")]
/// pub trait Greeter: Send + Sync {
///     #[throws(GREETING_FAILED)]
///     fn greet(&self, name: &str) -> InvocationResult<String>;
/// }
/// ```
#[proc_macro_attribute]
pub fn intercepted(args: TokenStream, input: TokenStream) -> TokenStream {
    intercepted::intercepted_impl(args.into(), input.into()).into()
}
