use component_macros::intercepted;
use infrastructure_common::{ExceptionKind, InvocationResult, EXCEPTION};
use std::sync::Arc;

static NOT_FOUND: ExceptionKind = ExceptionKind::checked("NotFound").extends(&EXCEPTION);

#[intercepted]
pub trait Lookup: Send + Sync {
    #[throws(NOT_FOUND)]
    fn find(&self, key: &str) -> InvocationResult<String>;

    fn size(&self) -> InvocationResult<usize>;

    fn boxed(self) -> Box<Self>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}

struct Empty;

impl Lookup for Empty {
    fn find(&self, key: &str) -> InvocationResult<String> {
        Ok(key.to_string())
    }

    fn size(&self) -> InvocationResult<usize> {
        Ok(0)
    }
}

fn main() {
    // 包装函数的签名与 exposes_intercepted 要求的一致
    let _wrap: fn(Arc<dyn Lookup>, di_abstractions::BoundInterception) -> Arc<dyn Lookup> =
        LookupSubclass::wrap;
    let delegate: Arc<dyn Lookup> = Arc::new(Empty);
    assert_eq!(delegate.size().unwrap(), 0);
}
