use component_macros::intercepted;
use infrastructure_common::InvocationResult;
use std::sync::Arc;

#[intercepted(name = "AuditedClock")]
trait Clock: Send + Sync {
    fn now(&self) -> InvocationResult<u64>;
}

fn assert_send_sync<T: Send + Sync>() {}

fn main() {
    assert_send_sync::<AuditedClock>();
    let _wrap: fn(Arc<dyn Clock>, di_abstractions::BoundInterception) -> Arc<dyn Clock> =
        AuditedClock::wrap;
}
