pub mod governor;
pub mod retry;

pub use governor::{QuotaProbe, RateGovernor};
pub use retry::{resilient_call, RetryPolicy};
