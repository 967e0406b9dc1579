//! 조회 → 변환 → 저장 파이프라인.

pub mod rate_limit;
pub mod retry;
pub mod worker;

pub use rate_limit::RateLimiter;
pub use retry::{FetchError, FetchRetryExecutor, RetryPolicy};
pub use worker::WorkerPool;
