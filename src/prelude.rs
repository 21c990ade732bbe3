//! Convenient re-exports for common quotaflow types.
pub use crate::{
    error::{ConfigError, LimiterError},
    limiter::{RateLimiter, RateLimiterStats},
    null::NullRateLimiter,
    partitioned::PartitionedRateLimiter,
    passthrough::TimedPassthroughLimiter,
    queue::{LimitReachedBehavior, RequestOptions},
    response_based::{QuotaParameters, ResponseBasedLimiter, ResponseBasedOperation},
    service::{LimiterService, TimeBasedLayer},
    time_based::{TimeBasedConfig, TimeBasedLimiter},
};
