#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # quotaflow
//!
//! Client-side rate limiting for async Rust. Every engine sits in front of a
//! downstream operation and decides when each submitted request may run.
//!
//! ## Engines
//!
//! - [`TimeBasedLimiter`]: at most `bucket_size` requests per `time_frame`
//! - [`ResponseBasedLimiter`]: learns the quota from responses and paces
//!   batches accordingly
//! - [`PartitionedRateLimiter`]: one independent child limiter per key
//! - [`TimedPassthroughLimiter`]: a fixed window in front of another limiter
//! - [`NullRateLimiter`]: forwards everything unthrottled
//!
//! All of them implement [`RateLimiter`]. What happens to a request that
//! cannot run right away is chosen per call with [`RequestOptions`].
//!
//! ## Quick Start
//!
//! ```rust
//! use quotaflow::{RateLimiter, RequestOptions, TimeBasedConfig, TimeBasedLimiter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TimeBasedConfig::new(5, Duration::from_millis(50)).unwrap();
//!     let limiter = TimeBasedLimiter::new(config, |id: u64| async move {
//!         // Call the real API here.
//!         Ok::<_, std::io::Error>(format!("user-{id}"))
//!     });
//!
//!     let user = limiter.request(7, RequestOptions::default()).await.unwrap();
//!     assert_eq!(user.as_deref(), Some("user-7"));
//!
//!     // Drop instead of waiting when the bucket is full.
//!     let maybe = limiter.request(8, RequestOptions::return_null()).await.unwrap();
//!     assert!(maybe.is_some());
//! }
//! ```

pub mod error;
pub mod limiter;
pub mod null;
pub mod partitioned;
pub mod passthrough;
pub mod prelude;
pub mod queue;
pub mod response_based;
pub mod service;
pub mod time_based;

// Re-exports
pub use error::{ConfigError, LimiterError};
pub use limiter::{RateLimiter, RateLimiterStats};
pub use null::NullRateLimiter;
pub use partitioned::{ChildLimiter, PartitionedRateLimiter};
pub use passthrough::TimedPassthroughLimiter;
pub use queue::{LimitReachedBehavior, Outcome, RequestOptions};
pub use response_based::{QuotaParameters, ResponseBasedLimiter, ResponseBasedOperation};
pub use service::{service_operation, LimiterService, TimeBasedLayer};
pub use time_based::{TimeBasedConfig, TimeBasedLimiter};
