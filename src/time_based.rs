//! Fixed-window bucket limiter.
//!
//! Admits up to `bucket_size` requests per `time_frame`. Every admitted
//! request occupies one slot from the moment it is dispatched until
//! `time_frame` after it settled, whether it succeeded or failed.
//!
//! Semantics:
//! - Admission (check + increment) and queue pops happen under one lock, so
//!   two submissions can never both take the last slot.
//! - Release timers are tokio tasks that re-enter the same lock; each one
//!   fires at most once and is cancelled by [`TimeBasedLimiter::destroy`].
//! - Queued requests are admitted in arrival order as slots free up.
//! - A released slot does not admit anything while the limiter is paused.

use crate::limiter::{lock, RateLimiter};
use crate::queue::{LimitReachedBehavior, Outcome, QueueEntry, RequestOptions};
use crate::{ConfigError, LimiterError};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

const TARGET: &str = "quotaflow::time_based";

/// Validated configuration for a fixed-window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawTimeBasedConfig"))]
pub struct TimeBasedConfig {
    bucket_size: usize,
    time_frame: Duration,
}

impl TimeBasedConfig {
    /// Create a config with validation. Both values must be non-zero.
    ///
    /// # Examples
    /// ```
    /// use quotaflow::TimeBasedConfig;
    /// use std::time::Duration;
    /// let config = TimeBasedConfig::new(20, Duration::from_secs(30)).unwrap();
    /// assert_eq!(config.bucket_size(), 20);
    /// ```
    pub fn new(bucket_size: usize, time_frame: Duration) -> Result<Self, ConfigError> {
        if bucket_size == 0 {
            return Err(ConfigError::InvalidBucketSize { provided: bucket_size });
        }
        if time_frame == Duration::ZERO {
            return Err(ConfigError::InvalidTimeFrame(time_frame));
        }
        Ok(Self { bucket_size, time_frame })
    }

    /// Maximum number of slots per window.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// How long an admitted request keeps its slot after settling.
    pub fn time_frame(&self) -> Duration {
        self.time_frame
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawTimeBasedConfig {
    bucket_size: usize,
    time_frame: Duration,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTimeBasedConfig> for TimeBasedConfig {
    type Error = ConfigError;

    fn try_from(raw: RawTimeBasedConfig) -> Result<Self, Self::Error> {
        Self::new(raw.bucket_size, raw.time_frame)
    }
}

/// Type-erased downstream call. Receives the request options so decorators can
/// forward them to a wrapped limiter.
pub(crate) type Dispatch<Req, Res, E> =
    Arc<dyn Fn(Req, RequestOptions) -> BoxFuture<'static, Outcome<Res, E>> + Send + Sync>;

struct State<Req, Res, E> {
    queue: VecDeque<QueueEntry<Req, Res, E>>,
    used_from_bucket: usize,
    paused: bool,
    destroyed: bool,
    release_timers: HashMap<u64, AbortHandle>,
    next_timer_id: u64,
}

struct Inner<Req, Res, E> {
    config: TimeBasedConfig,
    dispatch: Dispatch<Req, Res, E>,
    state: Mutex<State<Req, Res, E>>,
}

/// Fixed-window limiter.
///
/// Clones share the same bucket, queue and lifecycle flags.
/// Must be used from within a Tokio runtime.
pub struct TimeBasedLimiter<Req, Res, E> {
    inner: Arc<Inner<Req, Res, E>>,
}

impl<Req, Res, E> Clone for TimeBasedLimiter<Req, Res, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<Req, Res, E> std::fmt::Debug for TimeBasedLimiter<Req, Res, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("TimeBasedLimiter")
            .field("config", &self.inner.config)
            .field("used_from_bucket", &state.used_from_bucket)
            .field("queue_len", &state.queue.len())
            .field("paused", &state.paused)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl<Req, Res, E> TimeBasedLimiter<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    /// Create a limiter in front of `do_request`.
    ///
    /// # Examples
    /// ```
    /// use quotaflow::{RateLimiter, RequestOptions, TimeBasedConfig, TimeBasedLimiter};
    /// use std::time::Duration;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let config = TimeBasedConfig::new(2, Duration::from_millis(10)).unwrap();
    /// let limiter = TimeBasedLimiter::new(config, |n: u32| async move {
    ///     Ok::<_, std::io::Error>(n * 2)
    /// });
    /// let doubled = limiter.request(21, RequestOptions::default()).await.unwrap();
    /// assert_eq!(doubled, Some(42));
    /// # });
    /// ```
    pub fn new<F, Fut>(config: TimeBasedConfig, do_request: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
    {
        let dispatch: Dispatch<Req, Res, E> = Arc::new(move |req: Req, _options: RequestOptions| {
            let fut = do_request(req);
            async move { fut.await.map(Some).map_err(LimiterError::Inner) }.boxed()
        });
        Self::with_dispatch(config, dispatch)
    }

    pub(crate) fn with_dispatch(config: TimeBasedConfig, dispatch: Dispatch<Req, Res, E>) -> Self {
        let state = State {
            queue: VecDeque::new(),
            used_from_bucket: 0,
            paused: false,
            destroyed: false,
            release_timers: HashMap::new(),
            next_timer_id: 0,
        };
        Self { inner: Arc::new(Inner { config, dispatch, state: Mutex::new(state) }) }
    }

    /// The configuration this limiter was built with.
    pub fn config(&self) -> TimeBasedConfig {
        self.inner.config
    }

    /// Number of requests waiting for a slot.
    pub fn queue_len(&self) -> usize {
        lock(&self.inner.state).queue.len()
    }

    /// Slots currently occupied (in flight or cooling down).
    pub fn used_from_bucket(&self) -> usize {
        lock(&self.inner.state).used_from_bucket
    }

    /// Whether admission is paused.
    pub fn is_paused(&self) -> bool {
        lock(&self.inner.state).paused
    }

    /// Whether [`destroy`](Self::destroy) was called.
    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    /// Permanently shut the limiter down.
    ///
    /// Cancels every pending release timer, rejects every queued request with
    /// [`LimiterError::Destroyed`] and makes all later submissions fail fast.
    /// Requests already dispatched still complete.
    pub fn destroy(&self) {
        let drained: Vec<_> = {
            let mut state = lock(&self.inner.state);
            state.paused = false;
            state.destroyed = true;
            for (_, timer) in state.release_timers.drain() {
                timer.abort();
            }
            state.queue.drain(..).collect()
        };
        info!(target: TARGET, rejected = drained.len(), "rate limiter destroyed");
        for entry in drained {
            entry.reject(LimiterError::Destroyed);
        }
    }
}

impl<Req, Res, E> Inner<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    fn submit(self: &Arc<Self>, entry: QueueEntry<Req, Res, E>) {
        let mut state = lock(&self.state);
        if state.destroyed {
            drop(state);
            entry.reject(LimiterError::Destroyed);
            return;
        }

        let bucket_size = self.config.bucket_size;
        if state.used_from_bucket < bucket_size && !state.paused {
            self.admit(&mut state, entry);
            return;
        }

        match entry.limit_reached_behavior {
            LimitReachedBehavior::Enqueue => {
                state.queue.push_back(entry);
                let queue_len = state.queue.len();
                if state.used_from_bucket + queue_len >= bucket_size {
                    warn!(
                        target: TARGET,
                        bucket_size,
                        queue_len,
                        paused = state.paused,
                        "rate limit reached, waiting for {}",
                        if state.paused { "the limiter to be unpaused" } else { "a free bucket entry" }
                    );
                } else {
                    info!(target: TARGET, queue_len, "enqueueing request because the rate limiter is paused");
                }
            }
            LimitReachedBehavior::ReturnNull => {
                if state.paused {
                    info!(target: TARGET, "returning null because the rate limiter is paused");
                } else {
                    warn!(target: TARGET, bucket_size, "rate limit reached, dropping request and returning null");
                }
                drop(state);
                entry.resolve_null();
            }
            LimitReachedBehavior::Throw => {
                let reason = if state.paused {
                    "the rate limiter is paused"
                } else {
                    "the rate limit was reached"
                };
                drop(state);
                entry.reject(LimiterError::limit_reached(reason));
            }
        }
    }

    /// Take a slot and dispatch. Caller holds the state lock.
    fn admit(self: &Arc<Self>, state: &mut State<Req, Res, E>, entry: QueueEntry<Req, Res, E>) {
        state.used_from_bucket += 1;
        debug!(
            target: TARGET,
            used_from_bucket = state.used_from_bucket,
            queue_len = state.queue.len(),
            "doing a request"
        );
        let options = entry.options();
        let (req, responder) = entry.into_parts();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = (this.dispatch)(req, options).await;
            responder.settle(outcome);
            this.schedule_release();
        });
    }

    fn schedule_release(self: &Arc<Self>) {
        let mut state = lock(&self.state);
        if state.destroyed {
            return;
        }
        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let this = Arc::clone(self);
        let time_frame = self.config.time_frame;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(time_frame).await;
            this.release(id);
        });
        state.release_timers.insert(id, timer.abort_handle());
    }

    fn release(self: &Arc<Self>, id: u64) {
        let mut state = lock(&self.state);
        if state.release_timers.remove(&id).is_none() {
            // cancelled by destroy
            return;
        }
        state.used_from_bucket = state.used_from_bucket.saturating_sub(1);
        trace!(target: TARGET, used_from_bucket = state.used_from_bucket, "bucket slot released");
        self.fill_from_queue(&mut state);
    }

    /// Admit queued requests in order while capacity allows.
    fn fill_from_queue(self: &Arc<Self>, state: &mut State<Req, Res, E>) {
        while !state.paused && state.used_from_bucket < self.config.bucket_size {
            let Some(entry) = state.queue.pop_front() else {
                break;
            };
            self.admit(state, entry);
        }
    }
}

#[async_trait]
impl<Req, Res, E> RateLimiter<Req, Res, E> for TimeBasedLimiter<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    async fn request(&self, req: Req, options: RequestOptions) -> Outcome<Res, E> {
        let (entry, pending) = QueueEntry::new(req, options);
        self.inner.submit(entry);
        pending.wait().await
    }

    fn clear(&self) {
        let dropped: Vec<_> = lock(&self.inner.state).queue.drain(..).collect();
        if !dropped.is_empty() {
            info!(target: TARGET, dropped = dropped.len(), "queue cleared");
        }
        for entry in dropped {
            entry.reject(LimiterError::Cleared);
        }
    }

    fn pause(&self) {
        lock(&self.inner.state).paused = true;
    }

    fn resume(&self) {
        let mut state = lock(&self.inner.state);
        state.paused = false;
        self.inner.fill_from_queue(&mut state);
    }

    fn destroy(&self) {
        TimeBasedLimiter::destroy(self);
    }
}
