//! Fixed-window throttle in front of another limiter.

use crate::limiter::{RateLimiter, RateLimiterStats};
use crate::queue::{Outcome, RequestOptions};
use crate::time_based::{Dispatch, TimeBasedConfig, TimeBasedLimiter};
use async_trait::async_trait;
use futures::future::FutureExt;
use std::sync::Arc;

/// Composes two throttles in series.
///
/// Requests first pass an outer fixed window; once admitted there they are
/// submitted, with the caller's [`RequestOptions`], to the inner limiter.
/// Lifecycle calls (`pause`, `resume`, `clear`, `destroy`) act on the outer
/// window only; the inner limiter may be shared with other callers.
pub struct TimedPassthroughLimiter<Req, Res, E, L> {
    outer: TimeBasedLimiter<Req, Res, E>,
    inner: Arc<L>,
}

impl<Req, Res, E, L> Clone for TimedPassthroughLimiter<Req, Res, E, L> {
    fn clone(&self) -> Self {
        Self { outer: self.outer.clone(), inner: self.inner.clone() }
    }
}

impl<Req, Res, E, L> TimedPassthroughLimiter<Req, Res, E, L>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
    L: RateLimiter<Req, Res, E> + 'static,
{
    /// Wrap `inner` behind a fixed window described by `config`.
    pub fn new(inner: L, config: TimeBasedConfig) -> Self {
        Self::from_shared(Arc::new(inner), config)
    }

    /// Like [`new`](Self::new) for an inner limiter that is already shared.
    pub fn from_shared(inner: Arc<L>, config: TimeBasedConfig) -> Self {
        let child = inner.clone();
        let dispatch: Dispatch<Req, Res, E> = Arc::new(move |req: Req, options: RequestOptions| {
            let child = child.clone();
            async move { child.request(req, options).await }.boxed()
        });
        Self { outer: TimeBasedLimiter::with_dispatch(config, dispatch), inner }
    }

    /// The outer fixed window.
    pub fn outer(&self) -> &TimeBasedLimiter<Req, Res, E> {
        &self.outer
    }

    /// The wrapped limiter.
    pub fn inner(&self) -> &Arc<L> {
        &self.inner
    }
}

#[async_trait]
impl<Req, Res, E, L> RateLimiter<Req, Res, E> for TimedPassthroughLimiter<Req, Res, E, L>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
    L: RateLimiter<Req, Res, E> + 'static,
{
    async fn request(&self, req: Req, options: RequestOptions) -> Outcome<Res, E> {
        self.outer.request(req, options).await
    }

    fn clear(&self) {
        self.outer.clear();
    }

    fn pause(&self) {
        self.outer.pause();
    }

    fn resume(&self) {
        self.outer.resume();
    }

    fn destroy(&self) {
        self.outer.destroy();
    }

    fn stats(&self) -> Option<RateLimiterStats> {
        self.inner.stats()
    }
}
