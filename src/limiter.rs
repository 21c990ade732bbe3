//! The uniform contract every engine implements.

use crate::queue::{Outcome, RequestOptions};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Last quota observation of a limiter that learns its capacity from responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimiterStats {
    /// Total requests allowed per window, if known.
    pub last_known_limit: Option<u64>,
    /// Requests left in the current window, if known.
    pub last_known_remaining_requests: Option<u64>,
    /// When the current window resets, if known.
    pub last_known_reset: Option<Instant>,
}

/// Core interface shared by all engines.
///
/// Implementations gate calls to a downstream operation: `request` resolves
/// once the operation ran (or the request was dropped by its
/// [`LimitReachedBehavior`](crate::LimitReachedBehavior)). Lifecycle calls are
/// synchronous and never wait for in-flight work.
#[async_trait]
pub trait RateLimiter<Req, Res, E>: Send + Sync {
    /// Submit a request and wait for its outcome.
    async fn request(&self, req: Req, options: RequestOptions) -> Outcome<Res, E>;

    /// Drop every queued (not yet admitted) request.
    fn clear(&self);

    /// Stop admitting new work. In-flight requests complete normally.
    fn pause(&self);

    /// Resume admission and try to drain the queue.
    fn resume(&self);

    /// Permanently shut the limiter down. No-op unless the engine supports it.
    fn destroy(&self) {}

    /// Quota observations, for engines that learn them.
    fn stats(&self) -> Option<RateLimiterStats> {
        None
    }
}

#[async_trait]
impl<Req, Res, E, L> RateLimiter<Req, Res, E> for Arc<L>
where
    L: RateLimiter<Req, Res, E> + ?Sized,
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    async fn request(&self, req: Req, options: RequestOptions) -> Outcome<Res, E> {
        (**self).request(req, options).await
    }

    fn clear(&self) {
        (**self).clear();
    }

    fn pause(&self) {
        (**self).pause();
    }

    fn resume(&self) {
        (**self).resume();
    }

    fn destroy(&self) {
        (**self).destroy();
    }

    fn stats(&self) -> Option<RateLimiterStats> {
        (**self).stats()
    }
}

/// Lock engine state. Critical sections never leave state half-updated, so a
/// poisoned lock is still safe to reuse.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
