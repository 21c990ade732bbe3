//! Limiter that does not limit.

use crate::limiter::RateLimiter;
use crate::queue::{Outcome, RequestOptions};
use crate::LimiterError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

type Operation<Req, Res, E> = Arc<dyn Fn(Req) -> BoxFuture<'static, Result<Res, E>> + Send + Sync>;

/// Forwards every request straight to the operation.
///
/// Useful as a drop-in where a [`RateLimiter`] is required but no throttling
/// is wanted, e.g. for one partition of a [`PartitionedRateLimiter`](crate::PartitionedRateLimiter).
/// Lifecycle calls are no-ops and the options are ignored.
pub struct NullRateLimiter<Req, Res, E> {
    operation: Operation<Req, Res, E>,
}

impl<Req, Res, E> Clone for NullRateLimiter<Req, Res, E> {
    fn clone(&self) -> Self {
        Self { operation: self.operation.clone() }
    }
}

impl<Req, Res, E> std::fmt::Debug for NullRateLimiter<Req, Res, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullRateLimiter").finish_non_exhaustive()
    }
}

impl<Req, Res, E> NullRateLimiter<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    /// Forward every request to `do_request`.
    pub fn new<F, Fut>(do_request: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
    {
        Self { operation: Arc::new(move |req: Req| Box::pin(do_request(req)) as BoxFuture<'static, _>) }
    }
}

#[async_trait]
impl<Req, Res, E> RateLimiter<Req, Res, E> for NullRateLimiter<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    async fn request(&self, req: Req, _options: RequestOptions) -> Outcome<Res, E> {
        (self.operation)(req).await.map(Some).map_err(LimiterError::Inner)
    }

    fn clear(&self) {}

    fn pause(&self) {}

    fn resume(&self) {}
}
