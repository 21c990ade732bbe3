//! Tower integration.
//!
//! - [`service_operation`] turns a `tower::Service` into a downstream
//!   operation any engine can wrap.
//! - [`LimiterService`] exposes a [`RateLimiter`] as a `tower::Service`.
//! - [`TimeBasedLayer`] does both in one step inside a `ServiceBuilder`.

use crate::limiter::RateLimiter;
use crate::queue::{Outcome, RequestOptions};
use crate::time_based::{TimeBasedConfig, TimeBasedLimiter};
use crate::LimiterError;
use futures::future::{BoxFuture, FutureExt};
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::Oneshot;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// Adapt a service into an operation: every call drives a fresh clone of the
/// service to readiness and then calls it.
pub fn service_operation<S, Req>(service: S) -> impl Fn(Req) -> Oneshot<S, Req> + Send + Sync + 'static
where
    S: Service<Req> + Clone + Send + Sync + 'static,
    Req: 'static,
{
    move |req: Req| service.clone().oneshot(req)
}

/// A [`RateLimiter`] presented as a `tower::Service`.
///
/// The service is always ready; back-pressure comes from the limiter's
/// queue. Every call is submitted with the configured [`RequestOptions`].
pub struct LimiterService<L, Res, E> {
    limiter: Arc<L>,
    options: RequestOptions,
    _marker: PhantomData<fn() -> (Res, E)>,
}

impl<L, Res, E> Clone for LimiterService<L, Res, E> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), options: self.options, _marker: PhantomData }
    }
}

impl<L: std::fmt::Debug, Res, E> std::fmt::Debug for LimiterService<L, Res, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterService")
            .field("limiter", &self.limiter)
            .field("options", &self.options)
            .finish()
    }
}

impl<L, Res, E> LimiterService<L, Res, E> {
    /// Serve requests through `limiter`, submitted with default options.
    pub fn new(limiter: L) -> Self {
        Self::from_shared(Arc::new(limiter))
    }

    /// Share a limiter that other callers also submit to.
    pub fn from_shared(limiter: Arc<L>) -> Self {
        Self { limiter, options: RequestOptions::default(), _marker: PhantomData }
    }

    /// Submit every call with `options` instead of the default (enqueue).
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// The limiter behind this service, e.g. to pause or clear it.
    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}

impl<L, Req, Res, E> Service<Req> for LimiterService<L, Res, E>
where
    L: RateLimiter<Req, Res, E> + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    type Response = Option<Res>;
    type Error = LimiterError<E>;
    type Future = BoxFuture<'static, Outcome<Res, E>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let options = self.options;
        async move { limiter.request(req, options).await }.boxed()
    }
}

/// Layer that puts a fresh fixed-window limiter in front of each wrapped
/// service.
pub struct TimeBasedLayer<Req> {
    config: TimeBasedConfig,
    options: RequestOptions,
    _req: PhantomData<fn(Req)>,
}

impl<Req> Clone for TimeBasedLayer<Req> {
    fn clone(&self) -> Self {
        Self { config: self.config, options: self.options, _req: PhantomData }
    }
}

impl<Req> std::fmt::Debug for TimeBasedLayer<Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBasedLayer")
            .field("config", &self.config)
            .field("options", &self.options)
            .finish()
    }
}

impl<Req> TimeBasedLayer<Req> {
    /// Create a layer whose limiters use `config`.
    pub fn new(config: TimeBasedConfig) -> Self {
        Self { config, options: RequestOptions::default(), _req: PhantomData }
    }

    /// Submit every call with `options` instead of the default (enqueue).
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

impl<S, Req> Layer<S> for TimeBasedLayer<Req>
where
    S: Service<Req> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Service = LimiterService<TimeBasedLimiter<Req, S::Response, S::Error>, S::Response, S::Error>;

    fn layer(&self, service: S) -> Self::Service {
        LimiterService::new(TimeBasedLimiter::new(self.config, service_operation(service)))
            .with_options(self.options)
    }
}
