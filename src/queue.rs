//! Queue entries and per-request options shared by every engine.

use crate::LimiterError;
use tokio::sync::oneshot;

/// What a limiter does with a request when capacity is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LimitReachedBehavior {
    /// Wait in the queue until a slot frees up.
    #[default]
    Enqueue,
    /// Fail with [`LimiterError::RateLimitReached`].
    Throw,
    /// Resolve with `None` without calling the downstream operation.
    ReturnNull,
}

/// Per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    /// Policy applied when the request cannot be admitted right away.
    pub limit_reached_behavior: LimitReachedBehavior,
}

impl RequestOptions {
    /// Queue the request until capacity frees up (the default).
    pub fn enqueue() -> Self {
        Self { limit_reached_behavior: LimitReachedBehavior::Enqueue }
    }

    /// Fail fast when capacity is unavailable.
    pub fn throw() -> Self {
        Self { limit_reached_behavior: LimitReachedBehavior::Throw }
    }

    /// Resolve with `None` when capacity is unavailable.
    pub fn return_null() -> Self {
        Self { limit_reached_behavior: LimitReachedBehavior::ReturnNull }
    }
}

impl From<LimitReachedBehavior> for RequestOptions {
    fn from(limit_reached_behavior: LimitReachedBehavior) -> Self {
        Self { limit_reached_behavior }
    }
}

/// Result a caller observes: `Ok(None)` only under [`LimitReachedBehavior::ReturnNull`].
pub type Outcome<Res, E> = Result<Option<Res>, LimiterError<E>>;

/// A pending request owned by exactly one engine.
///
/// Every settling method consumes the entry, so a caller is resolved or
/// rejected at most once. Dropping an entry without settling it wakes the
/// caller with [`LimiterError::Cleared`].
pub(crate) struct QueueEntry<Req, Res, E> {
    pub(crate) request: Req,
    pub(crate) limit_reached_behavior: LimitReachedBehavior,
    responder: oneshot::Sender<Outcome<Res, E>>,
}

impl<Req, Res, E> QueueEntry<Req, Res, E> {
    pub(crate) fn new(request: Req, options: RequestOptions) -> (Self, PendingResponse<Res, E>) {
        let (responder, receiver) = oneshot::channel();
        let entry =
            Self { request, limit_reached_behavior: options.limit_reached_behavior, responder };
        (entry, PendingResponse { receiver })
    }

    pub(crate) fn options(&self) -> RequestOptions {
        RequestOptions { limit_reached_behavior: self.limit_reached_behavior }
    }

    /// Split into the payload and a handle that can still settle the caller.
    pub(crate) fn into_parts(self) -> (Req, Responder<Res, E>) {
        (self.request, Responder { inner: self.responder })
    }

    pub(crate) fn resolve(self, res: Res) {
        self.settle(Ok(Some(res)));
    }

    pub(crate) fn resolve_null(self) {
        self.settle(Ok(None));
    }

    pub(crate) fn reject(self, err: LimiterError<E>) {
        self.settle(Err(err));
    }

    pub(crate) fn settle(self, outcome: Outcome<Res, E>) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.responder.send(outcome);
    }
}

/// Settling half of an entry whose payload was handed to the downstream operation.
pub(crate) struct Responder<Res, E> {
    inner: oneshot::Sender<Outcome<Res, E>>,
}

impl<Res, E> Responder<Res, E> {
    pub(crate) fn settle(self, outcome: Outcome<Res, E>) {
        let _ = self.inner.send(outcome);
    }
}

/// Caller side of a queue entry.
pub(crate) struct PendingResponse<Res, E> {
    receiver: oneshot::Receiver<Outcome<Res, E>>,
}

impl<Res, E> PendingResponse<Res, E> {
    pub(crate) async fn wait(self) -> Outcome<Res, E> {
        self.receiver.await.unwrap_or(Err(LimiterError::Cleared))
    }
}
