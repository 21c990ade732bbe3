//! Response-driven limiter.
//!
//! Has no configured capacity. Every response reports the server's current
//! quota ([`QuotaParameters`]); the limiter dispatches queued requests in
//! batches sized from the last observation and backs off when a response
//! asks to be retried later.
//!
//! Semantics:
//! - With no observation yet, batches hold a single request.
//! - Otherwise a batch holds `min(remaining, limit / 10)` requests (at least one).
//! - A batch settles completely before the next one starts; one failure never
//!   cancels its siblings.
//! - Among a batch's observations the one with the smallest `remaining` wins.
//! - A retry signal puts the request back at the front of the queue and
//!   blocks new batches until the latest requested retry instant.
//! - When the quota is exhausted, queued requests that asked to fail or return
//!   `None` are settled right away; the rest wait for the reset.

use crate::limiter::{lock, RateLimiter, RateLimiterStats};
use crate::queue::{LimitReachedBehavior, Outcome, QueueEntry, RequestOptions};
use crate::LimiterError;
use async_trait::async_trait;
use futures::future::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const TARGET: &str = "quotaflow::response_based";

/// Quota reported by a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaParameters {
    /// Total requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub resets_at: Instant,
}

impl QuotaParameters {
    /// Quota whose window resets `reset_after` from now.
    pub fn resetting_in(limit: u64, remaining: u64, reset_after: Duration) -> Self {
        Self { limit, remaining, resets_at: instant_after(reset_after) }
    }
}

/// The downstream operation of a [`ResponseBasedLimiter`], plus the two
/// accessors that read quota information out of its responses.
///
/// Header parsing belongs here: the limiter only sees the extracted values.
#[async_trait]
pub trait ResponseBasedOperation: Send + Sync + 'static {
    /// Request payload. Kept by the limiter so it can be retried.
    type Request: Send + Sync + 'static;
    /// Successful response.
    type Response: Send + 'static;
    /// Failure of the operation, propagated verbatim.
    type Error: Send + 'static;

    /// Perform the request.
    async fn do_request(&self, req: &Self::Request) -> Result<Self::Response, Self::Error>;

    /// `Some(delay)` when the response itself says the request was throttled
    /// and must be sent again after `delay`.
    fn needs_retry_after(&self, res: &Self::Response) -> Option<Duration>;

    /// Quota reported by a response.
    fn quota_parameters(&self, res: &Self::Response) -> QuotaParameters;
}

type Entry<O> = QueueEntry<
    <O as ResponseBasedOperation>::Request,
    <O as ResponseBasedOperation>::Response,
    <O as ResponseBasedOperation>::Error,
>;

/// A response asked to be sent again at `retry_at`. Never leaves this module.
#[derive(Debug, Clone, Copy)]
struct RetryAfter {
    retry_at: Instant,
}

impl RetryAfter {
    fn after(delay: Duration) -> Self {
        Self { retry_at: instant_after(delay) }
    }
}

/// Roughly 30 years, used when a hint does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn instant_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

enum EntryOutcome<O: ResponseBasedOperation> {
    Retry(Entry<O>, RetryAfter),
    Observed(QuotaParameters),
    Failed,
}

struct ScheduledBatch {
    id: u64,
    handle: AbortHandle,
}

struct State<O: ResponseBasedOperation> {
    parameters: Option<QuotaParameters>,
    queue: VecDeque<Entry<O>>,
    batch_running: bool,
    next_batch_timer: Option<ScheduledBatch>,
    next_timer_id: u64,
    paused: bool,
}

struct Inner<O: ResponseBasedOperation> {
    operation: O,
    state: Mutex<State<O>>,
}

/// Limiter that learns its capacity from responses.
///
/// Clones share the same queue and quota state.
/// Must be used from within a Tokio runtime.
pub struct ResponseBasedLimiter<O: ResponseBasedOperation> {
    inner: Arc<Inner<O>>,
}

impl<O: ResponseBasedOperation> Clone for ResponseBasedLimiter<O> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<O: ResponseBasedOperation> std::fmt::Debug for ResponseBasedLimiter<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("ResponseBasedLimiter")
            .field("parameters", &state.parameters)
            .field("queue_len", &state.queue.len())
            .field("batch_running", &state.batch_running)
            .field("backing_off", &state.next_batch_timer.is_some())
            .field("paused", &state.paused)
            .finish()
    }
}

impl<O: ResponseBasedOperation> ResponseBasedLimiter<O> {
    /// Create a limiter around `operation`.
    pub fn new(operation: O) -> Self {
        let state = State {
            parameters: None,
            queue: VecDeque::new(),
            batch_running: false,
            next_batch_timer: None,
            next_timer_id: 0,
            paused: false,
        };
        Self { inner: Arc::new(Inner { operation, state: Mutex::new(state) }) }
    }

    /// The wrapped operation.
    pub fn operation(&self) -> &O {
        &self.inner.operation
    }

    /// Last adopted quota observation.
    pub fn parameters(&self) -> Option<QuotaParameters> {
        lock(&self.inner.state).parameters
    }

    /// Last known limit, remaining requests and reset instant.
    pub fn stats(&self) -> RateLimiterStats {
        let parameters = self.parameters();
        RateLimiterStats {
            last_known_limit: parameters.map(|p| p.limit),
            last_known_remaining_requests: parameters.map(|p| p.remaining),
            last_known_reset: parameters.map(|p| p.resets_at),
        }
    }

    /// Number of requests waiting for a batch.
    pub fn queue_len(&self) -> usize {
        lock(&self.inner.state).queue.len()
    }

    /// Whether admission is paused.
    pub fn is_paused(&self) -> bool {
        lock(&self.inner.state).paused
    }
}

fn batch_size(parameters: Option<&QuotaParameters>) -> usize {
    match parameters {
        None => 1,
        Some(p) => usize::try_from(p.remaining.min(p.limit / 10)).unwrap_or(usize::MAX).max(1),
    }
}

impl<O: ResponseBasedOperation> Inner<O> {
    fn submit(self: &Arc<Self>, entry: Entry<O>) {
        let mut state = lock(&self.state);
        trace!(target: TARGET, "request start");
        state.queue.push_back(entry);
        if state.batch_running || state.next_batch_timer.is_some() || state.paused {
            trace!(
                target: TARGET,
                batch_running = state.batch_running,
                has_next_batch_timer = state.next_batch_timer.is_some(),
                paused = state.paused,
                "request queued"
            );
            return;
        }
        self.run_next_batch(&mut state);
    }

    fn run_next_batch(self: &Arc<Self>, state: &mut State<O>) {
        if state.paused {
            return;
        }
        if let Some(timer) = state.next_batch_timer.take() {
            timer.handle.abort();
        }
        if state.batch_running {
            return;
        }
        let amount = batch_size(state.parameters.as_ref()).min(state.queue.len());
        if amount == 0 {
            return;
        }
        let batch: Vec<_> = state.queue.drain(..amount).collect();
        state.batch_running = true;
        if let Some(parameters) = &state.parameters {
            debug!(target: TARGET, remaining = parameters.remaining, "remaining requests");
        }
        debug!(
            target: TARGET,
            batch_len = batch.len(),
            queue_len = state.queue.len(),
            "doing a batch of requests"
        );
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let batch = futures::future::join_all(batch.into_iter().map(|entry| this.run_entry(entry)));
            match AssertUnwindSafe(batch).catch_unwind().await {
                Ok(outcomes) => this.finish_batch(outcomes),
                Err(_) => this.abandon_batch(),
            }
        });
    }

    async fn run_entry(&self, entry: Entry<O>) -> EntryOutcome<O> {
        match self.operation.do_request(&entry.request).await {
            Ok(res) => {
                if let Some(delay) = self.operation.needs_retry_after(&res) {
                    info!(target: TARGET, delay_ms = millis(delay), "retrying after delay");
                    return EntryOutcome::Retry(entry, RetryAfter::after(delay));
                }
                let parameters = self.operation.quota_parameters(&res);
                entry.resolve(res);
                EntryOutcome::Observed(parameters)
            }
            Err(e) => {
                entry.reject(LimiterError::Inner(e));
                EntryOutcome::Failed
            }
        }
    }

    fn finish_batch(self: &Arc<Self>, outcomes: Vec<EntryOutcome<O>>) {
        let now = Instant::now();
        let mut retries = Vec::new();
        let mut observed: Option<QuotaParameters> = None;
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Retry(entry, signal) => retries.push((entry, signal)),
                EntryOutcome::Observed(parameters) => {
                    observed = match observed {
                        Some(carry) if carry.remaining <= parameters.remaining => Some(carry),
                        _ => Some(parameters),
                    };
                }
                EntryOutcome::Failed => {}
            }
        }

        let mut state = lock(&self.state);
        state.batch_running = false;

        if !retries.is_empty() {
            let retry_at = retries.iter().map(|(_, signal)| signal.retry_at).fold(now, Instant::max);
            for (entry, _) in retries.into_iter().rev() {
                state.queue.push_front(entry);
            }
            let delay = retry_at.saturating_duration_since(now);
            warn!(
                target: TARGET,
                delay_ms = millis(delay),
                "waiting because the rate limit was exceeded"
            );
            self.schedule_next_batch(&mut state, delay);
            return;
        }

        let Some(parameters) = observed else {
            trace!(target: TARGET, "batch produced no quota observation");
            self.run_next_batch(&mut state);
            return;
        };

        state.parameters = Some(parameters);
        if parameters.resets_at < now || parameters.remaining > 0 {
            trace!(target: TARGET, "batch done, can run more");
            self.run_next_batch(&mut state);
            return;
        }

        let delay = parameters.resets_at.saturating_duration_since(now);
        warn!(
            target: TARGET,
            delay_ms = millis(delay),
            "waiting because the rate limit was reached"
        );
        let mut dropped = Vec::new();
        let mut kept = VecDeque::with_capacity(state.queue.len());
        for entry in state.queue.drain(..) {
            match entry.limit_reached_behavior {
                LimitReachedBehavior::Enqueue => kept.push_back(entry),
                LimitReachedBehavior::Throw | LimitReachedBehavior::ReturnNull => {
                    dropped.push(entry);
                }
            }
        }
        state.queue = kept;
        self.schedule_next_batch(&mut state, delay);
        drop(state);

        for entry in dropped {
            match entry.limit_reached_behavior {
                LimitReachedBehavior::ReturnNull => entry.resolve_null(),
                _ => entry.reject(LimiterError::limit_reached("the rate limit was reached")),
            }
        }
    }

    /// The operation panicked mid-batch. Its entries were dropped with the
    /// task, so their callers already observed [`LimiterError::Cleared`].
    fn abandon_batch(self: &Arc<Self>) {
        let mut state = lock(&self.state);
        state.batch_running = false;
        warn!(target: TARGET, queue_len = state.queue.len(), "batch aborted by a panicking operation");
        self.run_next_batch(&mut state);
    }

    fn schedule_next_batch(self: &Arc<Self>, state: &mut State<O>, delay: Duration) {
        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.on_timer(id);
        });
        state.next_batch_timer = Some(ScheduledBatch { id, handle: timer.abort_handle() });
    }

    fn on_timer(self: &Arc<Self>, id: u64) {
        let mut state = lock(&self.state);
        if state.next_batch_timer.as_ref().map(|timer| timer.id) != Some(id) {
            return;
        }
        state.next_batch_timer = None;
        state.parameters = None;
        self.run_next_batch(&mut state);
    }
}

#[async_trait]
impl<O: ResponseBasedOperation> RateLimiter<O::Request, O::Response, O::Error>
    for ResponseBasedLimiter<O>
{
    async fn request(
        &self,
        req: O::Request,
        options: RequestOptions,
    ) -> Outcome<O::Response, O::Error> {
        let (entry, pending) = QueueEntry::new(req, options);
        self.inner.submit(entry);
        pending.wait().await
    }

    fn clear(&self) {
        let dropped: Vec<_> = lock(&self.inner.state).queue.drain(..).collect();
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
        self.inner.run_next_batch(&mut state);
    }

    fn stats(&self) -> Option<RateLimiterStats> {
        Some(ResponseBasedLimiter::stats(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(u32);

    #[derive(Debug, Clone)]
    struct Call {
        id: u32,
        limit: u64,
        remaining: u64,
        reset_in: Duration,
        retry_once_after: Option<Duration>,
        fail: bool,
        panic: bool,
    }

    impl Call {
        fn new(id: u32, limit: u64, remaining: u64) -> Self {
            Self {
                id,
                limit,
                remaining,
                reset_in: Duration::from_secs(60),
                retry_once_after: None,
                fail: false,
                panic: false,
            }
        }
    }

    #[derive(Debug)]
    struct Reply {
        call: Call,
        attempt: usize,
        resets_at: Instant,
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<(u32, Instant)>>,
        attempts: Mutex<HashMap<u32, usize>>,
    }

    struct ScriptedApi {
        recorder: Arc<Recorder>,
        latency: Duration,
    }

    #[async_trait]
    impl ResponseBasedOperation for ScriptedApi {
        type Request = Call;
        type Response = Reply;
        type Error = TestError;

        async fn do_request(&self, req: &Call) -> Result<Reply, TestError> {
            self.recorder.log.lock().unwrap().push((req.id, Instant::now()));
            tokio::time::sleep(self.latency).await;
            let attempt = {
                let mut attempts = self.recorder.attempts.lock().unwrap();
                let n = attempts.entry(req.id).or_default();
                *n += 1;
                *n
            };
            if req.panic {
                panic!("operation blew up on request {}", req.id);
            }
            if req.fail {
                return Err(TestError(req.id));
            }
            Ok(Reply { call: req.clone(), attempt, resets_at: Instant::now() + req.reset_in })
        }

        fn needs_retry_after(&self, res: &Reply) -> Option<Duration> {
            if res.attempt == 1 {
                res.call.retry_once_after
            } else {
                None
            }
        }

        fn quota_parameters(&self, res: &Reply) -> QuotaParameters {
            QuotaParameters {
                limit: res.call.limit,
                remaining: res.call.remaining,
                resets_at: res.resets_at,
            }
        }
    }

    fn limiter(latency_ms: u64) -> (ResponseBasedLimiter<ScriptedApi>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let api = ScriptedApi { recorder: recorder.clone(), latency: Duration::from_millis(latency_ms) };
        (ResponseBasedLimiter::new(api), recorder)
    }

    fn ids(recorder: &Recorder) -> Vec<u32> {
        recorder.log.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn batch_size_is_a_tenth_of_the_limit() {
        assert_eq!(batch_size(None), 1);
        let p = QuotaParameters::resetting_in(100, 50, Duration::from_secs(1));
        assert_eq!(batch_size(Some(&p)), 10);
        let p = QuotaParameters::resetting_in(100, 3, Duration::from_secs(1));
        assert_eq!(batch_size(Some(&p)), 3);
        let p = QuotaParameters::resetting_in(5, 5, Duration::from_secs(1));
        assert_eq!(batch_size(Some(&p)), 1, "small limits still make progress");
        let p = QuotaParameters::resetting_in(100, 0, Duration::from_secs(1));
        assert_eq!(batch_size(Some(&p)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_are_unknown_before_first_response() {
        let (limiter, _) = limiter(10);
        assert_eq!(limiter.stats(), RateLimiterStats::default());
        assert!(limiter.parameters().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_runs_alone_then_batches() {
        let (limiter, recorder) = limiter(10);
        let start = Instant::now();

        let results = futures::future::join_all(
            (0..5).map(|id| limiter.request(Call::new(id, 100, 50), RequestOptions::default())),
        )
        .await;
        assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(log[0], (0, start));
        for (id, at) in &log[1..] {
            assert!(*id >= 1);
            assert_eq!(*at, start + Duration::from_millis(10), "one batch after discovery");
        }
        assert_eq!(limiter.stats().last_known_limit, Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn adopts_most_pessimistic_observation() {
        let (limiter, _) = limiter(10);
        let calls = vec![
            Call::new(0, 30, 10),
            Call::new(1, 30, 5),
            Call::new(2, 30, 2),
            Call::new(3, 30, 8),
        ];

        let results = futures::future::join_all(
            calls.into_iter().map(|c| limiter.request(c, RequestOptions::default())),
        )
        .await;
        assert!(results.iter().all(|r| r.is_ok()));

        let stats = limiter.stats();
        assert_eq!(stats.last_known_limit, Some(30));
        assert_eq!(stats.last_known_remaining_requests, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_backs_off_and_keeps_priority() {
        let (limiter, recorder) = limiter(10);
        let start = Instant::now();
        let mut throttled = Call::new(0, 100, 50);
        throttled.retry_once_after = Some(Duration::from_millis(500));

        let (first, second) = tokio::join!(
            limiter.request(throttled, RequestOptions::default()),
            limiter.request(Call::new(1, 100, 50), RequestOptions::default()),
        );
        assert_eq!(first.unwrap().unwrap().attempt, 2);
        assert_eq!(second.unwrap().unwrap().attempt, 1);

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(ids(&recorder), vec![0, 0, 1]);
        assert_eq!(log[0].1, start);
        assert!(log[1].1 >= start + Duration::from_millis(510));
        assert!(log[2].1 >= log[1].1 + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_settles_non_waiting_requests() {
        let (limiter, recorder) = limiter(10);
        let start = Instant::now();
        let mut exhausting = Call::new(0, 10, 0);
        exhausting.reset_in = Duration::from_secs(1);

        let (a, b, c, d) = tokio::join!(
            limiter.request(exhausting, RequestOptions::default()),
            limiter.request(Call::new(1, 10, 9), RequestOptions::enqueue()),
            limiter.request(Call::new(2, 10, 9), RequestOptions::return_null()),
            async {
                let result = limiter.request(Call::new(3, 10, 9), RequestOptions::throw()).await;
                (result, Instant::now())
            },
        );

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!(c.unwrap().is_none());
        let (thrown, thrown_at) = d;
        assert!(thrown.unwrap_err().is_rate_limit_reached());
        assert_eq!(thrown_at, start + Duration::from_millis(10));

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(ids(&recorder), vec![0, 1]);
        assert!(log[1].1 >= start + Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_while_reset_timer_is_armed_always_queue() {
        let (limiter, recorder) = limiter(10);
        let start = Instant::now();
        let mut exhausting = Call::new(0, 10, 0);
        exhausting.reset_in = Duration::from_secs(1);
        limiter.request(exhausting, RequestOptions::default()).await.unwrap();

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let (thrown, null) = tokio::join!(
                    limiter.request(Call::new(1, 10, 9), RequestOptions::throw()),
                    limiter.request(Call::new(2, 10, 8), RequestOptions::return_null()),
                );
                (thrown, null, Instant::now())
            })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(limiter.queue_len(), 2, "queued despite exhausted quota");
        assert_eq!(ids(&recorder), vec![0]);

        let (thrown, null, settled_at) = waiting.await.unwrap();
        assert_eq!(thrown.unwrap().unwrap().call.id, 1);
        assert_eq!(null.unwrap().unwrap().call.id, 2);
        assert!(settled_at >= start + Duration::from_millis(1010), "ran after the reset");
        assert_eq!(ids(&recorder), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_retry_hint_does_not_wedge_the_limiter() {
        let (limiter, recorder) = limiter(10);
        let mut throttled = Call::new(0, 100, 50);
        throttled.retry_once_after = Some(Duration::MAX);

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.request(throttled, RequestOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ids(&recorder), vec![0]);
        assert_eq!(limiter.queue_len(), 1, "retried entry waits for the far-away instant");

        // resume drops the pending backoff and retries right away
        limiter.resume();
        let reply = waiting.await.unwrap().unwrap().unwrap();
        assert_eq!(reply.attempt, 2);
        assert_eq!(
            limiter.request(Call::new(1, 100, 50), RequestOptions::default()).await.unwrap().unwrap().call.id,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_operation_does_not_stall_the_queue() {
        let (limiter, recorder) = limiter(10);
        let mut exploding = Call::new(0, 100, 50);
        exploding.panic = true;

        let (a, b) = tokio::join!(
            limiter.request(exploding, RequestOptions::default()),
            limiter.request(Call::new(1, 100, 50), RequestOptions::default()),
        );
        assert_eq!(a.unwrap_err(), LimiterError::Cleared);
        assert_eq!(b.unwrap().unwrap().call.id, 1);
        assert_eq!(ids(&recorder), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stall_the_queue() {
        let (limiter, _) = limiter(10);
        let mut failing = Call::new(0, 100, 50);
        failing.fail = true;

        let (a, b) = tokio::join!(
            limiter.request(failing, RequestOptions::default()),
            limiter.request(Call::new(1, 100, 50), RequestOptions::default()),
        );
        assert_eq!(a.unwrap_err().into_inner().map(|e| e.0), Some(0));
        assert_eq!(b.unwrap().unwrap().call.id, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_batches_until_resume() {
        let (limiter, recorder) = limiter(10);
        limiter.pause();
        assert!(limiter.is_paused());

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.request(Call::new(0, 100, 50), RequestOptions::default()).await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(limiter.queue_len(), 1);
        assert!(ids(&recorder).is_empty());

        limiter.resume();
        assert!(waiting.await.unwrap().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_rejects_queued_requests() {
        let (limiter, recorder) = limiter(10);
        limiter.pause();
        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.request(Call::new(0, 100, 50), RequestOptions::default()).await
            })
        };
        tokio::task::yield_now().await;

        limiter.clear();
        assert_eq!(waiting.await.unwrap().unwrap_err(), LimiterError::Cleared);
        assert!(ids(&recorder).is_empty());
    }
}
