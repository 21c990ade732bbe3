//! Response-driven pacing against a server that reports its quota in every
//! reply and answers "retry later" once the window is used up.
use async_trait::async_trait;
use quotaflow::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const LIMIT: u64 = 30;
const WINDOW: Duration = Duration::from_secs(1);

struct Reply {
    id: u32,
    retry_after: Option<Duration>,
    quota: QuotaParameters,
}

struct FakeApi {
    epoch: Instant,
    window: AtomicU64,
    used: AtomicU64,
}

#[async_trait]
impl ResponseBasedOperation for FakeApi {
    type Request = u32;
    type Response = Reply;
    type Error = std::io::Error;

    async fn do_request(&self, id: &u32) -> Result<Reply, std::io::Error> {
        tokio::time::sleep(Duration::from_millis(25)).await;
        let window = self.epoch.elapsed().as_secs();
        let resets_at = self.epoch + WINDOW * (window as u32 + 1);
        if self.window.swap(window, Ordering::SeqCst) != window {
            self.used.store(0, Ordering::SeqCst);
        }
        let used = self.used.fetch_add(1, Ordering::SeqCst) + 1;
        if used > LIMIT {
            let quota = QuotaParameters { limit: LIMIT, remaining: 0, resets_at };
            return Ok(Reply { id: *id, retry_after: Some(resets_at - Instant::now()), quota });
        }
        let quota = QuotaParameters { limit: LIMIT, remaining: LIMIT - used, resets_at };
        Ok(Reply { id: *id, retry_after: None, quota })
    }

    fn needs_retry_after(&self, res: &Reply) -> Option<Duration> {
        res.retry_after
    }

    fn quota_parameters(&self, res: &Reply) -> QuotaParameters {
        res.quota
    }
}

#[tokio::main]
async fn main() -> Result<(), LimiterError<std::io::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let api = FakeApi { epoch: Instant::now(), window: AtomicU64::new(0), used: AtomicU64::new(0) };
    let limiter = ResponseBasedLimiter::new(api);
    let start = Instant::now();

    let results =
        futures::future::join_all((0..80).map(|id| limiter.request(id, RequestOptions::default()))).await;
    let mut done = 0;
    for reply in results {
        if let Some(reply) = reply? {
            done += 1;
            tracing::trace!(id = reply.id, "reply");
        }
    }

    let stats = limiter.stats();
    println!(
        "{done} requests in {:?}; last known quota: {:?}/{:?}",
        start.elapsed(),
        stats.last_known_remaining_requests,
        stats.last_known_limit
    );
    Ok(())
}
