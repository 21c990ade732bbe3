//! Partitioning wrapper.
//!
//! Routes every request to an independent child limiter chosen by a
//! caller-supplied partition key. Children are created lazily, once per key,
//! and live as long as the wrapper. Lifecycle calls are broadcast to every
//! existing child under the partitions lock, and the paused and destroyed
//! flags are remembered so children created later start in the same state.

use crate::limiter::{lock, RateLimiter, RateLimiterStats};
use crate::queue::{Outcome, RequestOptions};
use crate::time_based::{Dispatch, TimeBasedConfig, TimeBasedLimiter};
use crate::LimiterError;
use async_trait::async_trait;
use futures::future::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tracing::debug;

const TARGET: &str = "quotaflow::partitioned";

/// Shared handle to a child limiter.
pub type ChildLimiter<Req, Res, E> = Arc<dyn RateLimiter<Req, Res, E>>;

type KeyFn<Req, K> = Arc<dyn Fn(&Req) -> Option<K> + Send + Sync>;
type CreateFn<Req, Res, E, K> = Arc<dyn Fn(Option<&K>) -> ChildLimiter<Req, Res, E> + Send + Sync>;

struct Partitions<Req, Res, E, K> {
    children: HashMap<Option<K>, ChildLimiter<Req, Res, E>>,
    paused: bool,
    destroyed: bool,
}

/// Multiplexes one child limiter per partition key.
///
/// `None` is the default partition. Capacity is never shared across
/// partitions.
pub struct PartitionedRateLimiter<Req, Res, E, K = String> {
    partitions: Mutex<Partitions<Req, Res, E, K>>,
    get_partition_key: KeyFn<Req, K>,
    create_child: CreateFn<Req, Res, E, K>,
}

impl<Req, Res, E, K> std::fmt::Debug for PartitionedRateLimiter<Req, Res, E, K>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let partitions = lock(&self.partitions);
        f.debug_struct("PartitionedRateLimiter")
            .field("partitions", &partitions.children.keys().collect::<Vec<_>>())
            .field("paused", &partitions.paused)
            .field("destroyed", &partitions.destroyed)
            .finish()
    }
}

impl<Req, Res, E, K> PartitionedRateLimiter<Req, Res, E, K>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a wrapper that derives a key with `get_partition_key` and builds
    /// children with `create_child` on first use of each key.
    pub fn new<G, C, L>(get_partition_key: G, create_child: C) -> Self
    where
        G: Fn(&Req) -> Option<K> + Send + Sync + 'static,
        C: Fn(Option<&K>) -> L + Send + Sync + 'static,
        L: RateLimiter<Req, Res, E> + 'static,
    {
        Self {
            partitions: Mutex::new(Partitions {
                children: HashMap::new(),
                paused: false,
                destroyed: false,
            }),
            get_partition_key: Arc::new(get_partition_key),
            create_child: Arc::new(move |key: Option<&K>| {
                Arc::new(create_child(key)) as ChildLimiter<Req, Res, E>
            }),
        }
    }

    /// One fixed-window bucket per partition, all in front of the same
    /// downstream operation.
    ///
    /// # Examples
    /// ```
    /// use quotaflow::{PartitionedRateLimiter, RateLimiter, RequestOptions, TimeBasedConfig};
    /// use std::time::Duration;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let config = TimeBasedConfig::new(10, Duration::from_secs(1)).unwrap();
    /// let limiter = PartitionedRateLimiter::time_based(
    ///     config,
    ///     |req: &(String, u32)| Some(req.0.clone()),
    ///     |req: (String, u32)| async move { Ok::<_, std::io::Error>(req.1) },
    /// );
    /// let res = limiter.request(("tenant-a".into(), 7), RequestOptions::default()).await;
    /// assert_eq!(res.unwrap(), Some(7));
    /// # });
    /// ```
    pub fn time_based<G, F, Fut>(config: TimeBasedConfig, get_partition_key: G, do_request: F) -> Self
    where
        G: Fn(&Req) -> Option<K> + Send + Sync + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
    {
        let dispatch: Dispatch<Req, Res, E> = Arc::new(move |req: Req, _options: RequestOptions| {
            let fut = do_request(req);
            async move { fut.await.map(Some).map_err(LimiterError::Inner) }.boxed()
        });
        Self::new(get_partition_key, move |_key| TimeBasedLimiter::with_dispatch(config, dispatch.clone()))
    }

    /// Number of partitions seen so far.
    pub fn partition_count(&self) -> usize {
        lock(&self.partitions).children.len()
    }

    /// Child for `key`, if one was created.
    pub fn child(&self, key: Option<&K>) -> Option<ChildLimiter<Req, Res, E>> {
        lock(&self.partitions).children.get(&key.cloned()).cloned()
    }

    /// Stats of the child for `key`; `None` when the child does not exist or
    /// does not track quota.
    pub fn stats_for(&self, key: Option<&K>) -> Option<RateLimiterStats> {
        self.child(key)?.stats()
    }

    /// Whether the wrapper is paused.
    pub fn is_paused(&self) -> bool {
        lock(&self.partitions).paused
    }

    /// Whether [`destroy`](RateLimiter::destroy) was called on the wrapper.
    pub fn is_destroyed(&self) -> bool {
        lock(&self.partitions).destroyed
    }

    fn get_or_create_child(&self, key: Option<K>) -> ChildLimiter<Req, Res, E> {
        let mut partitions = lock(&self.partitions);
        if let Some(child) = partitions.children.get(&key) {
            return child.clone();
        }
        let child = (self.create_child)(key.as_ref());
        if partitions.destroyed {
            child.destroy();
        } else if partitions.paused {
            child.pause();
        }
        debug!(
            target: TARGET,
            default_partition = key.is_none(),
            partitions = partitions.children.len() + 1,
            "created partition limiter"
        );
        partitions.children.insert(key, child.clone());
        child
    }

    /// Apply `f` to every child while holding the partitions lock, so a
    /// concurrent lifecycle call or child creation cannot interleave.
    fn broadcast(
        &self,
        update: impl FnOnce(&mut Partitions<Req, Res, E, K>),
        f: impl Fn(&ChildLimiter<Req, Res, E>),
    ) {
        let mut partitions = lock(&self.partitions);
        update(&mut partitions);
        for child in partitions.children.values() {
            f(child);
        }
    }
}

#[async_trait]
impl<Req, Res, E, K> RateLimiter<Req, Res, E> for PartitionedRateLimiter<Req, Res, E, K>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    async fn request(&self, req: Req, options: RequestOptions) -> Outcome<Res, E> {
        let key = (self.get_partition_key)(&req);
        let child = self.get_or_create_child(key);
        child.request(req, options).await
    }

    fn clear(&self) {
        self.broadcast(|_| {}, |child| child.clear());
    }

    fn pause(&self) {
        self.broadcast(|partitions| partitions.paused = true, |child| child.pause());
    }

    fn resume(&self) {
        self.broadcast(|partitions| partitions.paused = false, |child| child.resume());
    }

    fn destroy(&self) {
        debug!(target: TARGET, "destroying every partition");
        self.broadcast(
            |partitions| {
                partitions.paused = false;
                partitions.destroyed = true;
            },
            |child| child.destroy(),
        );
    }
}
