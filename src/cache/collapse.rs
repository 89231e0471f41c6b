//! Single-flight request collapsing.
//!
//! At most one producer runs per key at a time; every caller that arrives
//! while it is running awaits the same outcome. Nothing is retained after
//! settlement, success or failure alike. Longer-lived results belong in
//! [`CacheStore`](super::CacheStore).
//!
//! Producers are spawned as detached tasks, so a flight always runs to
//! completion even if every waiter goes away.

use crate::query::CacheKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a collapsed call did not produce a value.
#[derive(Debug)]
pub enum CollapseError<E> {
    /// The producer failed; every waiter receives the same error.
    Failed(Arc<E>),
    /// The producer task panicked or was cancelled by the runtime.
    Aborted,
}

impl<E: fmt::Display> fmt::Display for CollapseError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => e.fmt(f),
            Self::Aborted => f.write_str("in-flight request aborted before settling"),
        }
    }
}

/// `Failed` is transparent: both `Display` and `source` forward to the
/// producer's error, so a report chain does not repeat its message.
impl<E: std::error::Error + 'static> std::error::Error for CollapseError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(e) => e.source(),
            Self::Aborted => None,
        }
    }
}

impl<E> Clone for CollapseError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Failed(e) => Self::Failed(Arc::clone(e)),
            Self::Aborted => Self::Aborted,
        }
    }
}

/// Removes a key from the in-flight map when dropped, including on unwind
/// or when the runtime drops the task.
struct Deregister<V, E> {
    inflight: Arc<DashMap<String, Flight<V, E>>>,
    key: CacheKey,
}

impl<V, E> Drop for Deregister<V, E> {
    fn drop(&mut self) {
        self.inflight.remove(self.key.as_str());
    }
}

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, CollapseError<E>>>>;

/// Tracks in-flight work per key. Clone-cheap.
pub struct RequestCollapser<V, E> {
    inflight: Arc<DashMap<String, Flight<V, E>>>,
}

impl<V, E> Clone for RequestCollapser<V, E> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<V, E> Default for RequestCollapser<V, E> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<V, E> RequestCollapser<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key` unless a run is already in flight, in which
    /// case await that run instead.
    ///
    /// Registration is an atomic insert-if-absent: the producer is spawned
    /// while the key's shard is locked, so concurrent callers on any thread
    /// observe either no flight or exactly this one. The flight deregisters
    /// itself before its result becomes visible, so a call arriving after
    /// settlement always starts fresh.
    pub async fn collapse<F, Fut>(
        &self,
        key: &CacheKey,
        producer: F,
    ) -> Result<V, CollapseError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let flight = match self.inflight.entry(key.as_str().to_owned()) {
            Entry::Occupied(occupied) => {
                debug!(key = key.short(), "collapsed onto in-flight request");
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                debug!(key = key.short(), "starting new request");
                let flight = self.launch(key.clone(), producer());
                vacant.insert(flight.clone());
                flight
            }
        };
        flight.await
    }

    /// Number of keys with a flight currently registered.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    fn launch<Fut>(&self, key: CacheKey, work: Fut) -> Flight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inflight = Arc::clone(&self.inflight);
        let task = tokio::spawn(async move {
            let guard = Deregister {
                inflight,
                key: key.clone(),
            };
            let result = work.await;
            // Blocks briefly if the registering caller still holds the shard
            // lock; the entry is always in place by the time this runs.
            drop(guard);
            match &result {
                Ok(_) => debug!(key = key.short(), "in-flight request completed"),
                Err(_) => warn!(key = key.short(), "in-flight request failed"),
            }
            result.map_err(|e| CollapseError::Failed(Arc::new(e)))
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(error = %join_err, "in-flight request task aborted");
                    Err(CollapseError::Aborted)
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{LatLng, RawQuery, cache_key_for, normalize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(lat: f64) -> CacheKey {
        cache_key_for(&normalize(&RawQuery {
            origin: LatLng::new(lat, 0.0),
            radius: None,
            budget: None,
            efficiency: None,
            fuel_type: None,
        }))
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("upstream exploded")]
    struct Boom;

    #[tokio::test]
    async fn concurrent_calls_share_one_execution() {
        let collapser: RequestCollapser<u32, Boom> = RequestCollapser::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let producer = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(42)
            }
        };

        let k = key(1.0);
        let (a, b) = tokio::join!(
            collapser.collapse(&k, producer(calls.clone())),
            collapser.collapse(&k, producer(calls.clone())),
        );

        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(collapser.in_flight(), 0);
    }

    #[tokio::test]
    async fn call_after_settlement_runs_fresh() {
        let collapser: RequestCollapser<&'static str, Boom> = RequestCollapser::new();
        let k = key(1.0);

        let first = collapser.collapse(&k, || async { Ok("first") }).await;
        let second = collapser.collapse(&k, || async { Ok("second") }).await;

        assert_eq!(first.unwrap(), "first");
        assert_eq!(second.unwrap(), "second");
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_is_not_retained() {
        let collapser: RequestCollapser<u32, Boom> = RequestCollapser::new();
        let k = key(2.0);

        let failing = || async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err(Boom)
        };
        let (a, b) = tokio::join!(
            collapser.collapse(&k, failing),
            collapser.collapse(&k, failing),
        );
        for result in [a, b] {
            match result {
                Err(CollapseError::Failed(e)) => assert_eq!(*e, Boom),
                other => panic!("expected failure, got {other:?}"),
            }
        }
        assert_eq!(collapser.in_flight(), 0);

        let retry = collapser.collapse(&k, || async { Ok(7) }).await;
        assert_eq!(retry.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_producer_does_not_wedge_the_key() {
        let collapser: RequestCollapser<u32, Boom> = RequestCollapser::new();
        let k = key(5.0);

        let first = collapser
            .collapse(&k, || async {
                if true {
                    panic!("producer blew up");
                }
                Ok(1)
            })
            .await;
        assert!(matches!(first, Err(CollapseError::Aborted)));
        assert_eq!(collapser.in_flight(), 0);

        let second = collapser.collapse(&k, || async { Ok(2) }).await;
        assert_eq!(second.unwrap(), 2);
        assert_eq!(collapser.in_flight(), 0);
    }

    #[test]
    fn failed_error_is_transparent() {
        #[derive(Debug, thiserror::Error)]
        #[error("discovery failed")]
        struct Outer(#[source] Boom);

        let err: CollapseError<Outer> = CollapseError::Failed(Arc::new(Outer(Boom)));
        assert_eq!(err.to_string(), "discovery failed");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "upstream exploded");
        assert!(std::error::Error::source(&CollapseError::<Outer>::Aborted).is_none());
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let collapser: RequestCollapser<f64, Boom> = RequestCollapser::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |lat: f64| {
            let calls = calls.clone();
            let collapser = collapser.clone();
            async move {
                collapser
                    .collapse(&key(lat), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(lat)
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(1.0), run(2.0));
        assert_eq!(a.unwrap(), 1.0);
        assert_eq!(b.unwrap(), 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn flight_is_registered_while_running() {
        let collapser: RequestCollapser<u32, Boom> = RequestCollapser::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let background = collapser.clone();
        let k = key(3.0);
        let waiter = tokio::spawn({
            let k = k.clone();
            async move {
                background
                    .collapse(&k, || async move {
                        let _ = release_rx.await;
                        Ok(1)
                    })
                    .await
            }
        });

        while collapser.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(collapser.in_flight(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 1);
        assert_eq!(collapser.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_cancel_the_flight() {
        let collapser: RequestCollapser<u32, Boom> = RequestCollapser::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let k = key(4.0);

        let call = {
            let finished = finished.clone();
            collapser.collapse(&k, move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(5)
            })
        };
        // Poll once so the flight is registered, then drop the only waiter.
        let _ = tokio::time::timeout(Duration::from_millis(1), call).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(collapser.in_flight(), 0);
    }
}
