//! Single-flight request coalescing.
//!
//! Concurrent callers asking for the same [`Fingerprint`] share one
//! underlying call. The call runs as its own tokio task, so a caller that is
//! cancelled while waiting only abandons its own wait: the task keeps
//! running, other waiters still receive the outcome, and any side effects
//! the factory performs (such as writing the cache) still happen.
//!
//! The task removes its in-flight record before it resolves, even when the
//! call panics, so once any waiter observes the outcome a new call for the
//! same fingerprint starts fresh.

use super::fingerprint::Fingerprint;
use crate::error::ApiError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::debug;

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Removes a settled call's record from the in-flight table.
struct SettleGuard<V> {
    table: Arc<Mutex<HashMap<Fingerprint, SharedOutcome<V>>>>,
    key: Fingerprint,
}

impl<V> Drop for SettleGuard<V> {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// In-flight table of shared calls, keyed by fingerprint.
pub struct Coalescer<V> {
    in_flight: Arc<Mutex<HashMap<Fingerprint, SharedOutcome<V>>>>,
}

impl<V> Default for Coalescer<V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> std::fmt::Debug for Coalescer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl<V> Coalescer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<V: Clone + Send + Sync + 'static> Coalescer<V> {
    /// Await the in-flight call for `fingerprint`, starting one with
    /// `factory` if none exists. `factory` is invoked at most once per call
    /// and only by the caller that creates the record.
    pub async fn run_once<F, Fut>(&self, fingerprint: Fingerprint, factory: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut table = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = table.get(&fingerprint) {
                debug!(key = %fingerprint, "Joining in-flight request");
                existing.clone()
            } else {
                let call = factory();
                let table_ref = Arc::clone(&self.in_flight);
                let key = fingerprint.clone();
                let task = tokio::spawn(async move {
                    // Dropped on completion and on panic alike.
                    let _settle = SettleGuard {
                        table: table_ref,
                        key,
                    };
                    call.await
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(ApiError::Internal(format!("request task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                table.insert(fingerprint, shared.clone());
                shared
            }
        };
        shared.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn key(name: &str) -> Fingerprint {
        Fingerprint::new("/predictions", [("filter[stop]", name)])
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_invocation() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let invocations = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coalescer = coalescer.clone();
            let invocations = invocations.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run_once(key("place-pktrm"), move || {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        async move {
                            gate.notified().await;
                            Ok(42)
                        }
                    })
                    .await
            }));
        }

        while coalescer.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }
        // Let every caller join before releasing the call.
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn failure_is_delivered_to_every_waiter() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let gate = Arc::new(Notify::new());
        let failure = ApiError::Server {
            status: 502,
            detail: "bad gateway".into(),
        };

        let first = {
            let (coalescer, gate, failure) = (coalescer.clone(), gate.clone(), failure.clone());
            tokio::spawn(async move {
                coalescer
                    .run_once(key("x"), move || async move {
                        gate.notified().await;
                        Err(failure)
                    })
                    .await
            })
        };
        while coalescer.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }
        let second = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .run_once(key("x"), || async {
                        Err(ApiError::Internal("second factory ran".into()))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        assert_eq!(first.await.unwrap(), Err(failure.clone()));
        assert_eq!(second.await.unwrap(), Err(failure));
    }

    #[tokio::test]
    async fn record_is_removed_after_settle() {
        let coalescer = Coalescer::<u32>::new();
        let invocations = AtomicUsize::new(0);
        for expected in 1..=2 {
            let result = coalescer
                .run_once(key("y"), || {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    async { Ok(7) }
                })
                .await;
            assert_eq!(result, Ok(7));
            assert_eq!(invocations.load(Ordering::SeqCst), expected);
            assert_eq!(coalescer.in_flight_count(), 0);
        }
    }

    #[tokio::test]
    async fn distinct_fingerprints_do_not_coalesce() {
        let coalescer = Coalescer::<&'static str>::new();
        let a = coalescer.run_once(key("a"), || async { Ok("a") });
        let b = coalescer.run_once(key("b"), || async { Ok("b") });
        let (a, b) = tokio::join!(a, b);
        assert_eq!((a, b), (Ok("a"), Ok("b")));
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_cancel_the_call() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let gate = Arc::new(Notify::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let abandoned = {
            let (coalescer, gate, completed) = (coalescer.clone(), gate.clone(), completed.clone());
            tokio::spawn(async move {
                coalescer
                    .run_once(key("z"), move || async move {
                        gate.notified().await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok(5)
                    })
                    .await
            })
        };
        while coalescer.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }
        let survivor = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .run_once(key("z"), || async { Ok(0) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        abandoned.abort();
        gate.notify_one();

        assert_eq!(survivor.await.unwrap(), Ok(5));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_call_releases_its_record() {
        let coalescer = Coalescer::<u32>::new();
        let crashed = coalescer
            .run_once(key("p"), || {
                let fail = true;
                async move {
                    if fail {
                        panic!("decoder bug");
                    }
                    Ok(1)
                }
            })
            .await;
        assert!(matches!(crashed, Err(ApiError::Internal(_))));
        assert_eq!(coalescer.in_flight_count(), 0);

        let retried = coalescer.run_once(key("p"), || async { Ok(2) }).await;
        assert_eq!(retried, Ok(2));
    }
}
