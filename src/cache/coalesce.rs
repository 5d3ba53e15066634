//! Request coalescing
//!
//! When several callers ask for the same key at once, only the first one
//! (the leader) performs the remote call. Everyone else subscribes to the
//! leader's broadcast and receives the same `Result`.
//!
//! If a leader is dropped before it finishes, its in-flight entry is removed
//! and the waiters race again for leadership.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{MarketError, Result};

/// Leadership changes tolerated before a waiter gives up
const DEFAULT_MAX_ATTEMPTS: usize = 8;

/// Per-key in-flight request table
pub struct RequestCoalescer<K, V> {
    in_flight: Mutex<HashMap<K, broadcast::Sender<Result<V>>>>,
    max_attempts: usize,
}

enum Role<V> {
    Leader(broadcast::Sender<Result<V>>),
    Waiter(broadcast::Receiver<Result<V>>),
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `fetch` for `key`, or wait for the run already in flight.
    ///
    /// Failures are delivered to every waiter and are not remembered: the
    /// next call for the same key starts a fresh request.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        for attempt in 0..self.max_attempts {
            match self.join(&key) {
                Role::Leader(sender) => {
                    let mut guard = LeaderGuard {
                        coalescer: self,
                        key: key.clone(),
                        sender: Some(sender),
                    };
                    let result = fetch().await;
                    guard.complete(result.clone());
                    return result;
                }
                Role::Waiter(mut receiver) => {
                    debug!(key = ?key, attempt, "Waiting on coalesced request");
                    match receiver.recv().await {
                        Ok(result) => return result,
                        Err(_) => {
                            debug!(key = ?key, "Coalesced leader vanished, retrying");
                        }
                    }
                }
            }
        }

        Err(MarketError::Coalesce(format!(
            "{:?} lost its leader {} times",
            key, self.max_attempts
        )))
    }

    /// Number of keys with a request in flight
    pub fn in_flight_count(&self) -> usize {
        self.table().len()
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut in_flight = self.table();
        if let Some(sender) = in_flight.get(key) {
            return Role::Waiter(sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        in_flight.insert(key.clone(), sender.clone());
        Role::Leader(sender)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<Result<V>>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Default for RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the in-flight entry however the leader exits.
struct LeaderGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    coalescer: &'a RequestCoalescer<K, V>,
    key: K,
    sender: Option<broadcast::Sender<Result<V>>>,
}

impl<K, V> LeaderGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn complete(&mut self, result: Result<V>) {
        // Remove before sending: anyone who subscribed got in under the lock.
        self.coalescer.table().remove(&self.key);
        if let Some(sender) = self.sender.take() {
            // No receivers is fine, nobody was waiting
            let _ = sender.send(result);
        }
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            self.coalescer.table().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(99)
        };

        let (a, b, c) = tokio::join!(
            coalescer.run(1, fetch),
            coalescer.run(1, fetch),
            coalescer.run(1, fetch),
        );

        assert_eq!(a.unwrap(), 99);
        assert_eq!(b.unwrap(), 99);
        assert_eq!(c.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_but_not_remembered() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let failing = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(MarketError::RemoteUnavailable("down".into()))
        };

        let (a, b) = tokio::join!(coalescer.run(5, failing), coalescer.run(5, failing));
        assert_eq!(a, Err(MarketError::RemoteUnavailable("down".into())));
        assert_eq!(b, Err(MarketError::RemoteUnavailable("down".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let ok = coalescer.run(5, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let fetch = move |value: u32| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        };

        let (a, b) = tokio::join!(coalescer.run(1, fetch(10)), coalescer.run(2, fetch(20)));
        assert_eq!(a, Ok(10));
        assert_eq!(b, Ok(20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_leader_hands_over() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();

        let leader = tokio::time::timeout(
            Duration::from_millis(20),
            coalescer.run(3, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            }),
        );
        let waiter = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            coalescer.run(3, || async { Ok(2) }).await
        };

        // The leader times out and is dropped while the waiter is subscribed.
        let (timed_out, result) = tokio::join!(leader, waiter);
        assert!(timed_out.is_err());
        assert_eq!(result, Ok(2));
        assert_eq!(coalescer.in_flight_count(), 0);
    }
}
