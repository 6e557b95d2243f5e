//! Per-key in-flight deduplication.
//!
//! The first caller for a key spawns the work on the runtime; later callers for
//! the same key await the same shared outcome. Work runs to completion even if
//! every caller is dropped, and the key is released once it finishes so the
//! next caller starts afresh.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;
type FlightTable<K, V, E> = Mutex<HashMap<K, Flight<V, E>>>;

/// Coalesces concurrent work per key.
pub(crate) struct SingleFlight<K, V, E> {
    flights: Arc<FlightTable<K, V, E>>,
}

impl<K, V, E> Default for SingleFlight<K, V, E> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// Join the flight for `key`, starting it with `work` if none is running.
    ///
    /// The work is spawned before this returns; `work` is not called when a
    /// flight for `key` already exists.
    pub(crate) fn run<F, Fut>(&self, key: K, work: F) -> Flight<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut flights = lock(&self.flights);
        if let Some(existing) = flights.get(&key) {
            return existing.clone();
        }

        let registry = Arc::clone(&self.flights);
        let release_key = key.clone();
        let task = work();
        let handle = tokio::spawn(async move {
            let outcome = task.await;
            lock(&registry).remove(&release_key);
            outcome
        });
        let flight = async move { handle.await.unwrap_or_else(|error| Err(E::from(error))) }
            .boxed()
            .shared();
        flights.insert(key, flight.clone());
        flight
    }

    /// Number of keys with work in progress.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The table only holds futures; a panic elsewhere cannot leave it half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
