//! Per-pass request coalescing.
//!
//! Within one pass each distinct key is fetched at most once. The first
//! requester runs the work; anyone asking for the same key while it is in
//! flight, or afterwards, gets a clone of the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, OnceCell};

/// Shares one outcome per key for the lifetime of a pass.
pub struct RequestCoalescer<T> {
    in_flight: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
    started: AtomicUsize,
}

impl<T> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self { in_flight: Mutex::new(HashMap::new()), started: AtomicUsize::new(0) }
    }
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key` unless an outcome for `key` exists or is being
    /// produced, in which case wait for and return that outcome.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut map = self.in_flight.lock().await;
            Arc::clone(map.entry(key.to_string()).or_default())
        };

        cell.get_or_init(|| {
            self.started.fetch_add(1, Ordering::Relaxed);
            work()
        })
        .await
        .clone()
    }

    /// How many times work actually ran.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}
