//! Per-key serialization for read-modify-write sequences.
//!
//! The backing store exposes no compare-and-swap, so every mutation of a
//! series bound set, a group count, or an index bucket is funneled through
//! the mutex owned by that key.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub(crate) struct KeyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the mutex for `key`, creating it on first use.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = KeyLocks::new();
        let guard = locks.lock("a").await;

        // A second acquisition of the same key must wait
        let pending = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("a").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(guard);
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_independent() {
        let locks = KeyLocks::new();
        let _a = locks.lock("a").await;
        // Must not deadlock
        let _b = locks.lock("b").await;
    }
}
