//! Content-addressed object storage for attached images.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::StoreError;

/// Object store addressed by string key (image paths).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any previous object.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Deletes every key in one request. Quiet: keys that do not exist are
    /// not an error.
    async fn delete_batch(&self, keys: &BTreeSet<String>) -> Result<(), StoreError>;

    /// Fetches an object's bytes. Absent keys are `Ok(None)`.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}
