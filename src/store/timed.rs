//! Timeout decorators for the collaborator interfaces.
//!
//! Remote stores offer no deadline of their own; every call made through
//! these wrappers is raced against a configured limit and surfaced as a
//! retryable `StoreError::Timeout`.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::time::timeout;

use super::document::{DocEvent, DocumentStore};
use super::object::ObjectStore;
use crate::error::StoreError;

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// A document store whose every call is bounded by a deadline.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for TimedStore<S> {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        bounded(self.limit, self.inner.get(path)).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        bounded(self.limit, self.inner.set(path, value)).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        bounded(self.limit, self.inner.update(path, fields)).await
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        bounded(self.limit, self.inner.push(path, value)).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        bounded(self.limit, self.inner.remove(path)).await
    }

    async fn listen(&self, path: &str) -> broadcast::Receiver<DocEvent> {
        // Subscription registration is local; events arrive as they arrive
        self.inner.listen(path).await
    }
}

/// An object store whose every call is bounded by a deadline.
#[derive(Debug, Clone)]
pub struct TimedObjects<O> {
    inner: O,
    limit: Duration,
}

impl<O> TimedObjects<O> {
    pub fn new(inner: O, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<O: ObjectStore> ObjectStore for TimedObjects<O> {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        bounded(self.limit, self.inner.upload(key, bytes)).await
    }

    async fn delete_batch(&self, keys: &BTreeSet<String>) -> Result<(), StoreError> {
        bounded(self.limit, self.inner.delete_batch(keys)).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        bounded(self.limit, self.inner.fetch(key)).await
    }
}
