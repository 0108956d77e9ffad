//! The remote document tree, as this crate sees it.
//!
//! Paths address locations in a hierarchical key-value tree
//! (`<user>/cards/<key>`); values are JSON. Changes to a location's direct
//! children are observable through `listen`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::StoreError;

/// What happened to a child of a listened location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocEventKind {
    Added,
    Changed,
    Removed,
}

/// A change to a direct child of a listened location.
#[derive(Debug, Clone)]
pub struct DocEvent {
    pub kind: DocEventKind,
    pub key: String,
    /// The child's value after the change; `None` for removals.
    pub value: Option<Value>,
}

/// Hierarchical key-value document store.
///
/// Every method suspends at the remote call; nothing blocks a thread.
/// Absent locations read as `Ok(None)`, never as an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot read of the subtree at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow-merges `fields` into the object at `path`, creating it if
    /// absent.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Inserts `value` under a freshly generated key and returns the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Removes the subtree at `path`. Removing an absent path succeeds.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Subscribes to changes of the direct children of `path`.
    ///
    /// This is a publish mechanism: a lagging or dropped receiver has no
    /// effect on the store.
    async fn listen(&self, path: &str) -> broadcast::Receiver<DocEvent>;
}

/// Joins path segments into a child location: pure string composition, no
/// I/O.
pub fn join_path(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("user", "cards"), "user/cards");
        assert_eq!(join_path("", "cards"), "cards");
        assert_eq!(join_path("user/other", "series"), "user/other/series");
    }
}
