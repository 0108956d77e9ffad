//! In-memory implementations of the collaborator interfaces.
//!
//! These back the test suite and offline use. The document tree is one JSON
//! value behind an async lock; listeners are broadcast channels keyed by the
//! listened path, created lazily on first subscription.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::document::{DocEvent, DocEventKind, DocumentStore};
use super::object::ObjectStore;
use crate::error::StoreError;

/// Buffer for listener channels; slow receivers drop old events rather than
/// blocking the store.
const EVENT_BUFFER: usize = 64;

/// In-memory document tree.
#[derive(Debug)]
pub struct MemoryStore {
    tree: RwLock<Value>,
    listeners: RwLock<HashMap<String, broadcast::Sender<DocEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Value::Object(Map::new())),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    fn segments(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|s| !s.is_empty())
    }

    /// Splits a path into its parent location and final key.
    fn split_leaf(path: &str) -> Option<(String, String)> {
        let segments: Vec<&str> = Self::segments(path).collect();
        let (last, init) = segments.split_last()?;
        Some((init.join("/"), last.to_string()))
    }

    /// Immutable lookup of a subtree.
    fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
        let mut node = tree;
        for segment in Self::segments(path) {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    fn coerce_map(node: &mut Value) -> &mut Map<String, Value> {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => map,
            _ => unreachable!("coerced to an object above"),
        }
    }

    /// Mutable descent to the map at `path`, creating intermediate objects.
    fn descend<'a>(tree: &'a mut Value, path: &str) -> &'a mut Map<String, Value> {
        let node = Self::segments(path).fold(tree, |node, segment| {
            Self::coerce_map(node)
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
        });
        Self::coerce_map(node)
    }

    /// Mutable descent without creating anything.
    fn descend_existing<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Map<String, Value>> {
        let node = Self::segments(path).try_fold(tree, |node, segment| match node {
            Value::Object(map) => map.get_mut(segment),
            _ => None,
        })?;
        node.as_object_mut()
    }

    async fn notify(&self, parent: &str, kind: DocEventKind, key: &str, value: Option<Value>) {
        let listeners = self.listeners.read().await;
        if let Some(sender) = listeners.get(parent) {
            // Ignore send errors (no subscribers)
            let _ = sender.send(DocEvent {
                kind,
                key: key.to_string(),
                value,
            });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let tree = self.tree.read().await;
        Ok(Self::lookup(&tree, path).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let (parent, key) = Self::split_leaf(path)
            .ok_or_else(|| StoreError::Remote("cannot set the tree root".to_string()))?;
        let kind;
        {
            let mut tree = self.tree.write().await;
            let map = Self::descend(&mut tree, &parent);
            kind = if map.contains_key(&key) {
                DocEventKind::Changed
            } else {
                DocEventKind::Added
            };
            map.insert(key.clone(), value.clone());
        }
        self.notify(&parent, kind, &key, Some(value)).await;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let (parent, key) = Self::split_leaf(path)
            .ok_or_else(|| StoreError::Remote("cannot update the tree root".to_string()))?;
        let kind;
        let merged;
        {
            let mut tree = self.tree.write().await;
            let parent_map = Self::descend(&mut tree, &parent);
            kind = if parent_map.contains_key(&key) {
                DocEventKind::Changed
            } else {
                DocEventKind::Added
            };
            let record = Self::coerce_map(
                parent_map
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
            );
            for (field, value) in fields {
                record.insert(field, value);
            }
            merged = Value::Object(record.clone());
        }
        self.notify(&parent, kind, &key, Some(merged)).await;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = Uuid::new_v4().to_string();
        {
            let mut tree = self.tree.write().await;
            let map = Self::descend(&mut tree, path);
            map.insert(key.clone(), value.clone());
        }
        self.notify(path, DocEventKind::Added, &key, Some(value))
            .await;
        Ok(key)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let (parent, key) = Self::split_leaf(path)
            .ok_or_else(|| StoreError::Remote("cannot remove the tree root".to_string()))?;
        let removed = {
            let mut tree = self.tree.write().await;
            match Self::descend_existing(&mut tree, &parent) {
                Some(map) => map.remove(&key).is_some(),
                None => false,
            }
        };
        if removed {
            self.notify(&parent, DocEventKind::Removed, &key, None).await;
        }
        Ok(())
    }

    async fn listen(&self, path: &str) -> broadcast::Receiver<DocEvent> {
        let mut listeners = self.listeners.write().await;
        if let Some(sender) = listeners.get(path) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(EVENT_BUFFER);
            listeners.insert(path.to_string(), sender);
            receiver
        }
    }
}

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete_batch(&self, keys: &BTreeSet<String>) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.objects.read().await.get(key).cloned())
    }
}
