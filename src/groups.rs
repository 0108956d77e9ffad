//! Reference-counted shared-attribute groups.
//!
//! A group's count tracks the cards bound to it; the count reaching zero
//! deletes the record. Every successful mutation is published to
//! subscribers.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::locks::KeyLocks;
use crate::models::{CountedGroup, Group};
use crate::store::{join_path, DocumentStore};

/// Buffer for the group event channel.
const EVENT_BUFFER: usize = 16;

/// What happened to a group record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEventKind {
    Added,
    Changed,
    Removed,
}

/// Published after every successful group mutation.
#[derive(Debug, Clone)]
pub struct GroupEvent {
    pub kind: GroupEventKind,
    pub key: String,
    /// The record after the change; `None` for removals.
    pub value: Option<CountedGroup>,
}

/// Store for counted groups, rooted at the user's `other/groups` node.
pub struct CountedGroupStore<S> {
    store: Arc<S>,
    root: String,
    locks: KeyLocks,
    events: broadcast::Sender<GroupEvent>,
}

impl<S: DocumentStore> CountedGroupStore<S> {
    pub fn new(store: Arc<S>, root: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            root: root.into(),
            locks: KeyLocks::new(),
            events,
        }
    }

    /// Subscribes to group add/change/remove notifications.
    ///
    /// Publish only: a lagging or dropped receiver never affects the store.
    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.events.subscribe()
    }

    fn publish(&self, kind: GroupEventKind, key: &str, value: Option<CountedGroup>) {
        // Ignore send errors (no subscribers)
        let _ = self.events.send(GroupEvent {
            kind,
            key: key.to_string(),
            value,
        });
    }

    fn path(&self, key: &str) -> String {
        join_path(&self.root, key)
    }

    async fn read(&self, key: &str) -> Result<Option<CountedGroup>, CoreError> {
        match self.store.get(&self.path(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new group (absent or empty key) or merges `group` into an
    /// existing record, returning the resulting key.
    ///
    /// New groups start with a count of one: a group only comes into
    /// existence for the card that brings it along.
    pub async fn add(&self, key: Option<&str>, group: &Group) -> Result<String, CoreError> {
        match key {
            None | Some("") => {
                let record = CountedGroup {
                    count: 1,
                    group: group.clone(),
                };
                let key = self
                    .store
                    .push(&self.root, serde_json::to_value(&record)?)
                    .await?;
                tracing::debug!("Added group {}", key);
                self.publish(GroupEventKind::Added, &key, Some(record));
                Ok(key)
            }
            Some(key) => {
                tracing::debug!("Updating group {}", key);
                let _guard = self.locks.lock(key).await;
                let fields = match serde_json::to_value(group)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                self.store.update(&self.path(key), fields).await?;
                let record = self.read(key).await?;
                self.publish(GroupEventKind::Changed, key, record);
                Ok(key.to_string())
            }
        }
    }

    /// Deletes the record unconditionally.
    pub async fn remove(&self, key: &str) -> Result<(), CoreError> {
        tracing::debug!("Removing group {}", key);
        self.store.remove(&self.path(key)).await?;
        self.publish(GroupEventKind::Removed, key, None);
        Ok(())
    }

    /// Fetches a group. Absent keys are `None`.
    pub async fn get(&self, key: &str) -> Result<Option<CountedGroup>, CoreError> {
        self.read(key).await
    }

    /// Adds `delta` to the group's card count; a result of exactly zero
    /// deletes the record.
    ///
    /// The read-modify-write runs under the key's mutex: the backing store
    /// has no atomic counter, so concurrent callers are serialized here.
    /// A missing record is a logged no-op — that covers any attempt to
    /// increment from zero, since zero-count records never rest in the
    /// store.
    pub async fn update_count(&self, key: &str, delta: i64) -> Result<(), CoreError> {
        tracing::debug!("Updating count of group {} by {}", key, delta);
        let _guard = self.locks.lock(key).await;
        let mut record = match self.read(key).await? {
            Some(record) => record,
            None => {
                tracing::warn!("Count update on missing group {}, ignored", key);
                return Ok(());
            }
        };
        record.count += delta;
        if record.count == 0 {
            self.store.remove(&self.path(key)).await?;
            tracing::debug!("Group {} reached zero cards, deleted", key);
            self.publish(GroupEventKind::Removed, key, None);
        } else {
            if record.count < 0 {
                tracing::warn!("Group {} count went negative: {}", key, record.count);
            }
            let mut fields = Map::new();
            fields.insert("count".to_string(), record.count.into());
            self.store.update(&self.path(key), fields).await?;
            self.publish(GroupEventKind::Changed, key, Some(record));
        }
        Ok(())
    }
}
