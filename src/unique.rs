//! The unique-topic index: topic string -> description + bound cards.
//!
//! Buckets are created on first binding and deleted when their bound set
//! empties, the same termination rule a series follows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::locks::KeyLocks;
use crate::store::{join_path, DocumentStore};

/// One bucket of the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicEntry {
    pub description: Option<String>,
    pub cards: BTreeSet<String>,
}

/// Reverse lookup from a distinguishing value (topic) to the cards carrying
/// it.
///
/// Topic strings are used verbatim as tree keys; `/` in a topic is not
/// supported.
pub struct UniqueIndexStore<S> {
    store: Arc<S>,
    root: String,
    locks: KeyLocks,
}

impl<S: DocumentStore> UniqueIndexStore<S> {
    pub fn new(store: Arc<S>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: root.into(),
            locks: KeyLocks::new(),
        }
    }

    fn path(&self, key: &str) -> String {
        join_path(&self.root, key)
    }

    async fn read(&self, key: &str) -> Result<Option<TopicEntry>, CoreError> {
        match self.store.get(&self.path(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Dumps the whole index.
    pub async fn list(&self) -> Result<BTreeMap<String, TopicEntry>, CoreError> {
        tracing::debug!("Listing index at {}", self.root);
        let map = match self.store.get(&self.root).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(BTreeMap::new()),
        };
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match serde_json::from_value(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => tracing::warn!("Skipping malformed index bucket {}: {}", key, e),
            }
        }
        Ok(entries)
    }

    /// Adds `card_key` to the bucket, creating the bucket on first binding.
    /// An empty key is a no-op.
    pub async fn add_card(&self, key: &str, card_key: &str) -> Result<(), CoreError> {
        if key.is_empty() {
            return Ok(());
        }
        tracing::debug!("Indexing card {} under {}", card_key, key);
        let _guard = self.locks.lock(key).await;
        let mut entry = self.read(key).await?.unwrap_or_default();
        if entry.cards.insert(card_key.to_string()) {
            self.store
                .set(&self.path(key), serde_json::to_value(&entry)?)
                .await?;
        }
        Ok(())
    }

    /// Removes `card_key` from the bucket, deleting the bucket when its set
    /// empties. Unknown buckets and unbound cards are no-ops.
    pub async fn remove_card(&self, key: &str, card_key: &str) -> Result<(), CoreError> {
        if key.is_empty() {
            return Ok(());
        }
        tracing::debug!("Unindexing card {} from {}", card_key, key);
        let _guard = self.locks.lock(key).await;
        let mut entry = match self.read(key).await? {
            Some(entry) => entry,
            None => return Ok(()),
        };
        if !entry.cards.remove(card_key) {
            return Ok(());
        }
        if entry.cards.is_empty() {
            self.store.remove(&self.path(key)).await?;
        } else {
            self.store
                .set(&self.path(key), serde_json::to_value(&entry)?)
                .await?;
        }
        Ok(())
    }

    /// Sets the bucket's description, only if the bucket already exists.
    pub async fn add_description(
        &self,
        key: &str,
        description: impl Into<String>,
    ) -> Result<(), CoreError> {
        let _guard = self.locks.lock(key).await;
        let mut entry = match self.read(key).await? {
            Some(entry) => entry,
            None => {
                tracing::warn!("Description for missing bucket {}, ignored", key);
                return Ok(());
            }
        };
        entry.description = Some(description.into());
        self.store
            .set(&self.path(key), serde_json::to_value(&entry)?)
            .await?;
        Ok(())
    }

    /// Moves a card between buckets as one logical step: the card joins
    /// `new` before it leaves `old`, and a self-move changes nothing, so a
    /// sole-member bucket never transiently disappears during a rename.
    pub async fn move_card(
        &self,
        old: Option<&str>,
        new: &str,
        card_key: &str,
    ) -> Result<(), CoreError> {
        match old {
            Some(old) if old == new => Ok(()),
            Some(old) if !old.is_empty() => {
                self.add_card(new, card_key).await?;
                self.remove_card(old, card_key).await
            }
            _ => self.add_card(new, card_key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> UniqueIndexStore<MemoryStore> {
        UniqueIndexStore::new(Arc::new(MemoryStore::new()), "user/other/unique_topic")
    }

    #[tokio::test]
    async fn test_add_creates_bucket() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();

        let entries = index.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries["gym"].cards.contains("c1"));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_empty_index() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();
        index.remove_card("gym", "c1").await.unwrap();

        assert!(index.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_bucket_with_other_cards() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();
        index.add_card("gym", "c2").await.unwrap();

        index.remove_card("gym", "c1").await.unwrap();

        let entries = index.list().await.unwrap();
        assert_eq!(
            entries["gym"].cards,
            ["c2".to_string()].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();

        index.remove_card("gym", "never-added").await.unwrap();
        index.remove_card("no-bucket", "c1").await.unwrap();

        let entries = index.list().await.unwrap();
        assert_eq!(entries["gym"].cards.len(), 1);
    }

    #[tokio::test]
    async fn test_description_only_on_existing_bucket() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();

        index.add_description("gym", "strength work").await.unwrap();
        index.add_description("missing", "nothing").await.unwrap();

        let entries = index.list().await.unwrap();
        assert_eq!(
            entries["gym"].description.as_deref(),
            Some("strength work")
        );
        assert!(!entries.contains_key("missing"));
    }

    #[tokio::test]
    async fn test_move_between_buckets() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();

        index.move_card(Some("gym"), "fitness", "c1").await.unwrap();

        let entries = index.list().await.unwrap();
        assert!(!entries.contains_key("gym"));
        assert!(entries["fitness"].cards.contains("c1"));
    }

    #[tokio::test]
    async fn test_self_move_keeps_sole_member_bucket() {
        let index = setup();
        index.add_card("gym", "c1").await.unwrap();

        index.move_card(Some("gym"), "gym", "c1").await.unwrap();

        let entries = index.list().await.unwrap();
        assert!(entries["gym"].cards.contains("c1"));
    }

    #[tokio::test]
    async fn test_move_from_empty_topic_just_adds() {
        let index = setup();
        index.move_card(Some(""), "gym", "c1").await.unwrap();
        index.move_card(None, "run", "c2").await.unwrap();

        let entries = index.list().await.unwrap();
        assert!(entries["gym"].cards.contains("c1"));
        assert!(entries["run"].cards.contains("c2"));
    }
}
