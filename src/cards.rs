//! The card façade: orchestration of records, series, images, groups, and
//! the topic index.
//!
//! Within one operation the image deltas, the series decision, and the index
//! move are independent branches; each is individually idempotent and none
//! assumes the others have completed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::CoreError;
use crate::groups::CountedGroupStore;
use crate::images::{BatchReport, Images};
use crate::models::{Card, CardPatch, CardTemplate, CardView};
use crate::series::SeriesStore;
use crate::store::{join_path, DocEvent, DocumentStore, ObjectStore};
use crate::unique::{TopicEntry, UniqueIndexStore};

/// How to reconcile a series-shared edit on a card that already has a
/// series: update the existing series in place (fanning the shared fields
/// out to every sibling card), or fork a brand-new series.
///
/// Prompting the user is a presentation concern, so the answer arrives from
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesChoice {
    Update,
    Fork,
}

/// What an upsert actually did.
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    /// The card's key (fresh for creations).
    pub key: String,
    /// The series the card is bound to after the edit, if any.
    pub series: Option<String>,
    /// Outcome of the image deltas.
    pub images: BatchReport,
    /// Sibling cards that did not receive the shared-field fan-out.
    pub siblings_failed: Vec<String>,
}

/// Facade over one user's cards and everything hanging off them.
///
/// All collaborators are injected at construction; the service holds no
/// global state.
pub struct CardService<S, O> {
    store: Arc<S>,
    cards_root: String,
    images: Images<O>,
    series: SeriesStore<S>,
    topics: UniqueIndexStore<S>,
    groups: CountedGroupStore<S>,
}

impl<S: DocumentStore, O: ObjectStore> CardService<S, O> {
    /// Wires up all components for one user's tree.
    pub fn new(user: &str, store: Arc<S>, objects: Arc<O>) -> Self {
        Self {
            cards_root: join_path(user, "cards"),
            images: Images::new(objects),
            series: SeriesStore::new(store.clone(), join_path(user, "other/series")),
            topics: UniqueIndexStore::new(store.clone(), join_path(user, "other/unique_topic")),
            groups: CountedGroupStore::new(store.clone(), join_path(user, "other/groups")),
            store,
        }
    }

    /// Wires up from a loaded configuration.
    pub fn from_config(config: &Config, store: Arc<S>, objects: Arc<O>) -> Self {
        Self::new(&config.user, store, objects)
    }

    /// The series component, for direct series operations.
    pub fn series(&self) -> &SeriesStore<S> {
        &self.series
    }

    /// The counted-group component.
    pub fn groups(&self) -> &CountedGroupStore<S> {
        &self.groups
    }

    /// The topic index component.
    pub fn topics(&self) -> &UniqueIndexStore<S> {
        &self.topics
    }

    fn card_path(&self, key: &str) -> String {
        join_path(&self.cards_root, key)
    }

    async fn read_card(&self, key: &str) -> Result<Option<Card>, CoreError> {
        match self.store.get(&self.card_path(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Creates or updates a card from a partial value.
    ///
    /// A missing key creates a fresh card with default fields. Image deltas
    /// run as independent branches and report partial completion in the
    /// result rather than failing the edit; the series decision and the
    /// topic-index move each complete on their own.
    pub async fn upsert(
        &self,
        key: Option<&str>,
        patch: CardPatch,
        choice: SeriesChoice,
    ) -> Result<UpsertReport, CoreError> {
        // Resolve the target record
        let (key, old) = match key {
            Some(key) if !key.is_empty() => {
                let card = self
                    .read_card(key)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("card {}", key)))?;
                (key.to_string(), card)
            }
            _ => {
                let card = Card::default();
                let key = self
                    .store
                    .push(&self.cards_root, serde_json::to_value(&card)?)
                    .await?;
                tracing::debug!("Created card {}", key);
                (key, card)
            }
        };
        tracing::debug!("Upserting card {}", key);

        let incoming_series = patch.series.clone();
        let new_topic = patch.topic.clone();
        let parts = patch.partition()?;

        // A template-created card arrives carrying its series key; keep the
        // bound set consistent with the back-reference.
        if let Some(series_key) = &incoming_series {
            if old.series.as_deref() != Some(series_key.as_str()) {
                self.series.bind(series_key, &key).await?;
            }
        }
        let current_series = incoming_series.or_else(|| old.series.clone());

        let mut report = UpsertReport {
            key: key.clone(),
            series: current_series.clone(),
            ..Default::default()
        };

        // Image deltas: uploads and the batch delete are independent
        let remove_paths: BTreeSet<String> = parts.images.remove.values().cloned().collect();
        let (uploads, deletes) = tokio::join!(
            self.images.upload_all(&parts.images.add),
            self.images.delete_paths(&remove_paths),
        );
        for path in &uploads.uploaded {
            self.store
                .push(
                    &join_path(&self.card_path(&key), "images"),
                    Value::String(path.clone()),
                )
                .await?;
        }
        if !deletes.deleted.is_empty() {
            for image_key in parts.images.remove.keys() {
                self.store
                    .remove(&join_path(
                        &self.card_path(&key),
                        &format!("images/{}", image_key),
                    ))
                    .await?;
            }
        }
        report.images.merge(uploads);
        report.images.merge(deletes);

        // Series decision
        if !parts.series.is_empty() {
            match &current_series {
                None => {
                    let series_key = self.series.create(&parts.series).await?;
                    self.series.bind(&series_key, &key).await?;
                    report.series = Some(series_key);
                }
                Some(existing) => match choice {
                    SeriesChoice::Fork => {
                        self.series.unbind(existing, &key).await?;
                        let series_key = self.series.create(&parts.series).await?;
                        self.series.bind(&series_key, &key).await?;
                        report.series = Some(series_key);
                    }
                    SeriesChoice::Update => {
                        let store = self.store.clone();
                        let cards_root = self.cards_root.clone();
                        let result = self
                            .series
                            .update(existing, &parts.series, move |card_key, fields| {
                                let store = store.clone();
                                let cards_root = cards_root.clone();
                                async move {
                                    store
                                        .update(
                                            &join_path(&cards_root, &card_key),
                                            fields.card_merge_map()?,
                                        )
                                        .await?;
                                    Ok(())
                                }
                            })
                            .await;
                        match result {
                            Ok(()) => {}
                            Err(CoreError::Partial { failed }) => report.siblings_failed = failed,
                            Err(e) => return Err(e),
                        }
                    }
                },
            }
        }

        // Topic index: one logical move, from the topic read at resolution
        // time rather than re-read after the write
        if let Some(new_topic) = &new_topic {
            self.topics
                .move_card(Some(old.topic.as_str()), new_topic, &key)
                .await?;
        }

        // Persist the remainder, plus a changed series back-reference
        let mut rest = parts.rest;
        if report.series != old.series {
            if let Some(series_key) = &report.series {
                rest.insert("series".to_string(), Value::String(series_key.clone()));
            }
        }
        if !rest.is_empty() {
            self.store.update(&self.card_path(&key), rest).await?;
        }

        Ok(report)
    }

    /// Deletes a card and everything referencing it.
    ///
    /// The series unbind, group decrement, image delete, and index removal
    /// all run first, in no particular order; the record itself is deleted
    /// only once every branch has succeeded. A dangling card record beats a
    /// deleted card with live references.
    pub async fn remove(&self, key: &str) -> Result<(), CoreError> {
        tracing::debug!("Removing card {}", key);
        let card = self
            .read_card(key)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("card {}", key)))?;

        let unbind = async {
            match &card.series {
                Some(series_key) => self.series.unbind(series_key, key).await,
                None => Ok(()),
            }
        };
        let decrement = async {
            match &card.group {
                Some(group_key) => self.groups.update_count(group_key, -1).await,
                None => Ok(()),
            }
        };
        let delete_images = async {
            let paths: BTreeSet<String> = card.images.values().cloned().collect();
            let report = self.images.delete_paths(&paths).await;
            if report.is_clean() {
                Ok(())
            } else {
                Err(CoreError::Partial {
                    failed: report.failed.into_iter().map(|(path, _)| path).collect(),
                })
            }
        };
        let unindex = async { self.topics.remove_card(&card.topic, key).await };

        let (unbind, decrement, delete_images, unindex) =
            tokio::join!(unbind, decrement, delete_images, unindex);

        let mut failed = Vec::new();
        if let Err(e) = unbind {
            tracing::warn!("Series unbind failed for card {}: {}", key, e);
            failed.push("series".to_string());
        }
        if let Err(e) = decrement {
            tracing::warn!("Group decrement failed for card {}: {}", key, e);
            failed.push("group".to_string());
        }
        if let Err(e) = delete_images {
            tracing::warn!("Image delete failed for card {}: {}", key, e);
            failed.push("images".to_string());
        }
        if let Err(e) = unindex {
            tracing::warn!("Topic unindex failed for card {}: {}", key, e);
            failed.push("topic".to_string());
        }
        if !failed.is_empty() {
            return Err(CoreError::Partial { failed });
        }

        self.store.remove(&self.card_path(key)).await?;
        Ok(())
    }

    /// Reads a card and overlays its bound series' (or group's) current
    /// shared fields, so displayed attributes always track the binding.
    pub async fn get(&self, key: &str) -> Result<Option<CardView>, CoreError> {
        tracing::debug!("Getting card {}", key);
        let mut card = match self.read_card(key).await? {
            Some(card) => card,
            None => return Ok(None),
        };

        if let Some(series_key) = card.series.clone() {
            match self.series.get(&series_key).await? {
                Some(series) => {
                    card.topic = series.topic;
                    card.tags = series.tags;
                    card.repeat = Some(series.repeat);
                }
                None => {
                    tracing::warn!("Card {} references missing series {}", key, series_key)
                }
            }
        } else if let Some(group_key) = card.group.clone() {
            match self.groups.get(&group_key).await? {
                Some(counted) => {
                    card.topic = counted.group.topic;
                    card.tags = counted.group.tags;
                    card.repeat = Some(counted.group.repeat);
                }
                None => {
                    tracing::warn!("Card {} references missing group {}", key, group_key)
                }
            }
        }

        Ok(Some(CardView {
            key: key.to_string(),
            card,
        }))
    }

    /// Card templates for every series matching `date`.
    pub async fn templates_for(&self, date: NaiveDate) -> Result<Vec<CardTemplate>, CoreError> {
        self.series.find_matching(date).await
    }

    /// Up to `n` random-series card templates.
    pub async fn sample_random(&self, n: usize) -> Result<Vec<CardTemplate>, CoreError> {
        self.series.sample_random(n).await
    }

    /// The full topic index.
    pub async fn list_topics(&self) -> Result<BTreeMap<String, TopicEntry>, CoreError> {
        self.topics.list().await
    }

    /// Bytes of one attached image.
    pub async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        self.images.fetch(path).await
    }

    /// Card added/changed/removed events for this user.
    pub async fn subscribe(&self) -> broadcast::Receiver<DocEvent> {
        self.store.listen(&self.cards_root).await
    }
}
