//! Series records and the recurrence reconciliation around them.
//!
//! A series anchors the fan-out: shared-field updates travel from the series
//! to every bound card, and the bound set drives deletion when the last card
//! unbinds.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::seq::IteratorRandom;
use serde_json::Value;

use crate::error::CoreError;
use crate::locks::KeyLocks;
use crate::models::{CardTemplate, Repeat, Series, SeriesFields};
use crate::store::{join_path, DocumentStore};

/// Store for series records, rooted at the user's `other/series` node.
///
/// All collaborators are injected at construction; read-modify-writes of a
/// series go through a per-key mutex because the backing store has no
/// compare-and-swap.
pub struct SeriesStore<S> {
    store: Arc<S>,
    root: String,
    locks: KeyLocks,
}

impl<S: DocumentStore> SeriesStore<S> {
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

    async fn read(&self, key: &str) -> Result<Option<Series>, CoreError> {
        match self.store.get(&self.path(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Fetches a series record. Absent keys are `None`.
    pub async fn get(&self, key: &str) -> Result<Option<Series>, CoreError> {
        self.read(key).await
    }

    /// The repeat pattern of a series, if the series exists.
    pub async fn repeat_info(&self, key: &str) -> Result<Option<Repeat>, CoreError> {
        Ok(self.read(key).await?.map(|series| series.repeat))
    }

    /// Reads every series record, skipping any that fail to decode.
    async fn all(&self) -> Result<Vec<(String, Series)>, CoreError> {
        let map = match self.store.get(&self.root).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(Vec::new()),
        };
        let mut records = Vec::with_capacity(map.len());
        for (key, value) in map {
            match serde_json::from_value::<Series>(value) {
                Ok(series) => records.push((key, series)),
                Err(e) => tracing::warn!("Skipping malformed series {}: {}", key, e),
            }
        }
        Ok(records)
    }

    /// Card templates for every series whose pattern matches `date`.
    ///
    /// Result order is unspecified.
    pub async fn find_matching(&self, date: NaiveDate) -> Result<Vec<CardTemplate>, CoreError> {
        tracing::debug!("Finding series matching {}", date);
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|(_, series)| series.repeat.matches(date))
            .map(|(key, series)| series.card_template(key))
            .collect())
    }

    /// Draws up to `n` distinct random-type series, as card templates.
    ///
    /// Returns everything if fewer than `n` exist.
    pub async fn sample_random(&self, n: usize) -> Result<Vec<CardTemplate>, CoreError> {
        tracing::debug!("Sampling {} random series", n);
        let candidates: Vec<CardTemplate> = self
            .all()
            .await?
            .into_iter()
            .filter(|(_, series)| series.repeat.is_random())
            .map(|(key, series)| series.card_template(key))
            .collect();
        let mut rng = rand::rng();
        Ok(candidates.into_iter().choose_multiple(&mut rng, n))
    }

    /// Inserts a new series seeded from `fields`, with an empty bound set.
    pub async fn create(&self, fields: &SeriesFields) -> Result<String, CoreError> {
        let seed = fields.seed();
        let key = self
            .store
            .push(&self.root, serde_json::to_value(&seed)?)
            .await?;
        tracing::debug!("Created series {}", key);
        Ok(key)
    }

    /// Merges `fields` into the series record, then invokes `propagate` with
    /// every bound card key so the caller can push the shared fields onto
    /// each sibling.
    ///
    /// Per-card failures do not roll back anything already applied; they are
    /// collected into `CoreError::Partial` so the caller can retry just
    /// those.
    pub async fn update<F, Fut>(
        &self,
        key: &str,
        fields: &SeriesFields,
        propagate: F,
    ) -> Result<(), CoreError>
    where
        F: Fn(String, SeriesFields) -> Fut,
        Fut: Future<Output = Result<(), CoreError>>,
    {
        tracing::debug!("Updating series {}", key);
        let cards = {
            let _guard = self.locks.lock(key).await;
            self.store
                .update(&self.path(key), fields.series_merge_map()?)
                .await?;
            match self.read(key).await? {
                Some(series) => series.cards,
                None => BTreeSet::new(),
            }
        };

        let mut failed = Vec::new();
        for card_key in cards {
            if let Err(e) = propagate(card_key.clone(), fields.clone()).await {
                tracing::warn!(
                    "Failed to propagate series {} update to card {}: {}",
                    key,
                    card_key,
                    e
                );
                failed.push(card_key);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Partial { failed })
        }
    }

    /// Adds `card_key` to the series' bound set.
    pub async fn bind(&self, series_key: &str, card_key: &str) -> Result<(), CoreError> {
        tracing::debug!("Binding card {} to series {}", card_key, series_key);
        let _guard = self.locks.lock(series_key).await;
        let mut series = match self.read(series_key).await? {
            Some(series) => series,
            None => {
                tracing::warn!(
                    "Cannot bind card {} to missing series {}",
                    card_key,
                    series_key
                );
                return Ok(());
            }
        };
        if series.cards.insert(card_key.to_string()) {
            self.store
                .set(&self.path(series_key), serde_json::to_value(&series)?)
                .await?;
        }
        Ok(())
    }

    /// Removes `card_key` from the bound set, deleting the series when the
    /// set empties. Unbinding a key that was never bound is a no-op.
    pub async fn unbind(&self, series_key: &str, card_key: &str) -> Result<(), CoreError> {
        tracing::debug!("Unbinding card {} from series {}", card_key, series_key);
        let _guard = self.locks.lock(series_key).await;
        let mut series = match self.read(series_key).await? {
            Some(series) => series,
            None => return Ok(()),
        };
        if !series.cards.remove(card_key) {
            tracing::warn!("Card {} was not bound to series {}", card_key, series_key);
            return Ok(());
        }
        if series.cards.is_empty() {
            self.store.remove(&self.path(series_key)).await?;
            tracing::debug!("Series {} lost its last card, deleted", series_key);
        } else {
            self.store
                .set(&self.path(series_key), serde_json::to_value(&series)?)
                .await?;
        }
        Ok(())
    }
}
