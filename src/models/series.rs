use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::repeat::Repeat;

/// A recurrence template that one or more cards bind to.
///
/// The bound-card set drives the lifecycle: a series is deleted when the
/// last card unbinds from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Series {
    pub topic: String,
    pub repeat: Repeat,
    pub time: Option<NaiveTime>,
    /// Template for future cards; values are null placeholders.
    pub numbers: BTreeMap<String, Option<f64>>,
    pub order: i64,
    pub tags: BTreeSet<String>,
    pub cards: BTreeSet<String>,
}

impl Default for Series {
    fn default() -> Self {
        Self {
            topic: String::new(),
            repeat: Repeat::default(),
            time: None,
            numbers: BTreeMap::new(),
            order: i64::MAX,
            tags: BTreeSet::new(),
            cards: BTreeSet::new(),
        }
    }
}

impl Series {
    /// Converts this series into the template for a prospective card,
    /// nulling the number values.
    pub fn card_template(&self, key: impl Into<String>) -> CardTemplate {
        CardTemplate {
            series: key.into(),
            topic: self.topic.clone(),
            time: self.time,
            tags: self.tags.clone(),
            order: self.order,
            repeat: self.repeat.clone(),
            numbers: self.numbers.keys().map(|k| (k.clone(), None)).collect(),
        }
    }
}

/// A prospective card produced from a series by date matching or sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTemplate {
    pub series: String,
    pub topic: String,
    pub time: Option<NaiveTime>,
    pub tags: BTreeSet<String>,
    pub order: i64,
    pub repeat: Repeat,
    pub numbers: BTreeMap<String, Option<f64>>,
}
