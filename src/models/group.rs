use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::repeat::Repeat;

/// Shared attributes carried by a non-series grouping of cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub topic: String,
    pub tags: BTreeSet<String>,
    pub repeat: Repeat,
    /// Template for future cards; values are null placeholders.
    pub numbers: BTreeMap<String, Option<f64>>,
    pub order: i64,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            topic: String::new(),
            tags: BTreeSet::new(),
            repeat: Repeat::default(),
            numbers: BTreeMap::new(),
            order: i64::MAX,
        }
    }
}

/// A group plus the number of cards currently bound to it.
///
/// The count drives the lifecycle: decrementing to zero deletes the record,
/// and a deleted group is never resurrected by a later increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountedGroup {
    pub count: i64,
    #[serde(flatten)]
    pub group: Group,
}
