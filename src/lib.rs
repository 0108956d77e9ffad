//! Daybook Core Library
//!
//! Client-side data access for Daybook: journal cards, the recurring series
//! they bind to, counted groups, and the topic index, all kept against a
//! remote document tree plus an object store for attached images.

pub mod cards;
pub mod config;
pub mod error;
pub mod groups;
pub mod images;
mod locks;
pub mod models;
pub mod series;
pub mod store;
pub mod unique;

pub use cards::{CardService, SeriesChoice, UpsertReport};
pub use config::{Config, ConfigError};
pub use error::{CoreError, StoreError};
pub use groups::{CountedGroupStore, GroupEvent, GroupEventKind};
pub use images::{BatchReport, Images};
pub use models::{
    Card, CardPatch, CardTemplate, CardView, CountedGroup, Geolocation, Group, ImageDelta,
    PatchParts, Repeat, Series, SeriesFields,
};
pub use series::SeriesStore;
pub use store::{
    DocEvent, DocEventKind, DocumentStore, MemoryObjectStore, MemoryStore, ObjectStore,
    TimedObjects, TimedStore,
};
pub use unique::{TopicEntry, UniqueIndexStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
