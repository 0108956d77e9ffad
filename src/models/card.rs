use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::repeat::Repeat;

/// An optional place attached to a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geolocation {
    pub name: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
}

/// A single journal entry as stored in the user's card tree.
///
/// `series` and `group` are weak back-references; the card owns neither
/// record. `images` maps store-generated image keys to object paths and is
/// only ever mutated through image-delta application. `topic` and `repeat`
/// are kept on the record (that is where series fan-out lands), but a bound
/// card's displayed values are overlaid from the series at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub topic: String,
    pub content: String,
    pub geolocation: Geolocation,
    pub series: Option<String>,
    pub group: Option<String>,
    pub tags: BTreeSet<String>,
    pub star: bool,
    pub numbers: BTreeMap<String, f64>,
    pub repeat: Option<Repeat>,
    pub images: BTreeMap<String, String>,
    pub order: i64,
}

impl Default for Card {
    fn default() -> Self {
        Self {
            date: None,
            time: None,
            topic: String::new(),
            content: String::new(),
            geolocation: Geolocation::default(),
            series: None,
            group: None,
            tags: BTreeSet::new(),
            star: false,
            numbers: BTreeMap::new(),
            repeat: None,
            images: BTreeMap::new(),
            // new cards sort last
            order: i64::MAX,
        }
    }
}

/// A card as handed to callers: the stored record with the bound series'
/// (or group's) current shared fields already overlaid.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub key: String,
    pub card: Card,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_card_defaults() {
        let card = Card::default();
        assert!(card.date.is_none());
        assert!(card.topic.is_empty());
        assert!(card.series.is_none());
        assert!(!card.star);
        assert!(card.images.is_empty());
        assert_eq!(card.order, i64::MAX);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut card = Card::default();
        card.date = NaiveDate::from_ymd_opt(2024, 1, 1);
        card.topic = "gym".to_string();
        card.tags.insert("health".to_string());
        card.numbers.insert("reps".to_string(), 12.0);

        let json = serde_json::to_string(&card).unwrap();
        let parsed: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn test_partial_record_deserializes() {
        // Records written by older clients may be missing fields entirely
        let parsed: Card = serde_json::from_str(r#"{"topic":"run"}"#).unwrap();
        assert_eq!(parsed.topic, "run");
        assert_eq!(parsed.order, i64::MAX);
    }
}
