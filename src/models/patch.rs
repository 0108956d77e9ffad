use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::card::Geolocation;
use super::repeat::Repeat;
use super::series::Series;

/// A partial card update. Only populated fields are applied.
///
/// Image deltas address the object store; the series-shared subset drives
/// the series decision; everything else lands on the card record.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub topic: Option<String>,
    pub content: Option<String>,
    pub geolocation: Option<Geolocation>,
    pub star: Option<bool>,
    pub order: Option<i64>,
    pub tags: Option<BTreeSet<String>>,
    pub numbers: Option<BTreeMap<String, f64>>,
    pub repeat: Option<Repeat>,
    /// Series back-reference, set when the card comes from a series
    /// template.
    pub series: Option<String>,
    pub group: Option<String>,
    /// Object path -> image bytes to upload.
    pub add_images: BTreeMap<String, Vec<u8>>,
    /// Image key -> object path to delete.
    pub remove_images: BTreeMap<String, String>,
}

impl CardPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_star(mut self, star: bool) -> Self {
        self.star = Some(star);
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = Some(tags.into_iter().collect());
        self
    }

    pub fn with_numbers(mut self, numbers: BTreeMap<String, f64>) -> Self {
        self.numbers = Some(numbers);
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_added_image(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.add_images.insert(path.into(), bytes);
        self
    }

    pub fn with_removed_image(
        mut self,
        image_key: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.remove_images.insert(image_key.into(), path.into());
        self
    }

    /// Splits the patch into its image, series, and card-record parts.
    ///
    /// The partition is static over the patch schema. The series part is a
    /// copy: shared fields stay on the card record too, which is where
    /// series fan-out lands.
    pub fn partition(self) -> Result<PatchParts, serde_json::Error> {
        let CardPatch {
            date,
            time,
            topic,
            content,
            geolocation,
            star,
            order,
            tags,
            numbers,
            repeat,
            series,
            group,
            add_images,
            remove_images,
        } = self;

        let series_fields = SeriesFields {
            topic: topic.clone(),
            repeat: repeat.clone(),
            numbers: numbers.clone(),
            time,
            order,
        };

        let mut rest = Map::new();
        if let Some(v) = date {
            rest.insert("date".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = time {
            rest.insert("time".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = topic {
            rest.insert("topic".to_string(), Value::String(v));
        }
        if let Some(v) = content {
            rest.insert("content".to_string(), Value::String(v));
        }
        if let Some(v) = geolocation {
            rest.insert("geolocation".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = star {
            rest.insert("star".to_string(), Value::Bool(v));
        }
        if let Some(v) = order {
            rest.insert("order".to_string(), v.into());
        }
        if let Some(v) = tags {
            rest.insert("tags".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = numbers {
            rest.insert("numbers".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = repeat {
            rest.insert("repeat".to_string(), serde_json::to_value(v)?);
        }
        if let Some(v) = series {
            rest.insert("series".to_string(), Value::String(v));
        }
        if let Some(v) = group {
            rest.insert("group".to_string(), Value::String(v));
        }

        Ok(PatchParts {
            images: ImageDelta {
                add: add_images,
                remove: remove_images,
            },
            series: series_fields,
            rest,
        })
    }
}

/// The three independent parts of a partial update.
#[derive(Debug, Clone)]
pub struct PatchParts {
    pub images: ImageDelta,
    pub series: SeriesFields,
    /// JSON merge map for the card record itself.
    pub rest: Map<String, Value>,
}

/// Image deltas addressed to the object store.
#[derive(Debug, Clone, Default)]
pub struct ImageDelta {
    /// Object path -> bytes to upload.
    pub add: BTreeMap<String, Vec<u8>>,
    /// Image key -> object path to delete.
    pub remove: BTreeMap<String, String>,
}

impl ImageDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// The series-shared subset of a patch.
#[derive(Debug, Clone, Default)]
pub struct SeriesFields {
    pub topic: Option<String>,
    pub repeat: Option<Repeat>,
    pub numbers: Option<BTreeMap<String, f64>>,
    pub time: Option<NaiveTime>,
    pub order: Option<i64>,
}

impl SeriesFields {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.repeat.is_none()
            && self.numbers.is_none()
            && self.time.is_none()
            && self.order.is_none()
    }

    /// Seeds a brand-new series record from these fields.
    pub fn seed(&self) -> Series {
        let mut series = Series::default();
        if let Some(topic) = &self.topic {
            series.topic = topic.clone();
        }
        if let Some(repeat) = &self.repeat {
            series.repeat = repeat.clone();
        }
        if let Some(time) = self.time {
            series.time = Some(time);
        }
        if let Some(order) = self.order {
            series.order = order;
        }
        if let Some(numbers) = &self.numbers {
            series.numbers = numbers.keys().map(|k| (k.clone(), None)).collect();
        }
        series
    }

    /// JSON merge map applied to the series record on update. Number values
    /// are stored nulled: the series keeps a template, not data.
    pub fn series_merge_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = Map::new();
        if let Some(topic) = &self.topic {
            map.insert("topic".to_string(), Value::String(topic.clone()));
        }
        if let Some(repeat) = &self.repeat {
            map.insert("repeat".to_string(), serde_json::to_value(repeat)?);
        }
        if let Some(time) = self.time {
            map.insert("time".to_string(), serde_json::to_value(time)?);
        }
        if let Some(order) = self.order {
            map.insert("order".to_string(), order.into());
        }
        if let Some(numbers) = &self.numbers {
            let template: Map<String, Value> =
                numbers.keys().map(|k| (k.clone(), Value::Null)).collect();
            map.insert("numbers".to_string(), Value::Object(template));
        }
        Ok(map)
    }

    /// JSON merge map pushed onto every sibling card: the fields kept in
    /// lockstep across a series. Numbers and order stay per-card.
    pub fn card_merge_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = Map::new();
        if let Some(topic) = &self.topic {
            map.insert("topic".to_string(), Value::String(topic.clone()));
        }
        if let Some(repeat) = &self.repeat {
            map.insert("repeat".to_string(), serde_json::to_value(repeat)?);
        }
        if let Some(time) = self.time {
            map.insert("time".to_string(), serde_json::to_value(time)?);
        }
        Ok(map)
    }
}
