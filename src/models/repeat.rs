use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Recurrence pattern for a series.
///
/// Weekdays are numbered 0=Sunday through 6=Saturday; days of month are
/// 1-based calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Repeat {
    Once,
    Daily,
    Weekly { days: BTreeSet<u8> },
    Monthly { days: BTreeSet<u8> },
    Yearly,
    Random,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Once
    }
}

impl Repeat {
    /// Checks whether `date` falls on this pattern.
    ///
    /// Random series never match by date; they are drawn by sampling.
    /// Yearly patterns are stored but never matched.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Repeat::Daily => true,
            Repeat::Weekly { days } => {
                days.contains(&(date.weekday().num_days_from_sunday() as u8))
            }
            Repeat::Monthly { days } => days.contains(&(date.day() as u8)),
            Repeat::Once | Repeat::Yearly | Repeat::Random => false,
        }
    }

    /// True for series that are drawn by sampling rather than matched by date.
    pub fn is_random(&self) -> bool {
        matches!(self, Repeat::Random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_always_matches() {
        assert!(Repeat::Daily.matches(date(2024, 1, 1)));
        assert!(Repeat::Daily.matches(date(2024, 2, 29)));
        assert!(Repeat::Daily.matches(date(2025, 12, 31)));
    }

    #[test]
    fn test_weekly_matches_weekday() {
        // 2024-01-01 is a Monday, so weekday 1
        let monday = date(2024, 1, 1);
        let monday_repeat = Repeat::Weekly {
            days: [1].into_iter().collect(),
        };
        assert!(monday_repeat.matches(monday));
        assert!(monday_repeat.matches(date(2024, 1, 8)));
        assert!(!monday_repeat.matches(date(2024, 1, 2)));
    }

    #[test]
    fn test_weekly_sunday_is_zero() {
        // 2024-01-07 is a Sunday
        let sunday_repeat = Repeat::Weekly {
            days: [0].into_iter().collect(),
        };
        assert!(sunday_repeat.matches(date(2024, 1, 7)));
        assert!(!sunday_repeat.matches(date(2024, 1, 6)));
    }

    #[test]
    fn test_weekly_every_weekday_matches_own_day() {
        let week_start = date(2024, 3, 3); // a Sunday
        for offset in 0..7u8 {
            let day = week_start + chrono::Days::new(offset as u64);
            let repeat = Repeat::Weekly {
                days: [offset].into_iter().collect(),
            };
            assert!(repeat.matches(day), "weekday {} should match", offset);
            assert!(!repeat.matches(day + chrono::Days::new(1)));
        }
    }

    #[test]
    fn test_monthly_matches_day_of_month() {
        let repeat = Repeat::Monthly {
            days: [1, 15].into_iter().collect(),
        };
        assert!(repeat.matches(date(2024, 1, 1)));
        assert!(repeat.matches(date(2024, 6, 15)));
        assert!(!repeat.matches(date(2024, 6, 14)));
    }

    #[test]
    fn test_random_once_yearly_never_match() {
        for day in [date(2024, 1, 1), date(2024, 7, 4), date(2025, 3, 9)] {
            assert!(!Repeat::Random.matches(day));
            assert!(!Repeat::Once.matches(day));
            assert!(!Repeat::Yearly.matches(day));
        }
    }

    #[test]
    fn test_default_is_once() {
        assert_eq!(Repeat::default(), Repeat::Once);
    }

    #[test]
    fn test_json_tagged_encoding() {
        let repeat = Repeat::Weekly {
            days: [1, 3].into_iter().collect(),
        };
        let json = serde_json::to_string(&repeat).unwrap();
        assert_eq!(json, r#"{"type":"weekly","days":[1,3]}"#);

        let parsed: Repeat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, repeat);
    }

    #[test]
    fn test_json_unit_variants() {
        assert_eq!(
            serde_json::to_string(&Repeat::Daily).unwrap(),
            r#"{"type":"daily"}"#
        );
        let parsed: Repeat = serde_json::from_str(r#"{"type":"random"}"#).unwrap();
        assert!(parsed.is_random());
    }
}
