//! Market-regime (zone) types and the step-function lookup over zone history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Two-valued market regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneColor {
    Green,
    /// Fallback for dates with no classification.
    #[default]
    Red,
}

impl ZoneColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneColor::Green => "green",
            ZoneColor::Red => "red",
        }
    }
}

impl fmt::Display for ZoneColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(ZoneColor::Green),
            "red" => Ok(ZoneColor::Red),
            other => Err(format!("unknown zone color '{other}'")),
        }
    }
}

/// A regime change: `color` is in effect from `change_date` onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub color: ZoneColor,
    pub change_date: NaiveDate,
}

/// Ordered zone records forming a step function over dates.
///
/// Records are kept ascending by `change_date`. The color on date D is the
/// color of the latest record dated on or before D, else [`ZoneColor::Red`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneHistory {
    records: Vec<ZoneRecord>,
}

impl ZoneHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records in any order; they are sorted by change date.
    pub fn from_records(mut records: Vec<ZoneRecord>) -> Self {
        records.sort_by_key(|r| r.change_date);
        Self { records }
    }

    /// Append a record. Callers push in ascending date order.
    pub(crate) fn push(&mut self, record: ZoneRecord) {
        debug_assert!(self
            .records
            .last()
            .map_or(true, |last| last.change_date < record.change_date));
        self.records.push(record);
    }

    pub fn records(&self) -> &[ZoneRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Zone color in effect on `date` (find_zone_for_date).
    pub fn color_on(&self, date: NaiveDate) -> ZoneColor {
        let idx = self.records.partition_point(|r| r.change_date <= date);
        if idx == 0 {
            ZoneColor::default()
        } else {
            self.records[idx - 1].color
        }
    }

    /// Color of the most recent record, or red when the history is empty.
    pub fn latest_color(&self) -> ZoneColor {
        self.records.last().map(|r| r.color).unwrap_or_default()
    }
}
