use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::normalization::normalize;

pub const SEGMENT_TOTAL: &str = "Total";
pub const SEGMENT_MALE: &str = "Masculin";
pub const SEGMENT_FEMALE: &str = "Féminin";

/// Placeholder used by the statistics tables for "no data".
pub const ABSENT_PLACEHOLDER: &str = "-";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Locale {
    #[default]
    National,
    Urbain,
    Rural,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::National, Locale::Urbain, Locale::Rural];

    pub fn label(&self) -> &'static str {
        match self {
            Locale::National => "National",
            Locale::Urbain => "Urbain",
            Locale::Rural => "Rural",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Locale {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "national" | "ensemble" => Ok(Locale::National),
            "urbain" | "urban" => Ok(Locale::Urbain),
            "rural" => Ok(Locale::Rural),
            _ => Err(StatsError::UnknownLocale(value.to_string())),
        }
    }
}

/// One observation row as parsed from a source table.
///
/// Identifying fields stay optional here; the indexer decides what to drop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub segment: Option<String>,
    pub region: Option<String>,
    pub locale: Option<String>,
    pub values: Vec<(u16, Option<f64>)>,
}

/// Retiree counts for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetireeRecord {
    pub region: String,
    pub masculin: f64,
    pub feminin: f64,
    pub total: f64,
}

impl RetireeRecord {
    /// Lowers the count triple into index rows, one per segment.
    pub fn to_raw_records(&self, year: u16) -> Vec<RawRecord> {
        [
            (SEGMENT_TOTAL, self.total),
            (SEGMENT_MALE, self.masculin),
            (SEGMENT_FEMALE, self.feminin),
        ]
        .into_iter()
        .map(|(segment, value)| RawRecord {
            segment: Some(segment.to_string()),
            region: Some(self.region.clone()),
            locale: Some(Locale::National.label().to_string()),
            values: vec![(year, Some(value))],
        })
        .collect()
    }
}

/// Parses a numeric table cell. `-`, blanks and anything unparsable are absent.
pub fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == ABSENT_PLACEHOLDER {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Cell text for export: the number, or the absence placeholder.
pub fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => ABSENT_PLACEHOLDER.to_string(),
    }
}
