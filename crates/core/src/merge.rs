use std::cmp::Ordering;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::loader::GeoFeature;
use crate::matcher::RegionMatcher;
use crate::record::RetireeRecord;
use crate::schema::round_one_decimal;

/// A boundary feature joined with the retiree counts of its resolved region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedFeature {
    pub name: String,
    pub region: Option<String>,
    pub total: f64,
    pub masculin: f64,
    pub feminin: f64,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub geometry: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenderShare {
    pub masculin: f64,
    pub feminin: f64,
    pub masculin_pct: f64,
    pub feminin_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Descending total.
    Total,
    /// Geography order.
    #[default]
    Source,
}

impl std::str::FromStr for RankOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "total" => Ok(RankOrder::Total),
            "source" => Ok(RankOrder::Source),
            other => Err(format!("unknown rank order {other}")),
        }
    }
}

impl MergedFeature {
    /// Only features with a positive total get a bubble or can be selected.
    pub fn has_data(&self) -> bool {
        self.total > 0.0
    }

    pub fn gender_share(&self) -> Option<GenderShare> {
        if !self.has_data() {
            return None;
        }
        Some(GenderShare {
            masculin: self.masculin,
            feminin: self.feminin,
            masculin_pct: round_one_decimal(self.masculin / self.total * 100.0),
            feminin_pct: round_one_decimal(self.feminin / self.total * 100.0),
        })
    }

    pub fn without_geometry(&self) -> Self {
        Self {
            geometry: Value::Null,
            ..self.clone()
        }
    }
}

/// Pairs every feature with the statistics row its name resolves to.
///
/// Unresolved features keep zero counts; they still belong to the base map.
/// Cost is features × rows, which is fine at a dozen regions.
pub fn merge(
    matcher: &RegionMatcher,
    features: &[GeoFeature],
    rows: &[RetireeRecord],
) -> Vec<MergedFeature> {
    let available = rows
        .iter()
        .map(|row| row.region.clone())
        .collect::<IndexSet<_>>();
    features
        .iter()
        .map(|feature| {
            let region = matcher.resolve(&feature.name, &available);
            let row = region
                .as_deref()
                .and_then(|region| rows.iter().find(|row| row.region == region));
            MergedFeature {
                name: feature.name.clone(),
                total: row.map_or(0.0, |row| row.total),
                masculin: row.map_or(0.0, |row| row.masculin),
                feminin: row.map_or(0.0, |row| row.feminin),
                region,
                geometry: feature.geometry.clone(),
            }
        })
        .collect()
}

/// Features eligible for bubbles and selection.
pub fn bubbles(merged: &[MergedFeature]) -> impl Iterator<Item = &MergedFeature> {
    merged.iter().filter(|feature| feature.has_data())
}

/// Bubble-eligible features in histogram order.
pub fn ranked(merged: &[MergedFeature], order: RankOrder) -> Vec<&MergedFeature> {
    let mut ranked = bubbles(merged).collect::<Vec<_>>();
    if order == RankOrder::Total {
        ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    }
    ranked
}
