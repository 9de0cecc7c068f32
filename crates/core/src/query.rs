use std::io::Write;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::index::DataIndex;
use crate::matcher::RegionMatcher;
use crate::record::{format_cell, Locale, RawRecord, RetireeRecord};
use crate::schema::Schema;
use crate::tables::AGGREGATE_REGION;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub year: u16,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UrbanRural {
    pub urban: Option<f64>,
    pub rural: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 20.0,
            mean: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub region: String,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub first: NamedSeries,
    pub second: NamedSeries,
}

/// One export line; every cell is a number or the `-` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Région")]
    pub region: String,
    #[serde(rename = "National")]
    pub national: String,
    #[serde(rename = "Urbain")]
    pub urban: String,
    #[serde(rename = "Rural")]
    pub rural: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionExport {
    pub national: Option<f64>,
    pub urban: Option<f64>,
    pub rural: Option<f64>,
    pub evolution: Vec<SeriesPoint>,
}

/// A loaded table together with its schema. Every query is read-only and
/// answers missing data with `None` rather than an error.
#[derive(Debug, Clone)]
pub struct Dataset {
    index: DataIndex,
    schema: Schema,
}

impl Dataset {
    pub fn new(index: DataIndex, schema: Schema) -> Self {
        Self { index, schema }
    }

    pub fn from_rows(rows: &[RawRecord], schema: Schema) -> Self {
        Self::new(DataIndex::build(rows), schema)
    }

    pub fn from_retirees(records: &[RetireeRecord], schema: Schema) -> Self {
        let year = schema.latest_year().unwrap_or(crate::schema::RETIREE_YEAR);
        let rows = records
            .iter()
            .flat_map(|record| record.to_raw_records(year))
            .collect::<Vec<_>>();
        Self::from_rows(&rows, schema)
    }

    pub fn index(&self) -> &DataIndex {
        &self.index
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Observed value, else the gap-fill estimate, else `None`.
    pub fn value_at(&self, region: &str, year: u16, segment: &str, locale: Locale) -> Option<f64> {
        if let Some(value) = self.index.get(segment, region, locale, year) {
            return Some(value);
        }
        self.synthetic(region, year, locale)
    }

    fn synthetic(&self, region: &str, year: u16, locale: Locale) -> Option<f64> {
        let gap_fill = self.schema.gap_fill?;
        let year_index = self.schema.year_index(year)?;
        let baseline = self.schema.reference.baseline(region, locale)?;
        let estimate = gap_fill.estimate(baseline, year_index);
        debug!(region, year, %locale, estimate, "synthetic value");
        Some(estimate)
    }

    pub fn urban_rural_split(&self, region: &str, year: u16, segment: &str) -> UrbanRural {
        UrbanRural {
            urban: self.value_at(region, year, segment, Locale::Urbain),
            rural: self.value_at(region, year, segment, Locale::Rural),
        }
    }

    /// One point per configured year that has a value, in year order.
    pub fn temporal_series(&self, region: &str, segment: &str, locale: Locale) -> Vec<SeriesPoint> {
        self.schema
            .years
            .iter()
            .filter_map(|year| {
                self.value_at(region, *year, segment, locale)
                    .map(|value| SeriesPoint { year: *year, value })
            })
            .collect()
    }

    pub fn color_scale_stats(&self, year: u16, segment: &str) -> ColorScale {
        let values = self
            .available_regions(segment)
            .iter()
            .filter_map(|region| self.value_at(region, year, segment, Locale::National))
            .collect::<Vec<_>>();
        if values.is_empty() {
            return ColorScale::default();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        ColorScale { min, max, mean }
    }

    /// Regions with real data for `segment`, then every synthetic-reference
    /// region, without the national aggregate.
    pub fn available_regions(&self, segment: &str) -> IndexSet<String> {
        self.index
            .regions(segment)
            .chain(self.schema.reference.regions())
            .filter(|region| *region != AGGREGATE_REGION)
            .map(str::to_string)
            .collect()
    }

    /// Both National series, or `None` when either region yields no points.
    pub fn comparison_series(&self, first: &str, second: &str, segment: &str) -> Option<Comparison> {
        let named = |region: &str| {
            let series = self.temporal_series(region, segment, Locale::National);
            (!series.is_empty()).then(|| NamedSeries {
                region: region.to_string(),
                series,
            })
        };
        Some(Comparison {
            first: named(first)?,
            second: named(second)?,
        })
    }

    pub fn export_rows(&self, year: u16, segment: &str) -> Vec<ExportRow> {
        self.available_regions(segment)
            .into_iter()
            .map(|region| {
                let cell = |locale| format_cell(self.value_at(&region, year, segment, locale));
                ExportRow {
                    national: cell(Locale::National),
                    urban: cell(Locale::Urbain),
                    rural: cell(Locale::Rural),
                    region,
                }
            })
            .collect()
    }

    pub fn export_json(&self, year: u16, segment: &str) -> IndexMap<String, RegionExport> {
        self.available_regions(segment)
            .into_iter()
            .map(|region| {
                let export = RegionExport {
                    national: self.value_at(&region, year, segment, Locale::National),
                    urban: self.value_at(&region, year, segment, Locale::Urbain),
                    rural: self.value_at(&region, year, segment, Locale::Rural),
                    evolution: self.temporal_series(&region, segment, Locale::National),
                };
                (region, export)
            })
            .collect()
    }

    pub fn resolve(&self, matcher: &RegionMatcher, free_text: &str, segment: &str) -> Option<String> {
        matcher.resolve(free_text, &self.available_regions(segment))
    }
}

/// Writes export rows as CSV with a `Région,National,Urbain,Rural` header.
pub fn write_export_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SEGMENT_TOTAL;

    fn row(region: &str, locale: &str, values: &[Option<f64>]) -> RawRecord {
        RawRecord {
            segment: Some(SEGMENT_TOTAL.to_string()),
            region: Some(region.to_string()),
            locale: Some(locale.to_string()),
            values: (2015u16..).zip(values.iter().copied()).collect(),
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_rows(
            &[
                row(
                    "Oriental",
                    "National",
                    &[Some(17.1), Some(16.3), None, Some(15.2), None, Some(16.0), Some(18.1), Some(19.0), Some(19.2)],
                ),
                row("Oriental", "Urbain", &[Some(20.0); 9]),
                row("Ensemble", "National", &[Some(9.7); 9]),
                row("Fès-Meknès", "National", &[Some(0.0); 9]),
            ],
            Schema::unemployment(),
        )
    }

    #[test]
    fn real_value_wins_over_synthetic() {
        let data = dataset();
        assert_eq!(data.value_at("Oriental", 2015, "Total", Locale::National), Some(17.1));
        assert_eq!(data.value_at("Fès-Meknès", 2023, "Total", Locale::National), Some(0.0));
    }

    #[test]
    fn gap_filled_when_absent() {
        let data = dataset();
        assert_eq!(data.value_at("Fès-Meknès", 2023, "Total", Locale::Urbain), Some(16.4));
        assert_eq!(data.value_at("Souss-Massa", 2019, "Total", Locale::Rural), Some(7.1));
        assert_eq!(data.value_at("Oriental", 2017, "Total", Locale::National), None);
        assert_eq!(data.value_at("Atlantis", 2017, "Hommes", Locale::Rural), None);
        assert_eq!(data.value_at("Fès-Meknès", 1999, "Total", Locale::Urbain), None);
    }

    #[test]
    fn split_falls_back_independently() {
        let data = dataset();
        let split = data.urban_rural_split("Oriental", 2016, "Total");
        assert_eq!(split, UrbanRural { urban: Some(20.0), rural: None });
    }

    #[test]
    fn series_skips_gaps() {
        let data = dataset();
        let series = data.temporal_series("Oriental", "Total", Locale::National);
        assert_eq!(series.len(), 7);
        assert!(series.windows(2).all(|pair| pair[0].year < pair[1].year));
        assert!(data.temporal_series("Atlantis", "Total", Locale::National).is_empty());
        assert_eq!(data.temporal_series("Drâa-Tafilalet", "Total", Locale::National).len(), 9);
    }

    #[test]
    fn available_regions_skip_aggregate() {
        let regions = dataset().available_regions("Total");
        assert!(!regions.contains(AGGREGATE_REGION));
        assert_eq!(regions.get_index(0).map(String::as_str), Some("Oriental"));
        assert!(regions.contains("Régions du Sud"));
        assert_eq!(regions.len(), 9);
    }

    #[test]
    fn color_scale_defaults_without_values() {
        let empty = Dataset::from_rows(&[], Schema::retirees());
        assert_eq!(empty.color_scale_stats(2022, "Total"), ColorScale::default());
        let scale = dataset().color_scale_stats(2015, "Total");
        assert_eq!(scale.min, 0.0);
        assert_eq!(scale.max, 17.1);
    }

    #[test]
    fn comparison_requires_both_series() {
        let data = dataset();
        let comparison = data.comparison_series("Oriental", "Souss-Massa", "Total").unwrap();
        assert_eq!(comparison.first.region, "Oriental");
        assert_eq!(comparison.second.series.len(), 9);
        assert!(data.comparison_series("Oriental", "Atlantis", "Total").is_none());
    }

    #[test]
    fn export_has_one_row_per_available_region() {
        let data = dataset();
        let rows = data.export_rows(2017, "Total");
        assert_eq!(rows.len(), data.available_regions("Total").len());
        let oriental = &rows[0];
        assert_eq!(oriental.national, "-");
        assert_eq!(oriental.urban, "20");
        assert_eq!(oriental.rural, "-");
        let mut out = Vec::new();
        write_export_csv(&rows[..1], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Région,National,Urbain,Rural\nOriental,-,20,-\n");
        let json = data.export_json(2017, "Total");
        assert_eq!(json["Oriental"].evolution.len(), 7);
    }

    #[test]
    fn retiree_dataset_has_no_gap_fill() {
        let data = Dataset::from_retirees(
            &[RetireeRecord {
                region: "Oriental".to_string(),
                masculin: 4000.0,
                feminin: 2000.0,
                total: 6000.0,
            }],
            Schema::retirees(),
        );
        assert_eq!(data.value_at("Oriental", 2022, "Féminin", Locale::National), Some(2000.0));
        assert_eq!(data.value_at("Oriental", 2021, "Total", Locale::National), None);
        assert!(data.schema().reference.is_empty());
    }
}
