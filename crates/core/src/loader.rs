use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, StatsError};
use crate::normalization::normalize;
use crate::record::{parse_cell, RawRecord, RetireeRecord};

const SEGMENT_COLUMN: &str = "sexe";
const REGION_COLUMN: &str = "region";
const LOCALE_COLUMN: &str = "milieu";
const TITLE_MARKER: &str = "taux de chomage";
const TOTAL_ROW: &str = "TOTAL";

/// Externally supplied boundary feature. Only the name is ever read; the
/// geometry is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoFeature {
    pub name: String,
    pub geometry: Value,
}

/// Parses the unemployment table: `Sexe, Région, Milieu, <year>...`.
///
/// The header is the first row naming the `Sexe` and `Région` columns; title
/// lines above it and repeated headers below it are skipped. Rows missing
/// identifying cells are kept with `None` so the indexer can drop them.
pub fn parse_unemployment_csv<R: Read>(reader: R, years: &[u16]) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut layout: Option<Layout> = None;
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                skipped += 1;
                debug!(error = %err, "skipping unreadable csv row");
                continue;
            }
        };
        if layout.is_none() {
            layout = Layout::detect(&record, years);
            if layout.is_none() {
                skipped += 1;
            }
            continue;
        }
        let Some(layout) = layout.as_ref() else {
            continue;
        };
        let cell = |idx: Option<usize>| {
            idx.and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let segment = cell(layout.segment);
        if segment.as_deref().is_some_and(is_title_or_header) {
            skipped += 1;
            continue;
        }
        let values = layout
            .years
            .iter()
            .map(|(year, idx)| (*year, record.get(*idx).and_then(parse_cell)))
            .collect();
        rows.push(RawRecord {
            segment,
            region: cell(Some(layout.region)),
            locale: cell(layout.locale),
            values,
        });
    }
    if layout.is_none() {
        return Err(StatsError::InvalidTable("no Sexe/Région header row"));
    }
    info!(rows = rows.len(), skipped, "parsed unemployment table");
    Ok(rows)
}

struct Layout {
    segment: Option<usize>,
    region: usize,
    locale: Option<usize>,
    years: Vec<(u16, usize)>,
}

impl Layout {
    fn detect(record: &StringRecord, years: &[u16]) -> Option<Self> {
        let headers = record
            .iter()
            .map(|cell| normalize(cell.trim_start_matches('\u{feff}')))
            .collect::<Vec<_>>();
        let column = |name: &str| headers.iter().position(|header| header == name);
        let segment = column(SEGMENT_COLUMN)?;
        let region = column(REGION_COLUMN)?;
        Some(Self {
            segment: Some(segment),
            region,
            locale: column(LOCALE_COLUMN),
            years: years
                .iter()
                .filter_map(|year| column(&year.to_string()).map(|idx| (*year, idx)))
                .collect(),
        })
    }
}

fn is_title_or_header(segment: &str) -> bool {
    let normalized = normalize(segment);
    normalized.contains(TITLE_MARKER) || normalized == SEGMENT_COLUMN
}

#[derive(Debug, Deserialize)]
struct RetireeRow {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    masculin: Option<f64>,
    #[serde(default)]
    feminin: Option<f64>,
    #[serde(default)]
    total: Option<f64>,
}

/// Parses the retiree JSON array `[{region, masculin, feminin, total}]`.
///
/// The national `TOTAL` row and rows without a region or total are dropped;
/// missing gender counts read as zero.
pub fn parse_retirees_json(bytes: &[u8]) -> Result<Vec<RetireeRecord>> {
    let rows: Vec<RetireeRow> = serde_json::from_slice(bytes)?;
    let parsed = rows.len();
    let records = rows
        .into_iter()
        .filter_map(|row| {
            let region = row.region?.trim().to_string();
            if region.is_empty() || region.eq_ignore_ascii_case(TOTAL_ROW) {
                return None;
            }
            Some(RetireeRecord {
                region,
                masculin: row.masculin.unwrap_or(0.0),
                feminin: row.feminin.unwrap_or(0.0),
                total: row.total?,
            })
        })
        .collect::<Vec<_>>();
    info!(rows = records.len(), dropped = parsed - records.len(), "parsed retiree table");
    Ok(records)
}

/// Reads boundary features from GeoJSON or TopoJSON.
///
/// For TopoJSON the `regions` object is used when present, otherwise the
/// first object of the topology.
pub fn parse_geography(bytes: &[u8]) -> Result<Vec<GeoFeature>> {
    let root: Value = serde_json::from_slice(bytes)?;
    let features = match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => root
            .get("features")
            .and_then(Value::as_array)
            .ok_or(StatsError::InvalidGeography("feature collection without features"))?
            .iter()
            .map(|feature| feature_from(feature, "geometry"))
            .collect::<Vec<_>>(),
        Some("Topology") => {
            let objects = root
                .get("objects")
                .and_then(Value::as_object)
                .ok_or(StatsError::InvalidGeography("topology without objects"))?;
            let object = objects
                .get("regions")
                .or_else(|| objects.values().next())
                .ok_or(StatsError::InvalidGeography("topology with no object"))?;
            object
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or(StatsError::InvalidGeography("topology object without geometries"))?
                .iter()
                .map(|geometry| feature_from(geometry, "arcs"))
                .collect::<Vec<_>>()
        }
        Some("Feature") => vec![feature_from(&root, "geometry")],
        _ => return Err(StatsError::InvalidGeography("unrecognised geography document")),
    };
    info!(features = features.len(), "parsed geography");
    Ok(features)
}

fn feature_from(value: &Value, geometry_key: &str) -> GeoFeature {
    let name = value
        .get("properties")
        .and_then(|props| props.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let geometry = value.get(geometry_key).cloned().unwrap_or(Value::Null);
    GeoFeature { name, geometry }
}
