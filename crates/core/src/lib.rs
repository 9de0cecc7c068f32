mod config;
mod context;
mod controller;
mod error;
mod index;
mod loader;
mod matcher;
mod merge;
mod normalization;
mod query;
mod record;
mod schema;
mod source;
mod tables;

pub use config::{FetchConfig, MatchingConfig, SourcesConfig, StatsConfig, DEFAULT_CONFIG};
pub use context::{Pipeline, StatsContext};
pub use controller::{Controller, Filter, SelectionView, View};
pub use error::{Result, StatsError};
pub use index::DataIndex;
pub use loader::{parse_geography, parse_retirees_json, parse_unemployment_csv, GeoFeature};
pub use matcher::{MatchPolicy, RegionMatcher};
pub use merge::{bubbles, merge, ranked, GenderShare, MergedFeature, RankOrder};
pub use normalization::{compact, normalize};
pub use query::{
    write_export_csv, ColorScale, Comparison, Dataset, ExportRow, NamedSeries, RegionExport,
    SeriesPoint, UrbanRural,
};
pub use record::{
    format_cell, parse_cell, Locale, RawRecord, RetireeRecord, ABSENT_PLACEHOLDER, SEGMENT_FEMALE,
    SEGMENT_MALE, SEGMENT_TOTAL,
};
pub use schema::{GapFill, Schema, RETIREE_YEAR, UNEMPLOYMENT_YEARS};
pub use source::{fetch_bytes, fetch_inputs, DataSource, FetchPolicy, RawInputs};
pub use tables::{Baselines, SynonymEntry, SynonymTable, SyntheticReference, AGGREGATE_REGION};
