use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::loader::{parse_geography, parse_retirees_json, parse_unemployment_csv, GeoFeature};
use crate::matcher::{MatchPolicy, RegionMatcher};
use crate::merge::{merge, MergedFeature};
use crate::query::Dataset;
use crate::record::RetireeRecord;
use crate::schema::Schema;
use crate::source::{fetch_inputs, RawInputs};
use crate::tables::SynonymTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    Retirees,
    #[default]
    Unemployment,
}

impl FromStr for Pipeline {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "retirees" | "retraites" => Ok(Pipeline::Retirees),
            "unemployment" | "chomage" => Ok(Pipeline::Unemployment),
            other => Err(format!("unknown dataset {other}")),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Retirees => f.write_str("retirees"),
            Pipeline::Unemployment => f.write_str("unemployment"),
        }
    }
}

/// Everything loaded at startup. Built once after a successful load and
/// read-only afterwards; a reload builds a new context.
#[derive(Debug, Clone)]
pub struct StatsContext {
    geography: Vec<GeoFeature>,
    retiree_rows: Vec<RetireeRecord>,
    retirees: Dataset,
    unemployment: Dataset,
    retiree_matcher: RegionMatcher,
    unemployment_matcher: RegionMatcher,
}

impl StatsContext {
    pub fn load(config: &StatsConfig) -> Result<Self> {
        let inputs = fetch_inputs(
            &config.sources.geography,
            config.sources.retirees.as_ref(),
            config.sources.unemployment.as_ref(),
            &config.fetch.policy(),
        )?;
        Self::from_inputs(&inputs, config.matching.policy)
    }

    pub fn from_inputs(inputs: &RawInputs, policy: MatchPolicy) -> Result<Self> {
        let geography = parse_geography(&inputs.geography)
            .map_err(|err| StatsError::missing_input("geography", err))?;
        let retiree_rows = match &inputs.retirees {
            Some(bytes) => parse_retirees_json(bytes)
                .map_err(|err| StatsError::missing_input("retirees", err))?,
            None => Vec::new(),
        };
        let unemployment_schema = Schema::unemployment();
        let unemployment_rows = match &inputs.unemployment {
            Some(bytes) => parse_unemployment_csv(bytes.as_slice(), &unemployment_schema.years)
                .map_err(|err| StatsError::missing_input("unemployment", err))?,
            None => Vec::new(),
        };
        Ok(Self::from_parts(
            geography,
            retiree_rows,
            Dataset::from_rows(&unemployment_rows, unemployment_schema),
            policy,
        ))
    }

    pub fn from_parts(
        geography: Vec<GeoFeature>,
        retiree_rows: Vec<RetireeRecord>,
        unemployment: Dataset,
        policy: MatchPolicy,
    ) -> Self {
        let retirees = Dataset::from_retirees(&retiree_rows, Schema::retirees());
        let matcher_for = |dataset: &Dataset| {
            RegionMatcher::new(SynonymTable::morocco(), &dataset.schema().reference, policy)
        };
        let retiree_matcher = matcher_for(&retirees);
        let unemployment_matcher = matcher_for(&unemployment);
        let synonyms = SynonymTable::morocco();
        for (pipeline, dataset) in [
            (Pipeline::Retirees, &retirees),
            (Pipeline::Unemployment, &unemployment),
        ] {
            for region in unreached_regions(dataset, &synonyms, &geography) {
                warn!(dataset = %pipeline, region, "region reachable from neither synonyms nor geography");
            }
        }
        info!(
            features = geography.len(),
            retiree_rows = retiree_rows.len(),
            unemployment_dropped = unemployment.index().dropped_rows(),
            "statistics context ready"
        );
        Self {
            geography,
            retiree_rows,
            retirees,
            unemployment,
            retiree_matcher,
            unemployment_matcher,
        }
    }

    pub fn dataset(&self, pipeline: Pipeline) -> &Dataset {
        match pipeline {
            Pipeline::Retirees => &self.retirees,
            Pipeline::Unemployment => &self.unemployment,
        }
    }

    /// Matcher whose reference fallback is the one of `pipeline`'s dataset.
    fn matcher(&self, pipeline: Pipeline) -> &RegionMatcher {
        match pipeline {
            Pipeline::Retirees => &self.retiree_matcher,
            Pipeline::Unemployment => &self.unemployment_matcher,
        }
    }

    pub fn resolve(&self, pipeline: Pipeline, free_text: &str, segment: &str) -> Option<String> {
        self.dataset(pipeline)
            .resolve(self.matcher(pipeline), free_text, segment)
    }

    /// Map features joined with retiree counts, recomputed on every call.
    pub fn merged(&self) -> Vec<MergedFeature> {
        merge(
            self.matcher(Pipeline::Retirees),
            &self.geography,
            &self.retiree_rows,
        )
    }
}

/// Indexed regions that no synonym entry names and no geography feature
/// carries verbatim.
fn unreached_regions<'a>(
    dataset: &'a Dataset,
    synonyms: &SynonymTable,
    geography: &[GeoFeature],
) -> Vec<&'a str> {
    dataset
        .index()
        .all_regions()
        .into_iter()
        .filter(|region| {
            let named = synonyms.entries().iter().any(|entry| entry.region == *region);
            let drawn = geography.iter().any(|feature| feature.name == *region);
            !named && !drawn
        })
        .collect()
}
