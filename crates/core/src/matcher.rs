use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::normalization::{loosely_contains, normalize};
use crate::tables::{SynonymTable, SyntheticReference};

/// How synonym matches compete when several canonical regions qualify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Table order, first satisfying synonym wins.
    #[default]
    First,
    /// Exact synonym matches before substring matches; among substring
    /// matches the longest synonym wins, table order breaking ties.
    Specific,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "specific" => Ok(MatchPolicy::Specific),
            other => Err(format!("unknown match policy {other}")),
        }
    }
}

/// Maps free-text region names onto the canonical keys of a statistics table.
#[derive(Debug, Clone)]
pub struct RegionMatcher {
    synonyms: SynonymTable,
    reference_regions: Vec<String>,
    policy: MatchPolicy,
}

impl Default for RegionMatcher {
    fn default() -> Self {
        Self::new(
            SynonymTable::morocco(),
            &SyntheticReference::morocco(),
            MatchPolicy::First,
        )
    }
}

impl RegionMatcher {
    pub fn new(synonyms: SynonymTable, reference: &SyntheticReference, policy: MatchPolicy) -> Self {
        Self {
            synonyms,
            reference_regions: reference.regions().map(str::to_string).collect(),
            policy,
        }
    }

    /// Resolves `free_text` to one of `available`, or to a synthetic-reference
    /// region, trying in order: exact key, synonym table, loose containment
    /// against `available`, loose containment against the reference keys.
    pub fn resolve(&self, free_text: &str, available: &IndexSet<String>) -> Option<String> {
        if available.contains(free_text) {
            return Some(free_text.to_string());
        }
        let needle = normalize(free_text);
        if needle.is_empty() {
            return None;
        }
        if let Some(region) = self.resolve_synonym(&needle, available) {
            return Some(region.to_string());
        }
        if let Some(region) = available.iter().find(|region| loosely_contains(&needle, region)) {
            return Some(region.clone());
        }
        self.reference_regions
            .iter()
            .find(|region| loosely_contains(&needle, region))
            .cloned()
    }

    fn resolve_synonym<'a>(&'a self, needle: &str, available: &IndexSet<String>) -> Option<&'a str> {
        let mut best: Option<(&str, usize)> = None;
        for entry in self.synonyms.entries() {
            if !available.contains(entry.region.as_str()) {
                continue;
            }
            for synonym in &entry.synonyms {
                let synonym = normalize(synonym);
                if synonym.is_empty() {
                    continue;
                }
                let exact = synonym == needle;
                let overlaps = needle.contains(&synonym) || synonym.contains(needle);
                if !exact && !overlaps {
                    continue;
                }
                match self.policy {
                    MatchPolicy::First => return Some(entry.region.as_str()),
                    MatchPolicy::Specific => {
                        if exact {
                            return Some(entry.region.as_str());
                        }
                        let longer = best.map_or(true, |(_, len)| synonym.len() > len);
                        if longer {
                            best = Some((entry.region.as_str(), synonym.len()));
                        }
                    }
                }
            }
        }
        best.map(|(region, _)| region)
    }
}
