use serde::{Deserialize, Serialize};

use crate::tables::SyntheticReference;

pub const UNEMPLOYMENT_YEARS: std::ops::RangeInclusive<u16> = 2015..=2023;
pub const RETIREE_YEAR: u16 = 2022;

/// Linear-in-year adjustment applied to a baseline when no observation exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapFill {
    /// Position in the year sequence where the estimate equals the baseline.
    pub baseline_index: usize,
    pub slope: f64,
}

impl Default for GapFill {
    fn default() -> Self {
        Self {
            baseline_index: 4,
            slope: 0.3,
        }
    }
}

impl GapFill {
    pub fn estimate(&self, baseline: f64, year_index: usize) -> f64 {
        let offset = year_index as f64 - self.baseline_index as f64;
        round_one_decimal(baseline + offset * self.slope)
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// What a dataset looks like: its year columns and how gaps are filled.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: &'static str,
    pub years: Vec<u16>,
    pub gap_fill: Option<GapFill>,
    pub reference: SyntheticReference,
}

impl Schema {
    pub fn unemployment() -> Self {
        Self {
            name: "unemployment",
            years: UNEMPLOYMENT_YEARS.collect(),
            gap_fill: Some(GapFill::default()),
            reference: SyntheticReference::morocco(),
        }
    }

    pub fn retirees() -> Self {
        Self {
            name: "retirees",
            years: vec![RETIREE_YEAR],
            gap_fill: None,
            reference: SyntheticReference::empty(),
        }
    }

    pub fn year_index(&self, year: u16) -> Option<usize> {
        self.years.iter().position(|candidate| *candidate == year)
    }

    pub fn latest_year(&self) -> Option<u16> {
        self.years.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_linear_around_baseline_year() {
        let gap_fill = GapFill::default();
        assert_eq!(gap_fill.estimate(12.5, 8), 13.7);
        assert_eq!(gap_fill.estimate(12.5, 4), 12.5);
        assert_eq!(gap_fill.estimate(12.5, 0), 11.3);
    }

    #[test]
    fn year_positions() {
        let schema = Schema::unemployment();
        assert_eq!(schema.years.len(), 9);
        assert_eq!(schema.year_index(2015), Some(0));
        assert_eq!(schema.year_index(2019), Some(4));
        assert_eq!(schema.year_index(2023), Some(8));
        assert_eq!(schema.year_index(2030), None);
        assert_eq!(Schema::retirees().latest_year(), Some(RETIREE_YEAR));
    }
}
