use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::normalization::normalize;
use crate::record::{Locale, RawRecord};

pub type YearValues = BTreeMap<u16, Option<f64>>;
pub type LocaleMap = IndexMap<Locale, YearValues>;
pub type RegionMap = IndexMap<String, LocaleMap>;

/// segment → region → locale → year → value.
///
/// Built once from the raw rows and read-only afterwards; a reload builds a
/// fresh index.
#[derive(Debug, Clone, Default)]
pub struct DataIndex {
    segments: IndexMap<String, RegionMap>,
    dropped: usize,
}

impl DataIndex {
    pub fn build(rows: &[RawRecord]) -> Self {
        let mut segments: IndexMap<String, RegionMap> = IndexMap::new();
        let mut dropped = 0usize;
        for row in rows {
            let Some((segment, region, locale)) = identify(row) else {
                dropped += 1;
                debug!(
                    segment = ?row.segment,
                    region = ?row.region,
                    locale = ?row.locale,
                    "dropping row without identity"
                );
                continue;
            };
            let years: YearValues = row.values.iter().copied().collect();
            segments
                .entry(segment)
                .or_default()
                .entry(region)
                .or_default()
                .insert(locale, years);
        }
        Self { segments, dropped }
    }

    /// Point lookup; `None` covers every kind of missing data.
    pub fn get(&self, segment: &str, region: &str, locale: Locale, year: u16) -> Option<f64> {
        self.segment(segment)?
            .get(region)?
            .get(&locale)?
            .get(&year)
            .copied()
            .flatten()
    }

    /// Regions with at least one row for `segment`, in load order.
    pub fn regions(&self, segment: &str) -> impl Iterator<Item = &str> {
        self.segment(segment)
            .into_iter()
            .flat_map(|regions| regions.keys().map(String::as_str))
    }

    /// Every region with a row in any segment, in load order.
    pub fn all_regions(&self) -> IndexSet<&str> {
        self.segments
            .values()
            .flat_map(|regions| regions.keys().map(String::as_str))
            .collect()
    }

    /// Number of rows dropped at build time for missing identifying fields.
    pub fn dropped_rows(&self) -> usize {
        self.dropped
    }

    /// Exact segment key first, then a normalized comparison so that
    /// `Feminin` finds `Féminin`.
    fn segment(&self, segment: &str) -> Option<&RegionMap> {
        if let Some(regions) = self.segments.get(segment) {
            return Some(regions);
        }
        let wanted = normalize(segment);
        self.segments
            .iter()
            .find(|(key, _)| normalize(key) == wanted)
            .map(|(_, regions)| regions)
    }
}

fn identify(row: &RawRecord) -> Option<(String, String, Locale)> {
    let segment = non_blank(row.segment.as_deref())?;
    let region = non_blank(row.region.as_deref())?;
    let locale = non_blank(row.locale.as_deref())?.parse::<Locale>().ok()?;
    Some((segment.to_string(), region.to_string(), locale))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(segment: Option<&str>, region: Option<&str>, locale: Option<&str>) -> RawRecord {
        RawRecord {
            segment: segment.map(str::to_string),
            region: region.map(str::to_string),
            locale: locale.map(str::to_string),
            values: vec![(2015, Some(10.0)), (2016, None)],
        }
    }

    #[test]
    fn builds_nested_lookup() {
        let index = DataIndex::build(&[
            row(Some("Total"), Some("Oriental"), Some("National")),
            row(Some("Total"), Some("Oriental"), Some("Urbain")),
        ]);
        assert_eq!(index.get("Total", "Oriental", Locale::National, 2015), Some(10.0));
        assert_eq!(index.get("Total", "Oriental", Locale::Urbain, 2015), Some(10.0));
        assert_eq!(index.get("Total", "Oriental", Locale::National, 2016), None);
        assert_eq!(index.get("Total", "Oriental", Locale::Rural, 2015), None);
        assert_eq!(index.get("Total", "Nowhere", Locale::National, 2015), None);
        assert_eq!(index.get("Hommes", "Oriental", Locale::National, 2015), None);
        assert_eq!(index.regions("Total").collect::<Vec<_>>(), vec!["Oriental"]);
    }

    #[test]
    fn drops_rows_missing_identity() {
        let index = DataIndex::build(&[
            row(Some("Total"), None, Some("National")),
            row(None, Some("Oriental"), Some("National")),
            row(Some("Total"), Some("  "), Some("National")),
            row(Some("Total"), Some("Oriental"), Some("Banlieue")),
            row(Some("Total"), Some("Souss-Massa"), Some("National")),
        ]);
        assert_eq!(index.dropped_rows(), 4);
        assert_eq!(index.regions("Total").collect::<Vec<_>>(), vec!["Souss-Massa"]);
    }

    #[test]
    fn segment_lookup_ignores_accents() {
        let index = DataIndex::build(&[row(Some("Féminin"), Some("Oriental"), Some("National"))]);
        assert_eq!(index.get("Feminin", "Oriental", Locale::National, 2015), Some(10.0));
        assert_eq!(index.regions("feminin").count(), 1);
    }

    #[test]
    fn all_regions_spans_segments() {
        let index = DataIndex::build(&[
            row(Some("Féminin"), Some("Oriental"), Some("National")),
            row(Some("Total"), Some("Souss-Massa"), Some("National")),
            row(Some("Total"), Some("Oriental"), Some("Rural")),
        ]);
        assert_eq!(
            index.all_regions().into_iter().collect::<Vec<_>>(),
            vec!["Oriental", "Souss-Massa"]
        );
    }

    #[test]
    fn later_rows_replace_same_cell() {
        let mut second = row(Some("Total"), Some("Oriental"), Some("National"));
        second.values = vec![(2015, Some(11.0))];
        let index = DataIndex::build(&[row(Some("Total"), Some("Oriental"), Some("National")), second]);
        assert_eq!(index.get("Total", "Oriental", Locale::National, 2015), Some(11.0));
    }
}
