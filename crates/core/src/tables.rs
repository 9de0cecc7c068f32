//! Static reference tables: alternate region spellings and the synthetic
//! baselines used when a region has no observation.

use serde::Serialize;

use crate::record::Locale;

/// Aggregate bucket covering the whole country; never listed as a region.
pub const AGGREGATE_REGION: &str = "Ensemble";

const MOROCCO_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "Tanger-Tétouan-Al Hoceïma",
        &["Tanger-Tetouan-Al Hoceima", "Tangier-Tetouan-Al Hoceima"],
    ),
    ("Oriental", &["Oriental", "L'Oriental"]),
    ("Fès-Meknès", &["Fes-Meknes", "Fès-Meknès", "Fez-Meknes"]),
    ("Rabat-Salé-Kénitra", &["Rabat-Sale-Kenitra", "Rabat-Salé-Kénitra"]),
    (
        "Béni Mellal-Khénifra",
        &["Beni Mellal-Khenifra", "Béni Mellal-Khénifra"],
    ),
    ("Casablanca-settat", &["Casablanca-Settat", "Grand Casablanca"]),
    ("Marrakech-safi", &["Marrakech-Safi", "Marrakesh-Safi"]),
    ("Drâa-Tafilalet", &["Draa-Tafilalet", "Drâa-Tafilalet"]),
    ("Souss-Massa", &["Souss-Massa", "Souss-Massa-Draa"]),
    (
        "Régions du Sud",
        &[
            "Guelmim-Oued Noun",
            "Laayoune-Sakia El Hamra",
            "Dakhla-Oued Ed-Dahab",
        ],
    ),
    (AGGREGATE_REGION, &["Ensemble", "National"]),
];

// national, urbain, rural
const MOROCCO_BASELINES: &[(&str, [f64; 3])] = &[
    ("Fès-Meknès", [12.5, 15.2, 8.3]),
    ("Rabat-Salé-Kénitra", [14.8, 17.5, 9.1]),
    ("Béni Mellal-Khénifra", [9.2, 11.8, 6.5]),
    ("Casablanca-settat", [16.5, 18.9, 10.2]),
    ("Marrakech-safi", [11.3, 14.6, 7.8]),
    ("Drâa-Tafilalet", [8.7, 10.9, 6.2]),
    ("Souss-Massa", [10.5, 13.2, 7.1]),
    ("Régions du Sud", [15.8, 19.2, 11.5]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynonymEntry {
    pub region: String,
    pub synonyms: Vec<String>,
}

/// Canonical region → alternate spellings, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

impl SynonymTable {
    pub fn new(entries: Vec<SynonymEntry>) -> Self {
        Self { entries }
    }

    pub fn morocco() -> Self {
        let entries = MOROCCO_SYNONYMS
            .iter()
            .map(|(region, synonyms)| SynonymEntry {
                region: region.to_string(),
                synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SynonymEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baselines {
    pub national: f64,
    pub urbain: f64,
    pub rural: f64,
}

impl Baselines {
    pub fn for_locale(&self, locale: Locale) -> f64 {
        match locale {
            Locale::National => self.national,
            Locale::Urbain => self.urbain,
            Locale::Rural => self.rural,
        }
    }
}

/// Canonical region → per-locale baseline for synthetic estimates.
#[derive(Debug, Clone, Default)]
pub struct SyntheticReference {
    entries: Vec<(String, Baselines)>,
}

impl SyntheticReference {
    pub fn new(entries: Vec<(String, Baselines)>) -> Self {
        Self { entries }
    }

    pub fn morocco() -> Self {
        let entries = MOROCCO_BASELINES
            .iter()
            .map(|(region, [national, urbain, rural])| {
                (
                    region.to_string(),
                    Baselines {
                        national: *national,
                        urbain: *urbain,
                        rural: *rural,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn baseline(&self, region: &str, locale: Locale) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == region)
            .map(|(_, baselines)| baselines.for_locale(locale))
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonym_table_keeps_insertion_order() {
        let table = SynonymTable::morocco();
        let first = &table.entries()[0];
        assert_eq!(first.region, "Tanger-Tétouan-Al Hoceïma");
        assert_eq!(table.entries().last().unwrap().region, AGGREGATE_REGION);
        assert_eq!(table.entries()[1].region, "Oriental");
        assert_eq!(table.entries()[1].synonyms, vec!["Oriental", "L'Oriental"]);
    }

    #[test]
    fn baselines_per_locale() {
        let reference = SyntheticReference::morocco();
        assert_eq!(reference.baseline("Fès-Meknès", Locale::National), Some(12.5));
        assert_eq!(reference.baseline("Fès-Meknès", Locale::Rural), Some(8.3));
        assert_eq!(reference.baseline("Oriental", Locale::National), None);
        assert_eq!(reference.regions().count(), 8);
        assert!(SyntheticReference::empty().is_empty());
    }
}
