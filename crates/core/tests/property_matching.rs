use indexmap::IndexSet;
use maroc_stats_core::{normalize, MatchPolicy, RegionMatcher, SynonymTable, SyntheticReference};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalize_is_idempotent(name in region_like()) {
        let once = normalize(&name);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert_eq!(once.trim(), once.as_str());
        prop_assert!(!once.contains("  "));
        prop_assert!(!once.contains('-'));
    }

    #[test]
    fn normalize_ignores_case_accents_and_hyphens(name in region_like()) {
        let expected = normalize(&name);
        prop_assert_eq!(normalize(&name.to_uppercase()), expected.clone());
        prop_assert_eq!(normalize(&strip_accents(&name)), expected.clone());
        prop_assert_eq!(normalize(&name.replace('-', " ")), expected);
    }

    #[test]
    fn synonyms_resolve_to_their_region(
        (entry_idx, synonym_idx, extra) in synonym_pick(),
        specific in any::<bool>(),
    ) {
        let table = SynonymTable::morocco();
        let entry = &table.entries()[entry_idx];
        let synonym = &entry.synonyms[synonym_idx % entry.synonyms.len()];
        let mut available = table
            .entries()
            .iter()
            .zip(extra)
            .filter(|(_, keep)| *keep)
            .map(|(other, _)| other.region.clone())
            .collect::<IndexSet<_>>();
        available.insert(entry.region.clone());
        let policy = if specific { MatchPolicy::Specific } else { MatchPolicy::First };
        let matcher = RegionMatcher::new(table.clone(), &SyntheticReference::morocco(), policy);
        prop_assert_eq!(matcher.resolve(synonym, &available), Some(entry.region.clone()));
    }
}

fn region_like() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            'a', 'à', 'â', 'ä', 'e', 'é', 'è', 'ê', 'ë', 'i', 'î', 'ï', 'o', 'ô', 'ö', 'u',
            'ù', 'û', 'ü', 'c', 'ç', 'k', 'm', 's', 'D', 'É', ' ', '-', '\'', '\t',
        ]),
        0..24,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn synonym_pick() -> impl Strategy<Value = (usize, usize, Vec<bool>)> {
    let entries = SynonymTable::morocco().entries().len();
    (
        0..entries,
        0..8usize,
        prop::collection::vec(any::<bool>(), entries),
    )
}

fn strip_accents(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' => 'E',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
