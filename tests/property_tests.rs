// Invariants of key normalization, dedup and the left-join, over generated inputs

use police_analysis::{build_merged_dataset, normalize_city, SourceTables, Table};
use proptest::prelude::*;
use std::collections::HashSet;

/// Latin-1 letters, whitespace and case variants of the suffix tokens
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z\u{c0}-\u{ff}]{1,4}",
        prop::sample::select(vec![
            "city", "town", "City", "TOWN", "cItY", " ", "  ", "\t", "\u{a0}", "-", "\u{96}",
        ])
        .prop_map(String::from),
    ]
}

fn arb_city() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_token(), 0..6).prop_map(|tokens| tokens.concat())
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new(headers.iter().map(|h| h.to_string()).collect());
    for row in rows {
        t.push_row(
            row.into_iter()
                .map(|c| if c.is_empty() { None } else { Some(c) })
                .collect(),
        );
    }
    t
}

fn indicator(header: &str, cities: &[String]) -> Table {
    let rows = cities
        .iter()
        .enumerate()
        .map(|(i, c)| vec!["XX".to_string(), c.clone(), format!("{}.5", i)])
        .collect();
    table(&["Geographic Area", "City", header], rows)
}

proptest! {
    /// normalize_city(normalize_city(s)) == normalize_city(s)
    #[test]
    fn test_normalize_city_is_idempotent_for_any_input(raw in arb_city()) {
        let once = normalize_city(&raw);
        prop_assert_eq!(normalize_city(&once), once);
    }

    /// Normalized keys never keep edge whitespace or uppercase ASCII
    #[test]
    fn test_normalize_city_output_is_trimmed_lowercase(raw in arb_city()) {
        let key = normalize_city(&raw);
        prop_assert_eq!(key.trim(), key.as_str());
        prop_assert!(!key.chars().any(|c| c.is_ascii_uppercase()));
    }

    /// After dedup every key is distinct, and the first row per key survives
    #[test]
    fn test_dedup_leaves_one_row_per_key(cities in prop::collection::vec(arb_city(), 0..40)) {
        let rows = cities
            .iter()
            .enumerate()
            .map(|(i, c)| vec![c.clone(), i.to_string()])
            .collect();
        let mut t = table(&["city", "n"], rows);

        t.normalize_keys(0);
        let dropped = t.dedup_on(0);

        prop_assert_eq!(t.distinct_count(0), t.len());
        prop_assert_eq!(t.len() + dropped, cities.len());

        let keys: Vec<String> = cities.iter().map(|c| normalize_city(c)).collect();
        for row in &t.rows {
            let key = row[0].clone().unwrap_or_default();
            let n: usize = row[1].as_deref().unwrap().parse().unwrap();
            let first = keys.iter().position(|k| *k == key).unwrap();
            prop_assert_eq!(n, first);
        }
    }

    /// The merge never adds or drops fatality rows beyond the dedup
    #[test]
    fn test_merge_preserves_deduplicated_fatality_count(
        fatal_cities in prop::collection::vec(arb_city(), 0..30),
        income_cities in prop::collection::vec(arb_city(), 0..20),
        hs_cities in prop::collection::vec(arb_city(), 0..20),
        poverty_cities in prop::collection::vec(arb_city(), 0..20),
        race_cities in prop::collection::vec(arb_city(), 0..20),
    ) {
        let fatal_rows = fatal_cities
            .iter()
            .enumerate()
            .map(|(i, c)| vec![i.to_string(), format!("person {}", i), c.clone(), "shot".to_string()])
            .collect();
        let fatalities = table(&["id", "name", "city", "manner_of_death"], fatal_rows);

        let expected = fatal_cities
            .iter()
            .map(|c| normalize_city(c))
            .collect::<HashSet<_>>()
            .len();

        let sources = SourceTables {
            fatalities,
            income: indicator("Median Income", &income_cities),
            high_school: indicator("percent_completed_hs", &hs_cities),
            poverty: indicator("poverty_rate", &poverty_cities),
            race: indicator("share_white", &race_cities),
        };

        let out = build_merged_dataset(sources).unwrap();

        prop_assert_eq!(out.records.len(), expected);
        prop_assert_eq!(out.stats.final_rows, expected);
        prop_assert!(out.stats.rows_after_join.iter().all(|&n| n == expected));

        let distinct: HashSet<&str> = out.records.iter().map(|r| r.city.as_str()).collect();
        prop_assert_eq!(distinct.len(), out.records.len());
    }
}
