use geo_insights_core::{
    aggregate::AggregateResult,
    error::GeoError,
    filter::{CustomerType, FilterCombo, RenewalMode},
    geo::GroupingScheme,
    registry::{MetricId, Registry, RegistryKey},
};
use std::collections::HashSet;

#[test]
fn keys_follow_the_documented_grammar() {
    let combo = FilterCombo::new(CustomerType::Ftb, RenewalMode::Exclude);
    assert_eq!(
        RegistryKey::grouped(MetricId::CompPct, GroupingScheme::SixBand, combo).to_string(),
        "comp_pct_6band__ftb__excl"
    );
    assert_eq!(
        RegistryKey::grouped(MetricId::ActCumul, GroupingScheme::ThreeTier, FilterCombo::DEFAULT).to_string(),
        "act_cumul_3tier__all__incl"
    );
    assert_eq!(
        RegistryKey::ungrouped(MetricId::CityTable, combo).to_string(),
        "city_table__ftb__excl"
    );
    assert_eq!(RegistryKey::global(MetricId::PlzMap).to_string(), "plz_map");
}

#[test]
fn every_key_parses_back_to_its_triple() {
    for key in RegistryKey::all() {
        let parsed: RegistryKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key, "{key}");
    }
}

#[test]
fn malformed_keys_are_rejected() {
    for raw in [
        "comp_pct",                   // missing grouping and filter
        "comp_pct_6band",             // missing filter
        "plz_map_6band",              // maps are ungrouped
        "city_table_3tier__all__incl",
        "unknown_6band__all__incl",
        "comp_pct_6band__all__sometimes",
        "",
    ] {
        let err = raw.parse::<RegistryKey>().unwrap_err();
        assert!(matches!(err, GeoError::InvalidKey { .. }), "{raw}: {err:?}");
    }
}

#[test]
fn a_full_run_has_146_distinct_keys() {
    let keys = RegistryKey::all();
    let unique: HashSet<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(keys.len(), 146);
    assert_eq!(unique.len(), keys.len(), "no two triples may share a key");
    assert_eq!(RegistryKey::for_combo(FilterCombo::DEFAULT).len(), 24);
}

#[test]
fn put_rejects_a_second_write() {
    let mut registry = Registry::new();
    let key = RegistryKey::global(MetricId::CityMap);
    registry.put(key, AggregateResult::unavailable("first")).unwrap();

    let err = registry
        .put(key, AggregateResult::unavailable("second"))
        .unwrap_err();
    assert!(matches!(err, GeoError::DuplicateKey { ref key } if key == "city_map"));
    assert_eq!(registry.get("city_map").unwrap(), &AggregateResult::unavailable("first"));
}

#[test]
fn missing_keys_are_not_found_or_a_placeholder() {
    let registry = Registry::new();
    let err = registry.get("comp_pct_6band__all__incl").unwrap_err();
    assert!(matches!(err, GeoError::KeyNotFound { .. }));
    assert!(registry.get_or_unavailable("comp_pct_6band__all__incl").is_unavailable());
}

#[test]
fn grouping_and_filter_dependence_per_metric() {
    let ungrouped: Vec<&str> = MetricId::ALL
        .iter()
        .filter(|m| !m.grouped())
        .map(|m| m.as_str())
        .collect();
    assert_eq!(ungrouped, vec!["act_by_house", "city_table", "plz_map", "city_map"]);

    let unfiltered: Vec<&str> = MetricId::ALL
        .iter()
        .filter(|m| !m.filtered())
        .map(|m| m.as_str())
        .collect();
    assert_eq!(unfiltered, vec!["plz_map", "city_map"]);

    assert!(RegistryKey::new(MetricId::Fts, Some(GroupingScheme::SixBand), None).is_err());
    assert!(RegistryKey::new(MetricId::PlzMap, None, None).is_ok());
}
