use chrono::NaiveDate;
use geo_insights_core::{
    aggregate::{
        city::{city_performance, rank_cities, CityActivity},
        AggregateResult,
    },
    dataset::{BuyerType, CityPopulationRow, Dataset, TransactionRecord},
    error::GeoError,
    filter::View,
};
use std::collections::BTreeMap;

// ── Helpers ───────────────────────────────────────────────────────

fn city(name: &str, population: f64) -> CityPopulationRow {
    CityPopulationRow { city: name.into(), population }
}

fn activity(entries: &[(&str, u64, f64)]) -> BTreeMap<String, CityActivity> {
    entries
        .iter()
        .map(|(name, customers, revenue)| {
            (name.to_string(), CityActivity { customers: *customers, revenue: *revenue })
        })
        .collect()
}

fn tx(customer: &str, city: Option<&str>, revenue: f64) -> TransactionRecord {
    TransactionRecord {
        customer_id: customer.into(),
        created_at: NaiveDate::from_ymd_opt(2025, 2, 3)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap(),
        plz: "283".into(),
        city: city.map(Into::into),
        distance_km: Some(5.0),
        distance_band: None,
        revenue,
        ftb_rb: BuyerType::Returning,
        is_renewal: false,
        channel_type: None,
        platform: None,
        house_id: "h1".into(),
        event_category: None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[test]
fn cities_rank_by_population_not_customers() {
    let populations = vec![city("B", 50_000.0), city("A", 100_000.0)];
    let seen = activity(&[("A", 50, 1_000.0), ("B", 200, 5_000.0)]);

    let rows = rank_cities(&populations, &seen, 20, 2);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].city, "A", "A has the larger population");
    assert_eq!(rows[0].activation, 0.5);
    assert_eq!(rows[1].city, "B");
    assert_eq!(rows[1].rev_per_1k, 100.0);
}

#[test]
fn truncation_happens_after_the_join() {
    let populations = vec![
        city("Big", 900_000.0),
        city("Mid", 500_000.0),
        city("Quiet", 400_000.0),
        city("Small", 10_000.0),
    ];
    // Quiet has no activity and drops out of the inner join, so Small
    // is not pushed out by it; Small still loses on population.
    let seen = activity(&[("Big", 10, 100.0), ("Mid", 5, 50.0), ("Small", 900, 9_000.0)]);

    let rows = rank_cities(&populations, &seen, 2, 2);
    let names: Vec<&str> = rows.iter().map(|r| r.city.as_str()).collect();
    assert_eq!(names, vec!["Big", "Mid"]);

    let rows = rank_cities(&populations, &seen, 3, 2);
    let names: Vec<&str> = rows.iter().map(|r| r.city.as_str()).collect();
    assert_eq!(names, vec!["Big", "Mid", "Small"]);
}

#[test]
fn city_table_counts_distinct_customers_and_sums_revenue() {
    let data = Dataset::new(vec![
        tx("a", Some("Bremen"), 10.0),
        tx("a", Some("Bremen"), 15.0),
        tx("b", Some("Bremen"), 25.0),
        tx("c", None, 99.0),
        tx("d", Some("Nowhere"), 5.0),
    ])
    .with_city_population(vec![city("Bremen", 500_000.0), city("Hannover", 530_000.0)]);
    let view = View::from_records(&data.transactions);

    let AggregateResult::CityTable { rows } = city_performance(&view, &data, 20, 2).unwrap() else {
        panic!("expected a city table");
    };
    assert_eq!(rows.len(), 1, "Hannover has no customers, Nowhere no population");
    assert_eq!(rows[0].city, "Bremen");
    assert_eq!(rows[0].customers, 2);
    assert_eq!(rows[0].revenue, 50.0);
    assert_eq!(rows[0].rev_per_1k, 0.1);
}

#[test]
fn city_table_without_population_is_a_missing_dependency() {
    let data = Dataset::new(vec![tx("a", Some("Bremen"), 10.0)]);
    let view = View::from_records(&data.transactions);
    let err = city_performance(&view, &data, 20, 2).unwrap_err();
    assert!(matches!(err, GeoError::MissingDependency { ref table } if table == "city_population"));
}
