use chrono::NaiveDate;
use geo_insights_core::{
    aggregate::{
        composition::{composition_abs, composition_pct, VolumeMetric},
        AggregateResult, SeriesPoint,
    },
    config::GeoConfig,
    dataset::{BuyerType, CityPopulationRow, TransactionRecord},
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
    pipeline::SnapshotPipeline,
    registry::{MetricId, RegistryKey},
    synthetic::{self, SyntheticSpec},
};
use std::collections::BTreeMap;

// ── Helpers ───────────────────────────────────────────────────────

fn taxonomy() -> DistanceTaxonomy {
    DistanceTaxonomy::from_config(&GeoConfig::default_test()).unwrap()
}

fn tx(customer: &str, day: u32, km: f64, revenue: f64) -> TransactionRecord {
    TransactionRecord {
        customer_id: customer.into(),
        created_at: NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap(),
        plz: "803".into(),
        city: Some("Muenchen".into()),
        distance_km: Some(km),
        distance_band: None,
        revenue,
        ftb_rb: BuyerType::FirstTime,
        is_renewal: false,
        channel_type: None,
        platform: None,
        house_id: "h1".into(),
        event_category: None,
    }
}

fn points(result: &AggregateResult) -> &[SeriesPoint] {
    match result {
        AggregateResult::Series { points, .. } => points,
        other => panic!("expected a series, got {other:?}"),
    }
}

fn value(result: &AggregateResult, week: &str, category: &str) -> Option<f64> {
    points(result)
        .iter()
        .find(|p| p.bucket == week && p.category == category)
        .map(|p| p.value)
}

// ── Tests ─────────────────────────────────────────────────────────

#[test]
fn weekly_percentages_sum_to_one_hundred() {
    let config = GeoConfig::default_test();
    let dataset = synthetic::generate(&SyntheticSpec::new(11, 400), &config).unwrap();
    let view = View::from_records(&dataset.transactions);
    let t = taxonomy();

    for scheme in GroupingScheme::ALL {
        let result = composition_pct(&view, &t, scheme, config.pct_decimals);
        let mut weekly: BTreeMap<&str, f64> = BTreeMap::new();
        for p in points(&result) {
            *weekly.entry(p.bucket.as_str()).or_insert(0.0) += p.value;
        }
        assert!(!weekly.is_empty());
        for (week, sum) in weekly {
            assert!(
                (sum - 100.0).abs() <= 0.5,
                "{}: week {week} sums to {sum}",
                scheme.tag()
            );
        }
    }
}

#[test]
fn whole_number_percentages_still_sum_to_one_hundred() {
    let records = vec![
        tx("a", 6, 10.0, 20.0),
        tx("b", 6, 60.0, 20.0),
        tx("c", 6, 150.0, 20.0),
        tx("d", 6, 250.0, 20.0),
        tx("e", 6, 400.0, 20.0),
        tx("f", 6, 800.0, 20.0),
    ];
    let view = View::from_records(&records);
    let config = GeoConfig { pct_decimals: 0, ..GeoConfig::default_test() };
    assert!(config.validate().is_ok());

    let pct = composition_pct(&view, &taxonomy(), GroupingScheme::SixBand, config.pct_decimals);
    let values: Vec<f64> = points(&pct).iter().map(|p| p.value).collect();
    assert_eq!(values.len(), 6);
    assert_eq!(values.iter().sum::<f64>(), 100.0);
    assert_eq!(values.iter().filter(|v| **v == 17.0).count(), 4);
    assert_eq!(values.iter().filter(|v| **v == 16.0).count(), 2);
}

#[test]
fn customer_in_two_bands_counts_once_per_band() {
    let records = vec![
        tx("a", 6, 10.0, 20.0),
        tx("a", 7, 150.0, 30.0),
        tx("b", 8, 10.0, 50.0),
    ];
    let view = View::from_records(&records);
    let t = taxonomy();

    let customers = composition_abs(&view, &t, GroupingScheme::SixBand, VolumeMetric::Customers);
    assert_eq!(value(&customers, "2025-01-06", "0-50km"), Some(2.0));
    assert_eq!(value(&customers, "2025-01-06", "100-200km"), Some(1.0));

    let pct = composition_pct(&view, &t, GroupingScheme::SixBand, 1);
    assert_eq!(value(&pct, "2025-01-06", "0-50km"), Some(66.7));
    assert_eq!(value(&pct, "2025-01-06", "100-200km"), Some(33.3));
}

#[test]
fn revenue_and_spend_per_customer_by_week() {
    let records = vec![
        tx("a", 6, 10.0, 20.0),
        tx("a", 7, 12.0, 30.0),
        tx("b", 8, 40.0, 50.0),
        tx("c", 14, 320.0, 99.0),
    ];
    let view = View::from_records(&records);
    let t = taxonomy();

    let revenue = composition_abs(&view, &t, GroupingScheme::SixBand, VolumeMetric::Revenue);
    assert_eq!(value(&revenue, "2025-01-06", "0-50km"), Some(100.0));
    assert_eq!(value(&revenue, "2025-01-13", "300-500km"), Some(99.0));

    let spc = composition_abs(&view, &t, GroupingScheme::SixBand, VolumeMetric::Spc);
    assert_eq!(value(&spc, "2025-01-06", "0-50km"), Some(50.0));

    let tiers = composition_abs(&view, &t, GroupingScheme::ThreeTier, VolumeMetric::Customers);
    assert_eq!(value(&tiers, "2025-01-13", "National (300km+)"), Some(1.0));
}

#[test]
fn spend_per_customer_of_a_city_without_customers_is_zero() {
    let config = GeoConfig::default_test();
    let mut data = synthetic::generate(&SyntheticSpec::new(5, 150), &config).unwrap();
    data.city_population
        .get_or_insert_with(Vec::new)
        .push(CityPopulationRow { city: "Kiel".into(), population: 250_000.0 });

    let build = SnapshotPipeline::new(config).unwrap().build(&data).unwrap();
    let rows = match build.registry.get_key(&RegistryKey::global(MetricId::CityMap)).unwrap() {
        AggregateResult::CityMap { rows } => rows,
        other => panic!("expected city map, got {other:?}"),
    };
    let kiel = rows.iter().find(|r| r.city == "Kiel").expect("Kiel has a population row");
    assert_eq!(kiel.customers, 0);
    assert_eq!(kiel.spc, 0.0);
    assert!(!kiel.spc.is_nan());
}

#[test]
fn rows_without_a_distance_are_left_out() {
    let mut unknown = tx("z", 6, 0.0, 10.0);
    unknown.distance_km = None;
    let records = vec![unknown, tx("a", 6, 10.0, 20.0)];
    let view = View::from_records(&records);

    let pct = composition_pct(&view, &taxonomy(), GroupingScheme::SixBand, 1);
    assert_eq!(points(&pct).len(), 1);
    assert_eq!(value(&pct, "2025-01-06", "0-50km"), Some(100.0));
}

#[test]
fn precomputed_band_label_wins_over_distance() {
    let mut labelled = tx("a", 6, 10.0, 20.0);
    labelled.distance_band = Some("500+km".into());
    let records = vec![labelled];
    let view = View::from_records(&records);

    let customers = composition_abs(&view, &taxonomy(), GroupingScheme::SixBand, VolumeMetric::Customers);
    assert_eq!(value(&customers, "2025-01-06", "500+km"), Some(1.0));
    assert_eq!(value(&customers, "2025-01-06", "0-50km"), None);
}

#[test]
fn empty_view_yields_no_points() {
    let view = View::default();
    let pct = composition_pct(&view, &taxonomy(), GroupingScheme::ThreeTier, 1);
    assert!(pct.is_empty());
    assert!(!pct.is_unavailable());
}
