use chrono::NaiveDate;
use geo_insights_core::{
    aggregate::{
        maps::{city_map, plz_map},
        AggregateResult, CityMapRow, PlzMapRow,
    },
    config::GeoConfig,
    dataset::{BuyerType, CityPopulationRow, Dataset, GeoDimensionRow, TransactionRecord},
};

// ── Helpers ───────────────────────────────────────────────────────

fn geo(plz: &str, name: &str, lat: f64, lon: f64, population: Option<f64>) -> GeoDimensionRow {
    GeoDimensionRow { plz: plz.into(), latitude: lat, longitude: lon, population, name: name.into() }
}

fn tx(customer: &str, plz: &str, city: &str, revenue: f64) -> TransactionRecord {
    TransactionRecord {
        customer_id: customer.into(),
        created_at: NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        plz: plz.into(),
        city: Some(city.into()),
        distance_km: Some(12.0),
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

fn dataset() -> Dataset {
    Dataset::new(vec![
        tx("a", "101", "Berlin", 30.0),
        tx("b", "102", "Berlin", 70.0),
        tx("a", "102", "Berlin", 20.0),
        tx("c", "010", "Dresden", 50.0),
    ])
    .with_geo(vec![
        geo("010", "Dresden", 51.0, 13.7, Some(500_000.0)),
        geo("101", "Berlin-Mitte", 52.0, 13.0, Some(3_000_000.0)),
        geo("102", "Berlin-Ost", 53.0, 14.0, Some(1_000_000.0)),
        geo("990", "Nowhere", 50.0, 11.0, None),
    ])
}

fn plz_rows(result: &AggregateResult) -> &[PlzMapRow] {
    match result {
        AggregateResult::PlzMap { rows } => rows,
        other => panic!("expected plz map, got {other:?}"),
    }
}

fn city_rows(result: &AggregateResult) -> &[CityMapRow] {
    match result {
        AggregateResult::CityMap { rows } => rows,
        other => panic!("expected city map, got {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[test]
fn merged_codes_fold_into_one_weighted_point() {
    let result = plz_map(&dataset(), &GeoConfig::default_test()).unwrap();
    let rows = plz_rows(&result);
    let keys: Vec<&str> = rows.iter().map(|r| r.geo_key.as_str()).collect();
    assert_eq!(keys, vec!["010", "990", "Berlin"]);

    let berlin = &rows[2];
    assert_eq!(berlin.name, "Berlin");
    assert_eq!(berlin.population, 4_000_000.0);
    assert!((berlin.latitude.unwrap() - 52.25).abs() < 1e-9);
    assert!((berlin.longitude.unwrap() - 13.25).abs() < 1e-9);
    assert_eq!(berlin.customers, 2, "a appears under two codes but once in Berlin");
    assert_eq!(berlin.revenue, 120.0);
    assert_eq!(berlin.rev_per_1k, 0.03);
}

#[test]
fn zero_population_area_has_no_coordinates_and_zero_rates() {
    let result = plz_map(&dataset(), &GeoConfig::default_test()).unwrap();
    let nowhere = &plz_rows(&result)[1];
    assert_eq!(nowhere.latitude, None);
    assert_eq!(nowhere.longitude, None);
    assert_eq!(nowhere.customers, 0);
    assert_eq!(nowhere.activation, 0.0);
}

#[test]
fn city_map_derives_population_without_city_table() {
    let result = city_map(&dataset(), &GeoConfig::default_test()).unwrap();
    let rows = city_rows(&result);
    let names: Vec<&str> = rows.iter().map(|r| r.city.as_str()).collect();
    assert_eq!(names, vec!["Berlin", "Dresden", "Nowhere"]);
    assert_eq!(rows[0].spc, 60.0);
    assert_eq!(rows[2].spc, 0.0, "no customers, no division");
}

#[test]
fn city_map_prefers_the_city_population_table() {
    let data = dataset().with_city_population(vec![
        CityPopulationRow { city: "Dresden".into(), population: 560_000.0 },
        CityPopulationRow { city: "Berlin".into(), population: 3_700_000.0 },
    ]);
    let result = city_map(&data, &GeoConfig::default_test()).unwrap();
    let rows = city_rows(&result);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].city, "Berlin");
    assert_eq!(rows[0].population, 3_700_000.0);
    assert_eq!(rows[1].customers, 1);
    assert_eq!(rows[1].revenue, 50.0);
}

#[test]
fn maps_need_the_geo_dimension() {
    let data = Dataset::new(vec![tx("a", "101", "Berlin", 30.0)]);
    assert!(plz_map(&data, &GeoConfig::default_test()).is_err());
    assert!(city_map(&data, &GeoConfig::default_test()).is_err());
}
