//! Synthetic dataset generator.
//!
//! Produces a complete, internally consistent dataset (transactions plus
//! every auxiliary table) from a seed. Same seed, same spec: identical
//! dataset, row for row.
//!
//! The geography is a fixed catalogue of German 3-digit PLZ groups,
//! including several Berlin and Hamburg groups so the merge table has
//! something to fold.

use crate::{
    config::GeoConfig,
    dataset::{
        BuyerType, CityPopulationRow, Dataset, GeoDimensionRow, HouseMeta, HousePopulationRow,
        TransactionRecord,
    },
    error::GeoResult,
    rng::{RngBank, TableRng, TableSlot},
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::distributions::WeightedIndex;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub seed: u64,
    pub customers: usize,
    pub weeks: u32,
    /// Monday of the first generated week.
    pub start: NaiveDate,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            customers: 2_000,
            weeks: 12,
            start: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default(),
        }
    }
}

impl SyntheticSpec {
    pub fn new(seed: u64, customers: usize) -> Self {
        Self { seed, customers, ..Self::default() }
    }
}

// ── Catalogues ───────────────────────────────────────────────────────────────

/// (plz, name, latitude, longitude, population)
const GEO_CATALOGUE: &[(&str, &str, f64, f64, f64)] = &[
    ("010", "Dresden", 51.05, 13.74, 310_000.0),
    ("041", "Leipzig", 51.34, 12.37, 420_000.0),
    ("101", "Berlin-Mitte", 52.52, 13.40, 380_000.0),
    ("104", "Berlin-Prenzlauer Berg", 52.54, 13.42, 290_000.0),
    ("120", "Berlin-Neukoelln", 52.48, 13.44, 330_000.0),
    ("130", "Berlin-Spandau", 52.54, 13.20, 0.0),
    ("200", "Hamburg-Altstadt", 53.55, 9.99, 250_000.0),
    ("220", "Hamburg-Wandsbek", 53.58, 10.08, 410_000.0),
    ("283", "Bremen", 53.08, 8.80, 560_000.0),
    ("301", "Hannover", 52.37, 9.73, 530_000.0),
    ("401", "Duesseldorf", 51.23, 6.78, 620_000.0),
    ("451", "Essen", 51.46, 7.01, 580_000.0),
    ("503", "Koeln", 50.94, 6.96, 1_080_000.0),
    ("603", "Frankfurt", 50.11, 8.68, 750_000.0),
    ("702", "Stuttgart", 48.78, 9.18, 630_000.0),
    ("803", "Muenchen", 48.14, 11.58, 1_480_000.0),
    ("904", "Nuernberg", 49.45, 11.08, 520_000.0),
    ("992", "Erfurt", 50.98, 11.03, 0.0),
];

/// (house_id, name, rank, latitude, longitude)
const HOUSES: &[(&str, &str, i64, f64, f64)] = &[
    ("h-ber", "Berlin Arena", 1, 52.51, 13.45),
    ("h-ham", "Hamburg Hall", 2, 53.56, 10.01),
    ("h-muc", "Munich Dome", 3, 48.15, 11.55),
    ("h-cgn", "Cologne Stage", 4, 50.94, 6.98),
];

/// (channel_type, platform, weight)
const CHANNELS: &[(&str, &str, f64)] = &[
    ("Paid Social", "Meta", 0.34),
    ("Paid Search", "Google", 0.26),
    ("Direct", "Direct", 0.18),
    ("Organic", "Organic", 0.14),
    ("Referral", "Partner", 0.08),
];

const EVENT_CATEGORIES: &[&str] = &["Comedy", "Concert", "Sports", "Theatre"];

// ── Generator ────────────────────────────────────────────────────────────────

/// Great-circle distance in km.
fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * 6_371.0 * h.sqrt().asin()
}

fn city_name(plz: &str, name: &str, config: &GeoConfig) -> String {
    config
        .merge_table
        .get(plz)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

pub fn geo_dimension() -> Vec<GeoDimensionRow> {
    GEO_CATALOGUE
        .iter()
        .map(|(plz, name, lat, lon, pop)| GeoDimensionRow {
            plz: plz.to_string(),
            latitude: *lat,
            longitude: *lon,
            population: (*pop > 0.0).then_some(*pop),
            name: name.to_string(),
        })
        .collect()
}

pub fn houses() -> Vec<HouseMeta> {
    HOUSES
        .iter()
        .map(|(id, name, rank, _, _)| HouseMeta {
            house_id: id.to_string(),
            name: name.to_string(),
            rank: *rank,
        })
        .collect()
}

/// Cumulative catchment per house at every band boundary, plus the total
/// catchment row (`radius_km = None`).
pub fn house_population(config: &GeoConfig) -> Vec<HousePopulationRow> {
    let mut rows = Vec::new();
    for (id, _, _, lat, lon) in HOUSES {
        let within = |radius: f64| -> f64 {
            GEO_CATALOGUE
                .iter()
                .filter(|(_, _, plat, plon, _)| haversine_km((*lat, *lon), (*plat, *plon)) < radius)
                .map(|(_, _, _, _, pop)| pop)
                .sum()
        };
        for boundary in &config.band_boundaries_km {
            rows.push(HousePopulationRow {
                house_id: id.to_string(),
                radius_km: Some(*boundary),
                population: within(*boundary),
            });
        }
        rows.push(HousePopulationRow {
            house_id: id.to_string(),
            radius_km: None,
            population: within(f64::INFINITY),
        });
    }
    rows
}

pub fn city_population(config: &GeoConfig) -> Vec<CityPopulationRow> {
    let mut cities: BTreeMap<String, f64> = BTreeMap::new();
    for (plz, name, _, _, pop) in GEO_CATALOGUE {
        *cities.entry(city_name(plz, name, config)).or_insert(0.0) += pop;
    }
    cities
        .into_iter()
        .filter(|(_, population)| *population > 0.0)
        .map(|(city, population)| CityPopulationRow { city, population })
        .collect()
}

fn random_time(rng: &mut TableRng, start: NaiveDate, weeks: u32) -> NaiveDateTime {
    let day = rng.below(u64::from(weeks) * 7) as i64;
    let seconds = rng.below(24 * 3600) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default();
    (start + Duration::days(day)).and_time(time)
}

/// Generate a complete dataset for `spec`.
pub fn generate(spec: &SyntheticSpec, config: &GeoConfig) -> GeoResult<Dataset> {
    let bank = RngBank::new(spec.seed);
    let mut customer_rng = bank.for_table(TableSlot::Customers);
    let mut event_rng = bank.for_table(TableSlot::Transactions);
    let mut revenue_rng = bank.for_table(TableSlot::Revenue);

    let geo_weights = WeightedIndex::new(GEO_CATALOGUE.iter().map(|(_, _, _, _, pop)| pop.max(50_000.0)))
        .map_err(|e| anyhow::anyhow!("geo catalogue weights: {e}"))?;
    let channel_weights = WeightedIndex::new(CHANNELS.iter().map(|(_, _, w)| *w))
        .map_err(|e| anyhow::anyhow!("channel weights: {e}"))?;

    let mut transactions = Vec::new();
    for index in 0..spec.customers {
        let customer_id = format!("c-{index:06}");
        let (plz, name, lat, lon, _) = GEO_CATALOGUE[customer_rng.pick(&geo_weights)];

        // Mostly the nearest house, sometimes a destination trip.
        let nearest = HOUSES
            .iter()
            .enumerate()
            .map(|(i, h)| (i, haversine_km((lat, lon), (h.3, h.4))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (channel, platform, _) = CHANNELS[customer_rng.pick(&channel_weights)];
        let events = 1 + (customer_rng.pareto(1.0, 2.2) - 1.0).floor().min(6.0) as usize;

        let mut times: Vec<NaiveDateTime> = (0..events)
            .map(|_| random_time(&mut event_rng, spec.start, spec.weeks))
            .collect();
        times.sort();

        for (n, created_at) in times.into_iter().enumerate() {
            let house = if event_rng.chance(0.8) {
                nearest
            } else {
                event_rng.below(HOUSES.len() as u64) as usize
            };
            let (house_id, _, _, hlat, hlon) = HOUSES[house];
            let distance = haversine_km((lat, lon), (hlat, hlon));
            let ftb_rb = if n == 0 { BuyerType::FirstTime } else { BuyerType::Returning };
            let is_renewal = ftb_rb == BuyerType::Returning && event_rng.chance(0.3);
            let category = EVENT_CATEGORIES[event_rng.below(EVENT_CATEGORIES.len() as u64) as usize];
            let revenue = (revenue_rng.pareto(25.0, 2.5) * 100.0).round() / 100.0;

            transactions.push(TransactionRecord {
                customer_id: customer_id.clone(),
                created_at,
                plz: plz.to_string(),
                city: Some(city_name(plz, name, config)),
                distance_km: Some((distance * 10.0).round() / 10.0),
                distance_band: None,
                revenue,
                ftb_rb,
                is_renewal,
                channel_type: Some(channel.to_string()),
                platform: Some(platform.to_string()),
                house_id: house_id.to_string(),
                event_category: Some(category.to_string()),
            });
        }
    }

    transactions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    log::info!(
        "synthetic: seed={} customers={} transactions={}",
        spec.seed,
        spec.customers,
        transactions.len()
    );

    Ok(Dataset::new(transactions)
        .with_houses(houses())
        .with_house_population(house_population(config))
        .with_geo(geo_dimension())
        .with_city_population(city_population(config)))
}
