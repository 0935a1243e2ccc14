//! Filter-independent maps over merged geographic keys.
//!
//! RULE: Maps read the full transaction table. Multi-code metro areas are
//! folded into one key through the merge table before any grouping.

use super::{per_thousand, round_to, safe_div, AggregateResult, CityMapRow, DistinctCounter, PlzMapRow};
use crate::{
    config::GeoConfig,
    dataset::{Dataset, GeoDimensionRow},
    error::GeoResult,
    geo::{canonical_geo_key, weighted_centroid},
};
use std::collections::BTreeMap;

/// Display name of a geo row's city: the merged key for merged codes, the
/// row's own name otherwise.
fn city_of<'a>(row: &'a GeoDimensionRow, config: &'a GeoConfig) -> &'a str {
    config
        .merge_table
        .get(&row.plz)
        .map(String::as_str)
        .unwrap_or(row.name.as_str())
}

/// Geo rows grouped by a key, each group keeping its rows in input order.
fn group_geo<'a, F>(geo: &'a [GeoDimensionRow], mut key: F) -> BTreeMap<&'a str, Vec<&'a GeoDimensionRow>>
where
    F: FnMut(&'a GeoDimensionRow) -> &'a str,
{
    let mut grouped: BTreeMap<&str, Vec<&GeoDimensionRow>> = BTreeMap::new();
    for row in geo {
        grouped.entry(key(row)).or_default().push(row);
    }
    grouped
}

fn centroid(rows: &[&GeoDimensionRow]) -> Option<(f64, f64)> {
    weighted_centroid(
        rows.iter()
            .map(|r| (r.latitude, r.longitude, r.population.unwrap_or(0.0))),
    )
}

/// One row per merged geo key, left-joined with the customers and revenue
/// observed there.
pub fn plz_map(dataset: &Dataset, config: &GeoConfig) -> GeoResult<AggregateResult> {
    let geo = dataset.geo()?;
    let merge = &config.merge_table;

    let mut customers: DistinctCounter<'_, &str> = DistinctCounter::new();
    let mut revenue: BTreeMap<&str, f64> = BTreeMap::new();
    for row in &dataset.transactions {
        let key = canonical_geo_key(&row.plz, merge);
        customers.add(key, row.customer_id.as_str());
        *revenue.entry(key).or_insert(0.0) += row.revenue;
    }

    let rows = group_geo(geo, |r| canonical_geo_key(&r.plz, merge))
        .into_iter()
        .map(|(key, members)| {
            let population: f64 = members.iter().filter_map(|r| r.population).sum();
            let coords = centroid(&members);
            let reached = customers.count(&key);
            let spent = revenue.get(key).copied().unwrap_or(0.0);
            let name = if merge.values().any(|city| city == key) {
                key.to_string()
            } else {
                members.first().map(|r| r.name.clone()).unwrap_or_default()
            };
            PlzMapRow {
                geo_key: key.to_string(),
                name,
                latitude: coords.map(|c| c.0),
                longitude: coords.map(|c| c.1),
                population,
                customers: reached,
                revenue: spent,
                rev_per_1k: round_to(per_thousand(spent, population), config.rate_decimals),
                activation: round_to(per_thousand(reached as f64, population), config.rate_decimals),
            }
        })
        .collect();

    Ok(AggregateResult::PlzMap { rows })
}

/// One row per city with population, weighted centroid of the city's PLZ
/// groups, customers, revenue and revenue per customer.
///
/// City populations come from the city table when loaded, otherwise they
/// are summed from the geo dimension. Rows are ordered by population
/// descending, then name.
pub fn city_map(dataset: &Dataset, config: &GeoConfig) -> GeoResult<AggregateResult> {
    let geo = dataset.geo()?;
    let by_city = group_geo(geo, |r| city_of(r, config));

    let populations: Vec<(String, f64)> = match dataset.city_population.as_deref() {
        Some(cities) => cities.iter().map(|c| (c.city.clone(), c.population)).collect(),
        None => {
            log::debug!("city_map: no city population table, deriving from geo dimension");
            by_city
                .iter()
                .map(|(city, rows)| (city.to_string(), rows.iter().filter_map(|r| r.population).sum()))
                .collect()
        }
    };

    let mut customers: DistinctCounter<'_, &str> = DistinctCounter::new();
    let mut revenue: BTreeMap<&str, f64> = BTreeMap::new();
    for row in &dataset.transactions {
        if let Some(city) = row.city.as_deref() {
            customers.add(city, row.customer_id.as_str());
            *revenue.entry(city).or_insert(0.0) += row.revenue;
        }
    }

    let mut rows: Vec<CityMapRow> = populations
        .into_iter()
        .map(|(city, population)| {
            let coords = by_city.get(city.as_str()).and_then(|members| centroid(members));
            let reached = customers.count(&city.as_str());
            let spent = revenue.get(city.as_str()).copied().unwrap_or(0.0);
            CityMapRow {
                population,
                latitude: coords.map(|c| c.0),
                longitude: coords.map(|c| c.1),
                customers: reached,
                revenue: spent,
                spc: round_to(safe_div(spent, reached as f64), 2),
                city,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.population
            .total_cmp(&a.population)
            .then_with(|| a.city.cmp(&b.city))
    });

    Ok(AggregateResult::CityMap { rows })
}
