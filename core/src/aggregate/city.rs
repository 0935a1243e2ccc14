//! City performance table: population-ranked.

use super::{per_thousand, round_to, AggregateResult, CityRow, DistinctCounter};
use crate::{
    dataset::{CityPopulationRow, Dataset},
    error::GeoResult,
    filter::View,
};
use std::collections::BTreeMap;

/// Observed activity of one city.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CityActivity {
    pub customers: u64,
    pub revenue: f64,
}

/// Join city populations with observed activity (inner join), then sort by
/// population descending and keep the first `top_n`.
///
/// Ranking happens after the join: a small city with many customers is
/// still dropped when it is outside the top `top_n` by population.
pub fn rank_cities(
    populations: &[CityPopulationRow],
    activity: &BTreeMap<String, CityActivity>,
    top_n: usize,
    decimals: u32,
) -> Vec<CityRow> {
    let mut rows: Vec<CityRow> = populations
        .iter()
        .filter_map(|city| {
            let seen = activity.get(&city.city)?;
            Some(CityRow {
                city: city.city.clone(),
                population: city.population,
                customers: seen.customers,
                revenue: seen.revenue,
                activation: round_to(per_thousand(seen.customers as f64, city.population), decimals),
                rev_per_1k: round_to(per_thousand(seen.revenue, city.population), decimals),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.population
            .total_cmp(&a.population)
            .then_with(|| a.city.cmp(&b.city))
    });
    rows.truncate(top_n);
    rows
}

pub fn city_activity(view: &View<'_>) -> BTreeMap<String, CityActivity> {
    let mut customers: DistinctCounter<'_, &str> = DistinctCounter::new();
    let mut revenue: BTreeMap<&str, f64> = BTreeMap::new();
    for row in view.iter() {
        let Some(city) = row.city.as_deref() else {
            continue;
        };
        customers.add(city, row.customer_id.as_str());
        *revenue.entry(city).or_insert(0.0) += row.revenue;
    }

    revenue
        .into_iter()
        .map(|(city, revenue)| {
            let activity = CityActivity { customers: customers.count(&city), revenue };
            (city.to_string(), activity)
        })
        .collect()
}

pub fn city_performance(
    view: &View<'_>,
    dataset: &Dataset,
    top_n: usize,
    decimals: u32,
) -> GeoResult<AggregateResult> {
    let populations = dataset.city_population()?;
    let rows = rank_cities(populations, &city_activity(view), top_n, decimals);
    Ok(AggregateResult::CityTable { rows })
}
