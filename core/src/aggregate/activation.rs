//! Region activation: catchment population against reached customers.

use super::{
    house_order, per_thousand, round_to, week_key, week_range, week_start, AggregateResult, Axis,
    DistinctCounter, HouseActivationRow, PopulationActivationRow, SeriesPoint, ValueUnit,
};
use crate::{
    dataset::{Dataset, HousePopulationRow},
    error::GeoResult,
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
    types::WeekKey,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Population rows grouped per house, in input order.
fn population_by_house(rows: &[HousePopulationRow]) -> BTreeMap<&str, Vec<&HousePopulationRow>> {
    let mut grouped: BTreeMap<&str, Vec<&HousePopulationRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.house_id.as_str()).or_default().push(row);
    }
    grouped
}

/// Per house and category: incremental catchment population, distinct
/// customers, and activation (customers per 1,000 population).
pub fn population_activation(
    view: &View<'_>,
    dataset: &Dataset,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    decimals: u32,
) -> GeoResult<AggregateResult> {
    let population = population_by_house(dataset.house_population()?);

    let mut customers: DistinctCounter<'_, (&str, usize)> = DistinctCounter::new();
    for row in view.iter() {
        if let Some(category) = taxonomy.category_of(row, scheme) {
            customers.add((row.house_id.as_str(), category), row.customer_id.as_str());
        }
    }

    let labels = taxonomy.categories(scheme);
    let mut rows = Vec::new();
    for (house_id, house_name) in house_order(dataset.houses.as_deref(), population.keys().copied()) {
        let bands = taxonomy.incremental_populations(&population[house_id.as_str()]);
        let per_category = taxonomy.regroup_values(&bands, scheme);
        for (category, pop) in per_category.into_iter().enumerate() {
            let reached = customers.count(&(house_id.as_str(), category));
            rows.push(PopulationActivationRow {
                house_id: house_id.clone(),
                house_name: house_name.clone(),
                category: labels[category].clone(),
                population: pop,
                customers: reached,
                activation: round_to(per_thousand(reached as f64, pop), decimals),
            });
        }
    }

    Ok(AggregateResult::PopulationActivation { rows })
}

/// Distinct customers per week and category over the view's full week
/// range, zero-filled. With `cumulative`, each category's series is summed
/// over time and is therefore non-decreasing.
pub fn activation_series(
    view: &View<'_>,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    cumulative: bool,
) -> AggregateResult {
    let mut customers: DistinctCounter<'_, (WeekKey, usize)> = DistinctCounter::new();
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;
    for row in view.iter() {
        let Some(category) = taxonomy.category_of(row, scheme) else {
            continue;
        };
        let week = week_start(row.created_at);
        first = Some(first.map_or(week, |f| f.min(week)));
        last = Some(last.map_or(week, |l| l.max(week)));
        customers.add((week_key(row.created_at), category), row.customer_id.as_str());
    }

    let (Some(first), Some(last)) = (first, last) else {
        return AggregateResult::Series { axis: Axis::Week, unit: ValueUnit::Customers, points: Vec::new() };
    };

    let labels = taxonomy.categories(scheme);
    let weeks = week_range(first, last);
    let mut points = Vec::with_capacity(weeks.len() * labels.len());
    for (category, label) in labels.iter().enumerate() {
        let mut running = 0u64;
        for week in &weeks {
            let key = week.format("%Y-%m-%d").to_string();
            let count = customers.count(&(key.clone(), category));
            let value = if cumulative {
                running += count;
                running
            } else {
                count
            };
            points.push(SeriesPoint { bucket: key, category: label.clone(), value: value as f64 });
        }
    }

    AggregateResult::Series { axis: Axis::Week, unit: ValueUnit::Customers, points }
}

/// Per house: distinct customers against the house's total catchment.
pub fn activation_by_house(
    view: &View<'_>,
    dataset: &Dataset,
    taxonomy: &DistanceTaxonomy,
    decimals: u32,
) -> GeoResult<AggregateResult> {
    let population = population_by_house(dataset.house_population()?);

    let mut customers: DistinctCounter<'_, &str> = DistinctCounter::new();
    for row in view.iter() {
        customers.add(row.house_id.as_str(), row.customer_id.as_str());
    }

    let ids = population.keys().copied().chain(customers.counts().map(|(id, _)| *id));
    let rows = house_order(dataset.houses.as_deref(), ids)
        .into_iter()
        .map(|(house_id, house_name)| {
            let total: f64 = population
                .get(house_id.as_str())
                .map(|rows| taxonomy.incremental_populations(rows).iter().sum::<f64>())
                .unwrap_or(0.0);
            let reached = customers.count(&house_id.as_str());
            HouseActivationRow {
                activation: round_to(per_thousand(reached as f64, total), decimals),
                house_id,
                house_name,
                population: total,
                customers: reached,
            }
        })
        .collect();

    Ok(AggregateResult::HouseActivation { rows })
}
