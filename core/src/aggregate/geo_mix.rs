//! Geo mix by house, showing how each house's customers spread over categories.

use super::{apportion_pct, house_order, AggregateResult, Axis, DistinctCounter, ShareRow};
use crate::{
    dataset::Dataset,
    error::GeoResult,
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
};

/// Distinct customers per (house, category) and their share of the house's
/// categorised customers. Houses follow their canonical rank, so house
/// metadata is required.
pub fn geo_mix_by_house(
    view: &View<'_>,
    dataset: &Dataset,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    decimals: u32,
) -> GeoResult<AggregateResult> {
    let houses = dataset.houses()?;

    let mut customers: DistinctCounter<'_, (&str, usize)> = DistinctCounter::new();
    for row in view.iter() {
        if let Some(category) = taxonomy.category_of(row, scheme) {
            customers.add((row.house_id.as_str(), category), row.customer_id.as_str());
        }
    }

    let labels = taxonomy.categories(scheme);
    let ids = customers.counts().map(|((house, _), _)| *house);
    let mut rows = Vec::new();
    for (house_id, house_name) in house_order(Some(houses), ids) {
        let counts: Vec<u64> = (0..labels.len())
            .map(|category| customers.count(&(house_id.as_str(), category)))
            .collect();
        let shares = apportion_pct(&counts, decimals);
        for (category, (count, share_pct)) in counts.into_iter().zip(shares).enumerate() {
            rows.push(ShareRow {
                group: house_name.clone(),
                category: labels[category].clone(),
                customers: count,
                share_pct,
            });
        }
    }

    Ok(AggregateResult::Shares { axis: Axis::House, rows })
}
