//! Weekly geo composition: share and volume per distance category.

use super::{apportion_pct, round_to, safe_div, week_key, AggregateResult, Axis, DistinctCounter, SeriesPoint, ValueUnit};
use crate::{
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
    types::WeekKey,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMetric {
    Customers,
    Revenue,
    /// Revenue per distinct customer.
    Spc,
}

impl VolumeMetric {
    pub const ALL: [VolumeMetric; 3] = [VolumeMetric::Customers, VolumeMetric::Revenue, VolumeMetric::Spc];

    fn unit(&self) -> ValueUnit {
        match self {
            VolumeMetric::Customers => ValueUnit::Customers,
            VolumeMetric::Revenue => ValueUnit::Revenue,
            VolumeMetric::Spc => ValueUnit::RevenuePerCustomer,
        }
    }
}

/// Distinct customers and revenue per (week, category). Rows without a
/// resolvable distance category are left out.
struct WeeklyCategoryStats<'a> {
    customers: DistinctCounter<'a, (WeekKey, usize)>,
    revenue: BTreeMap<(WeekKey, usize), f64>,
}

impl<'a> WeeklyCategoryStats<'a> {
    fn collect(view: &View<'a>, taxonomy: &DistanceTaxonomy, scheme: GroupingScheme) -> Self {
        let mut customers = DistinctCounter::new();
        let mut revenue = BTreeMap::new();
        for row in view.iter() {
            let Some(category) = taxonomy.category_of(row, scheme) else {
                continue;
            };
            let key = (week_key(row.created_at), category);
            customers.add(key.clone(), row.customer_id.as_str());
            *revenue.entry(key).or_insert(0.0) += row.revenue;
        }
        Self { customers, revenue }
    }
}

/// Percentage of distinct customers per category within each week.
///
/// Per-category distinct counts are normalised by their weekly sum and
/// apportioned with largest-remainder rounding at `decimals`, so each week
/// sums to exactly 100. A customer seen in two categories in one week
/// counts once in each. Weeks without customers emit no rows.
pub fn composition_pct(
    view: &View<'_>,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    decimals: u32,
) -> AggregateResult {
    let stats = WeeklyCategoryStats::collect(view, taxonomy, scheme);
    let labels = taxonomy.categories(scheme);

    let mut weekly: BTreeMap<&WeekKey, Vec<(usize, u64)>> = BTreeMap::new();
    for ((week, category), count) in stats.customers.counts() {
        weekly.entry(week).or_default().push((*category, count));
    }

    let mut points = Vec::new();
    for (week, cells) in weekly {
        let counts: Vec<u64> = cells.iter().map(|(_, count)| *count).collect();
        if counts.iter().sum::<u64>() == 0 {
            continue;
        }
        for ((category, _), value) in cells.iter().zip(apportion_pct(&counts, decimals)) {
            points.push(SeriesPoint {
                bucket: week.clone(),
                category: labels[*category].clone(),
                value,
            });
        }
    }

    AggregateResult::Series { axis: Axis::Week, unit: ValueUnit::Percent, points }
}

/// Raw weekly volume per category: distinct customers, revenue, or
/// revenue per customer (0 for a category without customers).
pub fn composition_abs(
    view: &View<'_>,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    metric: VolumeMetric,
) -> AggregateResult {
    let stats = WeeklyCategoryStats::collect(view, taxonomy, scheme);
    let labels = taxonomy.categories(scheme);

    let points = stats
        .revenue
        .iter()
        .map(|(key, revenue)| {
            let customers = stats.customers.count(key);
            let value = match metric {
                VolumeMetric::Customers => customers as f64,
                VolumeMetric::Revenue => *revenue,
                VolumeMetric::Spc => round_to(safe_div(*revenue, customers as f64), 2),
            };
            SeriesPoint {
                bucket: key.0.clone(),
                category: labels[key.1].clone(),
                value,
            }
        })
        .collect();

    AggregateResult::Series { axis: Axis::Week, unit: metric.unit(), points }
}
