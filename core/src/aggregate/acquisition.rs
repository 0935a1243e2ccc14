//! Acquisition metrics: first-time share and lifetime value.
//!
//! RULE: Neither metric reads the `strict` view. First-time share uses the
//! `renewal_only` view as numerator and denominator so that a customer-type
//! filter cannot bias it; LTV takes its cohort from `renewal_only` and its
//! revenue from `base`.

use super::{round_to, safe_div, week_key, AggregateResult, Axis, DistinctCounter, SeriesPoint, ValueUnit};
use crate::{
    dataset::{BuyerType, TransactionRecord},
    filter::FilteredViews,
    geo::{DistanceTaxonomy, GroupingScheme},
    types::WeekKey,
};
use std::collections::BTreeMap;

/// Share (%) of distinct first-time buyers among distinct customers per
/// (week, category), computed over the `renewal_only` view.
pub fn first_time_share(
    views: &FilteredViews<'_>,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    decimals: u32,
) -> AggregateResult {
    let mut everyone: DistinctCounter<'_, (WeekKey, usize)> = DistinctCounter::new();
    let mut first_timers: DistinctCounter<'_, (WeekKey, usize)> = DistinctCounter::new();

    for row in views.renewal_only.iter() {
        let Some(category) = taxonomy.category_of(row, scheme) else {
            continue;
        };
        let key = (week_key(row.created_at), category);
        if row.ftb_rb == BuyerType::FirstTime {
            first_timers.add(key.clone(), row.customer_id.as_str());
        }
        everyone.add(key, row.customer_id.as_str());
    }

    let labels = taxonomy.categories(scheme);
    let points = everyone
        .counts()
        .map(|(key, total)| SeriesPoint {
            bucket: key.0.clone(),
            category: labels[key.1].clone(),
            value: round_to(safe_div(first_timers.count(key) as f64, total as f64) * 100.0, decimals),
        })
        .collect();

    AggregateResult::Series { axis: Axis::Week, unit: ValueUnit::Percent, points }
}

/// Average lifetime revenue per acquired customer, by acquisition week and
/// the distance category of the acquiring event.
///
/// The cohort is every customer with a first-time-buyer event in
/// `renewal_only`; the acquiring event is the earliest such event. Lifetime
/// revenue sums every event of that customer in `base`.
pub fn lifetime_value(
    views: &FilteredViews<'_>,
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
) -> AggregateResult {
    let mut acquisitions: BTreeMap<&str, &TransactionRecord> = BTreeMap::new();
    for row in views.renewal_only.iter() {
        if row.ftb_rb != BuyerType::FirstTime {
            continue;
        }
        acquisitions
            .entry(row.customer_id.as_str())
            .and_modify(|first| {
                if row.created_at < first.created_at {
                    *first = row;
                }
            })
            .or_insert(row);
    }

    let mut lifetime_revenue: BTreeMap<&str, f64> = BTreeMap::new();
    for row in views.base.iter() {
        if acquisitions.contains_key(row.customer_id.as_str()) {
            *lifetime_revenue.entry(row.customer_id.as_str()).or_insert(0.0) += row.revenue;
        }
    }

    // (cohort week, category) -> (customers, revenue)
    let mut cohorts: BTreeMap<(WeekKey, usize), (u64, f64)> = BTreeMap::new();
    for (customer_id, first) in &acquisitions {
        let Some(category) = taxonomy.category_of(first, scheme) else {
            continue;
        };
        let entry = cohorts
            .entry((week_key(first.created_at), category))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += lifetime_revenue.get(customer_id).copied().unwrap_or(0.0);
    }

    let labels = taxonomy.categories(scheme);
    let points = cohorts
        .into_iter()
        .map(|((week, category), (customers, revenue))| SeriesPoint {
            bucket: week,
            category: labels[category].clone(),
            value: round_to(safe_div(revenue, customers as f64), 2),
        })
        .collect();

    AggregateResult::Series { axis: Axis::CohortWeek, unit: ValueUnit::RevenuePerCustomer, points }
}
