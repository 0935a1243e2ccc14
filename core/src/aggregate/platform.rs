//! Platform composition: distance mix per acquisition channel.

use super::{round_to, safe_div, AggregateResult, Axis, DistinctCounter, ShareRow};
use crate::{
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
};
use std::collections::HashSet;

/// `"<channel> | <platform>"` options restricted to the candidate
/// platforms, ranked by distinct customers descending (ties by name).
pub fn ranked_channel_platforms(view: &View<'_>, candidates: &[String]) -> Vec<(String, u64)> {
    let present: HashSet<&str> = view.iter().filter_map(|r| r.platform.as_deref()).collect();
    let selected: Vec<&str> = candidates
        .iter()
        .map(String::as_str)
        .filter(|c| present.contains(c))
        .collect();

    let mut customers: DistinctCounter<'_, String> = DistinctCounter::new();
    for row in view.iter() {
        let (Some(channel), Some(platform)) = (row.channel_type.as_deref(), row.platform.as_deref()) else {
            continue;
        };
        if selected.contains(&platform) {
            customers.add(format!("{channel} | {platform}"), row.customer_id.as_str());
        }
    }

    let mut ranked: Vec<(String, u64)> = customers.counts().map(|(k, n)| (k.clone(), n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Distinct customers per (channel_platform, category) with the share of
/// each category within its channel_platform.
pub fn platform_composition(
    view: &View<'_>,
    candidates: &[String],
    taxonomy: &DistanceTaxonomy,
    scheme: GroupingScheme,
    decimals: u32,
) -> AggregateResult {
    let options = ranked_channel_platforms(view, candidates);
    if options.is_empty() {
        return AggregateResult::unavailable("no candidate platform present in the data");
    }

    let mut customers: DistinctCounter<'_, (String, usize)> = DistinctCounter::new();
    for row in view.iter() {
        let (Some(channel), Some(platform)) = (row.channel_type.as_deref(), row.platform.as_deref()) else {
            continue;
        };
        if let Some(category) = taxonomy.category_of(row, scheme) {
            customers.add((format!("{channel} | {platform}"), category), row.customer_id.as_str());
        }
    }

    let labels = taxonomy.categories(scheme);
    let mut rows = Vec::new();
    for (option, _) in options {
        let counts: Vec<u64> = (0..labels.len())
            .map(|category| customers.count(&(option.clone(), category)))
            .collect();
        let total: u64 = counts.iter().sum();
        for (category, count) in counts.into_iter().enumerate() {
            rows.push(ShareRow {
                group: option.clone(),
                category: labels[category].clone(),
                customers: count,
                share_pct: round_to(safe_div(count as f64, total as f64) * 100.0, decimals),
            });
        }
    }

    AggregateResult::Shares { axis: Axis::ChannelPlatform, rows }
}
