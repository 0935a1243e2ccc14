//! Aggregation engine: one pure function per metric.
//!
//! RULE: Every "customers" figure is a distinct count of customer ids,
//! never a row count. Revenue is a plain sum with no conversion.
//! Every divide-by-zero yields 0 (or `None` for coordinates), never NaN.

pub mod acquisition;
pub mod activation;
pub mod city;
pub mod composition;
pub mod geo_mix;
pub mod maps;
pub mod platform;

use crate::{
    dataset::HouseMeta,
    types::{HouseId, WeekKey},
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// ISO week of the event.
    Week,
    /// ISO week of the customer's acquisition.
    CohortWeek,
    House,
    ChannelPlatform,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueUnit {
    Percent,
    Customers,
    Revenue,
    RevenuePerCustomer,
}

/// One cell of a row-label × category table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub bucket: String,
    pub category: String,
    pub value: f64,
}

/// Distinct customers of a category within a group, with the group share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShareRow {
    pub group: String,
    pub category: String,
    pub customers: u64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationActivationRow {
    pub house_id: HouseId,
    pub house_name: String,
    pub category: String,
    pub population: f64,
    pub customers: u64,
    pub activation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseActivationRow {
    pub house_id: HouseId,
    pub house_name: String,
    pub population: f64,
    pub customers: u64,
    pub activation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityRow {
    pub city: String,
    pub population: f64,
    pub customers: u64,
    pub revenue: f64,
    pub activation: f64,
    pub rev_per_1k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlzMapRow {
    pub geo_key: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub population: f64,
    pub customers: u64,
    pub revenue: f64,
    pub rev_per_1k: f64,
    pub activation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityMapRow {
    pub city: String,
    pub population: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub customers: u64,
    pub revenue: f64,
    pub spc: f64,
}

/// The output of one (filter combination, grouping scheme, metric) triple.
/// Immutable once inserted into the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateResult {
    Series {
        axis: Axis,
        unit: ValueUnit,
        points: Vec<SeriesPoint>,
    },
    Shares {
        axis: Axis,
        rows: Vec<ShareRow>,
    },
    PopulationActivation {
        rows: Vec<PopulationActivationRow>,
    },
    HouseActivation {
        rows: Vec<HouseActivationRow>,
    },
    CityTable {
        rows: Vec<CityRow>,
    },
    PlzMap {
        rows: Vec<PlzMapRow>,
    },
    CityMap {
        rows: Vec<CityMapRow>,
    },
    /// "Data unavailable" sentinel shown as a placeholder by the client.
    Unavailable {
        reason: String,
    },
}

impl AggregateResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        AggregateResult::Unavailable { reason: reason.into() }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, AggregateResult::Unavailable { .. })
    }

    /// Number of rows / points carried.
    pub fn len(&self) -> usize {
        match self {
            AggregateResult::Series { points, .. } => points.len(),
            AggregateResult::Shares { rows, .. } => rows.len(),
            AggregateResult::PopulationActivation { rows } => rows.len(),
            AggregateResult::HouseActivation { rows } => rows.len(),
            AggregateResult::CityTable { rows } => rows.len(),
            AggregateResult::PlzMap { rows } => rows.len(),
            AggregateResult::CityMap { rows } => rows.len(),
            AggregateResult::Unavailable { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Arithmetic helpers ───────────────────────────────────────────────────────

/// `numerator / denominator`, or 0 when the denominator is zero.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Rate per 1,000 population, 0 for an empty population.
pub fn per_thousand(value: f64, population: f64) -> f64 {
    safe_div(value, population / 1000.0)
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Shares of `counts` in percent, rounded to `decimals` with the
/// largest-remainder method so a non-empty set sums to exactly 100.
/// Ties in the remainder go to the earlier entry. All zeros for an empty total.
pub fn apportion_pct(counts: &[u64], decimals: u32) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    let factor = 10f64.powi(decimals as i32);
    let exact: Vec<f64> = counts
        .iter()
        .map(|c| *c as f64 / total as f64 * 100.0 * factor)
        .collect();
    let mut units: Vec<i64> = exact.iter().map(|e| e.floor() as i64).collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|a, b| {
        let ra = exact[*a] - units[*a] as f64;
        let rb = exact[*b] - units[*b] as f64;
        rb.total_cmp(&ra).then(a.cmp(b))
    });
    let target = (100.0 * factor).round() as i64;
    let missing = (target - units.iter().sum::<i64>()).max(0) as usize;
    for index in order.into_iter().take(missing) {
        units[index] += 1;
    }

    units.into_iter().map(|u| u as f64 / factor).collect()
}

// ── Time buckets ─────────────────────────────────────────────────────────────

pub fn week_start(at: NaiveDateTime) -> NaiveDate {
    let date = at.date();
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn week_key(at: NaiveDateTime) -> WeekKey {
    week_start(at).format("%Y-%m-%d").to_string()
}

/// Every week start from `first` to `last` inclusive.
pub fn week_range(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut current = first;
    while current <= last {
        weeks.push(current);
        current += Duration::days(7);
    }
    weeks
}

// ── Distinct counting ────────────────────────────────────────────────────────

/// Distinct customer ids per key.
#[derive(Debug)]
pub struct DistinctCounter<'a, K: Ord> {
    sets: BTreeMap<K, HashSet<&'a str>>,
}

impl<'a, K: Ord> Default for DistinctCounter<'a, K> {
    fn default() -> Self {
        Self { sets: BTreeMap::new() }
    }
}

impl<'a, K: Ord> DistinctCounter<'a, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, customer_id: &'a str) {
        self.sets.entry(key).or_default().insert(customer_id);
    }

    pub fn count(&self, key: &K) -> u64 {
        self.sets.get(key).map(|s| s.len() as u64).unwrap_or(0)
    }

    pub fn counts(&self) -> impl Iterator<Item = (&K, u64)> {
        self.sets.iter().map(|(k, s)| (k, s.len() as u64))
    }
}

// ── House ordering ───────────────────────────────────────────────────────────

/// Houses in canonical order: ranked houses by (rank, id), then houses
/// without metadata by id. Never alphabetical by display name.
pub fn house_order<'a, I>(houses: Option<&[HouseMeta]>, ids: I) -> Vec<(HouseId, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    let meta: HashMap<&str, &HouseMeta> = houses
        .unwrap_or_default()
        .iter()
        .map(|h| (h.house_id.as_str(), h))
        .collect();

    let unique: HashSet<&str> = ids.into_iter().collect();
    let mut ordered: Vec<(Option<i64>, &str)> = unique
        .into_iter()
        .map(|id| (meta.get(id).map(|h| h.rank), id))
        .collect();
    ordered.sort_by(|a, b| match (a.0, b.0) {
        (Some(ra), Some(rb)) => ra.cmp(&rb).then(a.1.cmp(b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    });

    ordered
        .into_iter()
        .map(|(_, id)| {
            let name = meta.get(id).map(|h| h.name.clone()).unwrap_or_else(|| id.to_string());
            (id.to_string(), name)
        })
        .collect()
}
