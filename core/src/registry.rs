//! Named result registry: a flat, deterministic key → result mapping.
//!
//! Key grammar: `<metric>[_<groupingTag>][<filterSuffix>]`.
//! The grouping tag is present iff the metric depends on the grouping
//! scheme; the filter suffix is present iff it depends on the filters.
//!
//! RULE: Every key is written exactly once per run. A second write to the
//! same key is a bug in key construction and fails the run.

use crate::{
    aggregate::AggregateResult,
    error::{GeoError, GeoResult},
    filter::FilterCombo,
    geo::GroupingScheme,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

// ── Metric ids ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    CompPct,
    CompCustomers,
    CompRevenue,
    CompSpc,
    Fts,
    Ltv,
    PopHouse,
    ActWeekly,
    ActCumul,
    ActByHouse,
    GeoMix,
    Platform,
    CityTable,
    PlzMap,
    CityMap,
}

impl MetricId {
    pub const ALL: [MetricId; 15] = [
        MetricId::CompPct,
        MetricId::CompCustomers,
        MetricId::CompRevenue,
        MetricId::CompSpc,
        MetricId::Fts,
        MetricId::Ltv,
        MetricId::PopHouse,
        MetricId::ActWeekly,
        MetricId::ActCumul,
        MetricId::ActByHouse,
        MetricId::GeoMix,
        MetricId::Platform,
        MetricId::CityTable,
        MetricId::PlzMap,
        MetricId::CityMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricId::CompPct => "comp_pct",
            MetricId::CompCustomers => "comp_customers",
            MetricId::CompRevenue => "comp_revenue",
            MetricId::CompSpc => "comp_spc",
            MetricId::Fts => "fts",
            MetricId::Ltv => "ltv",
            MetricId::PopHouse => "pop_house",
            MetricId::ActWeekly => "act_weekly",
            MetricId::ActCumul => "act_cumul",
            MetricId::ActByHouse => "act_by_house",
            MetricId::GeoMix => "geo_mix",
            MetricId::Platform => "platform",
            MetricId::CityTable => "city_table",
            MetricId::PlzMap => "plz_map",
            MetricId::CityMap => "city_map",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == raw)
    }

    /// Depends on the grouping scheme.
    pub fn grouped(&self) -> bool {
        !matches!(
            self,
            MetricId::ActByHouse | MetricId::CityTable | MetricId::PlzMap | MetricId::CityMap
        )
    }

    /// Depends on the filter combination.
    pub fn filtered(&self) -> bool {
        !matches!(self, MetricId::PlzMap | MetricId::CityMap)
    }
}

// ── Keys ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryKey {
    pub metric: MetricId,
    pub grouping: Option<GroupingScheme>,
    pub filter: Option<FilterCombo>,
}

impl RegistryKey {
    /// Build a key, checking that grouping and filter are given exactly
    /// when the metric depends on them.
    pub fn new(
        metric: MetricId,
        grouping: Option<GroupingScheme>,
        filter: Option<FilterCombo>,
    ) -> GeoResult<Self> {
        let key = Self { metric, grouping, filter };
        if metric.grouped() != grouping.is_some() || metric.filtered() != filter.is_some() {
            return Err(GeoError::InvalidKey { key: key.to_string() });
        }
        Ok(key)
    }

    pub fn grouped(metric: MetricId, grouping: GroupingScheme, filter: FilterCombo) -> Self {
        Self { metric, grouping: Some(grouping), filter: Some(filter) }
    }

    pub fn ungrouped(metric: MetricId, filter: FilterCombo) -> Self {
        Self { metric, grouping: None, filter: Some(filter) }
    }

    pub fn global(metric: MetricId) -> Self {
        Self { metric, grouping: None, filter: None }
    }

    /// Every filter-dependent key of one combination, in metric order with
    /// the 6-band key before the 3-tier key.
    pub fn for_combo(combo: FilterCombo) -> Vec<RegistryKey> {
        let mut keys = Vec::new();
        for metric in MetricId::ALL.into_iter().filter(MetricId::filtered) {
            if metric.grouped() {
                for scheme in GroupingScheme::ALL {
                    keys.push(RegistryKey::grouped(metric, scheme, combo));
                }
            } else {
                keys.push(RegistryKey::ungrouped(metric, combo));
            }
        }
        keys
    }

    /// Every key of a full run.
    pub fn all() -> Vec<RegistryKey> {
        let mut keys: Vec<RegistryKey> = MetricId::ALL
            .into_iter()
            .filter(|m| !m.filtered())
            .map(RegistryKey::global)
            .collect();
        for combo in FilterCombo::all() {
            keys.extend(RegistryKey::for_combo(combo));
        }
        keys
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric.as_str())?;
        if let Some(scheme) = self.grouping {
            write!(f, "_{}", scheme.tag())?;
        }
        if let Some(combo) = self.filter {
            f.write_str(&combo.suffix())?;
        }
        Ok(())
    }
}

impl FromStr for RegistryKey {
    type Err = GeoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || GeoError::InvalidKey { key: raw.to_string() };

        let (rest, filter) = match raw.find("__") {
            Some(at) => {
                let combo = FilterCombo::from_suffix(&raw[at..]).ok_or_else(invalid)?;
                (&raw[..at], Some(combo))
            }
            None => (raw, None),
        };

        let (name, grouping) = GroupingScheme::ALL
            .into_iter()
            .find_map(|scheme| {
                rest.strip_suffix(scheme.tag())
                    .and_then(|head| head.strip_suffix('_'))
                    .map(|head| (head, Some(scheme)))
            })
            .unwrap_or((rest, None));

        let metric = MetricId::parse(name).ok_or_else(invalid)?;
        RegistryKey::new(metric, grouping, filter).map_err(|_| invalid())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Flat map from key string to result. `BTreeMap` keeps serialisation
/// order stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Registry {
    entries: BTreeMap<String, AggregateResult>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: RegistryKey, result: AggregateResult) -> GeoResult<()> {
        let name = key.to_string();
        if self.entries.contains_key(&name) {
            return Err(GeoError::DuplicateKey { key: name });
        }
        self.entries.insert(name, result);
        Ok(())
    }

    pub fn get(&self, key: &str) -> GeoResult<&AggregateResult> {
        self.entries
            .get(key)
            .ok_or_else(|| GeoError::KeyNotFound { key: key.to_string() })
    }

    pub fn get_key(&self, key: &RegistryKey) -> GeoResult<&AggregateResult> {
        self.get(&key.to_string())
    }

    /// Lookup for a live filter state. A key never written reads as the
    /// "data unavailable" placeholder.
    pub fn get_or_unavailable(&self, key: &str) -> AggregateResult {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| AggregateResult::unavailable(format!("no result for '{key}'")))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn unavailable_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_unavailable()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
