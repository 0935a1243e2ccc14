//! The snapshot pipeline: one full export run over a loaded dataset.
//!
//! BUILD ORDER (fixed, documented, never reordered):
//!   1. Input validation          (fatal on failure)
//!   2. Metadata                  (houses, event categories, date range)
//!   3. Filter-independent maps
//!   4. Per-combination sections  (serial, or fanned out when `parallel`)
//!   5. Registry merge            (enumeration order, after step 4 completes)
//!
//! RULES:
//!   - Run-scoped errors (invalid input, bad config) abort the build.
//!   - Metric- and combination-scoped errors become "data unavailable"
//!     sentinels and are recorded in `SnapshotBuild::failures`.
//!   - No combination writes to the registry while another is computing.

use crate::{
    aggregate::{house_order, maps, AggregateResult},
    config::GeoConfig,
    dataset::{Dataset, TransactionRecord},
    error::{GeoError, GeoResult},
    filter::{FilterCombo, FilteredViews},
    geo::DistanceTaxonomy,
    registry::{MetricId, Registry, RegistryKey},
    section::{standard_sections, AggregationSection, SectionContext, SectionOutput},
    types::HouseId,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Build output ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseEntry {
    pub house_id: HouseId,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMetadata {
    /// Houses in canonical rank order.
    pub houses: Vec<HouseEntry>,
    /// Distinct event categories, sorted.
    pub event_categories: Vec<String>,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub transaction_count: usize,
}

/// A metric that could not be computed and was replaced by a sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBuild {
    pub metadata: SnapshotMetadata,
    pub registry: Registry,
    pub failures: Vec<MetricFailure>,
    /// Combinations whose strict view was empty.
    pub skipped: Vec<FilterCombo>,
}

/// Results of one combination, produced without touching the registry.
struct ComboOutcome {
    combo: FilterCombo,
    results: Vec<(RegistryKey, AggregateResult)>,
    failures: Vec<MetricFailure>,
    skipped: bool,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct SnapshotPipeline {
    config: GeoConfig,
    taxonomy: DistanceTaxonomy,
    sections: Vec<Box<dyn AggregationSection>>,
}

impl SnapshotPipeline {
    /// Validate the configuration and wire up the standard sections.
    pub fn new(config: GeoConfig) -> GeoResult<Self> {
        config.validate()?;
        let taxonomy = DistanceTaxonomy::from_config(&config)?;
        Ok(Self { config, taxonomy, sections: standard_sections() })
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &DistanceTaxonomy {
        &self.taxonomy
    }

    pub fn sections(&self) -> &[Box<dyn AggregationSection>] {
        &self.sections
    }

    /// Every filter-dependent key one combination writes, in section order.
    pub fn expected_keys(&self, combo: FilterCombo) -> Vec<RegistryKey> {
        self.sections
            .iter()
            .flat_map(|section| section.expected_keys(combo))
            .collect()
    }

    pub fn build(&self, dataset: &Dataset) -> GeoResult<SnapshotBuild> {
        validate_input(dataset)?;
        log::info!(
            "pipeline: {} transactions, parallel={}",
            dataset.transactions.len(),
            self.config.parallel
        );

        let metadata = build_metadata(dataset);
        log::info!(
            "pipeline: metadata houses={} event_categories={}",
            metadata.houses.len(),
            metadata.event_categories.len()
        );

        let mut registry = Registry::new();
        let mut failures = Vec::new();

        for (metric, result) in [
            (MetricId::PlzMap, maps::plz_map(dataset, &self.config)),
            (MetricId::CityMap, maps::city_map(dataset, &self.config)),
        ] {
            let key = RegistryKey::global(metric);
            let result = self.settle(&key, result, &mut failures);
            registry.put(key, result)?;
        }

        let combos = FilterCombo::all();
        let outcomes: Vec<ComboOutcome> = if self.config.parallel {
            combos
                .par_iter()
                .map(|combo| self.run_combo(dataset, *combo))
                .collect()
        } else {
            combos
                .iter()
                .map(|combo| self.run_combo(dataset, *combo))
                .collect()
        };

        let mut skipped = Vec::new();
        for outcome in outcomes {
            if outcome.skipped {
                skipped.push(outcome.combo);
            }
            failures.extend(outcome.failures);
            for (key, result) in outcome.results {
                registry.put(key, result)?;
            }
        }

        log::info!(
            "pipeline: registry keys={} unavailable={} failures={} skipped_combos={}",
            registry.len(),
            registry.unavailable_count(),
            failures.len(),
            skipped.len()
        );

        Ok(SnapshotBuild { metadata, registry, failures, skipped })
    }

    /// Compute every section of one combination.
    fn run_combo(&self, dataset: &Dataset, combo: FilterCombo) -> ComboOutcome {
        let views = FilteredViews::derive(&dataset.transactions, combo);
        let suffix = combo.suffix();

        if views.strict.is_empty() {
            let reason = GeoError::EmptyFilterResult { suffix: suffix.clone() }.to_string();
            log::warn!("combo{suffix}: skipped, {reason}");
            let results = self
                .expected_keys(combo)
                .into_iter()
                .map(|key| (key, AggregateResult::unavailable(reason.clone())))
                .collect();
            return ComboOutcome { combo, results, failures: Vec::new(), skipped: true };
        }

        log::info!(
            "combo{suffix}: strict={} renewal_only={} base={} ({})",
            views.strict.len(),
            views.renewal_only.len(),
            views.base.len(),
            combo.describe()
        );

        let ctx = SectionContext {
            views: &views,
            dataset,
            taxonomy: &self.taxonomy,
            config: &self.config,
        };

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for section in &self.sections {
            let output: SectionOutput = section.aggregate(&ctx);
            log::debug!("combo{suffix}: section {} produced {} keys", section.name(), output.len());
            for (key, result) in output {
                let result = self.settle(&key, result, &mut failures);
                results.push((key, result));
            }
        }

        ComboOutcome { combo, results, failures, skipped: false }
    }

    /// Turn a metric error into its sentinel, recording the failure.
    fn settle(
        &self,
        key: &RegistryKey,
        result: GeoResult<AggregateResult>,
        failures: &mut Vec<MetricFailure>,
    ) -> AggregateResult {
        match result {
            Ok(result) => result,
            Err(err) => {
                let reason = err.to_string();
                log::warn!("metric {key}: unavailable, {reason}");
                failures.push(MetricFailure { key: key.to_string(), reason: reason.clone() });
                AggregateResult::unavailable(reason)
            }
        }
    }
}

// ── Steps ────────────────────────────────────────────────────────────────────

/// Run-scoped checks. Anything failing here cannot be degraded safely.
pub fn validate_input(dataset: &Dataset) -> GeoResult<()> {
    dataset.validate_keys()?;
    for (index, row) in dataset.transactions.iter().enumerate() {
        check_transaction(index, row)?;
    }
    Ok(())
}

fn check_transaction(index: usize, row: &TransactionRecord) -> GeoResult<()> {
    let problem = if row.customer_id.is_empty() {
        Some("empty customer_id")
    } else if row.house_id.is_empty() {
        Some("empty house_id")
    } else if !row.revenue.is_finite() {
        Some("non-finite revenue")
    } else {
        None
    };
    match problem {
        Some(detail) => Err(GeoError::InvalidInput {
            table: "transactions".to_string(),
            detail: format!("row {index}: {detail}"),
        }),
        None => Ok(()),
    }
}

pub fn build_metadata(dataset: &Dataset) -> SnapshotMetadata {
    let ids = dataset
        .houses
        .iter()
        .flatten()
        .map(|h| h.house_id.as_str())
        .chain(dataset.transactions.iter().map(|t| t.house_id.as_str()));
    let houses = house_order(dataset.houses.as_deref(), ids)
        .into_iter()
        .map(|(house_id, name)| HouseEntry { house_id, name })
        .collect();

    let event_categories: BTreeSet<&str> = dataset
        .transactions
        .iter()
        .filter_map(|t| t.event_category.as_deref())
        .collect();

    let dates = dataset.transactions.iter().map(|t| t.created_at.date());

    SnapshotMetadata {
        houses,
        event_categories: event_categories.into_iter().map(str::to_string).collect(),
        date_min: dates.clone().min(),
        date_max: dates.max(),
        transaction_count: dataset.transactions.len(),
    }
}
