//! Snapshot document: the packaged output of one export run.
//!
//! The document carries the registry verbatim plus the toggle contract a
//! client needs to map its live filter state onto registry keys.

use crate::{
    error::GeoResult,
    filter::{CustomerType, FilterCombo, RenewalMode},
    geo::GroupingScheme,
    pipeline::{MetricFailure, SnapshotBuild, SnapshotMetadata},
    registry::Registry,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

pub const KEY_GRAMMAR: &str = "<metric>[_<groupingTag>][__<customerType>__<renewal>]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleState {
    pub customer_type: String,
    pub renewal: String,
    pub grouping: String,
}

/// Client-side toggle contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Toggles {
    pub customer_type: Vec<ToggleOption>,
    pub renewal: Vec<ToggleOption>,
    pub grouping: Vec<ToggleOption>,
    pub default: ToggleState,
    pub key_grammar: String,
}

impl Toggles {
    pub fn standard() -> Self {
        let default = FilterCombo::DEFAULT;
        Self {
            customer_type: CustomerType::ALL
                .iter()
                .map(|c| ToggleOption { value: c.tag().into(), label: c.label().into() })
                .collect(),
            renewal: RenewalMode::ALL
                .iter()
                .map(|r| ToggleOption { value: r.tag().into(), label: r.label().into() })
                .collect(),
            grouping: GroupingScheme::ALL
                .iter()
                .map(|g| ToggleOption { value: g.tag().into(), label: g.label().into() })
                .collect(),
            default: ToggleState {
                customer_type: default.customer_type.tag().into(),
                renewal: default.renewal.tag().into(),
                grouping: GroupingScheme::SixBand.tag().into(),
            },
            key_grammar: KEY_GRAMMAR.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub exported_on: NaiveDate,
    pub metadata: SnapshotMetadata,
    pub toggles: Toggles,
    pub failures: Vec<MetricFailure>,
    pub charts: Registry,
}

impl Snapshot {
    /// `exported_on` is passed in so identical runs serialise identically.
    pub fn from_build(build: SnapshotBuild, exported_on: NaiveDate) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            exported_on,
            metadata: build.metadata,
            toggles: Toggles::standard(),
            failures: build.failures,
            charts: build.registry,
        }
    }

    pub fn to_json(&self) -> GeoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> GeoResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> GeoResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("snapshot: wrote {} charts to {}", self.charts.len(), path.display());
        Ok(())
    }
}
