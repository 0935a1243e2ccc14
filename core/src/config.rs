use crate::error::{GeoError, GeoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Distance taxonomy ──────────────────────────────────────────────

/// The fine scheme always has six bands and the coarse one three tiers;
/// the registry's `6band` / `3tier` tags depend on it.
pub const BAND_COUNT: usize = 6;
pub const TIER_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierConfig {
    pub label: String,
    /// Indices into the 6-band taxonomy. Must be a contiguous run.
    pub bands: Vec<usize>,
}

// ── Pipeline config ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeoConfig {
    /// Upper bounds (km) of every band except the last, strictly increasing.
    pub band_boundaries_km: Vec<f64>,
    pub band_labels: Vec<String>,
    pub tiers: Vec<TierConfig>,
    /// PLZ code -> canonical city key for multi-code metro areas.
    pub merge_table: BTreeMap<String, String>,
    pub platform_candidates: Vec<String>,
    pub city_table_top_n: usize,
    pub pct_decimals: u32,
    pub rate_decimals: u32,
    pub parallel: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            band_boundaries_km: vec![50.0, 100.0, 200.0, 300.0, 500.0],
            band_labels: vec![
                "0-50km".into(),
                "50-100km".into(),
                "100-200km".into(),
                "200-300km".into(),
                "300-500km".into(),
                "500+km".into(),
            ],
            tiers: vec![
                TierConfig { label: "Local (0-100km)".into(), bands: vec![0, 1] },
                TierConfig { label: "Regional (100-300km)".into(), bands: vec![2, 3] },
                TierConfig { label: "National (300km+)".into(), bands: vec![4, 5] },
            ],
            merge_table: default_merge_table(),
            platform_candidates: vec![
                "Meta".into(),
                "Google".into(),
                "Direct".into(),
                "Organic".into(),
            ],
            city_table_top_n: 20,
            pct_decimals: 1,
            rate_decimals: 2,
            parallel: false,
        }
    }
}

/// Berlin (10x-14x) and Hamburg (20x-22x) 3-digit PLZ groups.
fn default_merge_table() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    for code in (101..=109).chain(120..=125).chain(130..=136).chain(140..=141) {
        m.insert(code.to_string(), "Berlin".to_string());
    }
    for code in (200..=229).filter(|c| ![213, 214, 215, 216, 217, 218, 219].contains(c)) {
        m.insert(code.to_string(), "Hamburg".to_string());
    }
    m
}

impl GeoConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    /// In tests, use GeoConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GeoConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with a small merge table for use in unit tests.
    pub fn default_test() -> Self {
        let mut merge_table = BTreeMap::new();
        merge_table.insert("101".to_string(), "Berlin".to_string());
        merge_table.insert("102".to_string(), "Berlin".to_string());
        merge_table.insert("200".to_string(), "Hamburg".to_string());
        Self {
            merge_table,
            ..Self::default()
        }
    }

    pub fn band_count(&self) -> usize {
        self.band_labels.len()
    }

    /// Checks the taxonomy invariants: boundaries strictly increasing, one
    /// label per band, and tiers forming an ordered, disjoint, exhaustive
    /// partition of the bands into contiguous runs.
    pub fn validate(&self) -> GeoResult<()> {
        if self.band_boundaries_km.is_empty() {
            return Err(GeoError::InvalidConfig("no band boundaries".into()));
        }
        if self
            .band_boundaries_km
            .windows(2)
            .any(|w| w[0] >= w[1])
            || self.band_boundaries_km.iter().any(|b| !b.is_finite() || *b <= 0.0)
        {
            return Err(GeoError::InvalidConfig(
                "band boundaries must be positive and strictly increasing".into(),
            ));
        }
        if self.band_labels.len() != self.band_boundaries_km.len() + 1 {
            return Err(GeoError::InvalidConfig(format!(
                "{} band labels for {} boundaries (expected {})",
                self.band_labels.len(),
                self.band_boundaries_km.len(),
                self.band_boundaries_km.len() + 1
            )));
        }

        if self.band_count() != BAND_COUNT || self.tiers.len() != TIER_COUNT {
            return Err(GeoError::InvalidConfig(format!(
                "expected {BAND_COUNT} bands in {TIER_COUNT} tiers, found {} bands in {} tiers",
                self.band_count(),
                self.tiers.len()
            )));
        }

        let mut next_band = 0usize;
        for tier in &self.tiers {
            if tier.bands.is_empty() {
                return Err(GeoError::InvalidConfig(format!("tier '{}' has no bands", tier.label)));
            }
            for band in &tier.bands {
                if *band != next_band {
                    return Err(GeoError::InvalidConfig(format!(
                        "tier '{}' must continue at band {next_band}, found {band}",
                        tier.label
                    )));
                }
                next_band += 1;
            }
        }
        if next_band != self.band_count() {
            return Err(GeoError::InvalidConfig(format!(
                "tiers cover {next_band} of {} bands",
                self.band_count()
            )));
        }

        if self.city_table_top_n == 0 {
            return Err(GeoError::InvalidConfig("city_table_top_n must be > 0".into()));
        }
        Ok(())
    }
}
