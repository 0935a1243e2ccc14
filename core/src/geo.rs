//! Distance / geo normalizer.
//!
//! RULE: The 3-tier scheme is a re-grouping of the 6-band scheme, never an
//! independent distance cut. Every record is banded first; its tier is then
//! looked up from the band. Both schemes therefore share one set of
//! boundary values.
//!
//! Bands are upper-exclusive: with boundaries `[50, 100, ...]` a distance of
//! exactly 50km falls into the second band.

use crate::{
    config::GeoConfig,
    dataset::{HousePopulationRow, TransactionRecord},
    error::GeoResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RADIUS_EPSILON_KM: f64 = 1e-6;

// ── Grouping schemes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupingScheme {
    #[serde(rename = "6band")]
    SixBand,
    #[serde(rename = "3tier")]
    ThreeTier,
}

impl GroupingScheme {
    /// Fixed enumeration order used everywhere keys are generated.
    pub const ALL: [GroupingScheme; 2] = [GroupingScheme::SixBand, GroupingScheme::ThreeTier];

    pub fn tag(&self) -> &'static str {
        match self {
            GroupingScheme::SixBand => "6band",
            GroupingScheme::ThreeTier => "3tier",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "6band" => Some(GroupingScheme::SixBand),
            "3tier" => Some(GroupingScheme::ThreeTier),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupingScheme::SixBand => "6 Distance Bands",
            GroupingScheme::ThreeTier => "3 Geo Tiers",
        }
    }
}

// ── Distance taxonomy ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTaxonomy {
    boundaries_km: Vec<f64>,
    band_labels: Vec<String>,
    tier_labels: Vec<String>,
    band_to_tier: Vec<usize>,
}

impl DistanceTaxonomy {
    pub fn from_config(config: &GeoConfig) -> GeoResult<Self> {
        config.validate()?;
        let mut band_to_tier = vec![0; config.band_count()];
        for (tier_idx, tier) in config.tiers.iter().enumerate() {
            for band in &tier.bands {
                band_to_tier[*band] = tier_idx;
            }
        }
        Ok(Self {
            boundaries_km: config.band_boundaries_km.clone(),
            band_labels: config.band_labels.clone(),
            tier_labels: config.tiers.iter().map(|t| t.label.clone()).collect(),
            band_to_tier,
        })
    }

    pub fn boundaries_km(&self) -> &[f64] {
        &self.boundaries_km
    }

    /// Ordered category labels for a scheme.
    pub fn categories(&self, scheme: GroupingScheme) -> &[String] {
        match scheme {
            GroupingScheme::SixBand => &self.band_labels,
            GroupingScheme::ThreeTier => &self.tier_labels,
        }
    }

    pub fn category_count(&self, scheme: GroupingScheme) -> usize {
        self.categories(scheme).len()
    }

    pub fn band_for_distance(&self, km: f64) -> Option<usize> {
        if !km.is_finite() || km < 0.0 {
            return None;
        }
        let band = self
            .boundaries_km
            .iter()
            .position(|upper| km < *upper)
            .unwrap_or(self.boundaries_km.len());
        Some(band)
    }

    pub fn band_for_label(&self, label: &str) -> Option<usize> {
        self.band_labels.iter().position(|l| l == label)
    }

    /// The band whose upper bound is `radius_km`, if any.
    pub fn band_for_radius(&self, radius_km: f64) -> Option<usize> {
        self.boundaries_km
            .iter()
            .position(|upper| (upper - radius_km).abs() < RADIUS_EPSILON_KM)
    }

    pub fn tier_of_band(&self, band: usize) -> usize {
        self.band_to_tier[band]
    }

    /// Band of a record: the precomputed label when it is a known band,
    /// otherwise the band of the numeric distance.
    pub fn band_of(&self, record: &TransactionRecord) -> Option<usize> {
        record
            .distance_band
            .as_deref()
            .and_then(|label| self.band_for_label(label))
            .or_else(|| record.distance_km.and_then(|km| self.band_for_distance(km)))
    }

    pub fn category_of(&self, record: &TransactionRecord, scheme: GroupingScheme) -> Option<usize> {
        let band = self.band_of(record)?;
        Some(self.regroup(band, scheme))
    }

    /// Map a 6-band index into the given scheme.
    pub fn regroup(&self, band: usize, scheme: GroupingScheme) -> usize {
        match scheme {
            GroupingScheme::SixBand => band,
            GroupingScheme::ThreeTier => self.tier_of_band(band),
        }
    }

    /// Incremental catchment population per 6-band category for one house.
    ///
    /// Input rows are cumulative (population within 50km, within 100km, ...);
    /// band i gets `cum(i) - cum(i-1)`, the last band gets
    /// `total - cum(second-to-last)`. Missing radii carry the previous
    /// cumulative value forward, and a cumulative value lower than its
    /// predecessor is lifted to it so no band goes negative.
    pub fn incremental_populations(&self, rows: &[&HousePopulationRow]) -> Vec<f64> {
        let mut cumulative: Vec<Option<f64>> = vec![None; self.boundaries_km.len()];
        let mut total: Option<f64> = None;
        for row in rows {
            match row.radius_km {
                None => total = Some(row.population),
                Some(radius) => match self.band_for_radius(radius) {
                    Some(band) => cumulative[band] = Some(row.population),
                    None => log::debug!(
                        "house={} population: radius {radius}km matches no band boundary",
                        row.house_id
                    ),
                },
            }
        }

        let mut incremental = Vec::with_capacity(self.band_labels.len());
        let mut previous = 0.0_f64;
        for value in cumulative {
            let current = value.unwrap_or(previous).max(previous);
            incremental.push(current - previous);
            previous = current;
        }
        let total = match total {
            Some(t) if t >= previous => t,
            Some(t) => {
                log::warn!("population: total {t} below cumulative {previous}; clamping");
                previous
            }
            None => previous,
        };
        incremental.push(total - previous);
        incremental
    }

    /// Sum 6-band values into the given scheme's categories.
    pub fn regroup_values(&self, band_values: &[f64], scheme: GroupingScheme) -> Vec<f64> {
        let mut out = vec![0.0; self.category_count(scheme)];
        for (band, value) in band_values.iter().enumerate() {
            out[self.regroup(band, scheme)] += value;
        }
        out
    }
}

// ── Geographic keys ──────────────────────────────────────────────────────────

/// Canonical grouping key of a PLZ code: the merged city name when the code
/// belongs to a multi-code metro area, the code itself otherwise.
pub fn canonical_geo_key<'a>(plz: &'a str, merge_table: &'a BTreeMap<String, String>) -> &'a str {
    merge_table.get(plz).map(String::as_str).unwrap_or(plz)
}

/// Population-weighted centroid: `Σ(lat·pop) / Σpop`, likewise for longitude.
/// Returns `None` when the total population is zero.
pub fn weighted_centroid<I>(points: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = (f64, f64, f64)>,
{
    let (mut w_lat, mut w_lon, mut total) = (0.0, 0.0, 0.0);
    for (lat, lon, pop) in points {
        w_lat += lat * pop;
        w_lon += lon * pop;
        total += pop;
    }
    if total == 0.0 {
        return None;
    }
    Some((w_lat / total, w_lon / total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> DistanceTaxonomy {
        DistanceTaxonomy::from_config(&GeoConfig::default_test()).unwrap()
    }

    fn pop_row(radius_km: Option<f64>, population: f64) -> HousePopulationRow {
        HousePopulationRow { house_id: "h1".into(), radius_km, population }
    }

    #[test]
    fn distances_fall_into_upper_exclusive_bands() {
        let t = taxonomy();
        assert_eq!(t.band_for_distance(0.0), Some(0));
        assert_eq!(t.band_for_distance(49.9), Some(0));
        assert_eq!(t.band_for_distance(50.0), Some(1));
        assert_eq!(t.band_for_distance(499.0), Some(4));
        assert_eq!(t.band_for_distance(1200.0), Some(5));
        assert_eq!(t.band_for_distance(-1.0), None);
        assert_eq!(t.band_for_distance(f64::NAN), None);
    }

    #[test]
    fn every_band_maps_to_exactly_one_tier() {
        let t = taxonomy();
        let mut covered = vec![0; t.category_count(GroupingScheme::ThreeTier)];
        for band in 0..t.category_count(GroupingScheme::SixBand) {
            covered[t.tier_of_band(band)] += 1;
        }
        assert_eq!(covered.iter().sum::<usize>(), 6);
        assert!(covered.iter().all(|c| *c > 0), "every tier must hold a band: {covered:?}");
    }

    #[test]
    fn tier_of_a_distance_matches_tier_of_its_band() {
        let t = taxonomy();
        for km in [0.0, 42.0, 50.0, 99.9, 150.0, 250.0, 300.0, 480.0, 700.0] {
            let band = t.band_for_distance(km).unwrap();
            assert_eq!(t.regroup(band, GroupingScheme::ThreeTier), t.tier_of_band(band));
        }
    }

    #[test]
    fn incremental_population_differences_cumulative_bands() {
        let t = taxonomy();
        let rows = [
            pop_row(Some(50.0), 100.0),
            pop_row(Some(100.0), 250.0),
            pop_row(Some(200.0), 400.0),
            pop_row(Some(300.0), 700.0),
            pop_row(Some(500.0), 900.0),
            pop_row(None, 1500.0),
        ];
        let refs: Vec<&HousePopulationRow> = rows.iter().collect();
        let inc = t.incremental_populations(&refs);
        assert_eq!(inc, vec![100.0, 150.0, 150.0, 300.0, 200.0, 600.0]);
        assert!((inc.iter().sum::<f64>() - 1500.0).abs() < 1e-9);

        let tiers = t.regroup_values(&inc, GroupingScheme::ThreeTier);
        assert_eq!(tiers, vec![250.0, 450.0, 800.0]);
    }

    #[test]
    fn non_monotone_cumulative_never_goes_negative() {
        let t = taxonomy();
        let rows = [
            pop_row(Some(50.0), 300.0),
            pop_row(Some(100.0), 200.0),
            pop_row(None, 1000.0),
        ];
        let refs: Vec<&HousePopulationRow> = rows.iter().collect();
        let inc = t.incremental_populations(&refs);
        assert!(inc.iter().all(|v| *v >= 0.0), "negative band in {inc:?}");
        assert!((inc.iter().sum::<f64>() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn merged_codes_resolve_to_city_key() {
        let config = GeoConfig::default_test();
        assert_eq!(canonical_geo_key("101", &config.merge_table), "Berlin");
        assert_eq!(canonical_geo_key("200", &config.merge_table), "Hamburg");
        assert_eq!(canonical_geo_key("011", &config.merge_table), "011");
    }

    #[test]
    fn centroid_is_population_weighted() {
        let c = weighted_centroid([(52.0, 13.0, 3000.0), (53.0, 14.0, 1000.0)]).unwrap();
        assert!((c.0 - 52.25).abs() < 1e-9);
        assert!((c.1 - 13.25).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_zero_population_is_none() {
        assert_eq!(weighted_centroid([(52.0, 13.0, 0.0), (53.0, 14.0, 0.0)]), None);
        assert_eq!(weighted_centroid(Vec::<(f64, f64, f64)>::new()), None);
    }
}
