//! Aggregation sections: groups of metrics computed together per filter
//! combination.
//!
//! RULE: Sections run in a fixed order: LocalImpact, RegionActivation,
//! GeoMix, PlatformInsights, CityPerformance. A section reads only the
//! context it is handed and never another section's output.

use crate::{
    aggregate::{
        acquisition::{first_time_share, lifetime_value},
        activation::{activation_by_house, activation_series, population_activation},
        city::city_performance,
        composition::{composition_abs, composition_pct, VolumeMetric},
        geo_mix::geo_mix_by_house,
        platform::platform_composition,
        AggregateResult,
    },
    config::GeoConfig,
    dataset::Dataset,
    error::{GeoError, GeoResult},
    filter::{FilterCombo, FilteredViews},
    geo::{DistanceTaxonomy, GroupingScheme},
    registry::{MetricId, RegistryKey},
};

/// Everything a section may read for one filter combination.
pub struct SectionContext<'a> {
    pub views: &'a FilteredViews<'a>,
    pub dataset: &'a Dataset,
    pub taxonomy: &'a DistanceTaxonomy,
    pub config: &'a GeoConfig,
}

impl SectionContext<'_> {
    pub fn combo(&self) -> FilterCombo {
        self.views.combo
    }
}

pub type SectionOutput = Vec<(RegistryKey, GeoResult<AggregateResult>)>;

/// The contract every aggregation section fulfils.
pub trait AggregationSection: Send + Sync {
    /// Unique stable name for this section.
    fn name(&self) -> &'static str;

    /// Metrics this section produces, in output order.
    fn metrics(&self) -> &'static [MetricId];

    /// Every key this section writes for `combo`.
    fn expected_keys(&self, combo: FilterCombo) -> Vec<RegistryKey> {
        let mut keys = Vec::new();
        for metric in self.metrics() {
            if metric.grouped() {
                for scheme in GroupingScheme::ALL {
                    keys.push(RegistryKey::grouped(*metric, scheme, combo));
                }
            } else {
                keys.push(RegistryKey::ungrouped(*metric, combo));
            }
        }
        keys
    }

    /// Compute every expected key. A failing metric returns its error in
    /// place; it never aborts the other metrics of the section.
    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput;
}

/// All sections in execution order.
pub fn standard_sections() -> Vec<Box<dyn AggregationSection>> {
    vec![
        Box::new(LocalImpact),
        Box::new(RegionActivation),
        Box::new(GeoMix),
        Box::new(PlatformInsights),
        Box::new(CityPerformance),
    ]
}

// ── Local impact ─────────────────────────────────────────────────────────────

/// Weekly composition, first-time share and lifetime value.
pub struct LocalImpact;

impl AggregationSection for LocalImpact {
    fn name(&self) -> &'static str {
        "local_impact"
    }

    fn metrics(&self) -> &'static [MetricId] {
        &[
            MetricId::CompPct,
            MetricId::CompCustomers,
            MetricId::CompRevenue,
            MetricId::CompSpc,
            MetricId::Fts,
            MetricId::Ltv,
        ]
    }

    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput {
        let combo = ctx.combo();
        let strict = &ctx.views.strict;
        let mut out = Vec::new();
        for metric in self.metrics() {
            for scheme in GroupingScheme::ALL {
                let result = match metric {
                    MetricId::CompPct => Ok(composition_pct(strict, ctx.taxonomy, scheme, ctx.config.pct_decimals)),
                    MetricId::CompCustomers => Ok(composition_abs(strict, ctx.taxonomy, scheme, VolumeMetric::Customers)),
                    MetricId::CompRevenue => Ok(composition_abs(strict, ctx.taxonomy, scheme, VolumeMetric::Revenue)),
                    MetricId::CompSpc => Ok(composition_abs(strict, ctx.taxonomy, scheme, VolumeMetric::Spc)),
                    MetricId::Fts => Ok(first_time_share(ctx.views, ctx.taxonomy, scheme, ctx.config.pct_decimals)),
                    MetricId::Ltv => Ok(lifetime_value(ctx.views, ctx.taxonomy, scheme)),
                    other => Err(GeoError::UnsupportedMetric {
                        section: self.name().to_string(),
                        metric: other.as_str().to_string(),
                    }),
                };
                out.push((RegistryKey::grouped(*metric, scheme, combo), result));
            }
        }
        out
    }
}

// ── Region activation ────────────────────────────────────────────────────────

/// Catchment population, weekly activation and per-house activation.
pub struct RegionActivation;

impl AggregationSection for RegionActivation {
    fn name(&self) -> &'static str {
        "region_activation"
    }

    fn metrics(&self) -> &'static [MetricId] {
        &[MetricId::PopHouse, MetricId::ActWeekly, MetricId::ActCumul, MetricId::ActByHouse]
    }

    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput {
        let combo = ctx.combo();
        let strict = &ctx.views.strict;
        let decimals = ctx.config.rate_decimals;
        let mut out = Vec::new();
        for scheme in GroupingScheme::ALL {
            out.push((
                RegistryKey::grouped(MetricId::PopHouse, scheme, combo),
                population_activation(strict, ctx.dataset, ctx.taxonomy, scheme, decimals),
            ));
        }
        for (metric, cumulative) in [(MetricId::ActWeekly, false), (MetricId::ActCumul, true)] {
            for scheme in GroupingScheme::ALL {
                out.push((
                    RegistryKey::grouped(metric, scheme, combo),
                    Ok(activation_series(strict, ctx.taxonomy, scheme, cumulative)),
                ));
            }
        }
        out.push((
            RegistryKey::ungrouped(MetricId::ActByHouse, combo),
            activation_by_house(strict, ctx.dataset, ctx.taxonomy, decimals),
        ));
        out
    }
}

// ── Geo mix ──────────────────────────────────────────────────────────────────

pub struct GeoMix;

impl AggregationSection for GeoMix {
    fn name(&self) -> &'static str {
        "geo_mix"
    }

    fn metrics(&self) -> &'static [MetricId] {
        &[MetricId::GeoMix]
    }

    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput {
        GroupingScheme::ALL
            .into_iter()
            .map(|scheme| {
                (
                    RegistryKey::grouped(MetricId::GeoMix, scheme, ctx.combo()),
                    geo_mix_by_house(
                        &ctx.views.strict,
                        ctx.dataset,
                        ctx.taxonomy,
                        scheme,
                        ctx.config.pct_decimals,
                    ),
                )
            })
            .collect()
    }
}

// ── Platform insights ────────────────────────────────────────────────────────

pub struct PlatformInsights;

impl AggregationSection for PlatformInsights {
    fn name(&self) -> &'static str {
        "platform_insights"
    }

    fn metrics(&self) -> &'static [MetricId] {
        &[MetricId::Platform]
    }

    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput {
        GroupingScheme::ALL
            .into_iter()
            .map(|scheme| {
                (
                    RegistryKey::grouped(MetricId::Platform, scheme, ctx.combo()),
                    Ok(platform_composition(
                        &ctx.views.strict,
                        &ctx.config.platform_candidates,
                        ctx.taxonomy,
                        scheme,
                        ctx.config.pct_decimals,
                    )),
                )
            })
            .collect()
    }
}

// ── City performance ─────────────────────────────────────────────────────────

pub struct CityPerformance;

impl AggregationSection for CityPerformance {
    fn name(&self) -> &'static str {
        "city_performance"
    }

    fn metrics(&self) -> &'static [MetricId] {
        &[MetricId::CityTable]
    }

    fn aggregate(&self, ctx: &SectionContext<'_>) -> SectionOutput {
        vec![(
            RegistryKey::ungrouped(MetricId::CityTable, ctx.combo()),
            city_performance(
                &ctx.views.strict,
                ctx.dataset,
                ctx.config.city_table_top_n,
                ctx.config.rate_decimals,
            ),
        )]
    }
}
