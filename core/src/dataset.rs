//! Source dataset: the typed tables handed to the pipeline.
//!
//! RULE: Everything here is read-only once loaded. The pipeline borrows
//! the dataset for the whole run and never mutates a record.

use crate::{
    error::{GeoError, GeoResult},
    types::{CustomerId, HouseId, PlzCode},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Transactions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BuyerType {
    #[serde(rename = "FTB")]
    FirstTime,
    #[serde(rename = "RB")]
    Returning,
}

impl BuyerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuyerType::FirstTime => "FTB",
            BuyerType::Returning => "RB",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FTB" => Some(BuyerType::FirstTime),
            "RB" => Some(BuyerType::Returning),
            _ => None,
        }
    }
}

/// One customer event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub customer_id: CustomerId,
    pub created_at: NaiveDateTime,
    pub plz: PlzCode,
    pub city: Option<String>,
    pub distance_km: Option<f64>,
    /// Precomputed band label; wins over `distance_km` when present.
    pub distance_band: Option<String>,
    pub revenue: f64,
    pub ftb_rb: BuyerType,
    pub is_renewal: bool,
    pub channel_type: Option<String>,
    pub platform: Option<String>,
    pub house_id: HouseId,
    pub event_category: Option<String>,
}

// ── Dimension tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseMeta {
    pub house_id: HouseId,
    pub name: String,
    /// Canonical display order; lower comes first.
    pub rank: i64,
}

/// Cumulative catchment population of a house within `radius_km`.
/// `radius_km == None` is the house's total catchment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HousePopulationRow {
    pub house_id: HouseId,
    pub radius_km: Option<f64>,
    pub population: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoDimensionRow {
    pub plz: PlzCode,
    pub latitude: f64,
    pub longitude: f64,
    pub population: Option<f64>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityPopulationRow {
    pub city: String,
    pub population: f64,
}

// ── Dataset ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub transactions: Vec<TransactionRecord>,
    pub houses: Option<Vec<HouseMeta>>,
    pub house_population: Option<Vec<HousePopulationRow>>,
    pub geo: Option<Vec<GeoDimensionRow>>,
    pub city_population: Option<Vec<CityPopulationRow>>,
}

pub const TABLE_HOUSES: &str = "house";
pub const TABLE_HOUSE_POPULATION: &str = "house_population";
pub const TABLE_GEO: &str = "geo_dimension";
pub const TABLE_CITY_POPULATION: &str = "city_population";

impl Dataset {
    pub fn new(transactions: Vec<TransactionRecord>) -> Self {
        Self {
            transactions,
            ..Self::default()
        }
    }

    pub fn with_houses(mut self, houses: Vec<HouseMeta>) -> Self {
        self.houses = Some(houses);
        self
    }

    pub fn with_house_population(mut self, rows: Vec<HousePopulationRow>) -> Self {
        self.house_population = Some(rows);
        self
    }

    pub fn with_geo(mut self, rows: Vec<GeoDimensionRow>) -> Self {
        self.geo = Some(rows);
        self
    }

    pub fn with_city_population(mut self, rows: Vec<CityPopulationRow>) -> Self {
        self.city_population = Some(rows);
        self
    }

    pub fn houses(&self) -> GeoResult<&[HouseMeta]> {
        self.houses.as_deref().ok_or_else(|| GeoError::missing(TABLE_HOUSES))
    }

    pub fn house_population(&self) -> GeoResult<&[HousePopulationRow]> {
        self.house_population
            .as_deref()
            .ok_or_else(|| GeoError::missing(TABLE_HOUSE_POPULATION))
    }

    pub fn geo(&self) -> GeoResult<&[GeoDimensionRow]> {
        self.geo.as_deref().ok_or_else(|| GeoError::missing(TABLE_GEO))
    }

    pub fn city_population(&self) -> GeoResult<&[CityPopulationRow]> {
        self.city_population
            .as_deref()
            .ok_or_else(|| GeoError::missing(TABLE_CITY_POPULATION))
    }

    /// Auxiliary tables must be keyed uniquely. A duplicate key would make
    /// every join ambiguous, so it is fatal for the run.
    pub fn validate_keys(&self) -> GeoResult<()> {
        if let Some(houses) = &self.houses {
            ensure_unique(TABLE_HOUSES, houses.iter().map(|h| h.house_id.as_str()))?;
        }
        if let Some(geo) = &self.geo {
            ensure_unique(TABLE_GEO, geo.iter().map(|g| g.plz.as_str()))?;
        }
        if let Some(cities) = &self.city_population {
            ensure_unique(TABLE_CITY_POPULATION, cities.iter().map(|c| c.city.as_str()))?;
        }
        Ok(())
    }
}

fn ensure_unique<'a>(table: &str, keys: impl Iterator<Item = &'a str>) -> GeoResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(GeoError::InvalidInput {
                table: table.to_string(),
                detail: format!("duplicate key '{key}'"),
            });
        }
    }
    Ok(())
}
