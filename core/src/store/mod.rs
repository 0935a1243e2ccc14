//! SQLite source-data cache.
//!
//! RULE: Only the store talks to the database. The pipeline receives a
//! fully materialised `Dataset` and never executes SQL.
//!
//! Every table's columns are checked against the expected schema before it
//! is read, so a missing column surfaces as `SchemaMismatch` naming the
//! table and column instead of a query error deep inside a load.
//!
//! RULE: Only `transactions` is mandatory. An auxiliary table that does not
//! exist loads as `None` and its dependent metrics degrade to sentinels.

use crate::{
    dataset::{Dataset, TABLE_CITY_POPULATION, TABLE_GEO, TABLE_HOUSES, TABLE_HOUSE_POPULATION},
    error::{GeoError, GeoResult},
};
use rusqlite::Connection;
use std::collections::HashSet;

mod dimensions;
mod transactions;

pub const TABLE_TRANSACTIONS: &str = "transactions";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Required columns per table, checked before any read.
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        TABLE_TRANSACTIONS,
        &[
            "customer_id",
            "created_at",
            "plz",
            "city",
            "distance_km",
            "distance_band",
            "revenue",
            "ftb_rb",
            "is_renewal",
            "channel_type",
            "platform",
            "house_id",
            "event_category",
        ],
    ),
    (TABLE_HOUSES, &["house_id", "name", "rank"]),
    (TABLE_HOUSE_POPULATION, &["house_id", "radius_km", "population"]),
    (TABLE_GEO, &["plz", "latitude", "longitude", "population", "name"]),
    (TABLE_CITY_POPULATION, &["city", "population"]),
];

pub struct DatasetStore {
    conn: Connection,
}

impl DatasetStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &str) -> GeoResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; ignore failures elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GeoResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GeoResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_source_cache.sql"))?;
        Ok(())
    }

    /// Direct connection access for tests and tooling only.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Schema ─────────────────────────────────────────────────────

    /// Column names of `table`; empty when the table does not exist.
    pub fn table_columns(&self, table: &str) -> GeoResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(columns)
    }

    /// Fail with `SchemaMismatch` on the first required column `table` lacks.
    pub fn check_columns(&self, table: &str) -> GeoResult<()> {
        let Some((_, required)) = REQUIRED_COLUMNS.iter().find(|(name, _)| *name == table) else {
            return Ok(());
        };
        let present = self.table_columns(table)?;
        match required.iter().find(|column| !present.contains(**column)) {
            Some(column) => Err(GeoError::SchemaMismatch {
                table: table.to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn has_table(&self, table: &str) -> GeoResult<bool> {
        Ok(!self.table_columns(table)?.is_empty())
    }

    /// Checks `transactions` and every auxiliary table that exists.
    pub fn check_schema(&self) -> GeoResult<()> {
        for (table, _) in REQUIRED_COLUMNS {
            if *table == TABLE_TRANSACTIONS || self.has_table(table)? {
                self.check_columns(table)?;
            }
        }
        Ok(())
    }

    // ── Dataset ────────────────────────────────────────────────────

    /// True when the cache holds at least one transaction.
    pub fn has_data(&self) -> GeoResult<bool> {
        if self.table_columns(TABLE_TRANSACTIONS)?.is_empty() {
            return Ok(false);
        }
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Replace the cached dataset in a single transaction.
    pub fn save_dataset(&mut self, dataset: &Dataset) -> GeoResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM transactions;
             DELETE FROM house;
             DELETE FROM house_population;
             DELETE FROM geo_dimension;
             DELETE FROM city_population;",
        )?;
        transactions::insert_all(&tx, &dataset.transactions)?;
        if let Some(houses) = &dataset.houses {
            dimensions::insert_houses(&tx, houses)?;
        }
        if let Some(rows) = &dataset.house_population {
            dimensions::insert_house_population(&tx, rows)?;
        }
        if let Some(rows) = &dataset.geo {
            dimensions::insert_geo(&tx, rows)?;
        }
        if let Some(rows) = &dataset.city_population {
            dimensions::insert_city_population(&tx, rows)?;
        }
        tx.commit()?;
        log::info!(
            "store: cached {} transactions",
            dataset.transactions.len()
        );
        Ok(())
    }

    /// Load the full dataset. An auxiliary table that is absent or has zero
    /// rows loads as `None` so dependent metrics degrade instead of producing
    /// empty joins.
    pub fn load_dataset(&self) -> GeoResult<Dataset> {
        self.check_schema()?;

        let transactions = transactions::load_all(&self.conn)?;
        let dataset = Dataset {
            transactions,
            houses: self.load_auxiliary(TABLE_HOUSES, dimensions::load_houses)?,
            house_population: self
                .load_auxiliary(TABLE_HOUSE_POPULATION, dimensions::load_house_population)?,
            geo: self.load_auxiliary(TABLE_GEO, dimensions::load_geo)?,
            city_population: self
                .load_auxiliary(TABLE_CITY_POPULATION, dimensions::load_city_population)?,
        };
        log::info!(
            "store: loaded {} transactions (houses={} house_population={} geo={} city_population={})",
            dataset.transactions.len(),
            dataset.houses.is_some(),
            dataset.house_population.is_some(),
            dataset.geo.is_some(),
            dataset.city_population.is_some()
        );
        Ok(dataset)
    }

    fn load_auxiliary<T>(
        &self,
        table: &str,
        load: fn(&Connection) -> GeoResult<Vec<T>>,
    ) -> GeoResult<Option<Vec<T>>> {
        if !self.has_table(table)? {
            log::warn!("store: table '{table}' is absent, dependent metrics will be unavailable");
            return Ok(None);
        }
        Ok(non_empty(load(&self.conn)?))
    }
}

fn non_empty<T>(rows: Vec<T>) -> Option<Vec<T>> {
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}
