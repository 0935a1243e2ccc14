use crate::{
    dataset::{CityPopulationRow, GeoDimensionRow, HouseMeta, HousePopulationRow},
    error::GeoResult,
};
use rusqlite::{params, Connection};

// ── Houses ────────────────────────────────────────────────────────

pub(super) fn insert_houses(conn: &Connection, rows: &[HouseMeta]) -> GeoResult<()> {
    let mut stmt = conn.prepare("INSERT INTO house (house_id, name, rank) VALUES (?1, ?2, ?3)")?;
    for row in rows {
        stmt.execute(params![row.house_id, row.name, row.rank])?;
    }
    Ok(())
}

pub(super) fn load_houses(conn: &Connection) -> GeoResult<Vec<HouseMeta>> {
    let mut stmt = conn.prepare("SELECT house_id, name, rank FROM house ORDER BY rank, house_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(HouseMeta {
            house_id: row.get(0)?,
            name: row.get(1)?,
            rank: row.get(2)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Catchment population ──────────────────────────────────────────

pub(super) fn insert_house_population(conn: &Connection, rows: &[HousePopulationRow]) -> GeoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO house_population (house_id, radius_km, population) VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.house_id, row.radius_km, row.population])?;
    }
    Ok(())
}

pub(super) fn load_house_population(conn: &Connection) -> GeoResult<Vec<HousePopulationRow>> {
    let mut stmt = conn.prepare(
        "SELECT house_id, radius_km, population FROM house_population ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HousePopulationRow {
            house_id: row.get(0)?,
            radius_km: row.get(1)?,
            population: row.get(2)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Geo dimension ─────────────────────────────────────────────────

pub(super) fn insert_geo(conn: &Connection, rows: &[GeoDimensionRow]) -> GeoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO geo_dimension (plz, latitude, longitude, population, name)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![row.plz, row.latitude, row.longitude, row.population, row.name])?;
    }
    Ok(())
}

pub(super) fn load_geo(conn: &Connection) -> GeoResult<Vec<GeoDimensionRow>> {
    let mut stmt = conn.prepare(
        "SELECT plz, latitude, longitude, population, name FROM geo_dimension ORDER BY plz",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(GeoDimensionRow {
            plz: row.get(0)?,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            population: row.get(3)?,
            name: row.get(4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── City population ───────────────────────────────────────────────

pub(super) fn insert_city_population(conn: &Connection, rows: &[CityPopulationRow]) -> GeoResult<()> {
    let mut stmt = conn.prepare("INSERT INTO city_population (city, population) VALUES (?1, ?2)")?;
    for row in rows {
        stmt.execute(params![row.city, row.population])?;
    }
    Ok(())
}

pub(super) fn load_city_population(conn: &Connection) -> GeoResult<Vec<CityPopulationRow>> {
    let mut stmt = conn.prepare("SELECT city, population FROM city_population ORDER BY city")?;
    let rows = stmt.query_map([], |row| {
        Ok(CityPopulationRow {
            city: row.get(0)?,
            population: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
