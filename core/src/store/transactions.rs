use super::{TABLE_TRANSACTIONS, TIMESTAMP_FORMAT};
use crate::{
    dataset::{BuyerType, TransactionRecord},
    error::{GeoError, GeoResult},
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

// ── Transactions ──────────────────────────────────────────────────

pub(super) fn insert_all(conn: &Connection, rows: &[TransactionRecord]) -> GeoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO transactions (customer_id, created_at, plz, city, distance_km, distance_band,
                                   revenue, ftb_rb, is_renewal, channel_type, platform, house_id,
                                   event_category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.customer_id,
            row.created_at.format(TIMESTAMP_FORMAT).to_string(),
            row.plz,
            row.city,
            row.distance_km,
            row.distance_band,
            row.revenue,
            row.ftb_rb.as_str(),
            row.is_renewal as i32,
            row.channel_type,
            row.platform,
            row.house_id,
            row.event_category,
        ])?;
    }
    Ok(())
}

/// Raw row as stored; timestamps and flags are parsed afterwards so a bad
/// value can name its row.
struct RawTransaction {
    id: i64,
    customer_id: String,
    created_at: String,
    plz: String,
    city: Option<String>,
    distance_km: Option<f64>,
    distance_band: Option<String>,
    revenue: f64,
    ftb_rb: String,
    is_renewal: bool,
    channel_type: Option<String>,
    platform: Option<String>,
    house_id: String,
    event_category: Option<String>,
}

pub(super) fn load_all(conn: &Connection) -> GeoResult<Vec<TransactionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_id, created_at, plz, city, distance_km, distance_band, revenue,
                ftb_rb, is_renewal, channel_type, platform, house_id, event_category
         FROM transactions ORDER BY id ASC",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok(RawTransaction {
                id: row.get(0)?,
                customer_id: row.get(1)?,
                created_at: row.get(2)?,
                plz: row.get(3)?,
                city: row.get(4)?,
                distance_km: row.get(5)?,
                distance_band: row.get(6)?,
                revenue: row.get(7)?,
                ftb_rb: row.get(8)?,
                is_renewal: row.get::<_, i32>(9)? != 0,
                channel_type: row.get(10)?,
                platform: row.get(11)?,
                house_id: row.get(12)?,
                event_category: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter().map(parse).collect()
}

fn parse(raw: RawTransaction) -> GeoResult<TransactionRecord> {
    let invalid = |detail: String| GeoError::InvalidInput {
        table: TABLE_TRANSACTIONS.to_string(),
        detail: format!("row {}: {detail}", raw.id),
    };
    let created_at = NaiveDateTime::parse_from_str(&raw.created_at, TIMESTAMP_FORMAT)
        .map_err(|e| invalid(format!("bad created_at '{}': {e}", raw.created_at)))?;
    let ftb_rb = BuyerType::parse(&raw.ftb_rb)
        .ok_or_else(|| invalid(format!("bad ftb_rb '{}'", raw.ftb_rb)))?;

    Ok(TransactionRecord {
        customer_id: raw.customer_id,
        created_at,
        plz: raw.plz,
        city: raw.city,
        distance_km: raw.distance_km,
        distance_band: raw.distance_band,
        revenue: raw.revenue,
        ftb_rb,
        is_renewal: raw.is_renewal,
        channel_type: raw.channel_type,
        platform: raw.platform,
        house_id: raw.house_id,
        event_category: raw.event_category,
    })
}
