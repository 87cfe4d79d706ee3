use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::record::{ListingId, VehicleRecord};

/// Where a finalized batch goes. Keyed by listing URL; a second write of the
/// same listing replaces the stored fields.
pub trait VehicleSink {
    fn upsert(&self, records: &[VehicleRecord]) -> Result<usize>;
}

impl VehicleSink for Connection {
    fn upsert(&self, records: &[VehicleRecord]) -> Result<usize> {
        upsert_vehicles(self, records)
    }
}

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vehicles (
            id             INTEGER PRIMARY KEY,
            listing_url    TEXT UNIQUE NOT NULL,
            website_url    TEXT NOT NULL,
            title          TEXT,
            vin            TEXT,
            price          REAL,
            mileage        REAL,
            year           INTEGER,
            fuel_type      TEXT,
            transmission   TEXT,
            exterior_color TEXT,
            engine         TEXT,
            trim           TEXT,
            scraped_at     TEXT,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_vehicles_scraped_at ON vehicles(scraped_at);
        CREATE INDEX IF NOT EXISTS idx_vehicles_vin ON vehicles(vin);
        ",
    )?;
    Ok(())
}

// ── Vehicles ──

const COLUMNS: &str = "listing_url, website_url, title, vin, price, mileage, year, fuel_type,
     transmission, exterior_color, engine, trim, scraped_at";

pub fn upsert_vehicles(conn: &Connection, records: &[VehicleRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO vehicles ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(listing_url) DO UPDATE SET
                website_url = excluded.website_url,
                title = excluded.title,
                vin = excluded.vin,
                price = excluded.price,
                mileage = excluded.mileage,
                year = excluded.year,
                fuel_type = excluded.fuel_type,
                transmission = excluded.transmission,
                exterior_color = excluded.exterior_color,
                engine = excluded.engine,
                trim = excluded.trim,
                scraped_at = excluded.scraped_at"
        ))?;
        for r in records {
            count += stmt.execute(rusqlite::params![
                r.listing_url.as_str(),
                r.website_url,
                r.title,
                r.vin,
                r.price,
                r.mileage,
                r.year,
                r.fuel_type.map(|v| v.as_str()),
                r.transmission.map(|v| v.as_str()),
                r.exterior_color,
                r.engine,
                r.trim.map(|v| v.as_str()),
                r.scraped_at.map(|t| t.to_rfc3339()),
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

fn vehicle_from_row(row: &Row) -> rusqlite::Result<VehicleRecord> {
    let listing_url: String = row.get(0)?;
    let fuel_type: Option<String> = row.get(7)?;
    let transmission: Option<String> = row.get(8)?;
    let trim: Option<String> = row.get(11)?;
    let scraped_at: Option<String> = row.get(12)?;

    Ok(VehicleRecord {
        listing_url: ListingId::from(listing_url),
        website_url: row.get(1)?,
        title: row.get(2)?,
        vin: row.get(3)?,
        price: row.get(4)?,
        mileage: row.get(5)?,
        year: row.get(6)?,
        fuel_type: fuel_type.and_then(|s| s.parse().ok()),
        transmission: transmission.and_then(|s| s.parse().ok()),
        exterior_color: row.get(9)?,
        engine: row.get(10)?,
        trim: trim.and_then(|s| s.parse().ok()),
        scraped_at: scraped_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

/// Most recently scraped first.
pub fn fetch_vehicles(conn: &Connection, limit: usize) -> Result<Vec<VehicleRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM vehicles ORDER BY scraped_at DESC, id LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit as i64], vehicle_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_vehicle(conn: &Connection, listing_url: &str) -> Result<Option<VehicleRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM vehicles WHERE listing_url = ?1"),
            [listing_url],
            vehicle_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Deletes every stored vehicle. Returns how many were removed.
pub fn purge(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM vehicles", [])?;
    Ok(removed)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub with_price: usize,
    pub with_vin: usize,
    pub avg_price: Option<f64>,
    pub last_scraped: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM vehicles", [], |r| r.get(0))?;
    let with_price: usize = conn.query_row(
        "SELECT COUNT(*) FROM vehicles WHERE price IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_vin: usize =
        conn.query_row("SELECT COUNT(*) FROM vehicles WHERE vin IS NOT NULL", [], |r| r.get(0))?;
    let avg_price: Option<f64> =
        conn.query_row("SELECT AVG(price) FROM vehicles", [], |r| r.get(0))?;
    let last_scraped: Option<String> =
        conn.query_row("SELECT MAX(scraped_at) FROM vehicles", [], |r| r.get(0))?;
    Ok(Stats {
        total,
        with_price,
        with_vin,
        avg_price,
        last_scraped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FuelType, Trim};
    use chrono::TimeZone;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(url: &str, price: Option<f64>) -> VehicleRecord {
        let mut r = VehicleRecord::bare(ListingId::parse(url).unwrap(), "https://dealer.test");
        r.title = Some("2021 Audi Q5".to_string());
        r.price = price;
        r.fuel_type = Some(FuelType::Hybrid);
        r.trim = Some(Trim::SLine);
        r.scraped_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        r
    }

    #[test]
    fn upsert_reads_back_the_same_record() {
        let conn = store();
        let r = record("https://dealer.test/v?vehicleId=1", Some(45900.0));
        assert_eq!(conn.upsert(&[r.clone()]).unwrap(), 1);

        let back = fetch_vehicle(&conn, r.listing_url.as_str()).unwrap().unwrap();
        assert_eq!(back, r);
        assert!(fetch_vehicle(&conn, "https://dealer.test/nope").unwrap().is_none());
    }

    #[test]
    fn second_write_of_a_listing_replaces_it() {
        let conn = store();
        let url = "https://dealer.test/v?vehicleId=1";
        conn.upsert(&[record(url, Some(45900.0))]).unwrap();
        conn.upsert(&[record(url, None)]).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.with_price, 0);
        assert_eq!(fetch_vehicle(&conn, url).unwrap().unwrap().price, None);
    }

    #[test]
    fn listing_stats_and_purge() {
        let conn = store();
        let batch: Vec<_> = (0..5)
            .map(|i| record(&format!("https://dealer.test/v?vehicleId={i}"), Some(1000.0 * i as f64)))
            .collect();
        upsert_vehicles(&conn, &batch).unwrap();

        assert_eq!(fetch_vehicles(&conn, 3).unwrap().len(), 3);
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.with_vin, 0);
        assert_eq!(stats.avg_price, Some(2000.0));
        assert_eq!(stats.last_scraped.as_deref(), Some("2024-05-01T12:00:00+00:00"));

        assert_eq!(purge(&conn).unwrap(), 5);
        assert_eq!(get_stats(&conn).unwrap().total, 0);
    }

    #[test]
    fn connect_creates_the_directory() {
        let dir = std::env::temp_dir().join(format!("inventory_db_{}", std::process::id()));
        let path = dir.join("nested").join("inventory.sqlite");
        let conn = connect(path.to_str().unwrap()).unwrap();
        init_schema(&conn).unwrap();
        assert!(path.exists());
        drop(conn);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
