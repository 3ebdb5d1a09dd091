//! Persistence gateways for the two stores: the mutable operational
//! database and the append-only warehouse.

pub mod operational;
pub mod warehouse;

pub use operational::{OperationalBatch, OperationalStore};
pub use warehouse::WarehouseStore;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::models::ListingRecord;

/// Open a run-scoped connection pool. The run is sequential, so a single
/// connection suffices (and keeps `sqlite::memory:` databases coherent in
/// tests).
pub async fn open_pool(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("Invalid database url: {url}"))?
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to {url}"))
}

pub(crate) fn record_from_row(row: &SqliteRow) -> ListingRecord {
    ListingRecord {
        url: row.get("url"),
        price: row.get("price"),
        address: row.get("address"),
        bedrooms: row.get("bedrooms"),
        bathrooms: row.get("bathrooms"),
        powder_rooms: row.get("powder_rooms"),
        stories: row.get("stories"),
        construction_year: row.get("construction_year"),
        property_style: row.get("property_style"),
        floors: row.get("floors"),
        municipal_valuation: row.get("municipal_valuation"),
        parking_spaces: row.get("parking_spaces"),
        living_area: row.get("living_area"),
        land_area: row.get("land_area"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        postal_code: row.get("postal_code"),
        fsa: row.get("fsa"),
    }
}
