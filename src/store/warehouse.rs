//! Append-only historical warehouse. Every lifecycle event becomes a new
//! row tagged with its state; nothing here is ever updated or deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::models::{DiffAction, ListingRecord, WarehouseEntry};
use crate::store::open_pool;

pub struct WarehouseStore {
    pool: SqlitePool,
}

impl WarehouseStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = open_pool(url).await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a run's history rows in one transaction.
    pub async fn append_all(&self, entries: &[WarehouseEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        for entry in entries {
            append(&mut tx, &entry.record, entry.state, entry.update_date).await?;
        }
        tx.commit().await.context("Failed to commit warehouse batch")?;
        debug!(appended = entries.len(), "warehouse batch committed");
        Ok(())
    }

    /// Number of history rows; monotonically non-decreasing across runs.
    pub async fn row_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM listing_history")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count warehouse rows")?;
        Ok(row.get("n"))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// The warehouse's single write primitive: insert one tagged row. There is
/// deliberately no update or delete counterpart.
pub async fn append(
    conn: &mut SqliteConnection,
    record: &ListingRecord,
    state: DiffAction,
    update_date: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO listing_history (
            url, price, address, bedrooms, bathrooms, powder_rooms, stories,
            construction_year, property_style, floors, municipal_valuation,
            parking_spaces, living_area, land_area, latitude, longitude,
            postal_code, fsa, state, update_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.url)
    .bind(record.price)
    .bind(&record.address)
    .bind(record.bedrooms)
    .bind(record.bathrooms)
    .bind(record.powder_rooms)
    .bind(record.stories)
    .bind(record.construction_year)
    .bind(&record.property_style)
    .bind(&record.floors)
    .bind(record.municipal_valuation)
    .bind(record.parking_spaces)
    .bind(&record.living_area)
    .bind(&record.land_area)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(&record.postal_code)
    .bind(&record.fsa)
    .bind(state.as_state())
    .bind(update_date)
    .execute(conn)
    .await
    .context("Failed to append warehouse row")?;
    Ok(())
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listing_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT,
            price INTEGER,
            address TEXT,
            bedrooms INTEGER,
            bathrooms INTEGER,
            powder_rooms INTEGER,
            stories INTEGER,
            construction_year INTEGER,
            property_style TEXT,
            floors TEXT,
            municipal_valuation INTEGER,
            parking_spaces INTEGER,
            living_area TEXT,
            land_area TEXT,
            latitude REAL,
            longitude REAL,
            postal_code TEXT,
            fsa TEXT,
            state TEXT NOT NULL DEFAULT 'new',
            update_date TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create listing_history table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, state: DiffAction) -> WarehouseEntry {
        WarehouseEntry {
            record: ListingRecord {
                url: url.into(),
                price: Some(500_000),
                ..Default::default()
            },
            state,
            update_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_accumulate_one_row_per_event() {
        let store = WarehouseStore::connect("sqlite::memory:").await.unwrap();
        store.append_all(&[entry("a", DiffAction::New)]).await.unwrap();
        store
            .append_all(&[entry("a", DiffAction::PriceChange), entry("a", DiffAction::Sold)])
            .await
            .unwrap();

        assert_eq!(store.row_count().await.unwrap(), 3);

        let states: Vec<String> = sqlx::query("SELECT state FROM listing_history ORDER BY id")
            .fetch_all(store.pool())
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("state"))
            .collect();
        assert_eq!(states, vec!["new", "price_change", "sold"]);
    }

    #[tokio::test]
    async fn same_url_may_appear_many_times() {
        let store = WarehouseStore::connect("sqlite::memory:").await.unwrap();
        for _ in 0..3 {
            store.append_all(&[entry("a", DiffAction::New)]).await.unwrap();
        }
        assert_eq!(store.row_count().await.unwrap(), 3);
    }
}
