//! Mutable "current truth" store. One row per live listing, keyed by url;
//! rows are inserted on appearance, price-updated in place, and deleted
//! when the listing sells.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::models::ListingRecord;
use crate::store::{open_pool, record_from_row};

/// All operational mutations of one sync run, committed as a single
/// transaction.
#[derive(Debug, Default)]
pub struct OperationalBatch {
    pub inserts: Vec<ListingRecord>,
    /// (url, new price)
    pub price_updates: Vec<(String, Option<i64>)>,
    pub deletes: Vec<String>,
}

impl OperationalBatch {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.price_updates.is_empty() && self.deletes.is_empty()
    }
}

pub struct OperationalStore {
    pool: SqlitePool,
}

impl OperationalStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = open_pool(url).await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The stored snapshot: every listing currently considered live.
    pub async fn read_all_listings(&self) -> Result<Vec<ListingRecord>> {
        let rows = sqlx::query("SELECT * FROM listings")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read stored listings")?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Apply a run's mutations in one transaction. A crash before commit
    /// leaves the store untouched; the next run re-derives the same batch.
    pub async fn apply(&self, batch: &OperationalBatch) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        for record in &batch.inserts {
            upsert_new(&mut tx, record).await?;
        }
        for (url, price) in &batch.price_updates {
            update_price(&mut tx, url, *price).await?;
        }
        for url in &batch.deletes {
            delete_listing(&mut tx, url).await?;
        }
        tx.commit().await.context("Failed to commit operational batch")?;
        debug!(
            inserts = batch.inserts.len(),
            price_updates = batch.price_updates.len(),
            deletes = batch.deletes.len(),
            "operational batch committed"
        );
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Insert a newly appeared listing. A url already present means a previous
/// run already converged; the conflict is swallowed, not an error.
pub async fn upsert_new(conn: &mut SqliteConnection, record: &ListingRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO listings (
            url, price, address, bedrooms, bathrooms, powder_rooms, stories,
            construction_year, property_style, floors, municipal_valuation,
            parking_spaces, living_area, land_area, latitude, longitude,
            postal_code, fsa
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (url) DO NOTHING
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
    .execute(conn)
    .await
    .context("Failed to insert new listing")?;
    Ok(())
}

/// Update a listing's price in place. A missing row is a no-op: the state
/// has already converged (e.g. the listing sold in an earlier run).
pub async fn update_price(
    conn: &mut SqliteConnection,
    url: &str,
    price: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE listings SET price = ? WHERE url = ?")
        .bind(price)
        .bind(url)
        .execute(conn)
        .await
        .context("Failed to update listing price")?;
    Ok(())
}

/// Remove a sold listing. Deleting an absent row is a no-op.
pub async fn delete_listing(conn: &mut SqliteConnection, url: &str) -> Result<()> {
    sqlx::query("DELETE FROM listings WHERE url = ?")
        .bind(url)
        .execute(conn)
        .await
        .context("Failed to delete listing")?;
    Ok(())
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            url TEXT PRIMARY KEY,
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
            fsa TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create listings table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, price: Option<i64>) -> ListingRecord {
        ListingRecord {
            url: url.into(),
            price,
            address: Some("somewhere".into()),
            ..Default::default()
        }
    }

    async fn store() -> OperationalStore {
        OperationalStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_read_round_trips() {
        let store = store().await;
        let batch = OperationalBatch {
            inserts: vec![record("a", Some(500_000))],
            ..Default::default()
        };
        store.apply(&batch).await.unwrap();

        let listings = store.read_all_listings().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].url, "a");
        assert_eq!(listings[0].price, Some(500_000));
    }

    #[tokio::test]
    async fn duplicate_insert_is_swallowed() {
        let store = store().await;
        let first = OperationalBatch {
            inserts: vec![record("a", Some(1))],
            ..Default::default()
        };
        store.apply(&first).await.unwrap();

        // Re-inserting the same url must neither fail nor overwrite.
        let second = OperationalBatch {
            inserts: vec![record("a", Some(2))],
            ..Default::default()
        };
        store.apply(&second).await.unwrap();

        let listings = store.read_all_listings().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price, Some(1));
    }

    #[tokio::test]
    async fn price_update_mutates_in_place() {
        let store = store().await;
        store
            .apply(&OperationalBatch {
                inserts: vec![record("a", Some(500_000))],
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .apply(&OperationalBatch {
                price_updates: vec![("a".into(), Some(475_000))],
                ..Default::default()
            })
            .await
            .unwrap();

        let listings = store.read_all_listings().await.unwrap();
        assert_eq!(listings[0].price, Some(475_000));
    }

    #[tokio::test]
    async fn update_and_delete_on_missing_row_are_no_ops() {
        let store = store().await;
        let batch = OperationalBatch {
            price_updates: vec![("ghost".into(), Some(1))],
            deletes: vec!["ghost".into()],
            ..Default::default()
        };
        store.apply(&batch).await.unwrap();
        assert!(store.read_all_listings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = store().await;
        store
            .apply(&OperationalBatch {
                inserts: vec![record("a", Some(1))],
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .apply(&OperationalBatch {
                deletes: vec!["a".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.read_all_listings().await.unwrap().is_empty());
    }
}
