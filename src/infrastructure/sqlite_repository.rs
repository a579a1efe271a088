//! SQLite-backed product repository.
//!
//! Collection-valued fields (details, images, offers, histories) are stored
//! as JSON text columns, mirroring the document-style shape of the domain
//! model. Patches are applied read-modify-write inside a transaction so the
//! returned record is exactly what was persisted.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::domain::product::{ProductPatch, ProductRecord, ProductSnapshot};
use crate::domain::repositories::{ProductRepository, StorageError};

const CREATE_PRODUCTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        product_code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        min_price REAL NOT NULL,
        max_price REAL NOT NULL,
        rating REAL NOT NULL DEFAULT 0,
        comments_count INTEGER NOT NULL DEFAULT 0,
        details TEXT NOT NULL,
        image_links TEXT NOT NULL,
        offers TEXT NOT NULL,
        sellers_count INTEGER NOT NULL DEFAULT 0,
        price_history TEXT NOT NULL,
        offers_history TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    /// Opens (creating if necessary) the database and runs the migration.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        // A pool against :memory: must stay on one connection, otherwise
        // every pooled connection sees its own empty database.
        let in_memory = db_path.contains(":memory:");
        if !in_memory {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 10 })
            .connect(database_url)
            .await?;

        let repository = Self { pool };
        repository.migrate().await?;
        info!(%database_url, "product store ready");
        Ok(repository)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_PRODUCTS_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ProductRecord, StorageError> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StorageError::Corrupt(format!("invalid record id '{id}': {e}")))?;

    let details: String = row.try_get("details")?;
    let image_links: String = row.try_get("image_links")?;
    let offers: String = row.try_get("offers")?;
    let price_history: String = row.try_get("price_history")?;
    let offers_history: String = row.try_get("offers_history")?;

    Ok(ProductRecord {
        id,
        product_code: row.try_get("product_code")?,
        name: row.try_get("name")?,
        min_price: row.try_get("min_price")?,
        max_price: row.try_get("max_price")?,
        rating: row.try_get("rating")?,
        comments_count: row.try_get("comments_count")?,
        details: serde_json::from_str(&details)?,
        image_links: serde_json::from_str(&image_links)?,
        offers: serde_json::from_str(&offers)?,
        sellers_count: row.try_get("sellers_count")?,
        price_history: serde_json::from_str(&price_history)?,
        offers_history: serde_json::from_str(&offers_history)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn get_by_code(
        &self,
        product_code: &str,
    ) -> Result<Option<ProductRecord>, StorageError> {
        let row = sqlx::query("SELECT * FROM products WHERE product_code = ?")
            .bind(product_code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn create(&self, snapshot: &ProductSnapshot) -> Result<ProductRecord, StorageError> {
        let record = ProductRecord::from_snapshot(snapshot, Utc::now());

        let details = serde_json::to_string(&record.details)?;
        let image_links = serde_json::to_string(&record.image_links)?;
        let offers = serde_json::to_string(&record.offers)?;
        let price_history = serde_json::to_string(&record.price_history)?;
        let offers_history = serde_json::to_string(&record.offers_history)?;

        sqlx::query(
            r#"
            INSERT INTO products
            (id, product_code, name, min_price, max_price, rating, comments_count,
             details, image_links, offers, sellers_count, price_history, offers_history,
             created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.product_code)
        .bind(&record.name)
        .bind(record.min_price)
        .bind(record.max_price)
        .bind(record.rating)
        .bind(record.comments_count)
        .bind(&details)
        .bind(&image_links)
        .bind(&offers)
        .bind(record.sellers_count)
        .bind(&price_history)
        .bind(&offers_history)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<ProductRecord, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::RecordNotFound(id))?;

        let mut record = record_from_row(&row)?;
        patch.apply_to(&mut record);
        record.updated_at = Utc::now();

        let details = serde_json::to_string(&record.details)?;
        let image_links = serde_json::to_string(&record.image_links)?;
        let offers = serde_json::to_string(&record.offers)?;
        let price_history = serde_json::to_string(&record.price_history)?;
        let offers_history = serde_json::to_string(&record.offers_history)?;

        sqlx::query(
            r#"
            UPDATE products SET
                name = ?, min_price = ?, max_price = ?, rating = ?, comments_count = ?,
                details = ?, image_links = ?, offers = ?, sellers_count = ?,
                price_history = ?, offers_history = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.name)
        .bind(record.min_price)
        .bind(record.max_price)
        .bind(record.rating)
        .bind(record.comments_count)
        .bind(&details)
        .bind(&image_links)
        .bind(&offers)
        .bind(record.sellers_count)
        .bind(&price_history)
        .bind(&offers_history)
        .bind(record.updated_at)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }
}
