//! Repository interface for persisted product records.
//!
//! The store is a key-value-with-history collaborator: records are looked up
//! by product code, created from snapshots, and mutated only through typed
//! patches. Implementations must bump `updated_at` on every write and return
//! the post-write record.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::product::{ProductPatch, ProductRecord, ProductSnapshot};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored column could not be serialized or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("no product record with id {0}")]
    RecordNotFound(Uuid),
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Looks up the single record for a product code, if one exists.
    async fn get_by_code(&self, product_code: &str)
    -> Result<Option<ProductRecord>, StorageError>;

    /// Creates a record seeded from the snapshot. Fails if a record for the
    /// snapshot's code already exists.
    async fn create(&self, snapshot: &ProductSnapshot) -> Result<ProductRecord, StorageError>;

    /// Applies a patch to the record with the given id, bumps `updated_at`,
    /// and returns the post-patch record.
    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<ProductRecord, StorageError>;
}
