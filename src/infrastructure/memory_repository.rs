//! In-memory product repository.
//!
//! Backs the batch and pipeline tests; honors the same contract as the
//! SQLite implementation (one record per code, `updated_at` bumped on every
//! write, post-write record returned).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::product::{ProductPatch, ProductRecord, ProductSnapshot};
use crate::domain::repositories::{ProductRepository, StorageError};

#[derive(Default)]
pub struct InMemoryProductRepository {
    records: RwLock<HashMap<String, ProductRecord>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get_by_code(
        &self,
        product_code: &str,
    ) -> Result<Option<ProductRecord>, StorageError> {
        Ok(self.records.read().await.get(product_code).cloned())
    }

    async fn create(&self, snapshot: &ProductSnapshot) -> Result<ProductRecord, StorageError> {
        let record = ProductRecord::from_snapshot(snapshot, Utc::now());
        let mut records = self.records.write().await;
        if records.contains_key(&record.product_code) {
            return Err(StorageError::Corrupt(format!(
                "record for product code {} already exists",
                record.product_code
            )));
        }
        records.insert(record.product_code.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<ProductRecord, StorageError> {
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|record| record.id == id)
            .ok_or(StorageError::RecordNotFound(id))?;

        patch.apply_to(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
