//! Reconciliation of a fresh snapshot against the stored record.
//!
//! The comparison is explicit, field by field, over the enumerated field set
//! of the product model; the result is a typed [`ProductPatch`], never a
//! generic map. History logs are extended, never rewritten.

use std::sync::Arc;

use crate::domain::product::{ProductPatch, ProductRecord, ProductSnapshot};
use crate::domain::repositories::{ProductRepository, StorageError};

/// What the reconciliation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone)]
pub struct DiffReconciler {
    repository: Arc<dyn ProductRepository>,
}

impl DiffReconciler {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    /// Creates the record on first sight of a product code; otherwise applies
    /// the minimal patch. An empty patch leaves the stored record untouched,
    /// including its `updated_at`.
    pub async fn reconcile(
        &self,
        stored: Option<ProductRecord>,
        snapshot: &ProductSnapshot,
    ) -> Result<(ProductRecord, ReconcileOutcome), StorageError> {
        match stored {
            None => {
                let record = self.repository.create(snapshot).await?;
                Ok((record, ReconcileOutcome::Created))
            }
            Some(stored) => {
                let patch = build_patch(&stored, snapshot);
                if patch.is_empty() {
                    return Ok((stored, ReconcileOutcome::Unchanged));
                }
                let updated = self.repository.update(stored.id, patch).await?;
                Ok((updated, ReconcileOutcome::Updated))
            }
        }
    }
}

/// Computes the minimal field-level patch. A field joins the patch only when
/// the scraped value differs from the stored one; an empty scraped
/// name/details/image_links/offers never overwrites stored data. Histories
/// are appended when the respective current value changed.
pub fn build_patch(stored: &ProductRecord, snapshot: &ProductSnapshot) -> ProductPatch {
    let mut patch = ProductPatch::default();

    if snapshot.name != stored.name && !snapshot.name.is_empty() {
        patch.name = Some(snapshot.name.clone());
    }
    if snapshot.min_price != stored.min_price {
        patch.min_price = Some(snapshot.min_price);
    }
    if snapshot.max_price != stored.max_price {
        patch.max_price = Some(snapshot.max_price);
    }
    if snapshot.rating != stored.rating {
        patch.rating = Some(snapshot.rating);
    }
    if snapshot.comments_count != stored.comments_count {
        patch.comments_count = Some(snapshot.comments_count);
    }
    if snapshot.details != stored.details && !snapshot.details.is_empty() {
        patch.details = Some(snapshot.details.clone());
    }
    if snapshot.image_links != stored.image_links && !snapshot.image_links.is_empty() {
        patch.image_links = Some(snapshot.image_links.clone());
    }
    if snapshot.offers != stored.offers && !snapshot.offers.is_empty() {
        patch.offers = Some(snapshot.offers.clone());
    }
    if snapshot.sellers_count != stored.sellers_count {
        patch.sellers_count = Some(snapshot.sellers_count);
    }

    if snapshot.min_price != stored.min_price || snapshot.max_price != stored.max_price {
        let mut price_history = stored.price_history.clone();
        price_history.push(snapshot.price_entry.clone());
        patch.price_history = Some(price_history);
    }

    // Offers are compared as whole lists; a reordering or seller change is a
    // difference worth recording.
    if snapshot.offers != stored.offers {
        let mut offers_history = stored.offers_history.clone();
        offers_history.push(snapshot.offers_entry.clone());
        patch.offers_history = Some(offers_history);
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Details, Offer, OffersHistoryEntry, PriceHistoryEntry};
    use crate::infrastructure::memory_repository::InMemoryProductRepository;
    use chrono::Utc;

    fn snapshot(code: &str, min_price: f64, max_price: f64) -> ProductSnapshot {
        let now = Utc::now();
        let offers = vec![
            Offer {
                merchant_name: "Alser".to_string(),
                price: min_price,
            },
            Offer {
                merchant_name: "Technodom".to_string(),
                price: max_price,
            },
        ];
        let mut details = Details::new();
        details.insert("Memory".to_string(), vec!["128 GB".to_string()]);
        ProductSnapshot {
            product_code: code.to_string(),
            name: "Phone".to_string(),
            min_price,
            max_price,
            rating: 4.5,
            comments_count: 10,
            details,
            image_links: vec!["https://img.example/1.jpg".to_string()],
            sellers_count: offers.len() as i64,
            price_entry: PriceHistoryEntry {
                date: now,
                min_price,
                max_price,
            },
            offers_entry: OffersHistoryEntry {
                date: now,
                offers: offers.clone(),
            },
            offers,
        }
    }

    #[test]
    fn identical_snapshot_yields_empty_patch() {
        let snap = snapshot("111", 1000.0, 1200.0);
        let stored = ProductRecord::from_snapshot(&snap, Utc::now());

        let patch = build_patch(&stored, &snap);
        assert!(patch.is_empty());
    }

    #[test]
    fn price_change_extends_price_history_only() {
        let snap_old = snapshot("111", 1000.0, 1200.0);
        let stored = ProductRecord::from_snapshot(&snap_old, Utc::now());

        // Same offers, different page-level prices.
        let mut snap_new = snapshot("111", 900.0, 1200.0);
        snap_new.offers = stored.offers.clone();
        snap_new.offers_entry.offers = stored.offers.clone();

        let patch = build_patch(&stored, &snap_new);
        assert_eq!(patch.min_price, Some(900.0));
        assert_eq!(patch.price_history.as_ref().map(Vec::len), Some(2));
        assert!(patch.offers_history.is_none());
        assert!(patch.offers.is_none());
    }

    #[test]
    fn offers_reorder_extends_offers_history() {
        let snap_old = snapshot("111", 1000.0, 1200.0);
        let stored = ProductRecord::from_snapshot(&snap_old, Utc::now());

        let mut snap_new = snapshot("111", 1000.0, 1200.0);
        snap_new.offers.reverse();
        snap_new.offers_entry.offers = snap_new.offers.clone();

        let patch = build_patch(&stored, &snap_new);
        assert!(patch.price_history.is_none());
        assert_eq!(patch.offers_history.as_ref().map(Vec::len), Some(2));
        assert_eq!(patch.offers, Some(snap_new.offers.clone()));
    }

    #[test]
    fn empty_scraped_collections_never_overwrite() {
        let snap_old = snapshot("111", 1000.0, 1200.0);
        let stored = ProductRecord::from_snapshot(&snap_old, Utc::now());

        let mut snap_new = snapshot("111", 1000.0, 1200.0);
        snap_new.name = String::new();
        snap_new.details = Details::new();
        snap_new.image_links = Vec::new();

        let patch = build_patch(&stored, &snap_new);
        assert!(patch.name.is_none());
        assert!(patch.details.is_none());
        assert!(patch.image_links.is_none());
    }

    #[tokio::test]
    async fn reconcile_creates_then_reports_unchanged() {
        let repository = Arc::new(InMemoryProductRepository::new());
        let reconciler = DiffReconciler::new(repository.clone());

        let snap = snapshot("222", 500.0, 700.0);
        let (record, outcome) = reconciler.reconcile(None, &snap).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(record.price_history.len(), 1);

        let stored = repository.get_by_code("222").await.unwrap();
        let (same, outcome) = reconciler.reconcile(stored, &snap).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(same.updated_at, record.updated_at);
    }

    #[tokio::test]
    async fn reconcile_applies_patch_and_bumps_updated_at() {
        let repository = Arc::new(InMemoryProductRepository::new());
        let reconciler = DiffReconciler::new(repository.clone());

        let snap_old = snapshot("333", 500.0, 700.0);
        let (created, _) = reconciler.reconcile(None, &snap_old).await.unwrap();

        let snap_new = snapshot("333", 450.0, 700.0);
        let stored = repository.get_by_code("333").await.unwrap();
        let (updated, outcome) = reconciler.reconcile(stored, &snap_new).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated);
        assert_eq!(updated.min_price, 450.0);
        assert_eq!(updated.price_history.len(), 2);
        assert!(updated.updated_at >= created.updated_at);
        assert!(updated.created_at <= updated.updated_at);
    }
}
