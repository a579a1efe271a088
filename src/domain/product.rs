use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feature name mapped to its values, in source order.
pub type Details = BTreeMap<String, Vec<String>>;

/// One seller's listing for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub merchant_name: String,
    pub price: f64,
}

/// Append-only element of a record's price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub date: DateTime<Utc>,
    pub min_price: f64,
    pub max_price: f64,
}

/// Append-only element of a record's offers history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffersHistoryEntry {
    pub date: DateTime<Utc>,
    pub offers: Vec<Offer>,
}

/// Structured data decoded from the JSON object embedded in a product page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub title: String,
    /// Starting price shown on the page itself, before offers are collected.
    pub list_price: f64,
    /// Title of the last breadcrumb.
    pub category: String,
    pub brand: String,
    pub category_codes: Vec<String>,
    pub details: Details,
    pub image_links: Vec<String>,
}

/// Aggregate rating data from the reviews API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reviews {
    pub rating: f64,
    pub comments: i64,
}

/// Freshly scraped product state for one cycle. Immutable once assembled;
/// carries the single price/offers history entries a reconciliation may
/// append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_code: String,
    pub name: String,
    pub min_price: f64,
    pub max_price: f64,
    pub rating: f64,
    pub comments_count: i64,
    pub details: Details,
    pub image_links: Vec<String>,
    pub offers: Vec<Offer>,
    /// Always equals `offers.len()`.
    pub sellers_count: i64,
    pub price_entry: PriceHistoryEntry,
    pub offers_entry: OffersHistoryEntry,
}

/// The persisted, authoritative product entity. One record per product code;
/// the code never changes after creation and the history logs only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub product_code: String,
    pub name: String,
    pub min_price: f64,
    pub max_price: f64,
    pub rating: f64,
    pub comments_count: i64,
    pub details: Details,
    pub image_links: Vec<String>,
    pub offers: Vec<Offer>,
    pub sellers_count: i64,
    pub price_history: Vec<PriceHistoryEntry>,
    pub offers_history: Vec<OffersHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Seeds a new record from a snapshot. Creation is the only path that
    /// initializes the history logs.
    pub fn from_snapshot(snapshot: &ProductSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_code: snapshot.product_code.clone(),
            name: snapshot.name.clone(),
            min_price: snapshot.min_price,
            max_price: snapshot.max_price,
            rating: snapshot.rating,
            comments_count: snapshot.comments_count,
            details: snapshot.details.clone(),
            image_links: snapshot.image_links.clone(),
            offers: snapshot.offers.clone(),
            sellers_count: snapshot.sellers_count,
            price_history: vec![snapshot.price_entry.clone()],
            offers_history: vec![snapshot.offers_entry.clone()],
            created_at: now,
            updated_at: now,
        }
    }
}

/// Minimal field-level change set applied to a record during reconciliation.
/// Every field is enumerated explicitly; `price_history`/`offers_history`
/// carry the full extended log when the respective current value changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub rating: Option<f64>,
    pub comments_count: Option<i64>,
    pub details: Option<Details>,
    pub image_links: Option<Vec<String>>,
    pub offers: Option<Vec<Offer>>,
    pub sellers_count: Option<i64>,
    pub price_history: Option<Vec<PriceHistoryEntry>>,
    pub offers_history: Option<Vec<OffersHistoryEntry>>,
}

impl ProductPatch {
    /// An empty patch means the reconciliation must not touch the record.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.rating.is_none()
            && self.comments_count.is_none()
            && self.details.is_none()
            && self.image_links.is_none()
            && self.offers.is_none()
            && self.sellers_count.is_none()
            && self.price_history.is_none()
            && self.offers_history.is_none()
    }

    /// Applies the patch fields to `record`, leaving `id`, `product_code`
    /// and the timestamps alone. The caller is responsible for bumping
    /// `updated_at` when persisting.
    pub fn apply_to(&self, record: &mut ProductRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(min_price) = self.min_price {
            record.min_price = min_price;
        }
        if let Some(max_price) = self.max_price {
            record.max_price = max_price;
        }
        if let Some(rating) = self.rating {
            record.rating = rating;
        }
        if let Some(comments_count) = self.comments_count {
            record.comments_count = comments_count;
        }
        if let Some(details) = &self.details {
            record.details = details.clone();
        }
        if let Some(image_links) = &self.image_links {
            record.image_links = image_links.clone();
        }
        if let Some(offers) = &self.offers {
            record.offers = offers.clone();
        }
        if let Some(sellers_count) = self.sellers_count {
            record.sellers_count = sellers_count;
        }
        if let Some(price_history) = &self.price_history {
            record.price_history = price_history.clone();
        }
        if let Some(offers_history) = &self.offers_history {
            record.offers_history = offers_history.clone();
        }
    }
}
