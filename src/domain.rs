//! Domain layer: the product data model and the persistence seam.

pub mod product;
pub mod repositories;

pub use product::{
    Details, Offer, OffersHistoryEntry, PageData, PriceHistoryEntry, ProductPatch, ProductRecord,
    ProductSnapshot, Reviews,
};
pub use repositories::{ProductRepository, StorageError};
