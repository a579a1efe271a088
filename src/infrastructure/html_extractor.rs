//! Extraction of the product data object embedded in page HTML.
//!
//! The site ships product data as a JavaScript assignment
//! (`BACKEND.components.item = {...};`) rather than clean markup, so we
//! locate the marker, take the first balanced brace-delimited span after it,
//! and decode that span as JSON.

use serde::Deserialize;

use crate::domain::product::{Details, PageData};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Marker preceding the embedded product object.
pub const ITEM_MARKER: &str = "BACKEND.components.item";

/// Returns the exact substring spanning the first syntactically balanced
/// JSON object after `marker`.
pub fn extract_embedded_object<'a>(html: &'a str, marker: &str) -> ScrapeResult<&'a str> {
    let marker_pos = html
        .find(marker)
        .ok_or_else(|| ScrapeError::Extraction(format!("marker '{marker}' not found in page")))?;

    let start = html[marker_pos..]
        .find('{')
        .map(|rel| marker_pos + rel)
        .ok_or_else(|| {
            ScrapeError::Extraction(format!("no object literal follows marker '{marker}'"))
        })?;

    let mut depth = 0usize;
    for (i, ch) in html[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&html[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    Err(ScrapeError::Extraction(
        "embedded object is not brace-balanced".to_string(),
    ))
}

// Partial mirror of the embedded object; everything the page ships beyond
// these fields is ignored by serde.
#[derive(Debug, Deserialize)]
struct ItemBlob {
    card: Card,
    breadcrumbs: Vec<Breadcrumb>,
    #[serde(default)]
    specifications: Vec<Specification>,
    #[serde(rename = "galleryImages", default)]
    gallery_images: Vec<GalleryImage>,
}

#[derive(Debug, Deserialize)]
struct Card {
    title: String,
    price: f64,
    #[serde(rename = "promoConditions")]
    promo_conditions: PromoConditions,
}

#[derive(Debug, Deserialize)]
struct PromoConditions {
    brand: String,
    #[serde(rename = "categoryCodes")]
    category_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Breadcrumb {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Specification {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
    #[serde(rename = "featureValues", default)]
    feature_values: Vec<FeatureValue>,
}

#[derive(Debug, Deserialize)]
struct FeatureValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct GalleryImage {
    large: String,
}

/// Locates and decodes the embedded product object of a product page.
/// Source ordering of detail values and image links is preserved.
pub fn parse_page_data(html: &str) -> ScrapeResult<PageData> {
    let raw = extract_embedded_object(html, ITEM_MARKER)?;
    let blob: ItemBlob = serde_json::from_str(raw)
        .map_err(|e| ScrapeError::Extraction(format!("embedded object is not valid JSON: {e}")))?;

    let category = blob
        .breadcrumbs
        .last()
        .map(|crumb| crumb.title.clone())
        .ok_or_else(|| ScrapeError::Extraction("breadcrumbs list is empty".to_string()))?;

    let mut details = Details::new();
    for specification in &blob.specifications {
        for feature in &specification.features {
            let values = feature
                .feature_values
                .iter()
                .map(|v| v.value.clone())
                .collect();
            details.insert(feature.name.clone(), values);
        }
    }

    let image_links = blob
        .gallery_images
        .iter()
        .map(|image| image.large.clone())
        .collect();

    Ok(PageData {
        title: blob.card.title,
        list_price: blob.card.price,
        category,
        brand: blob.card.promo_conditions.brand,
        category_codes: blob.card.promo_conditions.category_codes,
        details,
        image_links,
    })
}
