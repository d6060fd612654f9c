//! Per-field heuristic cascades.
//!
//! Every field owns an ordered list of matchers. Matchers are plain functions
//! over a [`PageView`]: total, free of side effects, and independent of each
//! other, so the coordinator can run the cascades in any order or in parallel.

mod details;
mod json;
mod location;
mod media;
pub mod normalize;
pub mod page;
mod pricing;
mod rooms;

use crate::schema::{Field, FieldSchema};
use crate::value::{FieldValue, RawExtraction};
pub use page::PageView;

/// One heuristic in a field's cascade. `None` means "not found here, try the next one".
pub type Matcher = fn(&PageView) -> Option<FieldValue>;

/// The cascade for `field`, most reliable source first.
pub fn cascade(field: Field) -> &'static [Matcher] {
    match field {
        Field::Address => location::ADDRESS,
        Field::Price => pricing::PRICE,
        Field::Bedrooms => rooms::BEDROOMS,
        Field::Bathrooms => rooms::BATHROOMS,
        Field::SquareFeet => rooms::SQUARE_FEET,
        Field::LotSize => rooms::LOT_SIZE,
        Field::YearBuilt => details::YEAR_BUILT,
        Field::PropertyType => details::PROPERTY_TYPE,
        Field::Description => details::DESCRIPTION,
        Field::Images => media::IMAGES,
        Field::MlsId => details::MLS_ID,
        Field::Features => details::FEATURES,
    }
}

/// Runs `field`'s cascade until a matcher produces a value.
pub fn extract_field(field: Field, page: &PageView) -> Option<FieldValue> {
    cascade(field).iter().find_map(|matcher| matcher(page))
}

/// Sequential extraction of every field in `schema`.
pub fn extract_all(page: &PageView, schema: &FieldSchema) -> RawExtraction {
    let mut raw = RawExtraction::new();
    for field in schema.fields() {
        if let Some(value) = extract_field(field, page) {
            if let Err(e) = raw.insert(field, value) {
                tracing::warn!(error = %e, "discarding mis-shaped value");
            }
        }
    }
    raw
}
