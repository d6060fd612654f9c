//! Listing page extraction engine.
//!
//! Fetches a real-estate listing page, runs a heuristic cascade per field,
//! validates the result against tiered field requirements and relays
//! hotlink-protected listing photos.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod extractors;
pub mod fetcher;
pub mod relay;
pub mod schema;
pub mod validator;
pub mod value;

pub use coordinator::{ExtractionResult, Extractor, ExtractorConfig};
pub use fetcher::{FetchConfig, FetchError, PageFetcher, PageSource, RawContent};
pub use relay::{ImageRelay, RelayError, RelayedImage, TrustPolicy};
pub use schema::{Field, FieldSchema, FieldSpec, Tier};
pub use validator::{validate, ValidationReport};
