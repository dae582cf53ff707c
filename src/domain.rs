//! Domain module - Core price tracking entities and pure logic
//!
//! Everything in here is side-effect free: product and competitor types,
//! price normalization, identifier derivation and the comparison view.

pub mod aggregation;
pub mod price;
pub mod product;
pub mod product_url;

// Re-export commonly used items for convenience
pub use aggregation::{AggregatedRow, GroupingKey, Seller};
pub use price::{PriceParseError, RawPrice, normalize};
pub use product::{CanonicalProductRecord, CompetitorEntry, ProductStub, UNKNOWN_SELLER, dedup_latest};
pub use product_url::derive_identifier;
