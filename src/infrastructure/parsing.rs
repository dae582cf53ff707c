//! HTML and state-object parsing for catalog and product pages
//!
//! Everything here is synchronous and works on owned markup strings, so no
//! parsed document is ever held across an `.await`.

pub mod config;
pub mod context;
pub mod error;
pub mod product_detail_parser;
pub mod product_list_parser;
pub mod selector_chain;

pub use config::SelectorConfig;
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use product_detail_parser::ProductDetailParser;
pub use product_list_parser::{CatalogPage, DroppedCard, ProductListParser};
pub use selector_chain::{Resolution, SelectorChain};

use scraper::Html;

/// Parser that needs per-page context alongside the document
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
