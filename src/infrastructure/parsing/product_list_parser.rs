//! Catalog listing page parser
//!
//! Turns one rendered listing page into product stubs. Every field goes
//! through its own selector chain; a missing price or image keeps the stub,
//! a missing name or link drops it.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use super::config::SelectorConfig;
use super::selector_chain::{Resolution, SelectorChain, first_attr};
use super::{ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::price::RawPrice;
use crate::domain::product::ProductStub;
use crate::domain::product_url::{absolutize, derive_identifier};
use crate::infrastructure::config::MarketplaceConfig;

const HREF_ATTRS: &[&str] = &["href"];
const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-original"];

/// Stubs extracted from one listing page
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub stubs: Vec<ProductStub>,
    pub dropped: Vec<DroppedCard>,
    /// Card selector that produced the matches
    pub card_selector: String,
}

/// Card rejected because a required field could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCard {
    pub index: usize,
    pub missing_field: &'static str,
}

pub struct ProductListParser {
    cards: SelectorChain,
    names: SelectorChain,
    prices: SelectorChain,
    images: SelectorChain,
    links: SelectorChain,
    result_description: SelectorChain,
    identifier_attributes: Vec<String>,
    result_count: Regex,
    page_query_param: String,
}

impl ProductListParser {
    pub fn new(selectors: &SelectorConfig, marketplace: &MarketplaceConfig) -> ParsingResult<Self> {
        // "1.234 sonuç" as well as "57 sonuç"
        let pattern = format!(
            r"(\d{{1,3}}(?:\.\d{{3}})+|\d+)\s*{}",
            regex::escape(&marketplace.result_count_token)
        );
        let result_count = Regex::new(&pattern).map_err(|e| ParsingError::InvalidPattern {
            name: "result_count".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            cards: SelectorChain::compile("product_card", &selectors.product_card)?,
            names: SelectorChain::compile("name", &selectors.name)?,
            prices: SelectorChain::compile("price", &selectors.price)?,
            images: SelectorChain::compile("image", &selectors.image)?,
            links: SelectorChain::compile("url", &selectors.url)?,
            result_description: SelectorChain::compile(
                "result_description",
                &selectors.result_description,
            )?,
            identifier_attributes: selectors.identifier_attributes.clone(),
            result_count,
            page_query_param: marketplace.page_query_param.clone(),
        })
    }

    pub fn parse_page(&self, markup: &str, context: &ParseContext) -> ParsingResult<CatalogPage> {
        let document = Html::parse_document(markup);
        self.parse_with_context(&document, context)
    }

    /// Advertised number of results, read from the description element
    pub fn parse_result_count(&self, markup: &str) -> ParsingResult<u32> {
        let document = Html::parse_document(markup);
        let description = self
            .result_description
            .resolve_text(document.root_element())
            .ok_or(ParsingError::ResultCountMissing)?;

        self.result_count
            .captures(&description)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().replace('.', "").parse::<u32>().ok())
            .ok_or(ParsingError::ResultCountMissing)
    }

    /// Listing URL for `page_index`, rewriting an existing page parameter
    /// in place or appending one.
    pub fn page_url(&self, listing_url: &str, page_index: u32) -> String {
        let Ok(mut url) = Url::parse(listing_url) else {
            let separator = if listing_url.contains('?') { '&' } else { '?' };
            return format!(
                "{}{}{}={}",
                listing_url, separator, self.page_query_param, page_index
            );
        };

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let page = page_index.to_string();
        let mut replaced = false;
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &pairs {
                if *key == self.page_query_param {
                    if !replaced {
                        query.append_pair(key, &page);
                        replaced = true;
                    }
                } else {
                    query.append_pair(key, value);
                }
            }
            if !replaced {
                query.append_pair(&self.page_query_param, &page);
            }
        }
        url.to_string()
    }

    fn extract_stub(
        &self,
        card: ElementRef<'_>,
        index: usize,
        context: &ParseContext,
    ) -> Result<ProductStub, DroppedCard> {
        let parent = card.parent().and_then(ElementRef::wrap);

        let name = self
            .names
            .resolve_text(card)
            .ok_or(DroppedCard { index, missing_field: "name" })?;

        let href = self
            .links
            .resolve_attr(card, HREF_ATTRS)
            .or_else(|| parent.and_then(|p| self.link_from_parent(p)))
            .ok_or(DroppedCard { index, missing_field: "url" })?;
        let url = absolutize(&href, &context.base_origin)
            .ok_or(DroppedCard { index, missing_field: "url" })?;

        let own_price = self
            .prices
            .resolve_text(card)
            .map(RawPrice::Text)
            .unwrap_or_default();
        if own_price.is_blank() {
            debug!("Card {} on page {} has no price", index, context.page_index);
        }

        let image_url = self
            .images
            .resolve_attr(card, IMAGE_ATTRS)
            .or_else(|| parent.and_then(|p| self.images.resolve_attr(p, IMAGE_ATTRS)))
            .map(|src| absolutize(&src, &context.base_origin).unwrap_or(src))
            .unwrap_or_default();

        let attrs: Vec<&str> = self.identifier_attributes.iter().map(String::as_str).collect();
        let id = derive_identifier(&url).or_else(|| first_attr(&card, &attrs));
        if id.is_none() {
            warn!("No identifier derivable for {}", url);
        }

        Ok(ProductStub {
            id,
            name,
            url,
            own_price,
            image_url,
        })
    }

    /// The anchor often wraps the card instead of living inside it.
    fn link_from_parent(&self, parent: ElementRef<'_>) -> Option<String> {
        if parent.value().name() == "a" {
            if let Some(href) = first_attr(&parent, HREF_ATTRS) {
                return Some(href);
            }
        }
        self.links.resolve_attr(parent, HREF_ATTRS)
    }
}

impl ContextualParser for ProductListParser {
    type Output = CatalogPage;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<CatalogPage> {
        let (card_selector, cards) = match self.cards.resolve(html.root_element()) {
            Resolution::Found { selector, matches } => (selector, matches),
            Resolution::NotFound { tried } => {
                return Err(ParsingError::no_products_found(context.page_index, tried));
            }
        };

        debug!(
            "Page {}: {} cards via '{}'",
            context.page_index,
            cards.len(),
            card_selector
        );

        let mut page = CatalogPage {
            card_selector,
            ..CatalogPage::default()
        };
        for (index, card) in cards.into_iter().enumerate() {
            match self.extract_stub(card, index, context) {
                Ok(stub) => page.stubs.push(stub),
                Err(dropped) => {
                    warn!(
                        "Dropping card {} on page {}: missing {}",
                        dropped.index, context.page_index, dropped.missing_field
                    );
                    page.dropped.push(dropped);
                }
            }
        }

        Ok(page)
    }
}
