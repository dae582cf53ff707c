//! Ordered selector fallback
//!
//! Marketplace markup changes between layouts, so every field is looked up
//! through a list of candidate selectors. The first candidate that yields at
//! least one match wins and later candidates are never evaluated.

use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use super::{ParsingError, ParsingResult};

/// Result of walking a chain against some scope
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Found { selector: String, matches: Vec<T> },
    NotFound { tried: Vec<String> },
}

impl<T> Resolution<T> {
    pub fn into_matches(self) -> Vec<T> {
        match self {
            Self::Found { matches, .. } => matches,
            Self::NotFound { .. } => Vec::new(),
        }
    }

    pub fn first(self) -> Option<T> {
        self.into_matches().into_iter().next()
    }
}

#[derive(Debug, Clone)]
pub struct SelectorChain {
    field: String,
    candidates: Vec<(String, Selector)>,
}

impl SelectorChain {
    /// Compile every candidate; an invalid selector is a configuration error.
    pub fn compile(field: &str, selectors: &[String]) -> ParsingResult<Self> {
        if selectors.is_empty() {
            return Err(ParsingError::EmptySelectorChain {
                chain: field.to_string(),
            });
        }

        let candidates = selectors
            .iter()
            .map(|raw| {
                Selector::parse(raw)
                    .map(|compiled| (raw.clone(), compiled))
                    .map_err(|e| {
                        warn!("Failed to compile selector '{}' for {}: {}", raw, field, e);
                        ParsingError::invalid_selector(raw, e)
                    })
            })
            .collect::<ParsingResult<Vec<_>>>()?;

        Ok(Self {
            field: field.to_string(),
            candidates,
        })
    }

    /// Walk the candidates in order, stopping at the first non-empty query.
    pub fn first_match<T>(&self, mut query: impl FnMut(&Selector) -> Vec<T>) -> Resolution<T> {
        let mut tried = Vec::with_capacity(self.candidates.len());

        for (raw, selector) in &self.candidates {
            let matches = query(selector);
            if !matches.is_empty() {
                debug!("{}: '{}' matched {} element(s)", self.field, raw, matches.len());
                return Resolution::Found {
                    selector: raw.clone(),
                    matches,
                };
            }
            tried.push(raw.clone());
        }

        Resolution::NotFound { tried }
    }

    /// Descendants of `scope` matched by the first productive candidate
    pub fn resolve<'a>(&self, scope: ElementRef<'a>) -> Resolution<ElementRef<'a>> {
        self.first_match(|selector| scope.select(selector).collect())
    }

    /// Trimmed text of the first element with non-empty text
    pub fn resolve_text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.first_match(|selector| {
            scope
                .select(selector)
                .map(|element| element_text(&element))
                .filter(|text| !text.is_empty())
                .collect()
        })
        .first()
    }

    /// First non-empty value of any of `attrs` on a matched element
    pub fn resolve_attr(&self, scope: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
        self.first_match(|selector| {
            scope
                .select(selector)
                .filter_map(|element| first_attr(&element, attrs))
                .collect()
        })
        .first()
    }
}

/// Whitespace-collapsed text content
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn first_attr(element: &ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    attrs.iter().find_map(|attr| {
        element
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}
