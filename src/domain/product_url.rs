use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Marker segment the marketplace puts in front of the numeric product id,
/// e.g. `/brand/name-p-123456789`.
static PRODUCT_ID_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-p-(\d+)").expect("product id marker pattern is valid"));

/// Derive the stable product identifier from a listing URL.
///
/// Only the path is inspected, so query strings such as `?boutiqueId=61`
/// never leak into the identifier. Returns `None` when the marker is absent.
pub fn derive_identifier(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    PRODUCT_ID_MARKER
        .captures_iter(&path)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Rewrite a possibly relative href into an absolute URL on `base_origin`.
pub fn absolutize(href: &str, base_origin: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }

    let base = Url::parse(base_origin).ok()?;
    base.join(href).ok().map(|joined| joined.to_string())
}

/// Build a listing URL for a product that only survived with its identifier.
pub fn synthesize(base_origin: &str, identifier: &str) -> String {
    format!(
        "{}/brand/name-p-{identifier}",
        base_origin.trim_end_matches('/')
    )
}
