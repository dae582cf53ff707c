//! Parsing context passed alongside raw markup

/// Catalog page being parsed
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// 1-based page index within the listing
    pub page_index: u32,

    /// Origin used to absolutize relative links
    pub base_origin: String,
}

impl ParseContext {
    pub fn new(page_index: u32, base_origin: impl Into<String>) -> Self {
        Self {
            page_index,
            base_origin: base_origin.into(),
        }
    }
}

