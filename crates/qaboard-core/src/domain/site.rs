//! Site-wide configuration.

use qaboard_store::Document;
use serde::{Deserialize, Serialize};

use super::schema::fields;

/// Title shown before the configuration document has loaded.
pub const PLACEHOLDER_TITLE: &str = "title";

/// Singleton site configuration (`Config/SiteInfo`). Read-only for the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
        }
    }
}

impl SiteConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Decode from the stored document. A missing `Title` keeps the placeholder.
    pub fn from_document(doc: &Document) -> Self {
        doc.str_field(fields::TITLE)
            .map(SiteConfig::new)
            .unwrap_or_default()
    }
}
