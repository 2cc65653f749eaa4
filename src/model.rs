//! model.rs: core value types shared by every pipeline stage.
//!
//! `Source` and `Item` are immutable once built; the pipeline only moves them
//! between queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a tracked listing index (e.g. "olx-flats").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub index_url: String,
}

impl Source {
    pub fn new(id: impl Into<String>, index_url: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(id),
            index_url: index_url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Room,
    Flat,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Room => f.write_str("room"),
            Category::Flat => f.write_str("flat"),
        }
    }
}

/// Attributes an extractor reads from a single item page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub category: Category,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub size_sqm: Option<f64>,
    pub room_count: Option<u32>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ItemAttributes {
    /// Bare attributes with every optional field absent.
    pub fn bare(category: Category) -> Self {
        Self {
            category,
            price: None,
            location: None,
            size_sqm: None,
            room_count: None,
            image_urls: Vec::new(),
        }
    }
}

/// An item URL found on a source's index, still awaiting enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub source_id: SourceId,
    pub url: String,
}

/// A fully enriched listing. This is also the archive row layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub url: String,
    pub category: Category,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub size_sqm: Option<f64>,
    pub room_count: Option<u32>,
    pub image_urls: Vec<String>,
    pub extracted_at: DateTime<Utc>,
    pub source_id: SourceId,
}

impl Item {
    pub fn from_attributes(
        discovered: Discovered,
        attrs: ItemAttributes,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: discovered.url,
            category: attrs.category,
            price: attrs.price,
            location: attrs.location,
            size_sqm: attrs.size_sqm,
            room_count: attrs.room_count,
            image_urls: attrs.image_urls,
            extracted_at,
            source_id: discovered.source_id,
        }
    }
}
