//! Product records and the corpus they form.
//!
//! A [`RawProduct`] is what the upstream catalog export contains. A
//! [`ProductRecord`] is the processed form with its derived
//! `searchable_text`; a [`Corpus`] is the ordered, id-unique sequence of
//! processed records that both search indices are built from.

use crate::catalog::CatalogError;
use crate::normalize;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Unique integer identifier of a product. The join key across indices.
pub type ProductId = i64;

/// Tag field as it appears in a catalog line.
///
/// Upstream exports encode tags as a string holding a list literal
/// (`"['Dog', 'Leash']"`); processed catalogs store a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    List(Vec<serde_json::Value>),
    Encoded(String),
}

impl RawTags {
    /// Resolve into cleaned tags. Malformed encodings resolve to no tags.
    #[must_use]
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Self::Encoded(raw) => normalize::parse_tag_list(raw),
            Self::List(values) => values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .filter(|tag| !tag.is_empty())
                .map(normalize::clean_text)
                .collect(),
        }
    }
}

/// One row of a raw catalog export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    pub product_id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<RawTags>,
}

/// A processed product record. Immutable once the corpus is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Cleaned tags, in catalog order.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub searchable_text: String,
    #[serde(default)]
    pub title_cleaned: String,
    #[serde(default)]
    pub vendor_cleaned: String,
}

impl ProductRecord {
    /// Process a raw catalog row: parse tags, derive the searchable text and
    /// the cleaned display fields.
    #[must_use]
    pub fn from_raw(raw: RawProduct) -> Self {
        let tags = raw.tags.as_ref().map(RawTags::resolve).unwrap_or_default();
        let searchable_text = normalize::build_searchable_text(
            raw.title.as_deref(),
            raw.vendor.as_deref(),
            raw.category.as_deref(),
            &tags,
        );
        let title_cleaned = normalize::clean_text(raw.title.as_deref().unwrap_or_default());
        let vendor_cleaned = normalize::clean_text(raw.vendor.as_deref().unwrap_or_default());

        Self {
            product_id: raw.product_id,
            title: raw.title,
            vendor: raw.vendor,
            category: raw.category,
            tags,
            searchable_text,
            title_cleaned,
            vendor_cleaned,
        }
    }

    /// Snapshot of the fields needed to hydrate a search result.
    #[must_use]
    pub fn metadata(&self) -> ProductMetadata {
        ProductMetadata {
            title: self.title.clone(),
            vendor: self.vendor.clone(),
            category: self.category.clone(),
            searchable_text: self.searchable_text.clone(),
        }
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTags>::deserialize(deserializer)?;
    Ok(raw.as_ref().map(RawTags::resolve).unwrap_or_default())
}

/// Display metadata for one indexed product, keyed by index position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub searchable_text: String,
}

/// Ordered, id-unique sequence of processed product records.
///
/// Position is a build-time convenience; `product_id` is the join key, so
/// construction rejects duplicate ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    records: Vec<ProductRecord>,
}

impl Corpus {
    /// Build a corpus, rejecting duplicate product ids.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProductId`] naming the first repeated id.
    pub fn new(records: Vec<ProductRecord>) -> Result<Self, CatalogError> {
        let mut seen: HashMap<ProductId, usize> = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if seen.insert(record.product_id, position).is_some() {
                return Err(CatalogError::DuplicateProductId(record.product_id));
            }
        }
        Ok(Self { records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    /// Checked lookup by position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&ProductRecord> {
        self.records.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter()
    }

    /// Searchable texts in corpus order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|record| record.searchable_text.as_str())
            .collect()
    }

    /// Product ids in corpus order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.records.iter().map(|record| record.product_id).collect()
    }
}
