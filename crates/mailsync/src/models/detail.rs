//! Item detail and AI reply variants

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Item;

/// Identifier of an AI-generated reply variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantId(pub i64);

impl VariantId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two editable fields of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Subject,
    Body,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Subject, Field::Body];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Subject => "subject",
            Field::Body => "body",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One AI-proposed reply alternative attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub title: String,
    pub content: String,
    /// Suggested reply subject, if the generator produced one
    pub subject: Option<String>,
}

impl Variant {
    /// The subject this variant stages into a draft
    pub fn staged_subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.title)
    }

    /// The variant's value for an editable field
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Subject => self.staged_subject(),
            Field::Body => &self.content,
        }
    }
}

/// Full item including body and reply variants.
///
/// Loaded lazily whenever the active selection changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub item: Item,
    pub body: String,
    pub variants: Vec<Variant>,
}

impl ItemDetail {
    pub fn id(&self) -> super::ItemId {
        self.item.id
    }
}
