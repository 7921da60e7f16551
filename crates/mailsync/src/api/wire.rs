//! JSON wire types of the data API and the push channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Correction, Page, Refinement, TextRange};
use crate::models::{Field, Item, ItemDetail, ItemFlags, ItemId, ItemPatch, Variant, VariantId};

/// List row as sent by the server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireItem {
    pub id: i64,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub has_variants: bool,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
}

impl From<WireItem> for Item {
    fn from(wire: WireItem) -> Self {
        Self {
            id: ItemId::new(wire.id),
            flags: ItemFlags {
                is_read: wire.is_read,
                is_flagged: wire.is_flagged,
                has_variants: wire.has_variants,
            },
            received_at: wire.received_at,
            sender: wire.sender,
            subject: wire.subject,
            snippet: wire.snippet,
        }
    }
}

/// Partial row carried by `item.updated` frames
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireItemPatch {
    pub id: i64,
    pub is_read: Option<bool>,
    pub is_flagged: Option<bool>,
    pub has_variants: Option<bool>,
    pub subject: Option<String>,
    pub snippet: Option<String>,
}

impl From<WireItemPatch> for ItemPatch {
    fn from(wire: WireItemPatch) -> Self {
        Self {
            id: ItemId::new(wire.id),
            is_read: wire.is_read,
            is_flagged: wire.is_flagged,
            has_variants: wire.has_variants,
            subject: wire.subject,
            snippet: wire.snippet,
        }
    }
}

/// Response from listing a page of items
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<WireItem>,
    #[serde(default)]
    pub has_next_page: bool,
}

impl From<ListResponse> for Page {
    fn from(wire: ListResponse) -> Self {
        Self {
            items: wire.items.into_iter().map(Item::from).collect(),
            has_next_page: wire.has_next_page,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireVariant {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub subject: Option<String>,
}

impl From<WireVariant> for Variant {
    fn from(wire: WireVariant) -> Self {
        Self {
            id: VariantId::new(wire.id),
            title: wire.title,
            content: wire.content,
            subject: wire.subject,
        }
    }
}

/// Full item as returned by the detail endpoint
#[derive(Debug, Deserialize)]
pub struct DetailResponse {
    #[serde(flatten)]
    pub item: WireItem,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub variants: Vec<WireVariant>,
}

impl From<DetailResponse> for ItemDetail {
    fn from(wire: DetailResponse) -> Self {
        Self {
            item: wire.item.into(),
            body: wire.body,
            variants: wire.variants.into_iter().map(Variant::from).collect(),
        }
    }
}

/// The correct endpoint answers with either a snippet or a whole variant
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CorrectResponse {
    Snippet {
        #[serde(rename = "correctedSnippet")]
        corrected_snippet: String,
    },
    Variant(WireVariant),
}

impl From<CorrectResponse> for Correction {
    fn from(wire: CorrectResponse) -> Self {
        match wire {
            CorrectResponse::Snippet { corrected_snippet } => Correction::Snippet(corrected_snippet),
            CorrectResponse::Variant(variant) => Correction::Variant(variant.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefineResponse {
    pub subject: String,
    pub body: String,
}

impl From<RefineResponse> for Refinement {
    fn from(wire: RefineResponse) -> Self {
        Self {
            subject: wire.subject,
            body: wire.body,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateFieldRequest<'a> {
    pub field: Field,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WireRange {
    pub start: usize,
    pub end: usize,
}

impl From<TextRange> for WireRange {
    fn from(range: TextRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CorrectRequest {
    pub field: Field,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<WireRange>,
}

#[derive(Debug, Serialize)]
pub struct RefineRequest<'a> {
    pub instruction: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct HistoryRequest {
    pub field: Field,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSelectionRequest {
    pub selected_variant_index: Option<usize>,
}
