//! Data API consumed by the engine
//!
//! This module provides:
//! - The [`MailApi`] trait the runtime calls from blocking worker threads
//! - An HTTP implementation backed by `ureq`
//! - Wire types and their conversion into domain models

mod client;
pub mod wire;

pub use client::HttpMailApi;

use anyhow::Result;

use crate::models::{Field, Item, ItemDetail, ItemId, MailContext, Variant, VariantId};

/// One page of the item list
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub has_next_page: bool,
}

/// Result of a correction request
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    /// The whole variant, with the corrected field replaced
    Variant(Variant),
    /// Only the corrected text, returned when a selection was sent
    Snippet(String),
}

/// Result of a free-text refinement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub subject: String,
    pub body: String,
}

/// Direction of a server-side history step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Undo,
    Redo,
}

impl HistoryStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStep::Undo => "undo",
            HistoryStep::Redo => "redo",
        }
    }
}

/// Character range of an active text selection within a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// REST-style data API.
///
/// Calls are synchronous to keep implementations executor-agnostic; the
/// runtime moves them onto blocking worker threads.
pub trait MailApi: Send + Sync {
    /// Fetch one page (1-based) of a list context
    fn list(&self, context: &MailContext, page: u32, page_size: usize) -> Result<Page>;

    /// Fetch an item's detail; `None` if the item no longer exists
    fn detail(&self, id: ItemId) -> Result<Option<ItemDetail>>;

    fn update_variant_field(&self, variant_id: VariantId, field: Field, value: &str)
    -> Result<Variant>;

    fn correct(
        &self,
        variant_id: VariantId,
        field: Field,
        selection: Option<TextRange>,
    ) -> Result<Correction>;

    fn refine(&self, item_id: ItemId, instruction: &str, subject: &str, body: &str)
    -> Result<Refinement>;

    /// Apply one undo or redo step to a variant field
    fn history(&self, variant_id: VariantId, field: Field, step: HistoryStep) -> Result<Variant>;

    /// Record which variant the draft uses, or clear it
    fn set_draft_selection(&self, item_id: ItemId, index: Option<usize>) -> Result<()>;
}
