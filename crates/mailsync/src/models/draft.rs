//! Local edit buffer for an item's reply

use serde::{Deserialize, Serialize};

use super::{Field, Variant};

/// The user's in-progress reply for one item.
///
/// Local state is the user-visible source of truth: a failed remote write
/// never rolls a draft back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
    /// Index into the item's currently loaded variant list
    #[serde(default)]
    pub selected_variant_index: Option<usize>,
}

impl Draft {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Subject => &self.subject,
            Field::Body => &self.body,
        }
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        match field {
            Field::Subject => self.subject = value.into(),
            Field::Body => self.body = value.into(),
        }
    }

    /// Copy a variant's subject and content into the buffer
    pub fn stage(&mut self, index: usize, variant: &Variant) {
        self.subject = variant.staged_subject().to_string();
        self.body = variant.content.clone();
        self.selected_variant_index = Some(index);
    }
}
