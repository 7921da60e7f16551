//! Item model representing one row of the paginated mailbox list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a mailbox item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl ItemId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable per-item flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub is_read: bool,
    pub is_flagged: bool,
    /// Whether AI reply variants have been generated for the item
    pub has_variants: bool,
}

/// A single row in the mailbox list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub flags: ItemFlags,
    /// Ordering field (newest first)
    pub received_at: DateTime<Utc>,
    /// Display name or address of the sender
    pub sender: String,
    pub subject: String,
    /// Preview text shown under the subject
    pub snippet: String,
}

impl Item {
    pub fn new(id: ItemId, subject: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id,
            flags: ItemFlags::default(),
            received_at,
            sender: String::new(),
            subject: subject.into(),
            snippet: String::new(),
        }
    }

    /// Apply the fields carried by a pushed update, leaving the rest untouched
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(is_read) = patch.is_read {
            self.flags.is_read = is_read;
        }
        if let Some(is_flagged) = patch.is_flagged {
            self.flags.is_flagged = is_flagged;
        }
        if let Some(has_variants) = patch.has_variants {
            self.flags.has_variants = has_variants;
        }
        if let Some(subject) = &patch.subject {
            self.subject = subject.clone();
        }
        if let Some(snippet) = &patch.snippet {
            self.snippet = snippet.clone();
        }
    }
}

/// Partial row update delivered by the push channel.
///
/// Pushed payloads are not trusted to be complete, so every field but the
/// id is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub id: ItemId,
    pub is_read: Option<bool>,
    pub is_flagged: Option<bool>,
    pub has_variants: Option<bool>,
    pub subject: Option<String>,
    pub snippet: Option<String>,
}

/// The scope a list is loaded for (account and folder)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailContext {
    pub account_id: String,
    pub folder: String,
}

impl MailContext {
    pub fn new(account_id: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            folder: folder.into(),
        }
    }
}

impl fmt::Display for MailContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.folder)
    }
}
