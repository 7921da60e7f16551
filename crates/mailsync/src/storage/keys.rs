//! Key layout of the client-local store

use crate::models::{ItemId, MailContext};

/// Prefix shared by all persisted drafts
pub const DRAFT_PREFIX: &str = "drafts/";

/// Remembered active item for a list context. Segments are percent-encoded
/// so a `/` inside an account id cannot collide with another context.
pub fn active_item(context: &MailContext) -> String {
    format!(
        "active/{}/{}",
        urlencoding::encode(&context.account_id),
        urlencoding::encode(&context.folder)
    )
}

pub fn draft(item_id: ItemId) -> String {
    format!("{DRAFT_PREFIX}{item_id}")
}

/// Refinement instruction typed but not yet applied
pub fn instruction(item_id: ItemId) -> String {
    format!("instruction/{item_id}")
}

/// Parse the item id back out of a draft key
pub fn item_id_from_draft_key(key: &str) -> Option<ItemId> {
    key.strip_prefix(DRAFT_PREFIX)?.parse().ok().map(ItemId::new)
}
