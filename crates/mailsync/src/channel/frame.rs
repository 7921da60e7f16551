//! Push frame parsing
//!
//! Frames look like `{"type": "item.created", "payload": {...}}`. Parsing is
//! defensive: a malformed frame yields an error the channel logs and drops.

use serde::Deserialize;
use serde_json::Value;

use crate::api::wire::{WireItem, WireItemPatch};
use crate::error::SyncError;
use crate::models::{Item, ItemPatch};

/// A server-side mutation delivered over the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    ItemCreated(Item),
    ItemUpdated(ItemPatch),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Parse one text frame.
///
/// Returns `Ok(None)` for well-formed frames of a type this engine does not
/// consume.
pub fn parse_frame(text: &str) -> Result<Option<PushEvent>, SyncError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| SyncError::MalformedPush(e.to_string()))?;

    let event = match envelope.kind.as_str() {
        "item.created" => {
            let item: WireItem = serde_json::from_value(envelope.payload)
                .map_err(|e| SyncError::MalformedPush(format!("item.created: {e}")))?;
            PushEvent::ItemCreated(item.into())
        }
        "item.updated" => {
            let patch: WireItemPatch = serde_json::from_value(envelope.payload)
                .map_err(|e| SyncError::MalformedPush(format!("item.updated: {e}")))?;
            PushEvent::ItemUpdated(patch.into())
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
