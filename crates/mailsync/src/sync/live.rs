//! Live merge of pushed server mutations
//!
//! Created items are prepended unless their id is already listed. Updates
//! patch the row in place; if the updated item is the active one its detail
//! is re-fetched in full instead of trusting the partial payload.

use log::debug;

use crate::channel::PushEvent;
use crate::models::ItemId;

use super::list::ListController;
use super::selection::SelectionState;

/// What merging one push event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted(ItemId),
    /// `item.created` for an id already in the list
    Duplicate(ItemId),
    Updated {
        id: ItemId,
        /// Whether a listed row was patched
        patched: bool,
        /// Whether the active item's detail must be re-fetched
        refetch: bool,
    },
    /// No list context is loaded yet
    Ignored,
}

impl MergeOutcome {
    /// Whether the visible list changed
    pub fn changed_list(&self) -> bool {
        matches!(
            self,
            MergeOutcome::Inserted(_) | MergeOutcome::Updated { patched: true, .. }
        )
    }
}

pub fn merge(
    event: PushEvent,
    list: &mut ListController,
    selection: &mut SelectionState,
) -> MergeOutcome {
    if list.context().is_none() {
        debug!("Ignoring push event before any list is loaded");
        return MergeOutcome::Ignored;
    }

    match event {
        PushEvent::ItemCreated(item) => {
            let id = item.id;
            if list.prepend(item) {
                debug!("Pushed item {} prepended", id);
                MergeOutcome::Inserted(id)
            } else {
                debug!("Pushed item {} already listed", id);
                MergeOutcome::Duplicate(id)
            }
        }
        PushEvent::ItemUpdated(patch) => {
            let id = patch.id;
            let patched = list.patch(&patch);
            let refetch = selection.active() == Some(id) && selection.refetch().is_some();
            MergeOutcome::Updated {
                id,
                patched,
                refetch,
            }
        }
    }
}
