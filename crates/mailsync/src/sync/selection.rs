//! Selection state: the single source of truth for the active item
//!
//! `select` is the only mutator. Every change is persisted per context and
//! triggers a detail fetch (or a clear). Detail responses are committed only
//! if they were issued for the id that is still active.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{Operation, SyncError};
use crate::models::{ItemDetail, ItemId, MailContext};
use crate::storage::{KvStore, keys, load_json, save_json};

/// Side effect of a selection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Fetch(ItemId),
    Cleared,
}

/// What applying a detail response did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailOutcome {
    Committed(ItemId),
    /// The item no longer exists; the detail was cleared
    Gone(ItemId),
    /// Issued for an id that is no longer active
    Stale,
}

pub struct SelectionState {
    store: Arc<dyn KvStore>,
    context: Option<MailContext>,
    active: Option<ItemId>,
    detail: Option<ItemDetail>,
    loading: Option<ItemId>,
}

impl SelectionState {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            context: None,
            active: None,
            detail: None,
            loading: None,
        }
    }

    /// Enter a new context. Returns the id remembered for it, if any.
    ///
    /// The active id is cleared without touching the persisted value, which
    /// stays in place until the restore search selects something.
    pub fn switch_context(&mut self, context: MailContext) -> Option<ItemId> {
        let remembered = match load_json::<ItemId>(self.store.as_ref(), &keys::active_item(&context)) {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to read remembered selection for {}: {:#}", context, e);
                None
            }
        };
        self.context = Some(context);
        self.active = None;
        self.detail = None;
        self.loading = None;
        remembered
    }

    /// Change the active item. `None` when `id` is already active.
    pub fn select(&mut self, id: Option<ItemId>) -> Option<SelectionChange> {
        if id == self.active {
            return None;
        }
        debug!("Selection {:?} -> {:?}", self.active, id);
        self.active = id;
        self.detail = None;
        self.persist();

        match id {
            Some(id) => {
                self.loading = Some(id);
                Some(SelectionChange::Fetch(id))
            }
            None => {
                self.loading = None;
                Some(SelectionChange::Cleared)
            }
        }
    }

    fn persist(&self) {
        let Some(context) = &self.context else {
            return;
        };
        let key = keys::active_item(context);
        let result = match self.active {
            Some(id) => save_json(self.store.as_ref(), &key, &id),
            None => self.store.remove(&key),
        };
        if let Err(e) = result {
            warn!("Failed to persist selection for {}: {:#}", context, e);
        }
    }

    /// Re-fetch the active item's detail. Returns the id to fetch.
    pub fn refetch(&mut self) -> Option<ItemId> {
        let id = self.active?;
        self.loading = Some(id);
        Some(id)
    }

    /// Commit a detail response if it still matches the active id
    pub fn apply_detail(
        &mut self,
        requested: ItemId,
        result: anyhow::Result<Option<ItemDetail>>,
    ) -> Result<DetailOutcome, SyncError> {
        if self.active != Some(requested) {
            debug!("Discarding detail for {} (active {:?})", requested, self.active);
            return Ok(DetailOutcome::Stale);
        }
        if self.loading == Some(requested) {
            self.loading = None;
        }

        match result {
            Ok(Some(detail)) => {
                self.detail = Some(detail);
                Ok(DetailOutcome::Committed(requested))
            }
            Ok(None) => {
                debug!("Item {} no longer exists", requested);
                self.detail = None;
                Ok(DetailOutcome::Gone(requested))
            }
            Err(e) => {
                warn!("Detail fetch for {} failed: {:#}", requested, e);
                Err(SyncError::transient(Operation::FetchDetail, &e))
            }
        }
    }

    pub fn active(&self) -> Option<ItemId> {
        self.active
    }

    pub fn detail(&self) -> Option<&ItemDetail> {
        self.detail.as_ref()
    }

    pub fn context(&self) -> Option<&MailContext> {
        self.context.as_ref()
    }

    /// Whether a detail fetch for the active id is outstanding
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }
}
