//! Paginated list controller
//!
//! Owns the ordered item collection and the load-more cursor. At most one
//! page fetch is outstanding at a time; `reset` starts a new epoch so the
//! response of a fetch issued for a previous context is discarded instead of
//! clobbering the cursor.

use std::collections::HashSet;

use log::{debug, warn};

use crate::api::Page;
use crate::error::{Operation, SyncError};
use crate::models::{Item, ItemId, ItemPatch, MailContext};

/// A page fetch issued by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub context: MailContext,
    /// 1-based page number
    pub page: u32,
    pub page_size: usize,
    epoch: u64,
}

impl PageRequest {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// What applying a page response did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { page: u32, added: usize },
    /// The response belongs to a list that has since been reset
    Stale,
}

#[derive(Debug)]
pub struct ListController {
    context: Option<MailContext>,
    items: Vec<Item>,
    /// Last page successfully loaded (0 = none)
    pages_loaded: u32,
    has_more: bool,
    in_flight: Option<u32>,
    failed: bool,
    epoch: u64,
    page_size: usize,
}

impl ListController {
    pub fn new(page_size: usize) -> Self {
        Self {
            context: None,
            items: Vec::new(),
            pages_loaded: 0,
            has_more: false,
            in_flight: None,
            failed: false,
            epoch: 0,
            page_size: page_size.max(1),
        }
    }

    /// Clear all state and fetch page 1 of `context`.
    ///
    /// Always issues a request, even if a fetch for the previous context is
    /// still outstanding; that fetch's response will be reported as stale.
    pub fn reset(&mut self, context: MailContext) -> PageRequest {
        self.epoch += 1;
        self.items.clear();
        self.pages_loaded = 0;
        self.has_more = false;
        self.failed = false;
        self.context = Some(context.clone());
        self.issue(context, 1)
    }

    /// Fetch the next page if there is one and nothing is in flight
    pub fn load_more(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() || !self.has_more {
            return None;
        }
        let context = self.context.clone()?;
        Some(self.issue(context, self.pages_loaded + 1))
    }

    /// Re-request the page whose fetch failed
    pub fn retry(&mut self) -> Option<PageRequest> {
        if !self.failed || self.in_flight.is_some() {
            return None;
        }
        let context = self.context.clone()?;
        self.failed = false;
        Some(self.issue(context, self.pages_loaded + 1))
    }

    fn issue(&mut self, context: MailContext, page: u32) -> PageRequest {
        self.in_flight = Some(page);
        PageRequest {
            context,
            page,
            page_size: self.page_size,
            epoch: self.epoch,
        }
    }

    /// Apply the result of a page fetch
    pub fn apply_page(
        &mut self,
        request: &PageRequest,
        result: anyhow::Result<Page>,
    ) -> Result<PageOutcome, SyncError> {
        if request.epoch != self.epoch || self.in_flight != Some(request.page) {
            debug!(
                "Discarding stale page {} for {}",
                request.page, request.context
            );
            return Ok(PageOutcome::Stale);
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                if request.page == 1 {
                    self.items.clear();
                }
                let added = self.extend_unique(page.items);
                self.has_more = page.has_next_page;
                self.pages_loaded = request.page;
                self.failed = false;
                debug!(
                    "Loaded page {} of {} ({} items, has_more={})",
                    request.page, request.context, added, self.has_more
                );
                Ok(PageOutcome::Loaded {
                    page: request.page,
                    added,
                })
            }
            Err(e) => {
                warn!("Page {} of {} failed: {:#}", request.page, request.context, e);
                // Stop paging from a broken state; the cursor stays put for retry
                self.has_more = false;
                self.failed = true;
                Err(SyncError::transient(Operation::FetchPage, &e))
            }
        }
    }

    fn extend_unique(&mut self, items: Vec<Item>) -> usize {
        let mut seen: HashSet<ItemId> = self.items.iter().map(|i| i.id).collect();
        let before = self.items.len();
        self.items
            .extend(items.into_iter().filter(|item| seen.insert(item.id)));
        self.items.len() - before
    }

    /// Insert a pushed item at the top. Returns `false` for a known id.
    pub fn prepend(&mut self, item: Item) -> bool {
        if self.context.is_none() || self.contains(item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Patch a row's visible fields in place. Returns `false` if the id is unknown.
    pub fn patch(&mut self, patch: &ItemPatch) -> bool {
        match self.items.iter_mut().find(|item| item.id == patch.id) {
            Some(item) => {
                item.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn context(&self) -> Option<&MailContext> {
        self.context.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }

    /// Whether the last fetch failed and can be retried
    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
