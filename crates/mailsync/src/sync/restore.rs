//! Selection restoration search
//!
//! After a context reset the previously active id is hunted for page by
//! page, up to a page cap, before falling back to the first item.

use log::{debug, info};

use super::list::ListController;
use crate::models::ItemId;

/// Default number of pages the search may load before giving up
pub const DEFAULT_PAGE_CAP: u32 = 10;

/// The id the search is still hunting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTarget {
    /// `None` when nothing was remembered for the context
    pub item_id: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching(RestoreTarget),
    Settled,
}

/// What the search wants done after a list change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// Not searching
    Idle,
    /// A page fetch is in flight; try again when it lands
    Wait,
    /// Target not seen yet and more pages exist
    LoadMore,
    /// Search settled; select this id (or nothing)
    Select(Option<ItemId>),
    /// Search gave up but something is already selected
    KeepCurrent,
}

#[derive(Debug)]
pub struct RestoreSearch {
    state: SearchState,
    page_cap: u32,
}

impl RestoreSearch {
    pub fn new(page_cap: u32) -> Self {
        Self {
            state: SearchState::Idle,
            page_cap: page_cap.max(1),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.state, SearchState::Searching(_))
    }

    /// Start hunting for `target` after a context reset
    pub fn begin(&mut self, target: Option<ItemId>) {
        debug!("Restore search started for {:?}", target);
        self.state = SearchState::Searching(RestoreTarget { item_id: target });
    }

    /// An explicit user selection ends the search immediately
    pub fn cancel(&mut self) {
        if self.is_searching() {
            debug!("Restore search cancelled by user selection");
            self.state = SearchState::Settled;
        }
    }

    /// Decide the next step after the list collection changed
    pub fn on_list_changed(&mut self, list: &ListController, active: Option<ItemId>) -> RestoreStep {
        let SearchState::Searching(target) = self.state else {
            return RestoreStep::Idle;
        };

        // Never stack a second fetch on the list's own in-flight guard
        if list.is_loading() {
            return RestoreStep::Wait;
        }

        if let Some(id) = target.item_id
            && list.contains(id)
        {
            info!("Restored selection {} after {} page(s)", id, list.pages_loaded());
            self.state = SearchState::Settled;
            return RestoreStep::Select(Some(id));
        }

        // Without a remembered id there is nothing to page for
        if target.item_id.is_some() && list.has_more() && list.pages_loaded() < self.page_cap {
            return RestoreStep::LoadMore;
        }

        if let Some(id) = target.item_id {
            info!(
                "Gave up restoring {} after {} page(s)",
                id,
                list.pages_loaded()
            );
        }
        self.state = SearchState::Settled;
        if active.is_some() {
            RestoreStep::KeepCurrent
        } else {
            RestoreStep::Select(list.first().map(|item| item.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MailContext;
    use crate::sync::list::tests::page;

    fn inbox() -> MailContext {
        MailContext::new("acct", "INBOX")
    }

    #[test]
    fn test_idle_until_begun() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let list = ListController::new(3);
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::Idle);
    }

    #[test]
    fn test_waits_while_fetch_in_flight() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(42)));
        list.reset(inbox());
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::Wait);
        assert!(search.is_searching());
    }

    #[test]
    fn test_finds_target_on_second_page() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(42)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[50, 49, 48], true))).unwrap();
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::LoadMore);

        let second = list.load_more().unwrap();
        list.apply_page(&second, Ok(page(&[47, 46, 42], false))).unwrap();
        assert_eq!(
            search.on_list_changed(&list, None),
            RestoreStep::Select(Some(ItemId::new(42)))
        );
        assert_eq!(search.state(), SearchState::Settled);
    }

    #[test]
    fn test_gives_up_with_first_item() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(7)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[50, 49], false))).unwrap();
        assert_eq!(
            search.on_list_changed(&list, None),
            RestoreStep::Select(Some(ItemId::new(50)))
        );
    }

    #[test]
    fn test_gives_up_with_none_on_empty_list() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(7)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[], false))).unwrap();
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::Select(None));
    }

    #[test]
    fn test_keeps_existing_selection_on_give_up() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(7)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[50], false))).unwrap();
        assert_eq!(
            search.on_list_changed(&list, Some(ItemId::new(50))),
            RestoreStep::KeepCurrent
        );
    }

    #[test]
    fn test_page_cap_bounds_search() {
        let mut search = RestoreSearch::new(2);
        let mut list = ListController::new(1);
        search.begin(Some(ItemId::new(1)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[100], true))).unwrap();
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::LoadMore);

        let second = list.load_more().unwrap();
        list.apply_page(&second, Ok(page(&[99], true))).unwrap();
        assert_eq!(
            search.on_list_changed(&list, None),
            RestoreStep::Select(Some(ItemId::new(100)))
        );
        assert!(list.has_more(), "cap reached before the list ran out");
    }

    #[test]
    fn test_page_failure_gives_up() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(Some(ItemId::new(1)));

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[9, 8, 7], true))).unwrap();
        search.on_list_changed(&list, None);
        let second = list.load_more().unwrap();
        let _ = list.apply_page(&second, Err(anyhow::anyhow!("timeout")));

        assert_eq!(
            search.on_list_changed(&list, None),
            RestoreStep::Select(Some(ItemId::new(9)))
        );
    }

    #[test]
    fn test_no_remembered_id_settles_on_first_page() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        let mut list = ListController::new(3);
        search.begin(None);

        let first = list.reset(inbox());
        list.apply_page(&first, Ok(page(&[30, 29, 28], true))).unwrap();
        assert_eq!(
            search.on_list_changed(&list, None),
            RestoreStep::Select(Some(ItemId::new(30)))
        );
        assert_eq!(search.state(), SearchState::Settled);
    }

    #[test]
    fn test_cancel_settles() {
        let mut search = RestoreSearch::new(DEFAULT_PAGE_CAP);
        search.begin(Some(ItemId::new(1)));
        search.cancel();
        assert_eq!(search.state(), SearchState::Settled);

        let list = ListController::new(3);
        assert_eq!(search.on_list_changed(&list, None), RestoreStep::Idle);
    }
}
