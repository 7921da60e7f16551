//! Workspace state container
//!
//! Composes the list, restore search, selection, live merge and draft engine
//! behind one transition function. Every user command and every I/O
//! completion is an [`Action`]; applying it returns the effects to run and
//! at most one error to surface.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::api::{Correction, HistoryStep, Page, Refinement, TextRange};
use crate::channel::PushEvent;
use crate::error::SyncError;
use crate::models::{Draft, Field, Item, ItemDetail, ItemId, MailContext, Variant};
use crate::storage::KvStore;
use crate::sync::{
    DEFAULT_DEBOUNCE, DEFAULT_PAGE_CAP, DetailOutcome, DraftEngine, Effect, ListController,
    MergeOutcome, PageOutcome, PageRequest, RestoreSearch, RestoreStep, SearchState,
    SelectionChange, SelectionState, TimerKey, merge,
};

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Tuning knobs of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceOptions {
    pub page_size: usize,
    /// Pages the restore search may load before giving up
    pub page_cap: u32,
    pub debounce: Duration,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_cap: DEFAULT_PAGE_CAP,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug)]
pub enum Action {
    // User commands
    SwitchContext(MailContext),
    LoadMore,
    RetryPage,
    Select(Option<ItemId>),
    Edit { field: Field, value: String },
    Focus(Option<Field>),
    SetTextSelection(Option<TextRange>),
    SetInstruction(String),
    SelectVariant(usize),
    Correct,
    Refine,
    Undo,
    Redo,
    CloseCompose(ItemId),

    // Inbound events
    Push(PushEvent),
    TimerFired { key: TimerKey, generation: u64 },

    // I/O completions
    PageLoaded {
        request: PageRequest,
        result: anyhow::Result<Page>,
    },
    DetailLoaded {
        item_id: ItemId,
        result: anyhow::Result<Option<ItemDetail>>,
    },
    FieldWritten {
        item_id: ItemId,
        field: Field,
        value: String,
        result: anyhow::Result<Variant>,
    },
    CorrectionDone {
        item_id: ItemId,
        field: Field,
        result: anyhow::Result<Correction>,
    },
    RefinementDone {
        item_id: ItemId,
        instruction: String,
        result: anyhow::Result<Refinement>,
    },
    HistoryDone {
        item_id: ItemId,
        field: Field,
        step: HistoryStep,
        result: anyhow::Result<Variant>,
    },
    DraftSelectionPersisted {
        item_id: ItemId,
        result: anyhow::Result<()>,
    },
}

/// Result of applying one action
#[derive(Debug, Default, PartialEq)]
pub struct Transition {
    /// Effects to start, in order
    pub effects: Vec<Effect>,
    pub error: Option<SyncError>,
}

impl Transition {
    fn effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            error: None,
        }
    }

    fn fetch(request: Option<PageRequest>) -> Self {
        Self::effects(request.map(Effect::FetchPage).into_iter().collect())
    }

    fn from_result(result: Result<Vec<Effect>, SyncError>) -> Self {
        match result {
            Ok(effects) => Self::effects(effects),
            Err(error) => Self::failed(error),
        }
    }

    fn from_unit(result: Result<(), SyncError>) -> Self {
        Self {
            effects: Vec::new(),
            error: result.err(),
        }
    }

    fn failed(error: SyncError) -> Self {
        Self {
            effects: Vec::new(),
            error: Some(error),
        }
    }
}

/// Point-in-time view for the front end
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub context: Option<MailContext>,
    pub items: Vec<Item>,
    pub has_more: bool,
    pub list_loading: bool,
    pub list_failed: bool,
    pub search: SearchState,
    pub active: Option<ItemId>,
    pub detail: Option<ItemDetail>,
    pub detail_loading: bool,
    pub draft: Option<Draft>,
    pub instruction: Option<String>,
    pub focus: Option<Field>,
}

pub struct Workspace {
    list: ListController,
    restore: RestoreSearch,
    selection: SelectionState,
    drafts: DraftEngine,
}

impl Workspace {
    pub fn new(store: Arc<dyn KvStore>, options: WorkspaceOptions) -> Self {
        Self {
            list: ListController::new(options.page_size),
            restore: RestoreSearch::new(options.page_cap),
            selection: SelectionState::new(Arc::clone(&store)),
            drafts: DraftEngine::new(store, options.debounce),
        }
    }

    pub fn apply(&mut self, action: Action) -> Transition {
        match action {
            Action::SwitchContext(context) => self.switch_context(context),
            Action::LoadMore => Transition::fetch(self.list.load_more()),
            Action::RetryPage => Transition::fetch(self.list.retry()),
            Action::Select(id) => {
                self.restore.cancel();
                let mut effects = Vec::new();
                self.select(id, &mut effects);
                Transition::effects(effects)
            }
            Action::Edit { field, value } => {
                Transition::from_result(self.drafts.edit(field, value))
            }
            Action::Focus(field) => {
                self.drafts.set_focus(field);
                Transition::default()
            }
            Action::SetTextSelection(range) => {
                self.drafts.set_text_selection(range);
                Transition::default()
            }
            Action::SetInstruction(text) => {
                Transition::from_unit(self.drafts.set_instruction(text))
            }
            Action::SelectVariant(index) => {
                Transition::from_result(self.drafts.select_variant(index))
            }
            Action::Correct => Transition::from_result(self.drafts.correct()),
            Action::Refine => Transition::from_result(self.drafts.refine()),
            Action::Undo => Transition::from_result(self.drafts.history(HistoryStep::Undo)),
            Action::Redo => Transition::from_result(self.drafts.history(HistoryStep::Redo)),
            Action::CloseCompose(item_id) => {
                Transition::effects(self.drafts.close_compose(item_id))
            }

            Action::Push(event) => self.push(event),
            Action::TimerFired { key, generation } => {
                Transition::effects(self.drafts.timer_fired(key, generation))
            }

            Action::PageLoaded { request, result } => self.page_loaded(request, result),
            Action::DetailLoaded { item_id, result } => self.detail_loaded(item_id, result),
            Action::FieldWritten {
                item_id,
                field,
                value,
                result,
            } => Transition::from_unit(self.drafts.field_written(item_id, field, &value, result)),
            Action::CorrectionDone {
                item_id,
                field,
                result,
            } => Transition::from_unit(self.drafts.correction_done(item_id, field, result)),
            Action::RefinementDone {
                item_id,
                instruction,
                result,
            } => Transition::from_unit(self.drafts.refinement_done(item_id, &instruction, result)),
            Action::HistoryDone {
                item_id,
                field,
                step,
                result,
            } => Transition::from_unit(self.drafts.history_done(item_id, field, step, result)),
            Action::DraftSelectionPersisted { item_id, result } => {
                self.drafts.selection_persisted(item_id, result);
                Transition::default()
            }
        }
    }

    fn switch_context(&mut self, context: MailContext) -> Transition {
        debug!("Switching to {}", context);
        let mut effects = self.drafts.close_session();
        let remembered = self.selection.switch_context(context.clone());
        self.restore.begin(remembered);
        effects.push(Effect::FetchPage(self.list.reset(context)));
        Transition::effects(effects)
    }

    fn select(&mut self, id: Option<ItemId>, effects: &mut Vec<Effect>) {
        let Some(change) = self.selection.select(id) else {
            return;
        };
        effects.extend(self.drafts.close_session());
        if let SelectionChange::Fetch(id) = change {
            effects.push(Effect::FetchDetail(id));
        }
    }

    /// Run the restore search against the current list and fold its step in
    fn after_list_change(&mut self, effects: &mut Vec<Effect>) {
        match self.restore.on_list_changed(&self.list, self.selection.active()) {
            RestoreStep::Idle | RestoreStep::Wait | RestoreStep::KeepCurrent => {}
            RestoreStep::LoadMore => effects.extend(self.list.load_more().map(Effect::FetchPage)),
            RestoreStep::Select(id) => self.select(id, effects),
        }
    }

    fn page_loaded(&mut self, request: PageRequest, result: anyhow::Result<Page>) -> Transition {
        let mut transition = Transition::default();
        match self.list.apply_page(&request, result) {
            Ok(PageOutcome::Stale) => return transition,
            Ok(PageOutcome::Loaded { .. }) => {}
            Err(error) => transition.error = Some(error),
        }
        self.after_list_change(&mut transition.effects);
        transition
    }

    fn detail_loaded(
        &mut self,
        item_id: ItemId,
        result: anyhow::Result<Option<ItemDetail>>,
    ) -> Transition {
        match self.selection.apply_detail(item_id, result) {
            Ok(DetailOutcome::Committed(id)) => {
                let variants = self
                    .selection
                    .detail()
                    .map(|detail| detail.variants.clone())
                    .unwrap_or_default();
                Transition::effects(self.drafts.open(id, variants))
            }
            Ok(DetailOutcome::Gone(id)) => {
                if self.drafts.session_item() == Some(id) {
                    Transition::effects(self.drafts.close_session())
                } else {
                    Transition::default()
                }
            }
            Ok(DetailOutcome::Stale) => Transition::default(),
            Err(error) => Transition::failed(error),
        }
    }

    fn push(&mut self, event: PushEvent) -> Transition {
        let mut effects = Vec::new();
        let outcome = merge(event, &mut self.list, &mut self.selection);
        if let MergeOutcome::Updated {
            id, refetch: true, ..
        } = outcome
        {
            effects.push(Effect::FetchDetail(id));
        }
        if outcome.changed_list() {
            self.after_list_change(&mut effects);
        }
        Transition::effects(effects)
    }

    pub fn snapshot(&self) -> Snapshot {
        let active = self.selection.active();
        Snapshot {
            context: self.list.context().cloned(),
            items: self.list.items().to_vec(),
            has_more: self.list.has_more(),
            list_loading: self.list.is_loading(),
            list_failed: self.list.has_failed(),
            search: self.restore.state(),
            active,
            detail: self.selection.detail().cloned(),
            detail_loading: self.selection.is_loading(),
            draft: active.and_then(|id| self.drafts.draft(id)).cloned(),
            instruction: active
                .and_then(|id| self.drafts.instruction(id))
                .map(str::to_string),
            focus: self.drafts.focus(),
        }
    }

    pub fn list(&self) -> &ListController {
        &self.list
    }

    pub fn restore(&self) -> &RestoreSearch {
        &self.restore
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn drafts(&self) -> &DraftEngine {
        &self.drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemPatch, VariantId};
    use crate::storage::{InMemoryKvStore, keys, save_json};
    use chrono::{TimeZone, Utc};

    fn inbox() -> MailContext {
        MailContext::new("acct", "INBOX")
    }

    fn item(id: i64) -> Item {
        let received = Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap();
        Item::new(ItemId::new(id), format!("Item {id}"), received)
    }

    fn page(ids: &[i64], has_next_page: bool) -> Page {
        Page {
            items: ids.iter().copied().map(item).collect(),
            has_next_page,
        }
    }

    fn detail(id: i64) -> ItemDetail {
        ItemDetail {
            item: item(id),
            body: "Can we meet on Friday?".to_string(),
            variants: vec![
                Variant {
                    id: VariantId::new(id * 10),
                    title: "Accept".to_string(),
                    content: "Friday works.".to_string(),
                    subject: None,
                },
                Variant {
                    id: VariantId::new(id * 10 + 1),
                    title: "Decline".to_string(),
                    content: "Sorry, I can't.".to_string(),
                    subject: None,
                },
            ],
        }
    }

    fn workspace() -> (Workspace, Arc<InMemoryKvStore>) {
        let store = Arc::new(InMemoryKvStore::new());
        let workspace = Workspace::new(store.clone(), WorkspaceOptions::default());
        (workspace, store)
    }

    fn only_page_request(transition: &Transition) -> PageRequest {
        match transition.effects.as_slice() {
            [Effect::FetchPage(request)] => request.clone(),
            other => panic!("expected one page fetch, got {other:?}"),
        }
    }

    /// Switch to the inbox, load one page and open `active`
    fn opened(ids: &[i64], active: i64) -> Workspace {
        let (mut ws, _store) = workspace();
        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        ws.apply(Action::PageLoaded {
            request,
            result: Ok(page(ids, false)),
        });
        ws.apply(Action::Select(Some(ItemId::new(active))));
        ws.apply(Action::DetailLoaded {
            item_id: ItemId::new(active),
            result: Ok(Some(detail(active))),
        });
        ws
    }

    #[test]
    fn test_restores_target_on_second_page() {
        let (mut ws, store) = workspace();
        save_json(store.as_ref(), &keys::active_item(&inbox()), &ItemId::new(42)).unwrap();

        let first = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        assert_eq!(first.page, 1);
        // Scrolling while page 1 is in flight must not stack a fetch
        assert!(ws.apply(Action::LoadMore).effects.is_empty());

        let transition = ws.apply(Action::PageLoaded {
            request: first,
            result: Ok(page(&[50, 49, 48], true)),
        });
        let second = only_page_request(&transition);
        assert_eq!(second.page, 2);

        let transition = ws.apply(Action::PageLoaded {
            request: second,
            result: Ok(page(&[47, 46, 42], false)),
        });
        assert_eq!(transition.effects, vec![Effect::FetchDetail(ItemId::new(42))]);
        assert_eq!(ws.selection().active(), Some(ItemId::new(42)));
        assert_eq!(ws.restore().state(), SearchState::Settled);
    }

    #[test]
    fn test_missing_target_falls_back_to_first() {
        let (mut ws, store) = workspace();
        save_json(store.as_ref(), &keys::active_item(&inbox()), &ItemId::new(99)).unwrap();

        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let transition = ws.apply(Action::PageLoaded {
            request,
            result: Ok(page(&[3, 2, 1], false)),
        });
        assert_eq!(transition.effects, vec![Effect::FetchDetail(ItemId::new(3))]);
        assert_eq!(ws.restore().state(), SearchState::Settled);
    }

    #[test]
    fn test_first_visit_selects_first_item_after_one_page() {
        let (mut ws, _store) = workspace();

        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let transition = ws.apply(Action::PageLoaded {
            request,
            result: Ok(page(&[990, 989, 988], true)),
        });
        assert_eq!(transition.effects, vec![Effect::FetchDetail(ItemId::new(990))]);
        assert_eq!(ws.list().pages_loaded(), 1);
        assert!(ws.list().has_more());
        assert_eq!(ws.restore().state(), SearchState::Settled);
    }

    #[test]
    fn test_search_stops_at_page_cap() {
        let store = Arc::new(InMemoryKvStore::new());
        save_json(store.as_ref(), &keys::active_item(&inbox()), &ItemId::new(1)).unwrap();
        let options = WorkspaceOptions {
            page_cap: 2,
            ..Default::default()
        };
        let mut ws = Workspace::new(store, options);

        let mut request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let mut fetches = 1;
        loop {
            let base = 100 - i64::from(request.page) * 10;
            let transition = ws.apply(Action::PageLoaded {
                request: request.clone(),
                result: Ok(page(&[base, base - 1], true)),
            });
            match transition.effects.as_slice() {
                [Effect::FetchPage(next)] => {
                    request = next.clone();
                    fetches += 1;
                }
                [Effect::FetchDetail(id)] => {
                    assert_eq!(*id, ItemId::new(90));
                    break;
                }
                other => panic!("unexpected effects {other:?}"),
            }
        }
        assert_eq!(fetches, 2);
    }

    #[test]
    fn test_user_selection_cancels_search() {
        let (mut ws, store) = workspace();
        save_json(store.as_ref(), &keys::active_item(&inbox()), &ItemId::new(42)).unwrap();

        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let transition = ws.apply(Action::Select(Some(ItemId::new(7))));
        assert_eq!(transition.effects, vec![Effect::FetchDetail(ItemId::new(7))]);
        assert_eq!(ws.restore().state(), SearchState::Settled);

        let transition = ws.apply(Action::PageLoaded {
            request,
            result: Ok(page(&[50, 49], true)),
        });
        assert!(transition.effects.is_empty());
        assert_eq!(ws.selection().active(), Some(ItemId::new(7)));
    }

    #[test]
    fn test_stale_page_after_context_switch() {
        let (mut ws, _store) = workspace();
        let old = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let new = only_page_request(&ws.apply(Action::SwitchContext(MailContext::new("acct", "Sent"))));

        let transition = ws.apply(Action::PageLoaded {
            request: old,
            result: Ok(page(&[1, 2], false)),
        });
        assert_eq!(transition, Transition::default());
        assert!(ws.list().is_empty());
        assert!(ws.list().is_loading());

        ws.apply(Action::PageLoaded {
            request: new,
            result: Ok(page(&[8], false)),
        });
        assert_eq!(ws.selection().active(), Some(ItemId::new(8)));
    }

    #[test]
    fn test_page_failure_surfaces_and_allows_retry() {
        let (mut ws, _store) = workspace();
        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        let transition = ws.apply(Action::PageLoaded {
            request,
            result: Err(anyhow::anyhow!("connection reset")),
        });
        assert!(matches!(transition.error, Some(SyncError::TransientNetwork { .. })));
        assert!(ws.snapshot().list_failed);

        let retry = only_page_request(&ws.apply(Action::RetryPage));
        assert_eq!(retry.page, 1);
    }

    #[test]
    fn test_duplicate_push_keeps_length() {
        let mut ws = opened(&[3, 2, 1], 2);
        let transition = ws.apply(Action::Push(PushEvent::ItemCreated(item(3))));
        assert!(transition.effects.is_empty());
        assert_eq!(ws.list().len(), 3);

        ws.apply(Action::Push(PushEvent::ItemCreated(item(4))));
        assert_eq!(ws.list().len(), 4);
        assert_eq!(ws.selection().active(), Some(ItemId::new(2)));
    }

    #[test]
    fn test_push_update_refetches_active_detail() {
        let mut ws = opened(&[3, 2, 1], 2);
        let patch = ItemPatch {
            id: ItemId::new(2),
            subject: Some("Updated".into()),
            ..Default::default()
        };
        let transition = ws.apply(Action::Push(PushEvent::ItemUpdated(patch)));
        assert_eq!(transition.effects, vec![Effect::FetchDetail(ItemId::new(2))]);
        assert_eq!(ws.list().get(ItemId::new(2)).unwrap().subject, "Updated");
    }

    #[test]
    fn test_stale_detail_does_not_open_session() {
        let (mut ws, _store) = workspace();
        let request = only_page_request(&ws.apply(Action::SwitchContext(inbox())));
        ws.apply(Action::PageLoaded {
            request,
            result: Ok(page(&[3, 2, 1], false)),
        });
        ws.apply(Action::Select(Some(ItemId::new(1))));

        let transition = ws.apply(Action::DetailLoaded {
            item_id: ItemId::new(3),
            result: Ok(Some(detail(3))),
        });
        assert_eq!(transition, Transition::default());
        assert!(ws.selection().detail().is_none());
        assert_eq!(ws.drafts().session_item(), None);
    }

    #[test]
    fn test_variant_toggle_through_workspace() {
        let mut ws = opened(&[3, 2, 1], 2);
        assert_eq!(ws.drafts().session_item(), Some(ItemId::new(2)));

        let transition = ws.apply(Action::SelectVariant(1));
        assert_eq!(
            transition.effects,
            vec![Effect::PersistDraftSelection {
                item_id: ItemId::new(2),
                index: Some(1)
            }]
        );
        assert_eq!(ws.snapshot().draft.unwrap().body, "Sorry, I can't.");

        let transition = ws.apply(Action::SelectVariant(1));
        assert_eq!(
            transition.effects,
            vec![Effect::PersistDraftSelection {
                item_id: ItemId::new(2),
                index: None
            }]
        );
    }

    #[test]
    fn test_navigating_away_cancels_timers() {
        let mut ws = opened(&[3, 2, 1], 2);
        ws.apply(Action::Edit {
            field: Field::Body,
            value: "typing".into(),
        });
        let transition = ws.apply(Action::Select(Some(ItemId::new(3))));
        assert_eq!(
            transition.effects,
            vec![
                Effect::CancelTimer(TimerKey::new(ItemId::new(2), Field::Body)),
                Effect::FetchDetail(ItemId::new(3)),
            ]
        );
    }

    #[test]
    fn test_refine_without_instruction_reports_error() {
        let mut ws = opened(&[1], 1);
        let transition = ws.apply(Action::Refine);
        assert_eq!(transition.error, Some(SyncError::EmptyInstruction));
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn test_edit_without_open_item() {
        let (mut ws, _store) = workspace();
        let transition = ws.apply(Action::Edit {
            field: Field::Subject,
            value: "x".into(),
        });
        assert_eq!(transition.error, Some(SyncError::NoActiveItem));
    }
}
