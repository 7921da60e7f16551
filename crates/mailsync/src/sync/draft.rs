//! Draft sync engine
//!
//! Holds the per-item [`Draft`] buffers and the edit session of the item
//! currently open. Local edits apply immediately and are mirrored into the
//! durable store; remote writes are debounced per field and skipped when the
//! value matches the loaded variant. Corrections, refinements and history
//! steps cancel the affected fields' pending timers before their request is
//! emitted, so a stale debounced write can never land on top of their result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::api::{Correction, HistoryStep, Refinement, TextRange};
use crate::error::{Operation, SyncError};
use crate::models::{Draft, Field, ItemId, Variant, VariantId};
use crate::storage::{KvStore, keys, load_json, save_json};

use super::effects::{Effect, TimerKey};
use super::timer::TimerSlot;

/// Default debounce interval for remote field writes
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Edit state of the open item
#[derive(Debug)]
struct EditSession {
    item_id: ItemId,
    /// Variants as last loaded or confirmed by the server
    variants: Vec<Variant>,
    focus: Option<Field>,
    text_selection: Option<TextRange>,
    subject_timer: TimerSlot,
    body_timer: TimerSlot,
    /// Values of debounced writes not yet answered
    in_flight: HashMap<Field, String>,
}

impl EditSession {
    fn new(item_id: ItemId, variants: Vec<Variant>) -> Self {
        Self {
            item_id,
            variants,
            focus: None,
            text_selection: None,
            subject_timer: TimerSlot::new(),
            body_timer: TimerSlot::new(),
            in_flight: HashMap::new(),
        }
    }

    fn timer(&mut self, field: Field) -> &mut TimerSlot {
        match field {
            Field::Subject => &mut self.subject_timer,
            Field::Body => &mut self.body_timer,
        }
    }

    /// Cancel a field's pending timer, recording the effect if one was armed
    fn cancel_timer(&mut self, field: Field, effects: &mut Vec<Effect>) {
        if self.timer(field).cancel() {
            effects.push(Effect::CancelTimer(TimerKey::new(self.item_id, field)));
        }
    }

    fn cancel_all(&mut self, effects: &mut Vec<Effect>) {
        for field in Field::ALL {
            self.cancel_timer(field, effects);
        }
    }

    fn replace_variant(&mut self, variant: Variant) {
        if let Some(slot) = self.variants.iter_mut().find(|v| v.id == variant.id) {
            *slot = variant;
        }
    }
}

pub struct DraftEngine {
    store: Arc<dyn KvStore>,
    drafts: HashMap<ItemId, Draft>,
    instructions: HashMap<ItemId, String>,
    session: Option<EditSession>,
    debounce: Duration,
}

impl DraftEngine {
    /// Create the engine, restoring every draft persisted by earlier runs
    pub fn new(store: Arc<dyn KvStore>, debounce: Duration) -> Self {
        let mut drafts = HashMap::new();
        match store.keys_with_prefix(keys::DRAFT_PREFIX) {
            Ok(draft_keys) => {
                for key in draft_keys {
                    let Some(item_id) = keys::item_id_from_draft_key(&key) else {
                        continue;
                    };
                    match load_json::<Draft>(store.as_ref(), &key) {
                        Ok(Some(draft)) => {
                            drafts.insert(item_id, draft);
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Skipping unreadable draft {}: {:#}", key, e),
                    }
                }
            }
            Err(e) => warn!("Failed to list persisted drafts: {:#}", e),
        }
        if !drafts.is_empty() {
            info!("Restored {} drafts", drafts.len());
        }

        Self {
            store,
            drafts,
            instructions: HashMap::new(),
            session: None,
            debounce,
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Open (or refresh) the edit session for an item whose detail loaded
    pub fn open(&mut self, item_id: ItemId, variants: Vec<Variant>) -> Vec<Effect> {
        if self.session_item() == Some(item_id) {
            return self.load_variants(variants);
        }

        let mut effects = self.close_session();
        self.load_instruction(item_id);

        let len = variants.len();
        self.session = Some(EditSession::new(item_id, variants));

        if let Some(draft) = self.drafts.get_mut(&item_id)
            && let Some(index) = draft.selected_variant_index
            && index >= len
        {
            debug!("Draft {} points at variant {} of {}; clearing", item_id, index, len);
            draft.selected_variant_index = None;
            self.persist_draft(item_id);
            effects.push(Effect::PersistDraftSelection {
                item_id,
                index: None,
            });
        }
        effects
    }

    /// Replace the open session's variant list.
    ///
    /// If the variant ids changed, a selected index refers to a list that no
    /// longer exists and is reset in the same step.
    pub fn load_variants(&mut self, variants: Vec<Variant>) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let item_id = session.item_id;
        let changed = session.variants.len() != variants.len()
            || session
                .variants
                .iter()
                .zip(&variants)
                .any(|(old, new)| old.id != new.id);
        session.variants = variants;

        let mut effects = Vec::new();
        if changed
            && let Some(draft) = self.drafts.get_mut(&item_id)
            && draft.selected_variant_index.is_some()
        {
            debug!("Variants of {} changed; clearing stale selection", item_id);
            draft.selected_variant_index = None;
            self.persist_draft(item_id);
            effects.push(Effect::PersistDraftSelection {
                item_id,
                index: None,
            });
        }
        effects
    }

    /// Leave the open item. Its timers are cancelled; in-flight calls are
    /// allowed to finish.
    pub fn close_session(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(mut session) = self.session.take() {
            session.cancel_all(&mut effects);
        }
        effects
    }

    /// Discard an item's draft, instruction and pending timers
    pub fn close_compose(&mut self, item_id: ItemId) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(session) = self.session.as_mut()
            && session.item_id == item_id
        {
            session.cancel_all(&mut effects);
            session.in_flight.clear();
        }

        self.drafts.remove(&item_id);
        self.instructions.remove(&item_id);
        for key in [keys::draft(item_id), keys::instruction(item_id)] {
            if let Err(e) = self.store.remove(&key) {
                warn!("Failed to remove {}: {:#}", key, e);
            }
        }
        info!("Closed compose for {}", item_id);
        effects
    }

    // =========================================================================
    // Editing
    // =========================================================================

    pub fn set_focus(&mut self, field: Option<Field>) {
        if let Some(session) = self.session.as_mut() {
            session.focus = field;
            session.text_selection = None;
        }
    }

    pub fn set_text_selection(&mut self, range: Option<TextRange>) {
        if let Some(session) = self.session.as_mut() {
            session.text_selection = range;
        }
    }

    /// Apply a keystroke. The draft changes immediately; the remote write
    /// waits for the field's debounce timer. Typing into a field focuses it.
    pub fn edit(&mut self, field: Field, value: String) -> Result<Vec<Effect>, SyncError> {
        let session = self.session.as_mut().ok_or(SyncError::NoActiveItem)?;
        let item_id = session.item_id;
        if session.focus != Some(field) {
            session.focus = Some(field);
            session.text_selection = None;
        }

        let mut effects = Vec::new();
        session.cancel_timer(field, &mut effects);
        let ticket = session.timer(field).schedule(self.debounce);
        effects.push(Effect::ScheduleTimer {
            key: TimerKey::new(item_id, field),
            ticket,
        });

        self.drafts.entry(item_id).or_default().set_field(field, value);
        self.persist_draft(item_id);
        Ok(effects)
    }

    /// A debounce timer elapsed. Emits the write if the value still differs
    /// from the loaded variant and from any write already in flight.
    pub fn timer_fired(&mut self, key: TimerKey, generation: u64) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.item_id != key.item_id || !session.timer(key.field).accept(generation) {
            debug!("Ignoring stale timer for {} {}", key.item_id, key.field);
            return Vec::new();
        }
        let Some(draft) = self.drafts.get(&key.item_id) else {
            return Vec::new();
        };
        let Some(variant) = draft
            .selected_variant_index
            .and_then(|index| session.variants.get(index))
        else {
            debug!("No variant selected for {}; keeping edit local", key.item_id);
            return Vec::new();
        };

        let value = draft.field(key.field).to_string();
        if value == variant.field(key.field) {
            debug!("{} of {} unchanged; skipping write", key.field, key.item_id);
            return Vec::new();
        }
        let variant_id = variant.id;
        if session.in_flight.get(&key.field) == Some(&value) {
            debug!("Identical {} write already in flight", key.field);
            return Vec::new();
        }

        session.in_flight.insert(key.field, value.clone());
        vec![Effect::WriteVariantField {
            item_id: key.item_id,
            variant_id,
            field: key.field,
            value,
        }]
    }

    /// Result of a debounced write. Failures never touch the draft.
    pub fn field_written(
        &mut self,
        item_id: ItemId,
        field: Field,
        value: &str,
        result: anyhow::Result<Variant>,
    ) -> Result<(), SyncError> {
        let session = self.session.as_mut().filter(|s| s.item_id == item_id);
        if let Some(session) = session {
            if session.in_flight.get(&field).map(String::as_str) == Some(value) {
                session.in_flight.remove(&field);
            }
            if let Ok(variant) = &result {
                session.replace_variant(variant.clone());
            }
        }
        result.map(|_| ()).map_err(|e| {
            warn!("Writing {} of {} failed: {:#}", field, item_id, e);
            SyncError::transient(Operation::WriteField, &e)
        })
    }

    // =========================================================================
    // Server-side rewrites
    // =========================================================================

    /// Correct the focused field in full
    pub fn correct(&mut self) -> Result<Vec<Effect>, SyncError> {
        let (item_id, field, variant_id) = self.focused_target()?;
        let session = self.session.as_mut().ok_or(SyncError::NoActiveItem)?;
        if session.text_selection.is_some_and(|range| !range.is_empty()) {
            return Err(SyncError::Unsupported("partial-selection correction"));
        }

        let mut effects = Vec::new();
        session.cancel_timer(field, &mut effects);
        effects.push(Effect::Correct {
            item_id,
            variant_id,
            field,
        });
        Ok(effects)
    }

    pub fn correction_done(
        &mut self,
        item_id: ItemId,
        field: Field,
        result: anyhow::Result<Correction>,
    ) -> Result<(), SyncError> {
        let correction = result.map_err(|e| {
            warn!("Correcting {} of {} failed: {:#}", field, item_id, e);
            SyncError::transient(Operation::Correct, &e)
        })?;

        let value = match correction {
            Correction::Variant(variant) => {
                let value = variant.field(field).to_string();
                self.confirm_variant(item_id, variant);
                value
            }
            Correction::Snippet(snippet) => snippet,
        };
        self.replace_field(item_id, field, value);
        Ok(())
    }

    pub fn set_instruction(&mut self, text: String) -> Result<(), SyncError> {
        let item_id = self.session_item().ok_or(SyncError::NoActiveItem)?;
        let key = keys::instruction(item_id);
        let result = if text.is_empty() {
            self.instructions.remove(&item_id);
            self.store.remove(&key)
        } else {
            let result = save_json(self.store.as_ref(), &key, &text);
            self.instructions.insert(item_id, text);
            result
        };
        if let Err(e) = result {
            warn!("Failed to persist instruction for {}: {:#}", item_id, e);
        }
        Ok(())
    }

    /// Rewrite both fields from a free-text instruction
    pub fn refine(&mut self) -> Result<Vec<Effect>, SyncError> {
        let item_id = self.session_item().ok_or(SyncError::NoActiveItem)?;
        let instruction = self
            .instructions
            .get(&item_id)
            .filter(|text| !text.trim().is_empty())
            .cloned()
            .ok_or(SyncError::EmptyInstruction)?;
        let draft = self.drafts.get(&item_id).cloned().unwrap_or_default();

        let mut effects = Vec::new();
        if let Some(session) = self.session.as_mut() {
            session.cancel_all(&mut effects);
        }
        effects.push(Effect::Refine {
            item_id,
            instruction,
            subject: draft.subject,
            body: draft.body,
        });
        Ok(effects)
    }

    /// Result of a refinement. On success both fields are replaced and the
    /// instruction is cleared, unless it was edited while the request ran.
    pub fn refinement_done(
        &mut self,
        item_id: ItemId,
        instruction: &str,
        result: anyhow::Result<Refinement>,
    ) -> Result<(), SyncError> {
        let refinement = result.map_err(|e| {
            warn!("Refining {} failed: {:#}", item_id, e);
            SyncError::transient(Operation::Refine, &e)
        })?;

        if self.drafts.contains_key(&item_id) || self.session_item() == Some(item_id) {
            let draft = self.drafts.entry(item_id).or_default();
            draft.subject = refinement.subject;
            draft.body = refinement.body;
            self.persist_draft(item_id);
        }

        if self.instructions.get(&item_id).map(String::as_str) == Some(instruction) {
            self.instructions.remove(&item_id);
            if let Err(e) = self.store.remove(&keys::instruction(item_id)) {
                warn!("Failed to clear instruction for {}: {:#}", item_id, e);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Variants and history
    // =========================================================================

    /// Stage variant `index` into the draft, or clear the selection if it is
    /// already selected
    pub fn select_variant(&mut self, index: usize) -> Result<Vec<Effect>, SyncError> {
        let session = self.session.as_mut().ok_or(SyncError::NoActiveItem)?;
        let item_id = session.item_id;
        let variant = session
            .variants
            .get(index)
            .cloned()
            .ok_or(SyncError::InvalidVariant {
                index,
                len: session.variants.len(),
            })?;

        let mut effects = Vec::new();
        session.cancel_all(&mut effects);

        let draft = self.drafts.entry(item_id).or_default();
        if draft.selected_variant_index == Some(index) {
            draft.selected_variant_index = None;
        } else {
            draft.stage(index, &variant);
        }
        let selected = draft.selected_variant_index;
        self.persist_draft(item_id);

        effects.push(Effect::PersistDraftSelection {
            item_id,
            index: selected,
        });
        Ok(effects)
    }

    /// Best-effort remote mirror of the variant choice
    pub fn selection_persisted(&self, item_id: ItemId, result: anyhow::Result<()>) {
        if let Err(e) = result {
            let error = SyncError::transient(Operation::PersistSelection, &e);
            warn!("Item {}: {}", item_id, error);
        }
    }

    /// Request one server-side undo or redo of the focused field
    pub fn history(&mut self, step: HistoryStep) -> Result<Vec<Effect>, SyncError> {
        let (item_id, field, variant_id) = self.focused_target()?;
        let mut effects = Vec::new();
        if let Some(session) = self.session.as_mut() {
            session.cancel_timer(field, &mut effects);
        }
        effects.push(Effect::History {
            item_id,
            variant_id,
            field,
            step,
        });
        Ok(effects)
    }

    pub fn history_done(
        &mut self,
        item_id: ItemId,
        field: Field,
        step: HistoryStep,
        result: anyhow::Result<Variant>,
    ) -> Result<(), SyncError> {
        let variant = result.map_err(|e| {
            warn!("{} of {} for {} failed: {:#}", step.as_str(), field, item_id, e);
            let operation = match step {
                HistoryStep::Undo => Operation::Undo,
                HistoryStep::Redo => Operation::Redo,
            };
            SyncError::transient(operation, &e)
        })?;

        let value = variant.field(field).to_string();
        self.confirm_variant(item_id, variant);
        self.replace_field(item_id, field, value);
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Open item, focused field and selected variant of a field operation
    fn focused_target(&self) -> Result<(ItemId, Field, VariantId), SyncError> {
        let session = self.session.as_ref().ok_or(SyncError::NoActiveItem)?;
        let field = session.focus.ok_or(SyncError::MissingFocus)?;
        let variant = self
            .drafts
            .get(&session.item_id)
            .and_then(|draft| draft.selected_variant_index)
            .and_then(|index| session.variants.get(index))
            .ok_or(SyncError::NoVariantSelected)?;
        Ok((session.item_id, field, variant.id))
    }

    fn confirm_variant(&mut self, item_id: ItemId, variant: Variant) {
        if let Some(session) = self.session.as_mut()
            && session.item_id == item_id
        {
            session.replace_variant(variant);
        }
    }

    /// Overwrite a field with a server result, if the draft still exists
    fn replace_field(&mut self, item_id: ItemId, field: Field, value: String) {
        if let Some(draft) = self.drafts.get_mut(&item_id) {
            draft.set_field(field, value);
            self.persist_draft(item_id);
        } else {
            debug!("Draft {} closed before {} result arrived", item_id, field);
        }
    }

    fn load_instruction(&mut self, item_id: ItemId) {
        if self.instructions.contains_key(&item_id) {
            return;
        }
        match load_json::<String>(self.store.as_ref(), &keys::instruction(item_id)) {
            Ok(Some(text)) => {
                self.instructions.insert(item_id, text);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read instruction for {}: {:#}", item_id, e),
        }
    }

    fn persist_draft(&self, item_id: ItemId) {
        let Some(draft) = self.drafts.get(&item_id) else {
            return;
        };
        if let Err(e) = save_json(self.store.as_ref(), &keys::draft(item_id), draft) {
            warn!("Failed to persist draft {}: {:#}", item_id, e);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn draft(&self, item_id: ItemId) -> Option<&Draft> {
        self.drafts.get(&item_id)
    }

    pub fn instruction(&self, item_id: ItemId) -> Option<&str> {
        self.instructions.get(&item_id).map(String::as_str)
    }

    pub fn session_item(&self) -> Option<ItemId> {
        self.session.as_ref().map(|s| s.item_id)
    }

    pub fn variants(&self) -> &[Variant] {
        self.session
            .as_ref()
            .map(|s| s.variants.as_slice())
            .unwrap_or_default()
    }

    pub fn focus(&self) -> Option<Field> {
        self.session.as_ref().and_then(|s| s.focus)
    }

    pub fn has_pending_timer(&self, field: Field) -> bool {
        self.session.as_ref().is_some_and(|s| match field {
            Field::Subject => s.subject_timer.is_pending(),
            Field::Body => s.body_timer.is_pending(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKvStore;

    const ITEM: ItemId = ItemId(7);

    fn variant(id: i64, content: &str) -> Variant {
        Variant {
            id: VariantId::new(id),
            title: format!("Option {id}"),
            content: content.to_string(),
            subject: Some("Re: Plans".to_string()),
        }
    }

    fn variants() -> Vec<Variant> {
        vec![variant(10, "original"), variant(11, "alternative")]
    }

    fn setup() -> (DraftEngine, Arc<InMemoryKvStore>) {
        let store = Arc::new(InMemoryKvStore::new());
        let mut engine = DraftEngine::new(store.clone(), DEFAULT_DEBOUNCE);
        engine.open(ITEM, variants());
        (engine, store)
    }

    /// Schedule an edit and return the ticket generation
    fn type_into(engine: &mut DraftEngine, field: Field, value: &str) -> u64 {
        let effects = engine.edit(field, value.to_string()).unwrap();
        match effects.last() {
            Some(Effect::ScheduleTimer { ticket, .. }) => ticket.generation,
            other => panic!("expected a scheduled timer, got {other:?}"),
        }
    }

    #[test]
    fn test_edit_updates_draft_and_persists() {
        let (mut engine, store) = setup();
        let effects = engine.edit(Field::Body, "Hello".to_string()).unwrap();

        assert_eq!(effects.len(), 1);
        assert_eq!(engine.draft(ITEM).unwrap().body, "Hello");
        assert!(store.get("drafts/7").unwrap().unwrap().contains("Hello"));
        assert!(engine.has_pending_timer(Field::Body));
        assert_eq!(engine.focus(), Some(Field::Body));

        // A second keystroke cancels the first timer before re-arming
        let effects = engine.edit(Field::Body, "Hello!".to_string()).unwrap();
        assert_eq!(effects[0], Effect::CancelTimer(TimerKey::new(ITEM, Field::Body)));
    }

    #[test]
    fn test_debounce_writes_once_then_skips_identical() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        let key = TimerKey::new(ITEM, Field::Body);

        type_into(&mut engine, Field::Body, "X");
        let generation = type_into(&mut engine, Field::Body, "X");
        let effects = engine.timer_fired(key, generation);
        assert_eq!(
            effects,
            vec![Effect::WriteVariantField {
                item_id: ITEM,
                variant_id: VariantId::new(10),
                field: Field::Body,
                value: "X".to_string(),
            }]
        );

        // Same value again while the first write is in flight
        let generation = type_into(&mut engine, Field::Body, "X");
        assert!(engine.timer_fired(key, generation).is_empty());

        // And after it is confirmed
        engine
            .field_written(ITEM, Field::Body, "X", Ok(variant(10, "X")))
            .unwrap();
        let generation = type_into(&mut engine, Field::Body, "X");
        assert!(engine.timer_fired(key, generation).is_empty());
    }

    #[test]
    fn test_unchanged_value_is_not_written() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        let generation = type_into(&mut engine, Field::Body, "original");
        assert!(engine.timer_fired(TimerKey::new(ITEM, Field::Body), generation).is_empty());
    }

    #[test]
    fn test_write_without_variant_stays_local() {
        let (mut engine, _store) = setup();
        let generation = type_into(&mut engine, Field::Subject, "Hi");
        assert!(
            engine
                .timer_fired(TimerKey::new(ITEM, Field::Subject), generation)
                .is_empty()
        );
        assert_eq!(engine.draft(ITEM).unwrap().subject, "Hi");
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        let first = type_into(&mut engine, Field::Body, "a");
        let _second = type_into(&mut engine, Field::Body, "ab");
        assert!(engine.timer_fired(TimerKey::new(ITEM, Field::Body), first).is_empty());
    }

    #[test]
    fn test_failed_write_keeps_draft() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        engine.edit(Field::Body, "local".to_string()).unwrap();
        let err = engine
            .field_written(ITEM, Field::Body, "local", Err(anyhow::anyhow!("503")))
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::TransientNetwork {
                operation: Operation::WriteField,
                ..
            }
        ));
        assert_eq!(engine.draft(ITEM).unwrap().body, "local");
    }

    #[test]
    fn test_variant_toggle() {
        let (mut engine, store) = setup();
        let effects = engine.select_variant(1).unwrap();
        assert_eq!(
            effects,
            vec![Effect::PersistDraftSelection {
                item_id: ITEM,
                index: Some(1)
            }]
        );
        let draft = engine.draft(ITEM).unwrap();
        assert_eq!(draft.body, "alternative");
        assert_eq!(draft.subject, "Re: Plans");

        let effects = engine.select_variant(1).unwrap();
        assert_eq!(
            effects,
            vec![Effect::PersistDraftSelection {
                item_id: ITEM,
                index: None
            }]
        );
        assert_eq!(engine.draft(ITEM).unwrap().selected_variant_index, None);
        let stored: Draft = load_json(store.as_ref(), "drafts/7").unwrap().unwrap();
        assert_eq!(stored.selected_variant_index, None);
    }

    #[test]
    fn test_failed_selection_write_keeps_local_index() {
        let (mut engine, store) = setup();
        engine.select_variant(1).unwrap();
        engine.selection_persisted(ITEM, Err(anyhow::anyhow!("503")));

        assert_eq!(engine.draft(ITEM).unwrap().selected_variant_index, Some(1));
        let stored: Draft = load_json(store.as_ref(), &keys::draft(ITEM)).unwrap().unwrap();
        assert_eq!(stored.selected_variant_index, Some(1));
    }

    #[test]
    fn test_select_variant_out_of_range() {
        let (mut engine, _store) = setup();
        assert_eq!(
            engine.select_variant(5),
            Err(SyncError::InvalidVariant { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_correct_cancels_pending_timer_first() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        let generation = type_into(&mut engine, Field::Body, "teh draft");

        let effects = engine.correct().unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::CancelTimer(TimerKey::new(ITEM, Field::Body)),
                Effect::Correct {
                    item_id: ITEM,
                    variant_id: VariantId::new(10),
                    field: Field::Body,
                },
            ]
        );
        // A wake-up that was already queued must not write
        assert!(engine.timer_fired(TimerKey::new(ITEM, Field::Body), generation).is_empty());

        engine
            .correction_done(ITEM, Field::Body, Ok(Correction::Variant(variant(10, "the draft"))))
            .unwrap();
        assert_eq!(engine.draft(ITEM).unwrap().body, "the draft");
    }

    #[test]
    fn test_correct_refuses_partial_selection() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        type_into(&mut engine, Field::Body, "some text");
        engine.set_text_selection(Some(TextRange::new(0, 4)));

        assert_eq!(
            engine.correct(),
            Err(SyncError::Unsupported("partial-selection correction"))
        );
        assert!(engine.has_pending_timer(Field::Body));

        // A collapsed caret is not a selection
        engine.set_text_selection(Some(TextRange::new(3, 3)));
        assert!(engine.correct().is_ok());
    }

    #[test]
    fn test_selection_in_other_field_does_not_block_correction() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        engine.set_focus(Some(Field::Subject));
        engine.set_text_selection(Some(TextRange::new(0, 3)));

        type_into(&mut engine, Field::Body, "new body");
        assert_eq!(engine.focus(), Some(Field::Body));

        let effects = engine.correct().unwrap();
        assert!(matches!(
            effects.last(),
            Some(Effect::Correct {
                field: Field::Body,
                ..
            })
        ));
    }

    #[test]
    fn test_correct_preconditions() {
        let (mut engine, _store) = setup();
        assert_eq!(engine.correct(), Err(SyncError::MissingFocus));
        engine.set_focus(Some(Field::Subject));
        assert_eq!(engine.correct(), Err(SyncError::NoVariantSelected));
    }

    #[test]
    fn test_snippet_correction_replaces_field() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        engine.edit(Field::Subject, "Re: plns".to_string()).unwrap();
        engine
            .correction_done(ITEM, Field::Subject, Ok(Correction::Snippet("Re: plans".into())))
            .unwrap();
        assert_eq!(engine.draft(ITEM).unwrap().subject, "Re: plans");
    }

    #[test]
    fn test_refine_cancels_both_timers_and_clears_instruction() {
        let (mut engine, store) = setup();
        assert_eq!(engine.refine(), Err(SyncError::EmptyInstruction));

        engine.edit(Field::Subject, "Hi".to_string()).unwrap();
        engine.edit(Field::Body, "Long text".to_string()).unwrap();
        engine.set_instruction("make it shorter".to_string()).unwrap();
        assert!(store.get("instruction/7").unwrap().is_some());

        let effects = engine.refine().unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::CancelTimer(TimerKey::new(ITEM, Field::Subject)),
                Effect::CancelTimer(TimerKey::new(ITEM, Field::Body)),
                Effect::Refine {
                    item_id: ITEM,
                    instruction: "make it shorter".to_string(),
                    subject: "Hi".to_string(),
                    body: "Long text".to_string(),
                },
            ]
        );

        engine
            .refinement_done(
                ITEM,
                "make it shorter",
                Ok(Refinement {
                    subject: "Hi".into(),
                    body: "Short".into(),
                }),
            )
            .unwrap();
        assert_eq!(engine.draft(ITEM).unwrap().body, "Short");
        assert_eq!(engine.instruction(ITEM), None);
        assert!(store.get("instruction/7").unwrap().is_none());
    }

    #[test]
    fn test_failed_refine_keeps_instruction() {
        let (mut engine, _store) = setup();
        engine.set_instruction("friendlier".to_string()).unwrap();
        engine.refine().unwrap();
        assert!(
            engine
                .refinement_done(ITEM, "friendlier", Err(anyhow::anyhow!("timeout")))
                .is_err()
        );
        assert_eq!(engine.instruction(ITEM), Some("friendlier"));
    }

    #[test]
    fn test_history_replaces_field() {
        let (mut engine, _store) = setup();
        engine.select_variant(0).unwrap();
        type_into(&mut engine, Field::Body, "edited");

        let effects = engine.history(HistoryStep::Undo).unwrap();
        assert_eq!(effects[0], Effect::CancelTimer(TimerKey::new(ITEM, Field::Body)));
        assert!(matches!(
            effects[1],
            Effect::History {
                step: HistoryStep::Undo,
                field: Field::Body,
                ..
            }
        ));

        engine
            .history_done(ITEM, Field::Body, HistoryStep::Undo, Ok(variant(10, "before")))
            .unwrap();
        assert_eq!(engine.draft(ITEM).unwrap().body, "before");
        assert_eq!(engine.variants()[0].content, "before");
    }

    #[test]
    fn test_close_compose_drops_everything() {
        let (mut engine, store) = setup();
        engine.edit(Field::Body, "draft".to_string()).unwrap();
        engine.set_instruction("formal".to_string()).unwrap();

        let effects = engine.close_compose(ITEM);
        assert_eq!(effects, vec![Effect::CancelTimer(TimerKey::new(ITEM, Field::Body))]);
        assert!(engine.draft(ITEM).is_none());
        assert!(engine.instruction(ITEM).is_none());
        assert!(store.get("drafts/7").unwrap().is_none());
        assert!(store.get("instruction/7").unwrap().is_none());

        // Late results do not resurrect the draft
        engine
            .correction_done(ITEM, Field::Body, Ok(Correction::Snippet("x".into())))
            .unwrap();
        assert!(engine.draft(ITEM).is_none());
    }

    #[test]
    fn test_drafts_survive_restart() {
        let (mut engine, store) = setup();
        engine.select_variant(1).unwrap();
        engine.set_instruction("warmer".to_string()).unwrap();

        let mut restored = DraftEngine::new(store.clone(), DEFAULT_DEBOUNCE);
        assert_eq!(restored.draft(ITEM).unwrap().selected_variant_index, Some(1));
        restored.open(ITEM, variants());
        assert_eq!(restored.instruction(ITEM), Some("warmer"));
    }

    #[test]
    fn test_refreshed_variants_reset_stale_index() {
        let (mut engine, _store) = setup();
        engine.select_variant(1).unwrap();

        // Same ids: index stays
        assert!(engine.open(ITEM, variants()).is_empty());
        assert_eq!(engine.draft(ITEM).unwrap().selected_variant_index, Some(1));

        let effects = engine.open(ITEM, vec![variant(20, "new"), variant(21, "newer")]);
        assert_eq!(
            effects,
            vec![Effect::PersistDraftSelection {
                item_id: ITEM,
                index: None
            }]
        );
        assert_eq!(engine.draft(ITEM).unwrap().selected_variant_index, None);
    }

    #[test]
    fn test_open_clears_out_of_range_index() {
        let (mut engine, store) = setup();
        engine.select_variant(1).unwrap();
        engine.close_session();

        let mut restored = DraftEngine::new(store, DEFAULT_DEBOUNCE);
        let effects = restored.open(ITEM, vec![variant(10, "only one")]);
        assert_eq!(effects.len(), 1);
        assert_eq!(restored.draft(ITEM).unwrap().selected_variant_index, None);
    }

    #[test]
    fn test_switching_items_cancels_timers() {
        let (mut engine, _store) = setup();
        engine.edit(Field::Subject, "s".to_string()).unwrap();
        engine.edit(Field::Body, "b".to_string()).unwrap();

        let effects = engine.open(ItemId::new(8), Vec::new());
        assert_eq!(
            effects,
            vec![
                Effect::CancelTimer(TimerKey::new(ITEM, Field::Subject)),
                Effect::CancelTimer(TimerKey::new(ITEM, Field::Body)),
            ]
        );
        assert_eq!(engine.session_item(), Some(ItemId::new(8)));
        assert_eq!(engine.draft(ITEM).unwrap().body, "b");
    }
}
