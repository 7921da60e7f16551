//! I/O requested by engine transitions
//!
//! Components never perform I/O. Each transition returns the effects it
//! needs, in the order they must be started; the runtime executes them and
//! feeds the results back as actions.

use crate::api::HistoryStep;
use crate::models::{Field, ItemId, VariantId};

use super::list::PageRequest;
use super::timer::TimerTicket;

/// Identifies a debounce timer: one per (item, field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub item_id: ItemId,
    pub field: Field,
}

impl TimerKey {
    pub fn new(item_id: ItemId, field: Field) -> Self {
        Self { item_id, field }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchPage(PageRequest),
    FetchDetail(ItemId),
    ScheduleTimer {
        key: TimerKey,
        ticket: TimerTicket,
    },
    CancelTimer(TimerKey),
    WriteVariantField {
        item_id: ItemId,
        variant_id: VariantId,
        field: Field,
        value: String,
    },
    Correct {
        item_id: ItemId,
        variant_id: VariantId,
        field: Field,
    },
    Refine {
        item_id: ItemId,
        instruction: String,
        subject: String,
        body: String,
    },
    History {
        item_id: ItemId,
        variant_id: VariantId,
        field: Field,
        step: HistoryStep,
    },
    PersistDraftSelection {
        item_id: ItemId,
        index: Option<usize>,
    },
}
