//! Cancellable timer slots
//!
//! A slot never sleeps itself: `schedule` hands out a [`TimerTicket`] that
//! the runtime backs with a real sleep, and the wake-up is only honoured if
//! the ticket is still the slot's current one. A wake-up that was already
//! queued when the slot was cancelled or rescheduled is therefore ignored.

use std::time::Duration;

/// A scheduled wake-up handed to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    pub generation: u64,
    pub delay: Duration,
}

/// One logical timer with at most one pending wake-up
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: bool,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot, superseding any pending wake-up
    pub fn schedule(&mut self, delay: Duration) -> TimerTicket {
        self.generation += 1;
        self.pending = true;
        TimerTicket {
            generation: self.generation,
            delay,
        }
    }

    /// Disarm the slot. Returns whether a wake-up was pending.
    pub fn cancel(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    /// Consume a wake-up; `false` if it was cancelled or superseded
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.pending && generation == self.generation {
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
