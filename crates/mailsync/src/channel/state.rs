//! Connection state machine
//!
//! Three internal phases with a single owned retry timer, so "at most one
//! pending reconnect" holds by construction:
//!
//! - `Idle`: nothing connected, no retry pending
//! - `Active`: connecting or open
//! - `RetryScheduled`: closed uncleanly, one reconnect timer pending

use std::time::Duration;

use log::{debug, info, warn};

use crate::sync::{TimerSlot, TimerTicket};

/// Default fixed delay before reconnecting after an unclean close
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Close code of an orderly shutdown
pub const NORMAL_CLOSE: u16 = 1000;

/// Externally visible connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedClean,
    ClosedRetrying,
}

/// Why the connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame received (or none, if the peer sent no code)
    Code(Option<u16>),
    /// Connect failed or the transport errored
    Transport(String),
}

impl CloseReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, CloseReason::Code(Some(NORMAL_CLOSE)))
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            CloseReason::Code(code) => *code,
            CloseReason::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active { open: bool },
    RetryScheduled,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    phase: Phase,
    retry: TimerSlot,
    delay: Duration,
}

impl ConnectionMachine {
    pub fn new(delay: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            retry: TimerSlot::new(),
            delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Idle => ConnectionState::ClosedClean,
            Phase::Active { open: false } => ConnectionState::Connecting,
            Phase::Active { open: true } => ConnectionState::Open,
            Phase::RetryScheduled => ConnectionState::ClosedRetrying,
        }
    }

    /// Request a connection. Returns `true` if the caller should dial now.
    ///
    /// A no-op while connecting, open, or while a reconnect is already
    /// pending: the pending timer owns the next attempt.
    pub fn connect(&mut self) -> bool {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Active { open: false };
                true
            }
            Phase::Active { .. } | Phase::RetryScheduled => {
                debug!("connect() ignored in {:?}", self.state());
                false
            }
        }
    }

    pub fn on_open(&mut self) {
        if let Phase::Active { .. } = self.phase {
            self.phase = Phase::Active { open: true };
        }
    }

    /// Record a close. Returns the reconnect ticket to arm, if any.
    pub fn on_close(&mut self, reason: CloseReason) -> Option<TimerTicket> {
        if !matches!(self.phase, Phase::Active { .. }) {
            // Late close after teardown or a retry already pending
            return None;
        }
        if reason.is_clean() {
            info!("Push channel closed cleanly");
            self.phase = Phase::Idle;
            return None;
        }
        warn!(
            "Push channel dropped ({:?}); reconnecting in {:?}",
            reason, self.delay
        );
        self.phase = Phase::RetryScheduled;
        Some(self.retry.schedule(self.delay))
    }

    /// The reconnect timer fired. Returns `true` if the caller should dial now.
    pub fn on_retry_fired(&mut self, generation: u64) -> bool {
        if self.phase == Phase::RetryScheduled && self.retry.accept(generation) {
            self.phase = Phase::Active { open: false };
            true
        } else {
            false
        }
    }

    /// Explicit teardown: cancel any pending retry and close cleanly
    pub fn teardown(&mut self) {
        self.retry.cancel();
        self.phase = Phase::Idle;
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_pending()
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}
