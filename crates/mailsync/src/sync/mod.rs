//! Synchronization core
//!
//! Sans-IO components that keep the local view consistent with the remote
//! mailbox. Each transition returns the [`Effect`]s it needs; the workspace
//! runtime performs them and feeds the results back.

mod draft;
mod effects;
mod list;
mod live;
mod restore;
mod selection;
mod timer;

pub use draft::{DEFAULT_DEBOUNCE, DraftEngine};
pub use effects::{Effect, TimerKey};
pub use list::{ListController, PageOutcome, PageRequest};
pub use live::{MergeOutcome, merge};
pub use restore::{DEFAULT_PAGE_CAP, RestoreSearch, RestoreStep, RestoreTarget, SearchState};
pub use selection::{DetailOutcome, SelectionChange, SelectionState};
pub use timer::{TimerSlot, TimerTicket};
