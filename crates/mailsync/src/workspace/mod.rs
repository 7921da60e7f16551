//! Workspace: the composed engine and the task that drives it

mod runtime;
mod state;

pub use runtime::{WorkspaceEvent, WorkspaceHandle, WorkspaceRuntime};
pub use state::{Action, DEFAULT_PAGE_SIZE, Snapshot, Transition, Workspace, WorkspaceOptions};
