//! Mailsync crate - Client-side synchronization and edit-consistency engine
//!
//! This crate keeps a locally rendered, paginated mailbox view consistent
//! with a remote data API, a live push channel and a user editing
//! AI-assisted replies:
//! - Domain models (Item, ItemDetail, Variant, Draft)
//! - Data API trait and its HTTP client
//! - Push channel with a reconnecting WebSocket driver
//! - Sans-IO sync components (list, restore search, selection, live merge, drafts)
//! - Workspace state container and the tokio runtime that drives it
//! - Client-local key-value storage
//!
//! This crate has zero UI dependencies; a front end talks to it through
//! [`WorkspaceHandle`] and [`WorkspaceEvent`].

pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod sync;
pub mod workspace;

pub use api::{Correction, HistoryStep, HttpMailApi, MailApi, Page, Refinement, TextRange};
pub use channel::{ConnectionState, PushChannel, PushEvent, Topic};
pub use config::SyncConfig;
pub use error::{Operation, SyncError};
pub use models::{
    Draft, Field, Item, ItemDetail, ItemFlags, ItemId, ItemPatch, MailContext, Variant, VariantId,
};
pub use storage::{InMemoryKvStore, KvStore, SqliteKvStore};
pub use workspace::{
    Action, Snapshot, Workspace, WorkspaceEvent, WorkspaceHandle, WorkspaceOptions,
    WorkspaceRuntime,
};
