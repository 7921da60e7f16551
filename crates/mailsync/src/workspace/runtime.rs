//! Async runtime for a [`Workspace`]
//!
//! One tokio task owns the workspace and applies actions strictly one at a
//! time. Effects become background work: API calls run on blocking worker
//! threads, debounce tickets become sleeping tasks whose handles are aborted
//! on cancel. Every result re-enters the loop as an action, so all state
//! transitions stay serialized on the owner task.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;

use super::state::{Action, Snapshot, Workspace};
use crate::api::MailApi;
use crate::channel::PushEvent;
use crate::error::SyncError;
use crate::models::{Field, ItemId, MailContext};
use crate::sync::{Effect, TimerKey};

/// Notification for the embedding front end
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    /// State after an action was applied
    Changed(Box<Snapshot>),
    Error(SyncError),
}

/// Cloneable command surface of a running workspace.
///
/// The runtime stops once every handle is dropped.
#[derive(Clone)]
pub struct WorkspaceHandle {
    actions: UnboundedSender<Action>,
}

impl WorkspaceHandle {
    /// Queue an action. Returns `false` if the runtime has stopped.
    pub fn send(&self, action: Action) -> bool {
        self.actions.send(action).is_ok()
    }

    pub fn switch_context(&self, context: MailContext) -> bool {
        self.send(Action::SwitchContext(context))
    }

    pub fn select(&self, id: Option<ItemId>) -> bool {
        self.send(Action::Select(id))
    }

    pub fn edit(&self, field: Field, value: impl Into<String>) -> bool {
        self.send(Action::Edit {
            field,
            value: value.into(),
        })
    }

    /// Feed a live push event into the workspace
    pub fn push(&self, event: PushEvent) -> bool {
        self.send(Action::Push(event))
    }
}

pub struct WorkspaceRuntime {
    workspace: Workspace,
    api: Arc<dyn MailApi>,
    actions: UnboundedReceiver<Action>,
    /// Weak so that background work never keeps the loop alive
    feedback: WeakUnboundedSender<Action>,
    events: UnboundedSender<WorkspaceEvent>,
    timers: HashMap<TimerKey, JoinHandle<()>>,
}

impl WorkspaceRuntime {
    pub fn new(
        workspace: Workspace,
        api: Arc<dyn MailApi>,
    ) -> (Self, WorkspaceHandle, UnboundedReceiver<WorkspaceEvent>) {
        let (action_tx, actions) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            workspace,
            api,
            actions,
            feedback: action_tx.downgrade(),
            events,
            timers: HashMap::new(),
        };
        (runtime, WorkspaceHandle { actions: action_tx }, event_rx)
    }

    /// Create the runtime and run it on the current tokio runtime
    pub fn spawn(
        workspace: Workspace,
        api: Arc<dyn MailApi>,
    ) -> (
        WorkspaceHandle,
        UnboundedReceiver<WorkspaceEvent>,
        JoinHandle<()>,
    ) {
        let (runtime, handle, events) = Self::new(workspace, api);
        let task = tokio::spawn(runtime.run());
        (handle, events, task)
    }

    pub async fn run(mut self) {
        while let Some(action) = self.actions.recv().await {
            if let Action::TimerFired { key, .. } = &action
                && self.timers.get(key).is_some_and(JoinHandle::is_finished)
            {
                self.timers.remove(key);
            }

            let transition = self.workspace.apply(action);
            for effect in transition.effects {
                self.execute(effect);
            }
            if let Some(error) = transition.error {
                self.emit(WorkspaceEvent::Error(error));
            }
            self.emit(WorkspaceEvent::Changed(Box::new(self.workspace.snapshot())));
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        debug!("Workspace runtime stopped");
    }

    fn emit(&self, event: WorkspaceEvent) {
        // The front end may have gone away; the loop keeps serving handles
        let _ = self.events.send(event);
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::FetchPage(request) => self.call(move |api| {
                let result = api.list(&request.context, request.page, request.page_size);
                Action::PageLoaded { request, result }
            }),
            Effect::FetchDetail(item_id) => self.call(move |api| Action::DetailLoaded {
                item_id,
                result: api.detail(item_id),
            }),
            Effect::ScheduleTimer { key, ticket } => {
                let feedback = self.feedback.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(ticket.delay).await;
                    if let Some(tx) = feedback.upgrade() {
                        let _ = tx.send(Action::TimerFired {
                            key,
                            generation: ticket.generation,
                        });
                    }
                });
                if let Some(previous) = self.timers.insert(key, timer) {
                    previous.abort();
                }
            }
            Effect::CancelTimer(key) => {
                if let Some(timer) = self.timers.remove(&key) {
                    timer.abort();
                }
            }
            Effect::WriteVariantField {
                item_id,
                variant_id,
                field,
                value,
            } => self.call(move |api| {
                let result = api.update_variant_field(variant_id, field, &value);
                Action::FieldWritten {
                    item_id,
                    field,
                    value,
                    result,
                }
            }),
            Effect::Correct {
                item_id,
                variant_id,
                field,
            } => self.call(move |api| Action::CorrectionDone {
                item_id,
                field,
                result: api.correct(variant_id, field, None),
            }),
            Effect::Refine {
                item_id,
                instruction,
                subject,
                body,
            } => self.call(move |api| {
                let result = api.refine(item_id, &instruction, &subject, &body);
                Action::RefinementDone {
                    item_id,
                    instruction,
                    result,
                }
            }),
            Effect::History {
                item_id,
                variant_id,
                field,
                step,
            } => self.call(move |api| Action::HistoryDone {
                item_id,
                field,
                step,
                result: api.history(variant_id, field, step),
            }),
            Effect::PersistDraftSelection { item_id, index } => {
                self.call(move |api| Action::DraftSelectionPersisted {
                    item_id,
                    result: api.set_draft_selection(item_id, index),
                })
            }
        }
    }

    /// Run a blocking API call off the owner task and feed its result back
    fn call<F>(&self, work: F)
    where
        F: FnOnce(&dyn MailApi) -> Action + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let feedback = self.feedback.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || work(api.as_ref())).await {
                Ok(action) => {
                    if let Some(tx) = feedback.upgrade() {
                        let _ = tx.send(action);
                    }
                }
                Err(e) => error!("API worker failed: {}", e),
            }
        });
    }
}
