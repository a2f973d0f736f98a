//! Execution contexts: isolated, independently scheduled hosts for script
//! threads.
//!
//! Each context is a dedicated tokio task owning one [`ThreadManager`]. The
//! orchestrator talks to it exclusively through its command channel, and the
//! context reports back on the shared event channel; there is no shared
//! mutable state across the boundary.

use super::issuer::IdIssuer;
use super::manager::ThreadManager;
use super::protocol::{ContextCommand, ContextEvent, ObjectId, RequestId, ThreadId};
use crate::script::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Orchestrator-side handle to one pooled execution context.
pub(crate) struct ContextHandle {
    commands: UnboundedSender<ContextCommand>,
}

impl ContextHandle {
    pub(crate) fn run(&self, object_id: ObjectId, thread_id: ThreadId, code: String) {
        self.send(ContextCommand::Run {
            object_id,
            thread_id,
            code,
        });
    }

    pub(crate) fn stop(&self, object_id: ObjectId) {
        self.send(ContextCommand::Stop { object_id });
    }

    pub(crate) fn respond(&self, request_id: RequestId, result: Value) {
        self.send(ContextCommand::Respond { request_id, result });
    }

    fn send(&self, command: ContextCommand) {
        // A closed channel means the context task is gone; commands aimed at
        // it are moot.
        let _ = self.commands.send(command);
    }
}

/// Spawn the context task and return its handle.
///
/// The task services commands and a fixed-rate tick with `select!`; commands
/// are drained first so responses arriving just before a tick are applied on
/// that tick. The task exits when the orchestrator drops the handle.
pub(crate) fn spawn_context(
    index: usize,
    tick: Duration,
    steps_per_tick: usize,
    request_ids: Arc<IdIssuer>,
    events: UnboundedSender<ContextEvent>,
) -> ContextHandle {
    let (commands, mut rx) = unbounded_channel();
    let mut manager = ThreadManager::new(index, steps_per_tick, request_ids, events);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;

                command = rx.recv() => match command {
                    Some(ContextCommand::Run { object_id, thread_id, code }) => {
                        manager.spawn(object_id, thread_id, &code);
                    }
                    Some(ContextCommand::Stop { object_id }) => {
                        manager.terminate(&object_id);
                    }
                    Some(ContextCommand::Respond { request_id, result }) => {
                        manager.on_response(request_id, result);
                    }
                    None => break,
                },
                _ = interval.tick() => manager.on_tick(),
            }
        }
        trace!(context = index, "execution context shut down");
    });

    ContextHandle { commands }
}
