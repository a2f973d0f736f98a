//! Virtual machine orchestrator and public API.
//!
//! The orchestrator owns a fixed pool of execution contexts, maps agents to
//! their active threads, and exposes the run/stop/query surface plus the
//! typed event stream the game collaborator consumes. All cross-boundary
//! traffic is message passing; the orchestrator is the single writer of the
//! agent → thread map, each context's manager the single writer of its own.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, trace};

pub mod context;
pub mod error;
pub mod issuer;
pub mod manager;
pub mod protocol;

pub use error::VmError;
pub use issuer::IdIssuer;
pub use protocol::{ApiRequest, ObjectId, RequestId, StopReason, ThreadId};

use context::{ContextHandle, spawn_context};
use crate::script::Value;
use protocol::ContextEvent;

/// Configuration for the virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    /// Number of pooled execution contexts, fixed at startup.
    pub contexts: usize,

    /// Step-loop period for every context (the source targets 100 steps/s).
    pub tick: Duration,

    /// How many statements one thread may execute per tick before yielding
    /// to its siblings.
    pub steps_per_tick: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        // One context per hardware thread, minus one for the host simulation.
        let contexts = std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1);
        Self {
            contexts,
            tick: Duration::from_millis(10),
            steps_per_tick: 1,
        }
    }
}

/// The orchestrator's record of one agent's active thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    /// Agent the thread controls.
    pub object_id: ObjectId,
    /// Thread identifier, unique for the process lifetime.
    pub thread_id: ThreadId,
    /// Pool index of the context hosting the thread.
    pub context: usize,
}

/// Events delivered to the game collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum VmEvent {
    /// The context confirmed the thread's interpreter is running.
    Started(ThreadInfo),
    /// The thread terminated; exactly one per thread lifetime.
    Stopped {
        /// The thread that stopped.
        info: ThreadInfo,
        /// Why it stopped.
        reason: StopReason,
    },
    /// A script called a host API; answer with
    /// [`VirtualMachine::send_response`].
    Api(ApiRequest),
}

/// Receiving half of the orchestrator's event stream.
pub type Events = UnboundedReceiver<VmEvent>;

struct VmState {
    infos: std::collections::HashMap<ObjectId, ThreadInfo>,
    loads: Vec<usize>,
}

/// Host-side façade over the context pool.
pub struct VirtualMachine {
    contexts: Vec<ContextHandle>,
    state: Arc<Mutex<VmState>>,
    thread_ids: IdIssuer,
    events: UnboundedSender<VmEvent>,
}

impl VirtualMachine {
    /// Spawn the context pool and the event pump.
    ///
    /// Must be called within a tokio runtime. The returned [`Events`] stream
    /// is the collaborator's side of the start/stop/api notifications.
    pub fn new(config: VmConfig) -> error::Result<(Self, Events)> {
        if config.contexts == 0 {
            return Err(VmError::Config(
                "context pool size must be at least 1".to_string(),
            ));
        }
        if config.tick.is_zero() {
            return Err(VmError::Config("tick period must be non-zero".to_string()));
        }

        let (context_events, upward) = unbounded_channel();
        // One request-ID space across the whole pool, so a response can
        // never alias another context's request.
        let request_ids = Arc::new(IdIssuer::new());
        let contexts: Vec<ContextHandle> = (0..config.contexts)
            .map(|index| {
                spawn_context(
                    index,
                    config.tick,
                    config.steps_per_tick,
                    Arc::clone(&request_ids),
                    context_events.clone(),
                )
            })
            .collect();
        drop(context_events);

        let state = Arc::new(Mutex::new(VmState {
            infos: std::collections::HashMap::new(),
            loads: vec![0; config.contexts],
        }));
        let (events, stream) = unbounded_channel();

        tokio::spawn(pump(Arc::clone(&state), upward, events.clone()));

        info!(contexts = config.contexts, "virtual machine started");
        Ok((
            Self {
                contexts,
                state,
                thread_ids: IdIssuer::new(),
                events,
            },
            stream,
        ))
    }

    /// Start running `code` for `object_id`, superseding any active thread.
    ///
    /// The thread is dispatched to the least-loaded context and a
    /// provisional [`ThreadInfo`] is recorded immediately; the interpreter
    /// starts asynchronously and [`VmEvent::Started`] follows once the
    /// context confirms.
    pub fn run(&self, object_id: ObjectId, code: impl Into<String>) -> ThreadInfo {
        let mut state = self.state.lock();

        if let Some(old) = state.infos.remove(&object_id) {
            state.loads[old.context] = state.loads[old.context].saturating_sub(1);
            self.contexts[old.context].stop(object_id.clone());
            self.emit(VmEvent::Stopped {
                info: old,
                reason: StopReason::Stopped,
            });
        }

        let context = least_loaded(&state.loads);
        let thread_id = ThreadId(self.thread_ids.issue());
        let info = ThreadInfo {
            object_id: object_id.clone(),
            thread_id,
            context,
        };
        state.infos.insert(object_id.clone(), info.clone());
        state.loads[context] += 1;
        trace!(%object_id, %thread_id, context, "dispatching run");
        self.contexts[context].run(object_id, thread_id, code.into());
        info
    }

    /// Stop the agent's thread. Idempotent; returns whether one existed.
    ///
    /// Removal is optimistic: the `ThreadInfo` disappears immediately and a
    /// late stop confirmation from the context is dropped as stale.
    pub fn stop(&self, object_id: &ObjectId) -> bool {
        let mut state = self.state.lock();
        let Some(info) = state.infos.remove(object_id) else {
            return false;
        };
        state.loads[info.context] = state.loads[info.context].saturating_sub(1);
        self.contexts[info.context].stop(object_id.clone());
        trace!(%object_id, thread_id = %info.thread_id, "stop requested");
        self.emit(VmEvent::Stopped {
            info,
            reason: StopReason::Stopped,
        });
        true
    }

    /// Look up the agent's active thread, if any. No side effects.
    pub fn thread_info(&self, object_id: &ObjectId) -> Option<ThreadInfo> {
        self.state.lock().infos.get(object_id).cloned()
    }

    /// Answer an earlier [`VmEvent::Api`] request.
    ///
    /// Routed to the context currently owning the agent's thread; if the
    /// thread is gone the response is stale by definition and dropped.
    pub fn send_response(&self, object_id: &ObjectId, request_id: RequestId, result: Value) {
        let Some(info) = self.thread_info(object_id) else {
            trace!(%object_id, %request_id, "dropping response for a stopped agent");
            return;
        };
        self.contexts[info.context].respond(request_id, result);
    }

    /// Per-context live-thread counts, indexed by pool position.
    pub fn loads(&self) -> Vec<usize> {
        self.state.lock().loads.clone()
    }

    fn emit(&self, event: VmEvent) {
        // The collaborator may have dropped the stream; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Greedy least-loaded scan; the first index wins ties.
fn least_loaded(loads: &[usize]) -> usize {
    let mut best = 0;
    for (index, load) in loads.iter().enumerate().skip(1) {
        if *load < loads[best] {
            best = index;
        }
    }
    best
}

/// Forward context notifications to the collaborator, discarding messages
/// from superseded threads and keeping the agent map and load counts honest.
async fn pump(
    state: Arc<Mutex<VmState>>,
    mut upward: UnboundedReceiver<ContextEvent>,
    events: UnboundedSender<VmEvent>,
) {
    while let Some(event) = upward.recv().await {
        match event {
            ContextEvent::ThreadStarted {
                object_id,
                thread_id,
            } => {
                let info = {
                    let state = state.lock();
                    state.infos.get(&object_id).cloned()
                };
                match info {
                    Some(info) if info.thread_id == thread_id => {
                        let _ = events.send(VmEvent::Started(info));
                    }
                    _ => trace!(%object_id, %thread_id, "dropping stale start notification"),
                }
            }
            ContextEvent::ThreadStopped {
                object_id,
                thread_id,
                reason,
            } => {
                let info = {
                    let mut state = state.lock();
                    match state.infos.get(&object_id) {
                        Some(info) if info.thread_id == thread_id => {
                            let info = state.infos.remove(&object_id);
                            if let Some(info) = &info {
                                state.loads[info.context] =
                                    state.loads[info.context].saturating_sub(1);
                            }
                            info
                        }
                        _ => None,
                    }
                };
                match info {
                    Some(info) => {
                        let _ = events.send(VmEvent::Stopped { info, reason });
                    }
                    None => trace!(%object_id, %thread_id, "dropping stale stop notification"),
                }
            }
            ContextEvent::ApiRequest(request) => {
                let live = {
                    let state = state.lock();
                    state
                        .infos
                        .get(&request.object_id)
                        .is_some_and(|info| info.thread_id == request.thread_id)
                };
                if live {
                    let _ = events.send(VmEvent::Api(request));
                } else {
                    trace!(
                        object_id = %request.object_id,
                        thread_id = %request.thread_id,
                        "dropping api request from a superseded thread"
                    );
                }
            }
        }
    }
}
