//! Per-context thread bookkeeping and the cooperative step loop.
//!
//! The manager is the single writer of its context's thread maps. Threads
//! advance only from `on_tick`, one at a time in spawn order, so two scripts
//! sharing a context can never observe each other mid-statement.

use super::issuer::IdIssuer;
use super::protocol::{ApiRequest, ContextEvent, ObjectId, RequestId, StopReason, ThreadId};
use crate::script::{Interpreter, StepEvent, parse_script};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

/// Thread lifecycle, after spawning succeeds.
enum ThreadState {
    /// Eligible for stepping on the next tick.
    Running,
    /// Parked on a host call until its response arrives.
    Suspended,
}

struct Thread {
    thread_id: ThreadId,
    interpreter: Interpreter,
    state: ThreadState,
    /// Request IDs this thread is awaiting; cleared wholesale on destroy.
    pending: HashSet<RequestId>,
}

enum TickOutcome {
    Keep,
    Destroy(StopReason),
}

/// Owns the set of active threads inside one execution context.
pub struct ThreadManager {
    context: usize,
    steps_per_tick: usize,
    /// Deterministic stepping order (spawn order).
    order: Vec<ObjectId>,
    threads: HashMap<ObjectId, Thread>,
    /// Request ID → owning agent, for response correlation.
    pending: HashMap<RequestId, ObjectId>,
    /// Shared by every context, so a request ID identifies one request
    /// process-wide. A response routed to the wrong context after a
    /// supersede can then never match a different thread's request.
    request_ids: Arc<IdIssuer>,
    events: UnboundedSender<ContextEvent>,
}

impl ThreadManager {
    /// Create a manager for context `context` reporting on `events`.
    pub fn new(
        context: usize,
        steps_per_tick: usize,
        request_ids: Arc<IdIssuer>,
        events: UnboundedSender<ContextEvent>,
    ) -> Self {
        Self {
            context,
            steps_per_tick: steps_per_tick.max(1),
            order: Vec::new(),
            threads: HashMap::new(),
            pending: HashMap::new(),
            request_ids,
            events,
        }
    }

    /// Number of live threads; the orchestrator's load metric mirrors this.
    pub fn live_count(&self) -> usize {
        self.threads.len()
    }

    /// Start a thread for `object_id`, superseding any existing one.
    ///
    /// A parse failure terminates the thread immediately: a single
    /// `ThreadStopped { reason: Failed }` is reported and no start
    /// notification is sent.
    pub fn spawn(&mut self, object_id: ObjectId, thread_id: ThreadId, code: &str) {
        self.terminate(&object_id);

        let program = match parse_script(code) {
            Ok(program) => program,
            Err(err) => {
                debug!(%object_id, %thread_id, error = %err, "script failed to parse");
                self.emit(ContextEvent::ThreadStopped {
                    object_id,
                    thread_id,
                    reason: StopReason::Failed(err.to_string()),
                });
                return;
            }
        };

        trace!(%object_id, %thread_id, context = self.context, "thread started");
        self.order.push(object_id.clone());
        self.threads.insert(
            object_id.clone(),
            Thread {
                thread_id,
                interpreter: Interpreter::new(program),
                state: ThreadState::Running,
                pending: HashSet::new(),
            },
        );
        self.emit(ContextEvent::ThreadStarted {
            object_id,
            thread_id,
        });
    }

    /// Stop the agent's thread, discarding all of its pending requests.
    /// Returns whether a thread existed.
    pub fn terminate(&mut self, object_id: &ObjectId) -> bool {
        if self.threads.contains_key(object_id) {
            self.destroy(object_id, StopReason::Stopped);
            true
        } else {
            false
        }
    }

    /// Advance every running thread, in spawn order.
    pub fn on_tick(&mut self) {
        let order = self.order.clone();
        for object_id in &order {
            self.step_thread(object_id);
        }
    }

    /// Deliver a host API response. Unknown request IDs are stale (the
    /// thread was stopped or already answered) and are dropped silently.
    pub fn on_response(&mut self, request_id: RequestId, result: crate::script::Value) {
        let Some(object_id) = self.pending.remove(&request_id) else {
            trace!(%request_id, "dropping stale api response");
            return;
        };
        let Some(thread) = self.threads.get_mut(&object_id) else {
            return;
        };
        thread.pending.remove(&request_id);
        match thread.interpreter.resume(result) {
            Ok(()) => thread.state = ThreadState::Running,
            Err(err) => {
                // Unreachable under correct sequencing: a pending entry
                // implies the interpreter is suspended on this request.
                warn!(%object_id, %request_id, error = %err, "response for a thread that was not suspended");
            }
        }
    }

    fn step_thread(&mut self, object_id: &ObjectId) {
        let Some(thread) = self.threads.get_mut(object_id) else {
            return;
        };
        if matches!(thread.state, ThreadState::Suspended) {
            return;
        }

        let mut outcome = TickOutcome::Keep;
        for _ in 0..self.steps_per_tick {
            match thread.interpreter.step() {
                Ok(StepEvent::Progress) => continue,
                Ok(StepEvent::HostCall(call)) => {
                    let request_id = RequestId(self.request_ids.issue());
                    thread.state = ThreadState::Suspended;
                    thread.pending.insert(request_id);
                    self.pending.insert(request_id, object_id.clone());
                    trace!(%object_id, %request_id, api = %call.api, "host call suspended thread");
                    let _ = self.events.send(ContextEvent::ApiRequest(ApiRequest {
                        context: self.context,
                        object_id: object_id.clone(),
                        thread_id: thread.thread_id,
                        request_id,
                        api: call.api,
                        params: call.params,
                    }));
                    break;
                }
                Ok(StepEvent::Finished) => {
                    outcome = TickOutcome::Destroy(StopReason::Completed);
                    break;
                }
                Err(err) => {
                    debug!(%object_id, error = %err, "script error terminated thread");
                    outcome = TickOutcome::Destroy(StopReason::Failed(err.to_string()));
                    break;
                }
            }
        }

        if let TickOutcome::Destroy(reason) = outcome {
            self.destroy(object_id, reason);
        }
    }

    fn destroy(&mut self, object_id: &ObjectId, reason: StopReason) {
        let Some(thread) = self.threads.remove(object_id) else {
            return;
        };
        for request_id in &thread.pending {
            self.pending.remove(request_id);
        }
        self.order.retain(|id| id != object_id);
        trace!(%object_id, thread_id = %thread.thread_id, %reason, "thread stopped");
        self.emit(ContextEvent::ThreadStopped {
            object_id: object_id.clone(),
            thread_id: thread.thread_id,
            reason,
        });
    }

    fn emit(&self, event: ContextEvent) {
        // The orchestrator hanging up is not this side's problem.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{HostApi, Value};
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    fn manager() -> (ThreadManager, UnboundedReceiver<ContextEvent>) {
        let (events, rx) = unbounded_channel();
        (ThreadManager::new(0, 1, Arc::new(IdIssuer::new()), events), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ContextEvent>) -> Vec<ContextEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn requests(events: &[ContextEvent]) -> Vec<ApiRequest> {
        events
            .iter()
            .filter_map(|event| match event {
                ContextEvent::ApiRequest(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn spawn_reports_started() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "let x = 1;");
        assert_eq!(
            drain(&mut rx),
            vec![ContextEvent::ThreadStarted {
                object_id: ObjectId::new("helper"),
                thread_id: ThreadId(1),
            }]
        );
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn parse_failure_stops_without_start() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "let = ;");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ContextEvent::ThreadStopped {
                reason: StopReason::Failed(_),
                ..
            }
        ));
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn natural_completion_reports_stopped() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "let x = 1;");
        manager.on_tick(); // executes the statement
        manager.on_tick(); // observes completion
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ContextEvent::ThreadStopped {
                reason: StopReason::Completed,
                ..
            })
        ));
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn script_error_reports_failed() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "let x = 1 / 0;");
        manager.on_tick();
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ContextEvent::ThreadStopped {
                reason: StopReason::Failed(_),
                ..
            })
        ));
    }

    #[test]
    fn spawn_supersedes_existing_thread() {
        let (mut manager, mut rx) = manager();
        let helper = ObjectId::new("helper");
        manager.spawn(helper.clone(), ThreadId(1), "await jump();");
        manager.on_tick();
        let first = requests(&drain(&mut rx));
        assert_eq!(first.len(), 1);

        manager.spawn(helper.clone(), ThreadId(2), "await use();");
        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            ContextEvent::ThreadStopped {
                object_id: helper.clone(),
                thread_id: ThreadId(1),
                reason: StopReason::Stopped,
            }
        );
        assert_eq!(
            events[1],
            ContextEvent::ThreadStarted {
                object_id: helper.clone(),
                thread_id: ThreadId(2),
            }
        );
        assert_eq!(manager.live_count(), 1);

        // The superseded thread's request is gone: its response is stale and
        // must not resume anything.
        manager.on_response(first[0].request_id, Value::Null);
        manager.on_tick();
        let late = requests(&drain(&mut rx));
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].thread_id, ThreadId(2));
        assert_eq!(late[0].api, HostApi::Use);
    }

    #[test]
    fn responses_resume_exactly_the_asking_thread() {
        let (mut manager, mut rx) = manager();
        let a = ObjectId::new("a");
        let b = ObjectId::new("b");
        manager.spawn(a.clone(), ThreadId(1), "await moveTo([1, 0, 0]);");
        manager.spawn(b.clone(), ThreadId(2), "await jump();");
        manager.on_tick();

        let reqs = requests(&drain(&mut rx));
        assert_eq!(reqs.len(), 2);
        // Insertion order: both threads advanced one step on the same tick.
        assert_eq!(reqs[0].object_id, a);
        assert_eq!(reqs[0].api, HostApi::MoveTo);
        assert_eq!(reqs[1].object_id, b);
        assert_eq!(reqs[1].api, HostApi::Jump);

        // Answer only b; a must stay suspended.
        manager.on_response(reqs[1].request_id, Value::Null);
        manager.on_tick();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            ContextEvent::ThreadStopped {
                object_id: b,
                thread_id: ThreadId(2),
                reason: StopReason::Completed,
            }
        );
        assert_eq!(manager.live_count(), 1);

        // Now a completes too.
        manager.on_response(reqs[0].request_id, Value::Null);
        manager.on_tick();
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn duplicate_response_is_a_noop() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "await jump(); await jump();");
        manager.on_tick();
        let first = requests(&drain(&mut rx));
        manager.on_response(first[0].request_id, Value::Null);
        manager.on_response(first[0].request_id, Value::Null);
        manager.on_tick();
        let second = requests(&drain(&mut rx));
        assert_eq!(second.len(), 1);
        assert_ne!(second[0].request_id, first[0].request_id);
    }

    #[test]
    fn terminate_clears_pending_requests() {
        let (mut manager, mut rx) = manager();
        let helper = ObjectId::new("helper");
        manager.spawn(helper.clone(), ThreadId(1), "await moveTo([0, 0, 0]); await use();");
        manager.on_tick();
        let reqs = requests(&drain(&mut rx));
        assert_eq!(reqs.len(), 1);

        assert!(manager.terminate(&helper));
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ContextEvent::ThreadStopped {
                reason: StopReason::Stopped,
                ..
            })
        ));

        // A late response for the dead thread neither resumes nor panics.
        manager.on_response(reqs[0].request_id, Value::Null);
        manager.on_tick();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(manager.live_count(), 0);

        // Terminating again is idempotent.
        assert!(!manager.terminate(&helper));
    }

    #[test]
    fn suspended_threads_are_skipped_on_tick() {
        let (mut manager, mut rx) = manager();
        manager.spawn(ObjectId::new("helper"), ThreadId(1), "await jump(); let x = 1;");
        manager.on_tick();
        assert_eq!(requests(&drain(&mut rx)).len(), 1);

        // No response yet: further ticks must not advance the thread.
        manager.on_tick();
        manager.on_tick();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn contexts_share_one_request_id_space() {
        let issuer = Arc::new(IdIssuer::new());
        let (events_a, mut rx_a) = unbounded_channel();
        let (events_b, mut rx_b) = unbounded_channel();
        let mut a = ThreadManager::new(0, 1, Arc::clone(&issuer), events_a);
        let mut b = ThreadManager::new(1, 1, Arc::clone(&issuer), events_b);

        a.spawn(ObjectId::new("a"), ThreadId(1), "await jump();");
        b.spawn(ObjectId::new("b"), ThreadId(2), "await jump();");
        a.on_tick();
        b.on_tick();
        let first = requests(&drain(&mut rx_a));
        let second = requests(&drain(&mut rx_b));
        assert_ne!(first[0].request_id, second[0].request_id);

        // A response misrouted to the other context resumes nothing there.
        a.on_response(second[0].request_id, Value::Null);
        a.on_tick();
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(a.live_count(), 1);
    }

    #[test]
    fn step_budget_bounds_work_per_tick() {
        let (events, mut rx) = unbounded_channel();
        let mut manager = ThreadManager::new(0, 8, Arc::new(IdIssuer::new()), events);
        manager.spawn(
            ObjectId::new("helper"),
            ThreadId(1),
            "let a = 1; let b = 2; let c = 3; await jump();",
        );
        // With a budget of 8 the whole preamble and the host call fit in one
        // tick.
        manager.on_tick();
        assert_eq!(requests(&drain(&mut rx)).len(), 1);
    }
}
