//! Message vocabulary exchanged between the orchestrator and its execution
//! contexts.
//!
//! The two directions are deliberately asymmetric: downward commands address
//! agents (`object_id`), while upward notifications always carry both the
//! `object_id` and the `thread_id` so the orchestrator can discard messages
//! from a thread that has since been superseded.

use crate::script::{HostApi, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of the in-world agent a script controls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an agent identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of one script thread, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Correlation identifier of one in-flight host API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Why a thread stopped. Delivered with every `ThreadStopped` notification;
/// each thread stops exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The script ran to its natural end.
    Completed,
    /// An explicit stop, or the thread was superseded by a new run for the
    /// same agent.
    Stopped,
    /// Parse failure or uncaught script error.
    Failed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Downward message: orchestrator → execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContextCommand {
    /// Start a thread for `object_id` running `code`.
    Run {
        /// Agent the thread controls.
        object_id: ObjectId,
        /// Thread identifier issued by the orchestrator.
        thread_id: ThreadId,
        /// Compiled script text.
        code: String,
    },
    /// Stop the agent's thread, if any.
    Stop {
        /// Agent whose thread should stop.
        object_id: ObjectId,
    },
    /// Deliver the game world's answer to an earlier `ApiRequest`.
    Respond {
        /// Correlates with the `ApiRequest` that asked.
        request_id: RequestId,
        /// Result fed to the suspended interpreter.
        result: Value,
    },
}

/// Upward message: execution context → orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContextEvent {
    /// A thread's interpreter was loaded and entered the step loop.
    ThreadStarted {
        /// Agent the thread controls.
        object_id: ObjectId,
        /// Thread that started.
        thread_id: ThreadId,
    },
    /// A thread terminated; emitted exactly once per thread.
    ThreadStopped {
        /// Agent the thread controlled.
        object_id: ObjectId,
        /// Thread that stopped.
        thread_id: ThreadId,
        /// Why it stopped.
        reason: StopReason,
    },
    /// A thread called a host API and is now suspended.
    ApiRequest(ApiRequest),
}

/// A suspended host call awaiting an answer from the game world.
///
/// The collaborator consuming the orchestrator's event stream must answer
/// each request exactly once via `VirtualMachine::send_response`, unless the
/// thread is stopped first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Index of the execution context hosting the thread.
    pub context: usize,
    /// Agent on whose behalf the call was made.
    pub object_id: ObjectId,
    /// Thread that suspended.
    pub thread_id: ThreadId,
    /// Correlation identifier for the eventual response.
    pub request_id: RequestId,
    /// Which host operation was invoked.
    pub api: HostApi,
    /// Shaped call parameters.
    pub params: Value,
}
