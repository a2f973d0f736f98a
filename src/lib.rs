//! Marionette – A scripting runtime for driving in-world game agents
//!
//! This crate runs small behavior scripts on behalf of game objects:
//! - A pool of execution contexts, each stepping its threads on a fixed tick
//! - One thread per agent; a new run for the same agent supersedes the old
//! - Cooperative interpreters that suspend on host API calls (move, jump,
//!   use, world queries) and resume when the game answers
//! - A typed event stream (started / stopped / api request) with request
//!   correlation, so the game side stays a plain message consumer
//!
//! The entry point is [`VirtualMachine`]; scripts are parsed and stepped by
//! the [`script`] module.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod script;
pub mod vm;

// Re-export key types for convenience
pub use script::{HostApi, ScriptError, Value};
pub use vm::{
    ApiRequest, Events, ObjectId, RequestId, StopReason, ThreadId, ThreadInfo, VirtualMachine,
    VmConfig, VmError, VmEvent,
};

/// Current version of the Marionette runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
