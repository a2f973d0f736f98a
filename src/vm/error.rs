//! Error types for the virtual machine.
//!
//! Script-level failures never surface here: an erroring thread terminates
//! with `StopReason::Failed` on the normal stopped path, and stale protocol
//! messages are dropped without an error.

use thiserror::Error;

/// Orchestrator-level errors.
#[derive(Debug, Error)]
pub enum VmError {
    /// Invalid configuration supplied to `VirtualMachine::new`.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result alias for VM operations.
pub type Result<T> = std::result::Result<T, VmError>;
