//! Steppable interpreter for compiled agent scripts.
//!
//! Scripts arrive as linear imperative text (the output of the block editor's
//! compile step) and are executed one statement at a time so that a thread
//! manager can interleave many agents on a single execution context. The only
//! suspension points are the four host calls exposed by [`host::HostApi`];
//! straight-line computation, branching, and loops never suspend.
//!
//! This module provides the AST, parser, value model, and the frame-stack
//! interpreter with its explicit `step`/`resume` contract.

/// Statement and expression definitions for the script language.
pub mod ast;
/// Host-callable API surface and argument validation.
pub mod host;
/// Frame-stack interpreter with explicit step/resume.
pub mod interp;
/// Lexer and recursive-descent parser for script source text.
pub mod parser;
/// Structured runtime values exchanged with the host.
pub mod value;

pub use ast::{BinaryOp, Expr, Stmt, UnaryOp};
pub use host::{HostApi, HostCall};
pub use interp::{Interpreter, StepEvent};
pub use parser::parse_script;
pub use value::Value;

use thiserror::Error;

/// Convenience result alias for script operations.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors surfaced by the parser and interpreter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    /// Parsing failed due to invalid syntax.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Evaluation failed (bad operand types, missing variable, etc.).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A call named something other than a host function.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A host function was called with the wrong arguments.
    #[error("{api} called with invalid arguments: {detail}")]
    BadArguments {
        /// Host function name.
        api: &'static str,
        /// What was wrong with the call.
        detail: String,
    },

    /// The step/resume contract was violated by the embedder.
    #[error("interpreter contract violation: {0}")]
    Contract(String),
}
