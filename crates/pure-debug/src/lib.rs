//! `pure-debug` - interactive debugger core for a tree-walking interpreter.
//!
//! The interpreter calls an [`InterpreterHook`] around every
//! function-expression. [`DebugSession`] implements that hook: it matches
//! breakpoints and step modes, parks the interpreter thread on a pause, and
//! hands an [`ExecutionState`] snapshot to listeners and controller threads
//! until a resume command releases it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Breakpoint definitions and the breakpoint store.
pub mod breakpoints;
/// Debug session configuration.
pub mod config;
/// Pause/resume coordination.
pub mod coordinator;
/// Debugger errors.
pub mod error;
/// Call-tree interpreter used by tests and the CLI.
pub mod harness;
/// Interpreter hook trait.
pub mod hook;
/// Debug event listeners.
pub mod listener;
/// Interpreter-facing data contracts.
pub mod model;
/// Debug session façade.
pub mod session;
/// Paused execution snapshots.
pub mod state;
/// Step-mode state machine.
pub mod step;
mod trace;

pub use breakpoints::{Breakpoint, BreakpointId, BreakpointKind, BreakpointStore};
pub use config::{DebugConfig, ListenerFailurePolicy};
pub use coordinator::{PauseCoordinator, PauseHost, PauseSlot, Release, StopReason};
pub use error::{DebugError, DebugResult};
pub use hook::{InterpreterHook, NoopHook};
pub use listener::{DebugEventListener, ListenerRef};
pub use model::{
    function_display_name, DebugValue, ExprRef, FunctionExpression, FunctionValue, ScopeRef,
    SourceInfo, ValueRef, VariableScope,
};
pub use session::DebugSession;
pub use state::{
    CallStackFrame, ExecutionContext, ExecutionState, TypeParameterScope, VariableInfo,
    DEFAULT_PREVIEW_LENGTH,
};
pub use step::{StepController, StepMode};
