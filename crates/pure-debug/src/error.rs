//! Debugger errors.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by debug session commands and the pause coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    /// A command that requires an outstanding pause was issued while running.
    #[error("Not paused")]
    NotPaused,

    /// The interpreter thread's wait was abandoned before a resume arrived.
    #[error("debug session interrupted")]
    Interrupted,

    /// Invalid debugger configuration.
    #[error("invalid debug configuration: {0}")]
    InvalidConfig(SmolStr),
}

/// Result alias for debugger operations.
pub type DebugResult<T> = Result<T, DebugError>;
