//! Interpreter hook trait.

use crate::error::DebugResult;
use crate::model::ExprRef;
use crate::state::ExecutionContext;

/// Callbacks a tree-walking interpreter invokes around function-expressions.
///
/// `on_entry` may block the calling thread while the debugger is paused.
pub trait InterpreterHook {
    /// Called when a top-level function starts executing.
    fn on_start(&self, _function: &ExprRef) {}

    /// Called when a top-level function finished executing.
    fn on_end(&self, _function: &ExprRef) {}

    /// Called before `on_entry` with the context a pause would snapshot.
    fn capture_context(&self, _context: ExecutionContext) {}

    /// Called before an expression is evaluated.
    ///
    /// `depth` is the number of active function-expressions, including
    /// `expression` itself.
    fn on_entry(
        &self,
        expression: &ExprRef,
        parent: Option<&ExprRef>,
        depth: usize,
    ) -> DebugResult<()>;

    /// Called after an expression was evaluated.
    fn on_exit(&self, _expression: &ExprRef) {}
}

/// No-op interpreter hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl InterpreterHook for NoopHook {
    fn on_entry(&self, _: &ExprRef, _: Option<&ExprRef>, _: usize) -> DebugResult<()> {
        Ok(())
    }
}
