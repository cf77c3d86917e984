//! Debug session façade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::breakpoints::{BreakpointId, BreakpointStore};
use crate::config::DebugConfig;
use crate::coordinator::{PauseCoordinator, PauseHost, Release, StopReason};
use crate::error::{DebugError, DebugResult};
use crate::hook::InterpreterHook;
use crate::listener::{DebugEventListener, ListenerRef, ListenerRegistry};
use crate::model::ExprRef;
use crate::state::{ExecutionContext, ExecutionState};
use crate::step::{StepController, StepMode};
use crate::trace::{force_trace, trace_debug};

#[derive(Debug)]
struct SessionInner {
    breakpoints: BreakpointStore,
    steps: StepController,
    coordinator: PauseCoordinator,
    listeners: ListenerRegistry,
    active: AtomicBool,
    config: DebugConfig,
}

/// Debug session shared by the interpreter and controller threads.
///
/// Cloning yields another handle to the same session. The session is also
/// the [`InterpreterHook`] handed to the interpreter.
#[derive(Debug, Clone)]
pub struct DebugSession {
    inner: Arc<SessionInner>,
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugSession {
    /// Session with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DebugConfig::default())
    }

    /// Session using `config`.
    #[must_use]
    pub fn with_config(config: DebugConfig) -> Self {
        if config.trace {
            force_trace();
        }
        Self {
            inner: Arc::new(SessionInner {
                breakpoints: BreakpointStore::new(),
                steps: StepController::new(),
                coordinator: PauseCoordinator::new(config.preview_length),
                listeners: ListenerRegistry::default(),
                active: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Settings the session was created with.
    #[must_use]
    pub fn config(&self) -> &DebugConfig {
        &self.inner.config
    }

    /// Breakpoints consulted on every entry.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.inner.breakpoints
    }

    /// Step state shared with the pause coordinator.
    #[must_use]
    pub fn step_controller(&self) -> &StepController {
        &self.inner.steps
    }

    /// Resume until the next breakpoint or the end of execution.
    pub fn continue_execution(&self) -> DebugResult<()> {
        self.resume_with(StepMode::Continue, false)
    }

    /// Resume and pause at the very next evaluated expression.
    pub fn step_into(&self) -> DebugResult<()> {
        self.resume_with(StepMode::Into, true)
    }

    /// Resume and pause at the next expression at the current depth or shallower.
    pub fn step_over(&self) -> DebugResult<()> {
        self.resume_with(StepMode::Over, true)
    }

    /// Resume and pause once the current function has returned.
    pub fn step_out(&self) -> DebugResult<()> {
        self.resume_with(StepMode::Out, true)
    }

    /// Snapshot of the current pause.
    pub fn execution_state(&self) -> DebugResult<Arc<ExecutionState>> {
        self.inner
            .coordinator
            .current_state()
            .ok_or(DebugError::NotPaused)
    }

    /// Whether the interpreter is parked on a pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.coordinator.is_paused()
    }

    /// Whether a top-level execution has started and not yet ended.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Abandon the current pause; the interpreter sees [`DebugError::Interrupted`].
    pub fn interrupt(&self) -> bool {
        let interrupted = self.inner.coordinator.interrupt();
        if interrupted {
            tracing::debug!("pause interrupted");
        }
        interrupted
    }

    /// Return stepping to `Continue` and forget the recorded depth.
    pub fn reset(&self) {
        self.inner.steps.reset();
    }

    /// Register `listener`. Registering the same listener twice delivers every event twice.
    pub fn add_listener(&self, listener: ListenerRef) {
        self.inner.listeners.add(listener);
    }

    /// Remove the first registration of `listener`.
    pub fn remove_listener(&self, listener: &ListenerRef) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Number of registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Add a line breakpoint and notify listeners.
    pub fn add_line_breakpoint(&self, source_id: impl Into<SmolStr>, line: u32) -> BreakpointId {
        let id = self.inner.breakpoints.add_line(source_id, line);
        self.dispatch("breakpoint_added", |listener| {
            listener.on_breakpoint_added(self, &id);
        });
        id
    }

    /// Add a function breakpoint and notify listeners.
    pub fn add_function_breakpoint(
        &self,
        name: impl Into<SmolStr>,
        match_partial: bool,
    ) -> BreakpointId {
        let id = self.inner.breakpoints.add_function(name, match_partial);
        self.dispatch("breakpoint_added", |listener| {
            listener.on_breakpoint_added(self, &id);
        });
        id
    }

    /// Remove a breakpoint and notify listeners. Returns `false` if the id was unknown.
    pub fn remove_breakpoint(&self, id: &BreakpointId) -> bool {
        let removed = self.inner.breakpoints.remove(id);
        if removed {
            tracing::debug!(%id, "breakpoint removed");
            self.dispatch("breakpoint_removed", |listener| {
                listener.on_breakpoint_removed(self, id);
            });
        }
        removed
    }

    /// Mark the session active and notify listeners.
    pub fn notify_execution_started(&self, function: &ExprRef) {
        self.inner.active.store(true, Ordering::Release);
        tracing::debug!(function = %function, "execution started");
        self.dispatch("execution_started", |listener| {
            listener.on_execution_started(self, function);
        });
    }

    /// Mark the session inactive and notify listeners.
    pub fn notify_execution_ended(&self, function: &ExprRef) {
        self.inner.active.store(false, Ordering::Release);
        tracing::debug!(function = %function, "execution ended");
        self.dispatch("execution_ended", |listener| {
            listener.on_execution_ended(self, function);
        });
    }

    /// Hand the snapshot of the current pause to listeners.
    pub fn notify_paused(
        &self,
        expression: &ExprRef,
        reason: StopReason,
        state: Arc<ExecutionState>,
    ) {
        self.dispatch("paused", |listener| {
            listener.on_paused(self, expression, reason, &state);
        });
    }

    /// Report an interpreter error to listeners.
    pub fn notify_error(&self, message: &str, state: Option<&Arc<ExecutionState>>) {
        tracing::warn!(error = message, "interpreter error");
        self.dispatch("error", |listener| {
            listener.on_error(self, message, state);
        });
    }

    /// Step state is written only by the caller that detached the pause,
    /// so a losing command leaves it untouched.
    fn resume_with(&self, mode: StepMode, record_depth: bool) -> DebugResult<()> {
        let steps = &self.inner.steps;
        let released = self
            .inner
            .coordinator
            .release_with(Release::Resumed, |state| {
                if record_depth {
                    steps.record_depth(state.call_stack_depth());
                }
                steps.set_mode(mode);
            });
        if !released {
            return Err(DebugError::NotPaused);
        }
        trace_debug(|| format!("resumed with {mode:?}"));
        Ok(())
    }

    fn dispatch(&self, event: &'static str, deliver: impl FnMut(&dyn DebugEventListener)) {
        self.inner
            .listeners
            .dispatch(event, self.inner.config.listener_failure, deliver);
    }
}

impl PauseHost for DebugSession {
    fn breakpoints(&self) -> &BreakpointStore {
        &self.inner.breakpoints
    }

    fn step_controller(&self) -> &StepController {
        &self.inner.steps
    }

    fn notify_paused(&self, expression: &ExprRef, reason: StopReason, state: Arc<ExecutionState>) {
        DebugSession::notify_paused(self, expression, reason, state);
    }

    fn notify_resumed(&self) {
        self.dispatch("resumed", |listener| listener.on_resumed(self));
    }
}

impl InterpreterHook for DebugSession {
    fn on_start(&self, function: &ExprRef) {
        self.notify_execution_started(function);
    }

    fn on_end(&self, function: &ExprRef) {
        self.notify_execution_ended(function);
    }

    fn capture_context(&self, context: ExecutionContext) {
        self.inner.coordinator.capture_context(context);
    }

    fn on_entry(
        &self,
        expression: &ExprRef,
        parent: Option<&ExprRef>,
        depth: usize,
    ) -> DebugResult<()> {
        self.inner.coordinator.on_entry(self, expression, parent, depth)
    }

    fn on_exit(&self, expression: &ExprRef) {
        self.inner.coordinator.on_exit(self, expression);
    }
}
