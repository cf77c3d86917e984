//! Step-mode state machine.

use parking_lot::Mutex;

use crate::model::ExprRef;
use crate::trace::trace_debug;

/// Stepping behavior while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    /// Only breakpoints pause execution.
    #[default]
    Continue,
    /// Pause at the very next evaluated expression.
    Into,
    /// Pause once the call depth returns to the recorded depth or above it.
    Over,
    /// Pause once the call depth drops below the recorded depth.
    Out,
}

#[derive(Debug, Default)]
struct StepState {
    mode: StepMode,
    recorded_depth: usize,
    last_finished: Option<ExprRef>,
}

/// Decides whether stepping should pause execution.
///
/// `Into`, `Over` and `Out` are one-shot: the mode reverts to `Continue`
/// as soon as the controller reports a pause.
#[derive(Debug, Default)]
pub struct StepController {
    state: Mutex<StepState>,
}

impl StepController {
    /// Controller in `Continue` mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending step mode.
    pub fn set_mode(&self, mode: StepMode) {
        self.state.lock().mode = mode;
    }

    /// Pending step mode.
    #[must_use]
    pub fn mode(&self) -> StepMode {
        self.state.lock().mode
    }

    /// Record the call depth a step command was issued at.
    pub fn record_depth(&self, depth: usize) {
        self.state.lock().recorded_depth = depth;
    }

    /// Depth recorded by the last step command.
    #[must_use]
    pub fn recorded_depth(&self) -> usize {
        self.state.lock().recorded_depth
    }

    /// Entry-time decision. Only `Into` pauses here.
    pub fn decide_at_entry(&self, _expression: &ExprRef) -> bool {
        let mut state = self.state.lock();
        if state.mode == StepMode::Into {
            state.mode = StepMode::Continue;
            trace_debug(|| "step into satisfied".to_string());
            return true;
        }
        false
    }

    /// Depth-based decision for `Over` and `Out`.
    pub fn decide_at_depth(&self, current_depth: usize) -> bool {
        let mut state = self.state.lock();
        let should_pause = match state.mode {
            StepMode::Over => current_depth <= state.recorded_depth,
            StepMode::Out => current_depth < state.recorded_depth,
            StepMode::Continue | StepMode::Into => false,
        };
        if should_pause {
            trace_debug(|| {
                format!(
                    "step {:?} satisfied depth={current_depth} recorded={}",
                    state.mode, state.recorded_depth
                )
            });
            state.mode = StepMode::Continue;
        }
        should_pause
    }

    /// Bookkeeping after an expression finished evaluating.
    pub fn notify_finished(&self, expression: &ExprRef) {
        self.state.lock().last_finished = Some(expression.clone());
    }

    /// Most recently finished expression.
    #[must_use]
    pub fn last_finished(&self) -> Option<ExprRef> {
        self.state.lock().last_finished.clone()
    }

    /// Return to `Continue` and forget the recorded depth.
    pub fn reset(&self) {
        *self.state.lock() = StepState::default();
    }
}
