//! Pause/resume coordination between the interpreter and controller threads.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::breakpoints::BreakpointStore;
use crate::error::{DebugError, DebugResult};
use crate::model::{declared_function_name, ExprRef};
use crate::state::{ExecutionContext, ExecutionState, DEFAULT_PREVIEW_LENGTH};
use crate::step::StepController;
use crate::trace::trace_debug;

/// Why the interpreter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A breakpoint matched and cleared its hit-count gate.
    Breakpoint,
    /// A step command was satisfied.
    Step,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Breakpoint => f.write_str("Breakpoint hit"),
            StopReason::Step => f.write_str("Step"),
        }
    }
}

/// How a pause slot was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// A resume or step command released the pause.
    Resumed,
    /// The pause was abandoned; the interpreter unwinds with an error.
    Interrupted,
}

/// One-shot release signal for a single pause.
#[derive(Debug, Default)]
pub struct PauseSlot {
    release: Mutex<Option<Release>>,
    cvar: Condvar,
}

impl PauseSlot {
    /// Create an unreleased slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the waiting thread. Only the first release counts.
    pub fn release(&self, release: Release) -> bool {
        let mut slot = self.release.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(release);
        self.cvar.notify_all();
        true
    }

    /// Block until released. Returns immediately if already released.
    pub fn wait(&self) -> Release {
        let mut slot = self.release.lock();
        loop {
            if let Some(release) = *slot {
                return release;
            }
            self.cvar.wait(&mut slot);
        }
    }

    /// Whether [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.lock().is_some()
    }
}

/// What the coordinator needs from its owner.
pub trait PauseHost {
    /// Breakpoints consulted on every entry.
    fn breakpoints(&self) -> &BreakpointStore;

    /// Step state consulted on every entry and exit.
    fn step_controller(&self) -> &StepController;

    /// Called on the interpreter thread after the pause is installed.
    fn notify_paused(&self, expression: &ExprRef, reason: StopReason, state: Arc<ExecutionState>);

    /// Called on the interpreter thread once a resume command released the
    /// pause, after every `notify_paused` delivery has returned.
    fn notify_resumed(&self);
}

/// The outstanding pause and the snapshot taken for it.
#[derive(Debug)]
struct Pause {
    slot: Arc<PauseSlot>,
    state: Arc<ExecutionState>,
}

/// Entry/exit hook logic and the session's single pause slot.
#[derive(Debug)]
pub struct PauseCoordinator {
    current: Mutex<Option<Pause>>,
    context: Mutex<ExecutionContext>,
    last_expression: Mutex<Option<ExprRef>>,
    preview_length: usize,
}

impl Default for PauseCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_LENGTH)
    }
}

impl PauseCoordinator {
    /// Coordinator whose snapshots truncate previews to `preview_length`.
    #[must_use]
    pub fn new(preview_length: usize) -> Self {
        Self {
            current: Mutex::new(None),
            context: Mutex::new(ExecutionContext::default()),
            last_expression: Mutex::new(None),
            preview_length,
        }
    }

    /// Store the interpreter context a snapshot would be built from.
    pub fn capture_context(&self, context: ExecutionContext) {
        *self.context.lock() = context;
    }

    /// Hook invoked before a function-expression is evaluated.
    ///
    /// All three pause conditions are evaluated so that hit counts and
    /// one-shot step modes are updated even when another condition fires.
    pub fn on_entry(
        &self,
        host: &dyn PauseHost,
        expression: &ExprRef,
        _parent: Option<&ExprRef>,
        depth: usize,
    ) -> DebugResult<()> {
        let function_name = declared_function_name(expression.as_ref());
        let breakpoint = host
            .breakpoints()
            .should_break(expression.source_info(), function_name);
        let step_entry = host.step_controller().decide_at_entry(expression);
        let step_depth = host.step_controller().decide_at_depth(depth);

        let reason = if breakpoint {
            StopReason::Breakpoint
        } else if step_entry || step_depth {
            StopReason::Step
        } else {
            return Ok(());
        };
        self.pause(host, expression, reason, depth)
    }

    /// Hook invoked after a function-expression is evaluated.
    pub fn on_exit(&self, host: &dyn PauseHost, expression: &ExprRef) {
        host.step_controller().notify_finished(expression);
    }

    /// Suspend the calling thread until [`resume`](Self::resume) or
    /// [`interrupt`](Self::interrupt) releases it.
    ///
    /// The snapshot is published together with the slot, so a controller
    /// that sees the pause also sees its state.
    pub fn pause(
        &self,
        host: &dyn PauseHost,
        expression: &ExprRef,
        reason: StopReason,
        depth: usize,
    ) -> DebugResult<()> {
        let state = Arc::new(
            ExecutionState::new(Some(expression.clone()), self.context.lock().clone(), depth)
                .with_preview_length(self.preview_length),
        );

        *self.last_expression.lock() = Some(expression.clone());
        let slot = Arc::new(PauseSlot::new());
        let previous = self.current.lock().replace(Pause {
            slot: slot.clone(),
            state: state.clone(),
        });
        if previous.is_some() {
            tracing::warn!("pause slot replaced while another pause was outstanding");
        }
        tracing::debug!(%reason, expression = %expression, depth, "paused");

        host.notify_paused(expression, reason, state);

        let release = slot.wait();
        {
            let mut current = self.current.lock();
            if current
                .as_ref()
                .is_some_and(|pause| Arc::ptr_eq(&pause.slot, &slot))
            {
                *current = None;
            }
        }
        trace_debug(|| format!("pause released with {release:?}"));
        match release {
            Release::Resumed => {
                host.notify_resumed();
                Ok(())
            }
            Release::Interrupted => Err(DebugError::Interrupted),
        }
    }

    /// Release the outstanding pause, if any.
    ///
    /// Returns `false` without error when nothing is paused.
    pub fn resume(&self) -> bool {
        self.release_with(Release::Resumed, |_| {})
    }

    /// Abandon the outstanding pause; the paused hook returns
    /// [`DebugError::Interrupted`].
    pub fn interrupt(&self) -> bool {
        self.release_with(Release::Interrupted, |_| {})
    }

    /// Detach the outstanding pause, run `prepare` against its snapshot and
    /// then release it.
    ///
    /// Only one caller can detach a given pause. Losers return `false`
    /// without running `prepare`.
    pub fn release_with(&self, release: Release, prepare: impl FnOnce(&ExecutionState)) -> bool {
        let Some(pause) = self.current.lock().take() else {
            trace_debug(|| format!("{release:?} ignored: not paused"));
            return false;
        };
        prepare(&pause.state);
        pause.slot.release(release)
    }

    /// Whether a pause is outstanding.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Snapshot of the outstanding pause.
    #[must_use]
    pub fn current_state(&self) -> Option<Arc<ExecutionState>> {
        self.current
            .lock()
            .as_ref()
            .map(|pause| pause.state.clone())
    }

    /// Expression of the most recent pause.
    #[must_use]
    pub fn current_expression(&self) -> Option<ExprRef> {
        self.last_expression.lock().clone()
    }
}
