//! Debug event listeners.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::breakpoints::BreakpointId;
use crate::config::ListenerFailurePolicy;
use crate::coordinator::StopReason;
use crate::model::ExprRef;
use crate::session::DebugSession;
use crate::state::ExecutionState;

/// Receives debug events.
///
/// Execution and pause callbacks run synchronously on the interpreter
/// thread; breakpoint callbacks run on the thread that changed the store.
/// `on_paused` may resume the session directly through the `session` handle.
pub trait DebugEventListener: Send + Sync {
    /// A top-level execution started.
    fn on_execution_started(&self, session: &DebugSession, function: &ExprRef);

    /// The top-level execution finished.
    fn on_execution_ended(&self, session: &DebugSession, function: &ExprRef);

    /// The interpreter paused; it stays parked until a command releases it.
    fn on_paused(
        &self,
        session: &DebugSession,
        expression: &ExprRef,
        reason: StopReason,
        state: &Arc<ExecutionState>,
    );

    /// A resume or step command released the pause. Runs on the interpreter thread.
    fn on_resumed(&self, _session: &DebugSession) {}

    /// The interpreter reported an error.
    fn on_error(
        &self,
        _session: &DebugSession,
        _message: &str,
        _state: Option<&Arc<ExecutionState>>,
    ) {
    }

    /// A breakpoint was added through the session.
    fn on_breakpoint_added(&self, _session: &DebugSession, _id: &BreakpointId) {}

    /// A breakpoint was removed through the session.
    fn on_breakpoint_removed(&self, _session: &DebugSession, _id: &BreakpointId) {}
}

/// Shared listener handle.
pub type ListenerRef = Arc<dyn DebugEventListener>;

/// Copy-on-write listener list.
///
/// Delivery iterates a snapshot, so listeners may register or remove
/// listeners (including themselves) from inside a callback.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Arc<Vec<ListenerRef>>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: ListenerRef) {
        let mut listeners = self.listeners.write();
        let mut next = Vec::clone(&listeners);
        next.push(listener);
        *listeners = Arc::new(next);
    }

    /// Remove the first registration of `listener`.
    pub(crate) fn remove(&self, listener: &ListenerRef) -> bool {
        let mut listeners = self.listeners.write();
        let Some(position) = listeners
            .iter()
            .position(|current| Arc::ptr_eq(current, listener))
        else {
            return false;
        };
        let mut next = Vec::clone(&listeners);
        next.remove(position);
        *listeners = Arc::new(next);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener in registration order.
    pub(crate) fn dispatch(
        &self,
        event: &'static str,
        policy: ListenerFailurePolicy,
        mut deliver: impl FnMut(&dyn DebugEventListener),
    ) {
        let snapshot = self.listeners.read().clone();
        for (index, listener) in snapshot.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref())));
            if let Err(payload) = outcome {
                tracing::warn!(
                    event,
                    listener = index,
                    panic = panic_message(payload.as_ref()),
                    "debug listener panicked"
                );
                if policy == ListenerFailurePolicy::Abort {
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
