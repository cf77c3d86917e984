#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use parking_lot::Mutex;
use pure_debug::harness::{CallNode, CallTree};
use pure_debug::{
    function_display_name, DebugEventListener, DebugSession, ExecutionState, ExprRef, StopReason,
};

/// main (a.src 1-20)
///   helper (a.src 3-6)
///     plus (a.src 4)
///   log (a.src 8)
pub fn program() -> CallTree {
    CallTree::new(
        CallNode::new("main")
            .at("a.src", 1, 1, 20)
            .local("count", 1)
            .child(
                CallNode::new("helper")
                    .at("a.src", 3, 3, 6)
                    .local("value", 41)
                    .child(CallNode::new("plus").at("a.src", 4, 4, 4)),
            )
            .child(CallNode::new("log").at("a.src", 8, 8, 8).local("message", "done")),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Continue,
    Into,
    Over,
    Out,
}

impl Command {
    pub fn apply(self, session: &DebugSession) {
        let result = match self {
            Command::Continue => session.continue_execution(),
            Command::Into => session.step_into(),
            Command::Over => session.step_over(),
            Command::Out => session.step_out(),
        };
        result.unwrap();
    }
}

pub fn describe(expression: &ExprRef, reason: StopReason, state: &ExecutionState) -> String {
    format!(
        "{reason}: {} depth={}",
        function_display_name(expression.as_ref()),
        state.call_stack_depth()
    )
}

/// Applies queued commands from inside `on_paused`; continues once the
/// queue is drained.
#[derive(Default)]
pub struct ScriptedListener {
    commands: Mutex<VecDeque<Command>>,
    pub pauses: Mutex<Vec<String>>,
    pub events: Mutex<Vec<String>>,
}

impl ScriptedListener {
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(commands.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn continuing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pauses(&self) -> Vec<String> {
        self.pauses.lock().clone()
    }
}

impl DebugEventListener for ScriptedListener {
    fn on_execution_started(&self, _: &DebugSession, function: &ExprRef) {
        self.events.lock().push(format!("started {function}"));
    }

    fn on_execution_ended(&self, _: &DebugSession, function: &ExprRef) {
        self.events.lock().push(format!("ended {function}"));
    }

    fn on_paused(
        &self,
        session: &DebugSession,
        expression: &ExprRef,
        reason: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        self.pauses.lock().push(describe(expression, reason, state));
        let command = self.commands.lock().pop_front().unwrap_or(Command::Continue);
        command.apply(session);
    }

    fn on_resumed(&self, _: &DebugSession) {
        self.events.lock().push("resumed".to_string());
    }
}

/// Forwards pause descriptions to a controller thread and leaves the
/// interpreter parked.
pub struct ChannelListener {
    tx: Mutex<Sender<String>>,
}

impl ChannelListener {
    pub fn new(tx: Sender<String>) -> Arc<Self> {
        Arc::new(Self { tx: Mutex::new(tx) })
    }
}

impl DebugEventListener for ChannelListener {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {
        let _ = self.tx.lock().send("ended".to_string());
    }

    fn on_paused(
        &self,
        _: &DebugSession,
        expression: &ExprRef,
        reason: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        let _ = self.tx.lock().send(describe(expression, reason, state));
    }
}
