mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{describe, program, ChannelListener, Command, ScriptedListener};
use expect_test::expect;
use parking_lot::Mutex;
use pure_debug::harness::{CallNode, CallTree, TestValue, TreeWalker};
use pure_debug::{
    BreakpointId, DebugConfig, DebugEventListener, DebugSession, ExecutionState, ExprRef,
    ListenerFailurePolicy, ListenerRef, StepMode, StopReason, VariableInfo,
};

/// Keeps every snapshot and continues.
#[derive(Default)]
struct Capture {
    states: Mutex<Vec<Arc<ExecutionState>>>,
}

impl DebugEventListener for Capture {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        session: &DebugSession,
        _: &ExprRef,
        _: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        self.states.lock().push(state.clone());
        session.continue_execution().unwrap();
    }
}

fn capture(session: &DebugSession, tree: &CallTree) -> Vec<Arc<ExecutionState>> {
    let listener = Arc::new(Capture::default());
    session.add_listener(listener.clone());
    TreeWalker::new(tree).run(session).unwrap();
    let states = listener.states.lock().clone();
    states
}

#[test]
fn renders_call_stack_and_variables() {
    let session = DebugSession::new();
    session.add_function_breakpoint("plus", false);
    session.add_function_breakpoint("log", false);
    let states = capture(&session, &program());
    assert_eq!(states.len(), 2);

    expect![[r#"
        #0 plus at a.src:4
        #1 helper at a.src:3
        #2 main at a.src:1"#]]
    .assert_eq(&states[0].format_call_stack());
    expect![[r#"
        value: Integer = 41
        count: Integer = 1"#]]
    .assert_eq(&states[0].format_variables());

    expect![[r#"
        #0 log at a.src:8
        #1 main at a.src:1"#]]
    .assert_eq(&states[1].format_call_stack());
    expect![[r#"
        message: String = 'done'
        count: Integer = 1"#]]
    .assert_eq(&states[1].format_variables());
}

#[test]
fn variables_mark_locals_and_keep_shadowed_names() {
    let tree = CallTree::new(
        CallNode::new("outer")
            .local("x", 1)
            .child(CallNode::new("inner").local("x", 2).local("y", true)),
    );
    let session = DebugSession::new();
    session.add_function_breakpoint("inner", false);
    let states = capture(&session, &tree);
    let state = &states[0];

    let rendered: Vec<_> = state
        .variables()
        .iter()
        .map(|info| format!("{info} local={}", info.is_local))
        .collect();
    assert_eq!(
        rendered,
        vec![
            "x: Integer = 2 local=true",
            "y: Boolean = true local=true",
            "x: Integer = 1 local=false",
        ]
    );
    assert_eq!(
        state.variable("x").map(|info| info.to_string()),
        Some("x: Integer = 2".into())
    );
    assert_eq!(state.variables_in_frame(1).len(), 3);
    assert!(std::ptr::eq(state.variables(), state.variables_in_frame(0)));
}

/// Records snapshots without resuming.
#[derive(Default)]
struct Observer {
    states: Mutex<Vec<Arc<ExecutionState>>>,
}

impl DebugEventListener for Observer {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        _: &DebugSession,
        _: &ExprRef,
        _: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        self.states.lock().push(state.clone());
    }
}

#[test]
fn unnamed_frames_without_source() {
    let tree = CallTree::new(
        CallNode::new("main").at("a.src", 1, 1, 5).child(CallNode {
            lambda: Some("lambda$0".to_string()),
            children: vec![CallNode::default()],
            ..CallNode::default()
        }),
    );
    let session = DebugSession::new();
    let observer = Arc::new(Observer::default());
    session.add_listener(observer.clone());
    let scripted = ScriptedListener::new([Command::Into, Command::Into]);
    session.add_listener(scripted.clone());
    session.step_controller().set_mode(StepMode::Into);

    TreeWalker::new(&tree).run(&session).unwrap();

    assert_eq!(
        scripted.pauses(),
        vec![
            "Step: main depth=1",
            "Step: lambda$0 depth=2",
            "Step: <anonymous> depth=3",
        ]
    );
    let states = observer.states.lock();
    expect![[r#"
        #0 <anonymous> (unknown location)
        #1 lambda$0 (unknown location)
        #2 main at a.src:1"#]]
    .assert_eq(&states[2].format_call_stack());
    assert_eq!(states[2].format_variables(), "");
}

#[test]
fn type_parameters_are_captured() {
    let tree = CallTree::new(
        CallNode::new("main")
            .type_argument("T", "Integer")
            .child(CallNode::new("map").type_argument("U", "String")),
    );
    let session = DebugSession::new();
    session.add_function_breakpoint("map", false);
    let states = capture(&session, &tree);

    let scopes = states[0].type_parameters();
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0].get("T").map(|value| value.print()), Some("Integer".into()));
    assert_eq!(scopes[1].get("U").map(|value| value.print()), Some("String".into()));
}

#[test]
fn preview_is_exactly_the_budget_when_truncated() {
    for length in 1..40 {
        let text: String = "x".repeat(length);
        let info = VariableInfo::new("s", Some(TestValue::string(text.clone())), true);
        let printed = format!("'{text}'");
        for max in 3..printed.len() {
            let preview = info.preview(max);
            assert_eq!(preview.chars().count(), max, "length={length} max={max}");
            assert!(preview.ends_with("..."), "length={length} max={max}");
        }
        assert_eq!(info.preview(printed.len()), printed);
    }
}

#[test]
fn configured_preview_length_applies_to_snapshots() {
    let config = DebugConfig::from_toml_str("[debug]\npreview_length = 10\n").unwrap();
    let session = DebugSession::with_config(config);
    session.add_function_breakpoint("main", false);
    let tree = CallTree::new(CallNode::new("main").local("text", "abcdefghijklmnop"));
    let states = capture(&session, &tree);
    assert_eq!(states[0].format_variables(), "text: String = 'abcdef...");
}

/// Panics on every pause.
struct Faulty;

impl DebugEventListener for Faulty {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        _: &DebugSession,
        _: &ExprRef,
        _: StopReason,
        _: &Arc<ExecutionState>,
    ) {
        panic!("listener failure");
    }
}

#[test]
fn panicking_listener_does_not_block_later_listeners() {
    let session = DebugSession::new();
    session.add_listener(Arc::new(Faulty));
    let listener = ScriptedListener::continuing();
    session.add_listener(listener.clone());
    session.add_function_breakpoint("helper", false);

    let (tx, rx) = channel();
    let hook = session.clone();
    let handle = thread::spawn(move || {
        tx.send(TreeWalker::new(&program()).run(&hook)).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Ok(4));
    handle.join().unwrap();
    assert_eq!(listener.pauses(), vec!["Breakpoint hit: helper depth=2"]);
}

#[test]
fn abort_policy_stops_delivery_and_stays_paused() {
    let config = DebugConfig {
        listener_failure: ListenerFailurePolicy::Abort,
        ..DebugConfig::default()
    };
    let session = DebugSession::with_config(config);
    session.add_listener(Arc::new(Faulty));
    let listener = ScriptedListener::continuing();
    session.add_listener(listener.clone());
    session.add_function_breakpoint("helper", false);

    let (done_tx, done) = channel();
    let hook = session.clone();
    let handle = thread::spawn(move || {
        done_tx.send(TreeWalker::new(&program()).run(&hook)).unwrap();
    });

    assert!(done.recv_timeout(Duration::from_millis(200)).is_err());
    assert!(session.is_paused());
    assert!(listener.pauses().is_empty());

    session.continue_execution().unwrap();
    assert_eq!(done.recv_timeout(Duration::from_secs(2)).unwrap(), Ok(4));
    handle.join().unwrap();
}

/// Removes itself and registers a replacement on its first pause.
struct Handover {
    me: Mutex<Option<ListenerRef>>,
    replacement: ListenerRef,
    pauses: AtomicUsize,
}

impl DebugEventListener for Handover {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        session: &DebugSession,
        _: &ExprRef,
        _: StopReason,
        _: &Arc<ExecutionState>,
    ) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        if let Some(me) = self.me.lock().take() {
            assert!(session.remove_listener(&me));
            session.add_listener(self.replacement.clone());
        }
        session.continue_execution().unwrap();
    }
}

#[test]
fn listeners_may_change_registrations_during_delivery() {
    let session = DebugSession::new();
    let replacement = ScriptedListener::continuing();
    let handover = Arc::new(Handover {
        me: Mutex::new(None),
        replacement: replacement.clone(),
        pauses: AtomicUsize::new(0),
    });
    let handover_ref: ListenerRef = handover.clone();
    *handover.me.lock() = Some(handover_ref.clone());
    session.add_listener(handover_ref);
    session.add_function_breakpoint("main", false);
    session.add_function_breakpoint("log", false);

    TreeWalker::new(&program()).run(&session).unwrap();

    assert_eq!(handover.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(replacement.pauses(), vec!["Breakpoint hit: log depth=2"]);
    assert_eq!(session.listener_count(), 1);
}

/// Counts lifecycle callbacks.
#[derive(Default)]
struct Counter {
    started: AtomicUsize,
    errors: Mutex<Vec<String>>,
    added: Mutex<Vec<BreakpointId>>,
    removed: Mutex<Vec<BreakpointId>>,
}

impl DebugEventListener for Counter {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        _: &DebugSession,
        _: &ExprRef,
        _: StopReason,
        _: &Arc<ExecutionState>,
    ) {}

    fn on_error(&self, _: &DebugSession, message: &str, state: Option<&Arc<ExecutionState>>) {
        self.errors
            .lock()
            .push(format!("{message} with_state={}", state.is_some()));
    }

    fn on_breakpoint_added(&self, _: &DebugSession, id: &BreakpointId) {
        self.added.lock().push(id.clone());
    }

    fn on_breakpoint_removed(&self, _: &DebugSession, id: &BreakpointId) {
        self.removed.lock().push(id.clone());
    }
}

#[test]
fn duplicate_registrations_receive_each_event() {
    let session = DebugSession::new();
    let counter = Arc::new(Counter::default());
    let counter_ref: ListenerRef = counter.clone();
    session.add_listener(counter_ref.clone());
    session.add_listener(counter_ref.clone());

    TreeWalker::new(&program()).run(&session).unwrap();
    assert_eq!(counter.started.load(Ordering::SeqCst), 2);

    assert!(session.remove_listener(&counter_ref));
    TreeWalker::new(&program()).run(&session).unwrap();
    assert_eq!(counter.started.load(Ordering::SeqCst), 3);
}

#[test]
fn breakpoint_and_error_events_reach_listeners() {
    let session = DebugSession::new();
    let counter = Arc::new(Counter::default());
    session.add_listener(counter.clone());

    let line = session.add_line_breakpoint("a.src", 3);
    let function = session.add_function_breakpoint("plus", true);
    assert!(session.remove_breakpoint(&line));
    assert!(!session.remove_breakpoint(&line));
    session.notify_error("division by zero", None);

    assert_eq!(*counter.added.lock(), vec![line.clone(), function]);
    assert_eq!(*counter.removed.lock(), vec![line]);
    assert_eq!(
        *counter.errors.lock(),
        vec!["division by zero with_state=false".to_string()]
    );
}

#[test]
fn resume_events_follow_each_command() {
    let session = DebugSession::new();
    let (events_tx, events) = channel();
    session.add_listener(ChannelListener::new(events_tx));
    let scripted = ScriptedListener::continuing();
    session.add_listener(scripted.clone());
    session.add_function_breakpoint("helper", false);

    TreeWalker::new(&program()).run(&session).unwrap();

    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        "Breakpoint hit: helper depth=2"
    );
    assert_eq!(
        *scripted.events.lock(),
        vec![
            "started main(...)".to_string(),
            "resumed".to_string(),
            "ended main(...)".to_string(),
        ]
    );
}

/// Records pause and resume callbacks with the thread they ran on.
#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<(String, thread::ThreadId)>>,
}

impl Journal {
    fn record(&self, entry: String) {
        self.entries.lock().push((entry, thread::current().id()));
    }

    fn events(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    fn all_on(&self, thread: thread::ThreadId) -> bool {
        self.entries.lock().iter().all(|(_, id)| *id == thread)
    }
}

impl DebugEventListener for Journal {
    fn on_execution_started(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {}

    fn on_paused(
        &self,
        _: &DebugSession,
        expression: &ExprRef,
        reason: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        self.record(format!("paused {}", describe(expression, reason, state)));
    }

    fn on_resumed(&self, _: &DebugSession) {
        self.record("resumed".to_string());
    }
}

#[test]
fn later_listeners_see_pause_before_inline_resume() {
    let session = DebugSession::new();
    session.add_listener(ScriptedListener::continuing());
    let journal = Arc::new(Journal::default());
    session.add_listener(journal.clone());
    session.add_function_breakpoint("helper", false);
    session.add_function_breakpoint("log", false);

    let hook = session.clone();
    let handle = thread::spawn(move || {
        let result = TreeWalker::new(&program()).run(&hook);
        (result, thread::current().id())
    });
    let (result, interpreter) = handle.join().unwrap();

    assert_eq!(result, Ok(4));
    assert_eq!(
        journal.events(),
        vec![
            "paused Breakpoint hit: helper depth=2",
            "resumed",
            "paused Breakpoint hit: log depth=2",
            "resumed",
        ]
    );
    assert!(journal.all_on(interpreter));
}

#[test]
fn controller_resume_is_reported_on_interpreter_thread() {
    let session = DebugSession::new();
    let (events_tx, events) = channel();
    session.add_listener(ChannelListener::new(events_tx));
    let journal = Arc::new(Journal::default());
    session.add_listener(journal.clone());
    session.add_function_breakpoint("helper", false);

    let hook = session.clone();
    let handle = thread::spawn(move || {
        let result = TreeWalker::new(&program()).run(&hook);
        (result, thread::current().id())
    });
    assert_eq!(
        events.recv_timeout(Duration::from_secs(2)).unwrap(),
        "Breakpoint hit: helper depth=2"
    );
    session.continue_execution().unwrap();
    let (result, interpreter) = handle.join().unwrap();

    assert_eq!(result, Ok(4));
    assert_eq!(
        journal.events(),
        vec!["paused Breakpoint hit: helper depth=2", "resumed"]
    );
    assert!(journal.all_on(interpreter));
    assert_ne!(interpreter, thread::current().id());
}
