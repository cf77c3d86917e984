//! `pure-debug run`: interpreter thread plus scripted controller.

use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use parking_lot::Mutex;
use pure_debug::harness::{CallTree, TreeWalker};
use pure_debug::{
    DebugConfig, DebugEventListener, DebugSession, ExecutionState, ExprRef, StopReason,
};
use tracing::info;

use crate::cli::RunArgs;
use crate::script::{parse_script, write_block, ScriptCommand};

enum Event {
    Paused {
        reason: StopReason,
        state: Arc<ExecutionState>,
    },
    Ended,
}

/// Forwards interpreter-side events to the controller loop.
struct Forwarder {
    tx: Mutex<Sender<Event>>,
}

impl DebugEventListener for Forwarder {
    fn on_execution_started(&self, _: &DebugSession, function: &ExprRef) {
        info!(function = %function, "execution started");
    }

    fn on_execution_ended(&self, _: &DebugSession, _: &ExprRef) {
        let _ = self.tx.lock().send(Event::Ended);
    }

    fn on_paused(
        &self,
        _: &DebugSession,
        _: &ExprRef,
        reason: StopReason,
        state: &Arc<ExecutionState>,
    ) {
        let _ = self.tx.lock().send(Event::Paused {
            reason,
            state: state.clone(),
        });
    }
}

pub fn run(args: &RunArgs) -> anyhow::Result<()> {
    let tree = CallTree::load(&args.program)
        .with_context(|| format!("failed to load program {}", args.program.display()))?;
    let config = match &args.config {
        Some(path) => DebugConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DebugConfig::default(),
    };
    let script = match &args.script {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            parse_script(&text)?
        }
        None => args
            .commands
            .iter()
            .map(|command| command.parse())
            .collect::<anyhow::Result<Vec<_>>>()?,
    };

    let session = DebugSession::with_config(config);
    for spec in &args.line_breakpoints {
        let (source, line) = parse_line_breakpoint(spec)?;
        session.add_line_breakpoint(source, line);
    }
    for name in &args.function_breakpoints {
        session.add_function_breakpoint(name.as_str(), false);
    }
    for name in &args.partial_function_breakpoints {
        session.add_function_breakpoint(name.as_str(), true);
    }
    info!(breakpoints = session.breakpoints().len(), "debug session ready");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    debug_program(&session, tree, script, &mut out)
}

/// Run `tree` on an interpreter thread and drive it from `script`.
pub fn debug_program(
    session: &DebugSession,
    tree: CallTree,
    script: Vec<ScriptCommand>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let (tx, rx) = channel();
    session.add_listener(Arc::new(Forwarder { tx: Mutex::new(tx) }));

    let hook = session.clone();
    let interpreter = thread::spawn(move || TreeWalker::new(&tree).run(&hook));

    let drive_result = drive(session, &rx, script, out);
    if drive_result.is_err() {
        // Let the interpreter run out instead of parking on a later pause.
        // A pause already decided on may not be installed yet, so keep
        // interrupting until the thread is gone.
        session.breakpoints().clear();
        session.reset();
        while !interpreter.is_finished() {
            session.interrupt();
            thread::sleep(Duration::from_millis(1));
        }
    }
    let outcome = interpreter
        .join()
        .map_err(|_| anyhow::anyhow!("interpreter thread panicked"))?;
    drive_result?;
    let evaluated = outcome.context("program execution failed")?;
    writeln!(out, "== finished ({evaluated} calls)")?;
    Ok(())
}

fn drive(
    session: &DebugSession,
    events: &Receiver<Event>,
    script: Vec<ScriptCommand>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut script = script.into_iter();
    for event in events {
        let (reason, state) = match event {
            Event::Paused { reason, state } => (reason, state),
            Event::Ended => break,
        };
        let location = state
            .call_stack_frames()
            .first()
            .map_or_else(|| "<unknown>".to_string(), |frame| frame.location_string());
        writeln!(out, "== {reason}: {location}")?;
        write_block(out, &state.format_call_stack(), "(empty stack)")?;
        write_block(out, &state.format_variables(), "(no variables)")?;

        loop {
            let command = script.next().unwrap_or(ScriptCommand::Continue);
            writeln!(out, "> {}", describe(&command))?;
            if command.resumes() {
                command.resume(session)?;
                break;
            }
            command.inspect(&state, out)?;
        }
    }
    Ok(())
}

fn describe(command: &ScriptCommand) -> String {
    match command {
        ScriptCommand::Continue => "continue".to_string(),
        ScriptCommand::Into => "into".to_string(),
        ScriptCommand::Over => "over".to_string(),
        ScriptCommand::Out => "out".to_string(),
        ScriptCommand::Stack => "stack".to_string(),
        ScriptCommand::Vars => "vars".to_string(),
        ScriptCommand::Print(name) => format!("print {name}"),
    }
}

fn parse_line_breakpoint(spec: &str) -> anyhow::Result<(&str, u32)> {
    let Some((source, line)) = spec.rsplit_once(':') else {
        bail!("invalid breakpoint '{spec}', expected SOURCE:LINE");
    };
    let line = line
        .trim()
        .parse()
        .with_context(|| format!("invalid line in breakpoint '{spec}'"))?;
    if source.is_empty() {
        bail!("invalid breakpoint '{spec}', missing source");
    }
    Ok((source, line))
}
