//! Debugger command scripts.

use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use pure_debug::{DebugResult, DebugSession, ExecutionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Continue,
    Into,
    Over,
    Out,
    Stack,
    Vars,
    Print(String),
}

impl ScriptCommand {
    /// Whether the command releases the pause.
    pub fn resumes(&self) -> bool {
        matches!(
            self,
            ScriptCommand::Continue | ScriptCommand::Into | ScriptCommand::Over | ScriptCommand::Out
        )
    }

    pub fn resume(&self, session: &DebugSession) -> DebugResult<()> {
        match self {
            ScriptCommand::Continue => session.continue_execution(),
            ScriptCommand::Into => session.step_into(),
            ScriptCommand::Over => session.step_over(),
            ScriptCommand::Out => session.step_out(),
            ScriptCommand::Stack | ScriptCommand::Vars | ScriptCommand::Print(_) => Ok(()),
        }
    }

    pub fn inspect(&self, state: &ExecutionState, out: &mut impl Write) -> std::io::Result<()> {
        match self {
            ScriptCommand::Stack => write_block(out, &state.format_call_stack(), "(empty stack)"),
            ScriptCommand::Vars => write_block(out, &state.format_variables(), "(no variables)"),
            ScriptCommand::Print(name) => match state.variable(name) {
                Some(info) => writeln!(out, "  {info}"),
                None => writeln!(out, "  {name}: not found"),
            },
            _ => Ok(()),
        }
    }
}

impl FromStr for ScriptCommand {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (verb, rest) = text
            .split_once(char::is_whitespace)
            .map_or((text, ""), |(verb, rest)| (verb, rest.trim()));
        let command = match verb.to_ascii_lowercase().as_str() {
            "continue" | "c" => ScriptCommand::Continue,
            "into" | "step" | "s" => ScriptCommand::Into,
            "over" | "next" | "n" => ScriptCommand::Over,
            "out" | "finish" => ScriptCommand::Out,
            "stack" | "bt" => ScriptCommand::Stack,
            "vars" => ScriptCommand::Vars,
            "print" | "p" => {
                if rest.is_empty() {
                    bail!("print needs a variable name");
                }
                return Ok(ScriptCommand::Print(rest.to_string()));
            }
            _ => return Err(anyhow!("unknown debugger command '{text}'")),
        };
        if !rest.is_empty() {
            bail!("'{verb}' takes no arguments");
        }
        Ok(command)
    }
}

/// Parse a script: one command per line, `#` starts a comment.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<ScriptCommand>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((index + 1, line))
        })
        .map(|(line_no, line)| {
            line.parse()
                .map_err(|err: anyhow::Error| err.context(format!("script line {line_no}")))
        })
        .collect()
}

pub fn write_block(out: &mut impl Write, block: &str, empty: &str) -> std::io::Result<()> {
    if block.is_empty() {
        return writeln!(out, "  {empty}");
    }
    for line in block.lines() {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}
