//! CLI definitions for pure-debug.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pure-debug",
    version,
    about = "Run a call-tree program under the debugger",
    after_help = "Examples:\n  pure-debug run prog.toml --break a.src:4 --command over --command vars\n  pure-debug run prog.toml --break-fn helper --script session.txt"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a program, pausing at breakpoints and applying scripted commands.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Call-tree program (TOML).
    pub program: PathBuf,
    /// Debugger configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Line breakpoint as SOURCE:LINE.
    #[arg(long = "break", value_name = "SOURCE:LINE")]
    pub line_breakpoints: Vec<String>,
    /// Function breakpoint matching the exact declared name.
    #[arg(long = "break-fn", value_name = "NAME")]
    pub function_breakpoints: Vec<String>,
    /// Function breakpoint matching any name containing NAME.
    #[arg(long = "break-fn-partial", value_name = "NAME")]
    pub partial_function_breakpoints: Vec<String>,
    /// File with one debugger command per line.
    #[arg(long, conflicts_with = "commands")]
    pub script: Option<PathBuf>,
    /// Debugger command, applied in order at successive prompts.
    #[arg(long = "command", value_name = "CMD")]
    pub commands: Vec<String>,
}
