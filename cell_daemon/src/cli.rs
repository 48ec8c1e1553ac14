//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "cell_daemon", version, about = "Measurement cell daemon")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the measurement engine and serve the control socket until Ctrl-C
    Serve {
        /// Listen address; overrides server.bind from the config
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Bring every sensor up once and report the resulting state
    SelfCheck,
    /// Run the engine for a while and print one snapshot as JSON
    Snapshot {
        /// How long to sample before reading the snapshot
        #[arg(long, value_name = "MS", default_value_t = 12_000)]
        wait_ms: u64,
    },
}
