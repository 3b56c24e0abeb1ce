//! CLI module for the faultline bisector
//!
//! ## Usage
//!
//! - `faultline -l 1 -u 100 -t ./check.sh` - bisect a known bracket
//! - `faultline -t ./check.sh` - discover the upper bound by doubling, then bisect
//! - `faultline -b ./build.sh -t ./test.sh -r 3` - build with the candidate,
//!   judge by the test script, three passes required per candidate
//! - `faultline -l 1 -u 50 -t ./check.sh -- --flag value` - pass-through args
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! The command function returns `CliResult<T>` instead of calling
//! `process::exit`. Only the top-level `run()` function handles errors and
//! exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::oracle::LaunchPolicy;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Invalid bounds, missing scripts: no search was attempted.
    pub const CONFIG: ExitCode = ExitCode(2);
    /// Conventional 128 + SIGINT.
    pub const INTERRUPTED: ExitCode = ExitCode(130);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create a configuration error (exit code 2).
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::CONFIG)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Find the boundary where a script's exit status flips from pass to fail
#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(version = VERSION)]
#[command(
    about = "Find the boundary where a script's exit status flips from pass to fail",
    long_about = None
)]
pub struct Cli {
    /// Lower bound of the search range (starting probe when --upper is omitted)
    #[arg(
        short = 'l',
        long = "lower",
        value_name = "INT",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub lower: i64,

    /// Upper bound of the search range; omit to discover one by doubling
    #[arg(
        short = 'u',
        long = "upper",
        value_name = "INT",
        allow_negative_numbers = true
    )]
    pub upper: Option<i64>,

    /// Test script, judged by its exit status
    #[arg(short = 't', long = "test", value_name = "PATH")]
    pub test: PathBuf,

    /// Build script run with the candidate before each test round
    #[arg(short = 'b', long = "build", value_name = "PATH")]
    pub build: Option<PathBuf>,

    /// Consecutive passes required before a candidate counts as passing
    #[arg(short = 'r', long = "repeat", value_name = "N", default_value_t = 1)]
    pub repeat: u32,

    /// Per-evaluation time budget in seconds
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,

    /// Policy when the oracle process cannot be launched: abort or fail
    #[arg(
        long = "on-launch-error",
        value_name = "POLICY",
        default_value = "abort",
        value_parser = parse_launch_policy
    )]
    pub on_launch_error: LaunchPolicy,

    /// Per-probe verdicts and timings
    #[arg(short, long)]
    pub verbose: bool,

    /// Extra arguments appended to every test script invocation
    #[arg(last = true, value_name = "ARGS")]
    pub extra_args: Vec<String>,
}

fn parse_launch_policy(s: &str) -> Result<LaunchPolicy, String> {
    s.parse()
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. The command
/// implementation returns `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match commands::run_search(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
