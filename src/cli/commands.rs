//! Search command implementation
//!
//! Validates the configuration, wires the chosen oracle, and runs the
//! search. Returns `CliResult<ExitCode>` instead of calling `process::exit`;
//! error handling and exits happen in the top-level `run()`.

use std::path::Path;
use std::time::Duration;

use crate::oracle::{
    BuildTestOracle, Oracle, RepeatedOracle, ScriptCommand, ScriptOracle,
};
use crate::search::{
    BisectionResult, CancelFlag, ConsoleReporter, SearchError, SearchRange, bisect,
    discover_upper_bound,
};

use super::{Cli, CliError, CliResult, ExitCode};

/// Run the boundary search described by the parsed CLI.
pub fn run_search(cli: Cli) -> CliResult<ExitCode> {
    validate(&cli)?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .map_err(|e| CliError::failure(format!("failed to install interrupt handler: {e}")))?;
    }

    print_header(&cli);

    let timeout = Duration::from_secs(cli.timeout);
    let mut reporter = ConsoleReporter::new(cli.verbose);

    let outcome = if let Some(build) = &cli.build {
        // Build-then-test mode: the build gets the candidate, the test
        // script carries the pass-through args and the repeat count.
        let mut oracle = BuildTestOracle::new(
            ScriptCommand::new(build, Vec::new(), timeout),
            ScriptCommand::new(&cli.test, cli.extra_args.clone(), timeout),
            cli.repeat,
            cli.on_launch_error,
        );
        search(&cli, &mut oracle, &cancel, &mut reporter)
    } else {
        let script = ScriptOracle::new(
            ScriptCommand::new(&cli.test, cli.extra_args.clone(), timeout),
            cli.on_launch_error,
        );
        if cli.repeat > 1 {
            let mut oracle = RepeatedOracle::new(script, cli.repeat);
            search(&cli, &mut oracle, &cancel, &mut reporter)
        } else {
            let mut oracle = script;
            search(&cli, &mut oracle, &cancel, &mut reporter)
        }
    };

    match outcome {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(SearchError::Interrupted) => Err(CliError::new(
            "search interrupted; no boundary was established",
            ExitCode::INTERRUPTED,
        )),
        Err(err @ SearchError::InvalidBounds { .. }) => Err(CliError::config(render(err))),
        Err(err) => Err(CliError::failure(render(err))),
    }
}

/// Establish the bracket (given or discovered) and bisect it.
fn search<O: Oracle>(
    cli: &Cli,
    oracle: &mut O,
    cancel: &CancelFlag,
    reporter: &mut ConsoleReporter,
) -> Result<BisectionResult, SearchError> {
    let range = match cli.upper {
        Some(upper) => SearchRange::new(cli.lower, upper)?,
        None => discover_upper_bound(cli.lower, oracle, cancel, reporter)?,
    };
    bisect(range, oracle, cancel, reporter)
}

/// Reject broken configurations before any process is spawned.
fn validate(cli: &Cli) -> CliResult<()> {
    if let Some(upper) = cli.upper {
        if cli.lower >= upper {
            return Err(CliError::config(format!(
                "lower bound {} must be less than upper bound {}",
                cli.lower, upper
            )));
        }
    } else if cli.lower < 0 {
        return Err(CliError::config(format!(
            "bound discovery doubles the candidate, so the starting bound must be \
             non-negative (got {})",
            cli.lower
        )));
    }

    if cli.repeat < 1 {
        return Err(CliError::config("--repeat must be at least 1"));
    }
    if cli.timeout == 0 {
        return Err(CliError::config("--timeout must be at least 1 second"));
    }

    require_script(&cli.test, "test")?;
    if let Some(build) = &cli.build {
        require_script(build, "build")?;
    }

    Ok(())
}

fn require_script(path: &Path, role: &str) -> CliResult<()> {
    if !path.is_file() {
        return Err(CliError::config(format!(
            "{role} script '{}' not found",
            path.display()
        )));
    }
    Ok(())
}

fn print_header(cli: &Cli) {
    if let Some(build) = &cli.build {
        println!("Build script: {}", build.display());
    }
    println!("Test script: {}", cli.test.display());
    if !cli.extra_args.is_empty() {
        println!("Extra args: {}", cli.extra_args.join(" "));
    }
    if cli.repeat > 1 {
        println!("Passes required per candidate: {}", cli.repeat);
    }
}

/// Render a search error through miette for the terminal.
fn render(err: SearchError) -> String {
    format!("{:?}", miette::Report::new(err))
}

// ============================================================================
// Tests
// ============================================================================
