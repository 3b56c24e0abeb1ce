//! Oracle evaluation: spawning external scripts and judging their exit status
//!
//! The bisection loop never inspects process output. An oracle turns one
//! integer candidate into a [`Verdict`] by running a script with the
//! candidate as its first argument and mapping exit 0 to `Pass`, any
//! non-zero exit to `Fail`, and an expired time budget to `TimedOut`.
//!
//! A spawn failure is *not* a verdict: it usually means a broken harness
//! (missing binary, bad permissions), so the default policy aborts the
//! search. The reference tooling disagreed on this point, hence
//! [`LaunchPolicy`] makes it an explicit choice.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use miette::Diagnostic;
use thiserror::Error;

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// Verdicts and errors
// ============================================================================

/// Outcome of one oracle evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The script exited with status 0.
    Pass,
    /// The script exited with a non-zero status.
    Fail,
    /// The script exceeded its time budget and was killed.
    TimedOut,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "passed"),
            Verdict::Fail => write!(f, "failed"),
            Verdict::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Errors that occur while evaluating an oracle.
///
/// These are harness failures, distinct from a `Fail` verdict: a failing
/// probe narrows the bracket, an `OracleError` stops the search.
#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("failed to launch '{path}': {source}")]
    #[diagnostic(
        code(faultline::oracle::launch),
        help("check that the script exists and is executable, or pass --on-launch-error fail")
    )]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build script '{path}' {detail}")]
    #[diagnostic(
        code(faultline::oracle::build),
        help("a broken build is not a bisected signal; fix the build script before searching")
    )]
    Build { path: PathBuf, detail: String },

    #[error("failed waiting for '{path}': {source}")]
    #[diagnostic(code(faultline::oracle::wait))]
    Wait {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What to do when the oracle process cannot be spawned at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchPolicy {
    /// Abort the whole search (the default): a missing binary is a broken
    /// harness, not a predicate result.
    #[default]
    Abort,
    /// Count the probe as a failing result and keep bisecting.
    TreatAsFail,
}

impl FromStr for LaunchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(LaunchPolicy::Abort),
            "fail" => Ok(LaunchPolicy::TreatAsFail),
            other => Err(format!(
                "unknown launch-error policy '{other}' (expected 'abort' or 'fail')"
            )),
        }
    }
}

// ============================================================================
// Oracle trait
// ============================================================================

/// A predicate over integers, evaluated one candidate at a time.
///
/// Implementations may have side effects (builds, test runs) invisible to
/// the bisection loop. Closures implement this directly, which keeps tests
/// and library callers free of process plumbing.
pub trait Oracle {
    fn evaluate(&mut self, candidate: i64) -> Result<Verdict, OracleError>;
}

impl<F> Oracle for F
where
    F: FnMut(i64) -> Result<Verdict, OracleError>,
{
    fn evaluate(&mut self, candidate: i64) -> Result<Verdict, OracleError> {
        self(candidate)
    }
}

// ============================================================================
// Script execution
// ============================================================================

/// One external script plus its fixed arguments and time budget.
///
/// Output is discarded; only the exit status matters.
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    path: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ScriptCommand {
    pub fn new(path: impl AsRef<Path>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            args,
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the script to completion or until the time budget expires.
    ///
    /// `candidate`, when present, is stringified and prepended to the fixed
    /// arguments. A child that outlives the budget is killed and reaped,
    /// never left running.
    pub fn run(&self, candidate: Option<i64>) -> Result<Verdict, OracleError> {
        let mut command = Command::new(&self.path);
        if let Some(value) = candidate {
            command.arg(value.to_string());
        }
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|source| OracleError::Launch {
            path: self.path.clone(),
            source,
        })?;

        self.wait_with_budget(&mut child)
    }

    fn wait_with_budget(&self, child: &mut Child) -> Result<Verdict, OracleError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(if status.success() {
                        Verdict::Pass
                    } else {
                        Verdict::Fail
                    });
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            script = %self.path.display(),
                            timeout_secs = self.timeout.as_secs_f64(),
                            "script exceeded its time budget, killing it"
                        );
                        // Reap after the kill so no zombie is left behind.
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(Verdict::TimedOut);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(OracleError::Wait {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }
    }
}

// ============================================================================
// Oracle implementations
// ============================================================================

/// The plain script oracle: one script receives the candidate and its exit
/// status is the whole signal.
#[derive(Debug)]
pub struct ScriptOracle {
    command: ScriptCommand,
    launch_policy: LaunchPolicy,
}

impl ScriptOracle {
    pub fn new(command: ScriptCommand, launch_policy: LaunchPolicy) -> Self {
        Self {
            command,
            launch_policy,
        }
    }
}

impl Oracle for ScriptOracle {
    fn evaluate(&mut self, candidate: i64) -> Result<Verdict, OracleError> {
        match self.command.run(Some(candidate)) {
            Err(OracleError::Launch { path, source })
                if self.launch_policy == LaunchPolicy::TreatAsFail =>
            {
                tracing::warn!(
                    script = %path.display(),
                    error = %source,
                    "treating launch failure as a failing probe"
                );
                Ok(Verdict::Fail)
            }
            other => other,
        }
    }
}

/// Build-then-test oracle: the build script receives the candidate, the test
/// script (fixed argv) provides the bisected signal.
///
/// A build failure of any kind is a hard [`OracleError::Build`]. The test
/// step runs `repeat` times and short-circuits on the first non-pass, which
/// filters flaky tests.
#[derive(Debug)]
pub struct BuildTestOracle {
    build: ScriptCommand,
    test: ScriptCommand,
    repeat: u32,
    launch_policy: LaunchPolicy,
}

impl BuildTestOracle {
    pub fn new(
        build: ScriptCommand,
        test: ScriptCommand,
        repeat: u32,
        launch_policy: LaunchPolicy,
    ) -> Self {
        Self {
            build,
            test,
            repeat: repeat.max(1),
            launch_policy,
        }
    }
}

impl Oracle for BuildTestOracle {
    fn evaluate(&mut self, candidate: i64) -> Result<Verdict, OracleError> {
        tracing::info!(candidate, build = %self.build.path().display(), "building");
        match self.build.run(Some(candidate))? {
            Verdict::Pass => {}
            Verdict::Fail => {
                return Err(OracleError::Build {
                    path: self.build.path().to_path_buf(),
                    detail: format!("exited non-zero for candidate {candidate}"),
                });
            }
            Verdict::TimedOut => {
                return Err(OracleError::Build {
                    path: self.build.path().to_path_buf(),
                    detail: format!("timed out for candidate {candidate}"),
                });
            }
        }

        for attempt in 1..=self.repeat {
            tracing::info!(attempt, total = self.repeat, "testing");
            let verdict = match self.test.run(None) {
                Err(OracleError::Launch { path, source })
                    if self.launch_policy == LaunchPolicy::TreatAsFail =>
                {
                    tracing::warn!(
                        script = %path.display(),
                        error = %source,
                        "treating launch failure as a failing probe"
                    );
                    Verdict::Fail
                }
                other => other?,
            };
            if !verdict.is_pass() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Pass)
    }
}

/// Decorator requiring `times` consecutive passes before a candidate counts
/// as passing. Short-circuits on the first non-pass.
#[derive(Debug)]
pub struct RepeatedOracle<O> {
    inner: O,
    times: u32,
}

impl<O: Oracle> RepeatedOracle<O> {
    pub fn new(inner: O, times: u32) -> Self {
        Self {
            inner,
            times: times.max(1),
        }
    }
}

impl<O: Oracle> Oracle for RepeatedOracle<O> {
    fn evaluate(&mut self, candidate: i64) -> Result<Verdict, OracleError> {
        for _ in 0..self.times {
            let verdict = self.inner.evaluate(candidate)?;
            if !verdict.is_pass() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Pass)
    }
}

// ============================================================================
// Tests
// ============================================================================
