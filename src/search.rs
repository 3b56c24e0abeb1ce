//! Boundary search: binary search and exponential bound discovery
//!
//! The search operates on a [`SearchRange`] bracket known to contain the
//! boundary and narrows it strictly on every probe. Correctness of the
//! returned boundary assumes a monotonic oracle (a true prefix followed by
//! a false suffix); a non-monotonic oracle still terminates but converges
//! on an arbitrary flip point.
//!
//! ## SearchReporter Trait
//!
//! Progress reporting is separated from the search through a
//! `SearchReporter` trait, so the CLI's console output, quiet library use,
//! and test instrumentation all share one loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use miette::Diagnostic;
use thiserror::Error;

use crate::oracle::{Oracle, OracleError, Verdict};

// ============================================================================
// Errors
// ============================================================================

/// Errors that end a search without a boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("invalid bracket: lower bound {low} must be less than upper bound {high}")]
    #[diagnostic(code(faultline::search::invalid_bounds))]
    InvalidBounds { low: i64, high: i64 },

    #[error("no passing baseline: the oracle already fails at {start}")]
    #[diagnostic(
        code(faultline::search::baseline),
        help("bound discovery needs a passing starting point; lower the starting bound or fix the script")
    )]
    BaselineFailure { start: i64 },

    #[error("bound discovery overflowed while doubling past {last_pass}")]
    #[diagnostic(
        code(faultline::search::overflow),
        help("the oracle never failed; there may be no boundary to find")
    )]
    BoundOverflow { last_pass: i64 },

    #[error("search interrupted")]
    #[diagnostic(code(faultline::search::interrupted))]
    Interrupted,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),
}

// ============================================================================
// Data model
// ============================================================================

/// A half-open bracket `[low, high)` known to contain the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    pub low: i64,
    pub high: i64,
}

impl SearchRange {
    /// Create a bracket, rejecting the degenerate `low >= high` case.
    pub fn new(low: i64, high: i64) -> Result<Self, SearchError> {
        if low >= high {
            return Err(SearchError::InvalidBounds { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn width(&self) -> i64 {
        self.high - self.low
    }
}

impl fmt::Display for SearchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.low, self.high)
    }
}

/// Outcome of a completed search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BisectionResult {
    /// Smallest value at which the oracle is false.
    pub boundary: i64,
    /// Oracle evaluations performed by the bisection loop.
    pub evaluations: u32,
    pub elapsed: Duration,
}

/// Shared cancellation flag, set from the Ctrl-C handler and polled between
/// oracle evaluations. Partial progress is discarded, not resumed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Search Reporter Trait
// ============================================================================

/// Trait for reporting search progress.
///
/// Implement this trait to customize progress output (JSON, quiet, etc.)
pub trait SearchReporter {
    /// Called once before bound discovery begins
    fn on_discovery_start(&mut self, _start: i64) {}

    /// Called after each exponential bound probe
    fn on_discovery_probe(&mut self, _candidate: i64, _verdict: Verdict) {}

    /// Called once with the initial bracket before bisection begins
    fn on_search_start(&mut self, _range: SearchRange) {}

    /// Called before each bisection probe
    fn on_probe_start(&mut self, _candidate: i64, _range: SearchRange) {}

    /// Called after each bisection probe completes
    fn on_probe_complete(&mut self, _candidate: i64, _verdict: Verdict, _elapsed: Duration) {}

    /// Called once when the bracket has collapsed to the boundary
    fn on_search_complete(&mut self, _result: &BisectionResult) {}
}

/// No-op reporter for library callers that want a silent search.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl SearchReporter for SilentReporter {}

/// Default console reporter: one progress line per probe, a final report
/// naming the boundary and the pass/fail split around it.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SearchReporter for ConsoleReporter {
    fn on_discovery_start(&mut self, start: i64) {
        println!("Discovering an upper bound by doubling from {start}");
    }

    fn on_discovery_probe(&mut self, candidate: i64, verdict: Verdict) {
        println!("  bound probe {candidate}: {verdict}");
    }

    fn on_search_start(&mut self, range: SearchRange) {
        println!("Bisecting {range}");
        println!("{}", "-".repeat(50));
    }

    fn on_probe_start(&mut self, candidate: i64, range: SearchRange) {
        if self.verbose {
            print!("{range} probing {candidate} ... ");
        } else {
            println!("{range} probing {candidate}");
        }
    }

    fn on_probe_complete(&mut self, _candidate: i64, verdict: Verdict, elapsed: Duration) {
        if self.verbose {
            println!("{verdict} ({:.2}s)", elapsed.as_secs_f64());
        }
    }

    fn on_search_complete(&mut self, result: &BisectionResult) {
        println!("{}", "-".repeat(50));
        println!("Boundary found at: {}", result.boundary);
        println!("The oracle passes for values < {}", result.boundary);
        println!("The oracle fails for values >= {}", result.boundary);
        println!(
            "{} evaluation(s) in {:.2}s",
            result.evaluations,
            result.elapsed.as_secs_f64()
        );
    }
}

// ============================================================================
// Search algorithms
// ============================================================================

/// Find the smallest value in `range` at which the oracle is false.
///
/// Classic first-false binary search: a passing probe moves `low` past the
/// candidate, a failing one pulls `high` onto it. Floor division keeps
/// `mid < high`, so the bracket strictly narrows and the loop terminates in
/// `O(log(width))` evaluations without re-probing any candidate.
pub fn bisect<O, R>(
    range: SearchRange,
    oracle: &mut O,
    cancel: &CancelFlag,
    reporter: &mut R,
) -> Result<BisectionResult, SearchError>
where
    O: Oracle,
    R: SearchReporter,
{
    let started = Instant::now();
    let SearchRange { mut low, mut high } = range;
    let mut evaluations = 0u32;

    reporter.on_search_start(range);

    while low < high {
        if cancel.is_cancelled() {
            return Err(SearchError::Interrupted);
        }

        let mid = low + (high - low) / 2;
        reporter.on_probe_start(mid, SearchRange { low, high });

        let probe_started = Instant::now();
        let verdict = oracle.evaluate(mid)?;
        evaluations += 1;
        reporter.on_probe_complete(mid, verdict, probe_started.elapsed());
        tracing::debug!(low, high, mid, %verdict, "probe");

        if verdict.is_pass() {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    let result = BisectionResult {
        boundary: low,
        evaluations,
        elapsed: started.elapsed(),
    };
    reporter.on_search_complete(&result);
    Ok(result)
}

/// Discover a bracket for [`bisect`] by exponential probing from `start`.
///
/// The oracle must pass at `start`; a failing baseline is a fatal
/// [`SearchError::BaselineFailure`], never a silently degenerate range.
/// Doubling is checked: running out of `i64` is an explicit error, not a
/// wrap. A start of 0 probes 1 next, since 0 cannot be doubled.
pub fn discover_upper_bound<O, R>(
    start: i64,
    oracle: &mut O,
    cancel: &CancelFlag,
    reporter: &mut R,
) -> Result<SearchRange, SearchError>
where
    O: Oracle,
    R: SearchReporter,
{
    reporter.on_discovery_start(start);

    if cancel.is_cancelled() {
        return Err(SearchError::Interrupted);
    }
    let verdict = oracle.evaluate(start)?;
    reporter.on_discovery_probe(start, verdict);
    if !verdict.is_pass() {
        return Err(SearchError::BaselineFailure { start });
    }

    let mut last_pass = start;
    let mut current = start;
    loop {
        current = if current == 0 {
            1
        } else {
            current
                .checked_mul(2)
                .ok_or(SearchError::BoundOverflow { last_pass })?
        };

        if cancel.is_cancelled() {
            return Err(SearchError::Interrupted);
        }
        let verdict = oracle.evaluate(current)?;
        reporter.on_discovery_probe(current, verdict);
        tracing::debug!(current, last_pass, %verdict, "bound probe");

        if verdict.is_pass() {
            last_pass = current;
        } else {
            return SearchRange::new(last_pass, current);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Monotonic oracle from a plain predicate.
    fn passes_below(limit: i64) -> impl FnMut(i64) -> Result<Verdict, OracleError> {
        move |v| {
            Ok(if v < limit {
                Verdict::Pass
            } else {
                Verdict::Fail
            })
        }
    }

    fn quiet_bisect<O: Oracle>(range: SearchRange, oracle: &mut O) -> BisectionResult {
        bisect(range, oracle, &CancelFlag::new(), &mut SilentReporter).unwrap()
    }

    #[test]
    fn finds_the_first_failing_value() {
        let range = SearchRange::new(0, 100).unwrap();
        let result = quiet_bisect(range, &mut passes_below(42));
        assert_eq!(result.boundary, 42);
        assert!(result.evaluations <= 7, "took {}", result.evaluations);
    }

    #[test]
    fn width_one_bracket_takes_one_probe() {
        let range = SearchRange::new(10, 11).unwrap();

        let result = quiet_bisect(range, &mut passes_below(11));
        assert_eq!(result.boundary, 11);
        assert_eq!(result.evaluations, 1);

        let result = quiet_bisect(range, &mut passes_below(10));
        assert_eq!(result.boundary, 10);
        assert_eq!(result.evaluations, 1);
    }

    #[test]
    fn deterministic_oracle_gives_the_same_boundary() {
        let range = SearchRange::new(-500, 500).unwrap();
        let first = quiet_bisect(range, &mut passes_below(-123));
        let second = quiet_bisect(range, &mut passes_below(-123));
        assert_eq!(first.boundary, -123);
        assert_eq!(first.boundary, second.boundary);
        assert_eq!(first.evaluations, second.evaluations);
    }

    #[test]
    fn never_reprobes_a_candidate() {
        let mut seen = std::collections::HashSet::new();
        let mut oracle = |v: i64| {
            assert!(seen.insert(v), "candidate {v} probed twice");
            Ok(if v < 77 { Verdict::Pass } else { Verdict::Fail })
        };
        let range = SearchRange::new(0, 1000).unwrap();
        assert_eq!(quiet_bisect(range, &mut oracle).boundary, 77);
    }

    #[test]
    fn timeout_counts_as_a_failing_probe() {
        let mut oracle = |v: i64| {
            Ok(if v < 42 {
                Verdict::Pass
            } else {
                Verdict::TimedOut
            })
        };
        let range = SearchRange::new(0, 100).unwrap();
        assert_eq!(quiet_bisect(range, &mut oracle).boundary, 42);
    }

    #[test]
    fn non_monotonic_oracle_still_terminates_in_range() {
        let mut oracle = |v: i64| {
            Ok(if v % 7 == 0 {
                Verdict::Fail
            } else {
                Verdict::Pass
            })
        };
        let range = SearchRange::new(0, 1_000_000).unwrap();
        let result = quiet_bisect(range, &mut oracle);
        assert!((0..=1_000_000).contains(&result.boundary));
        assert!(result.evaluations <= 20);
    }

    #[test]
    fn degenerate_bracket_is_rejected() {
        assert!(matches!(
            SearchRange::new(10, 10),
            Err(SearchError::InvalidBounds { low: 10, high: 10 })
        ));
        assert!(matches!(
            SearchRange::new(10, 3),
            Err(SearchError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn cancelled_search_reports_interrupted() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let range = SearchRange::new(0, 100).unwrap();
        let result = bisect(range, &mut passes_below(42), &cancel, &mut SilentReporter);
        assert!(matches!(result, Err(SearchError::Interrupted)));
    }

    #[test]
    fn oracle_errors_stop_the_search() {
        let mut oracle = |_: i64| -> Result<Verdict, OracleError> {
            Err(OracleError::Build {
                path: "build.sh".into(),
                detail: "exited non-zero".into(),
            })
        };
        let range = SearchRange::new(0, 100).unwrap();
        let result = bisect(range, &mut oracle, &CancelFlag::new(), &mut SilentReporter);
        assert!(matches!(result, Err(SearchError::Oracle(_))));
    }

    #[test]
    fn discovers_a_doubling_bracket() {
        let range = discover_upper_bound(
            1,
            &mut passes_below(1000),
            &CancelFlag::new(),
            &mut SilentReporter,
        )
        .unwrap();
        assert_eq!(range, SearchRange { low: 512, high: 1024 });
    }

    #[test]
    fn discovery_from_zero_probes_one_next() {
        let range = discover_upper_bound(
            0,
            &mut passes_below(3),
            &CancelFlag::new(),
            &mut SilentReporter,
        )
        .unwrap();
        assert_eq!(range, SearchRange { low: 2, high: 4 });
    }

    #[test]
    fn failing_baseline_is_fatal() {
        let result = discover_upper_bound(
            64,
            &mut passes_below(10),
            &CancelFlag::new(),
            &mut SilentReporter,
        );
        assert!(matches!(
            result,
            Err(SearchError::BaselineFailure { start: 64 })
        ));
    }

    #[test]
    fn discovery_fails_explicitly_instead_of_wrapping() {
        let mut always_pass = |_: i64| Ok(Verdict::Pass);
        let result = discover_upper_bound(
            1,
            &mut always_pass,
            &CancelFlag::new(),
            &mut SilentReporter,
        );
        assert!(matches!(result, Err(SearchError::BoundOverflow { .. })));
    }

    #[test]
    fn discovery_then_bisect_finds_the_boundary() {
        let cancel = CancelFlag::new();
        let range = discover_upper_bound(
            1,
            &mut passes_below(1000),
            &cancel,
            &mut SilentReporter,
        )
        .unwrap();
        let result = bisect(range, &mut passes_below(1000), &cancel, &mut SilentReporter).unwrap();
        assert_eq!(result.boundary, 1000);
    }
}
