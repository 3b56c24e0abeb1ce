#![forbid(unsafe_code)]
//! Faultline — regression-boundary bisection for scripted build/test workflows
//!
//! Given a monotonic predicate over an integer domain (an external script
//! judged by its exit status), faultline finds the smallest value at which
//! the predicate flips from pass to fail. When no upper bound is known it
//! first discovers one by exponential probing.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`.
//!   The `cli` module enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod oracle;
pub mod search;

pub use oracle::{
    BuildTestOracle, LaunchPolicy, Oracle, OracleError, RepeatedOracle, ScriptCommand,
    ScriptOracle, Verdict,
};
pub use search::{
    BisectionResult, CancelFlag, ConsoleReporter, SearchError, SearchRange, SearchReporter,
    SilentReporter, bisect, discover_upper_bound,
};
