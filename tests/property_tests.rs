//! Property-based tests for the boundary search
//!
//! These tests use proptest to verify invariants across many randomly
//! generated inputs, catching edge cases that hand-written tests might miss.

use faultline::oracle::{OracleError, Verdict};
use faultline::search::{CancelFlag, SearchRange, SilentReporter, bisect, discover_upper_bound};
use proptest::prelude::*;

fn passes_below(limit: i64) -> impl FnMut(i64) -> Result<Verdict, OracleError> {
    move |v| {
        Ok(if v < limit {
            Verdict::Pass
        } else {
            Verdict::Fail
        })
    }
}

/// Worst-case probe count for a bracket of the given width: its bit length.
fn probe_budget(width: i64) -> u32 {
    64 - (width as u64).leading_zeros()
}

proptest! {
    /// Property: for every monotonic true-prefix/false-suffix predicate,
    /// bisect returns exactly the first failing value within the probe budget.
    #[test]
    fn bisect_finds_the_exact_boundary(
        low in -10_000i64..10_000,
        width in 1i64..20_000,
        offset in 0i64..=20_000,
    ) {
        let high = low + width;
        // Clamp the boundary into [low, high] so the bracket always contains it.
        let boundary = low + offset.min(width);

        let range = SearchRange::new(low, high).unwrap();
        let result = bisect(
            range,
            &mut passes_below(boundary),
            &CancelFlag::new(),
            &mut SilentReporter,
        )
        .unwrap();

        prop_assert_eq!(result.boundary, boundary);
        prop_assert!(
            result.evaluations <= probe_budget(width),
            "{} probes for width {}",
            result.evaluations,
            width
        );
    }

    /// Property: rerunning with the same deterministic oracle is idempotent.
    #[test]
    fn bisect_is_idempotent(low in -1_000i64..1_000, width in 1i64..2_000, offset in 0i64..2_000) {
        let boundary = low + offset.min(width);
        let range = SearchRange::new(low, low + width).unwrap();
        let cancel = CancelFlag::new();

        let first = bisect(range, &mut passes_below(boundary), &cancel, &mut SilentReporter).unwrap();
        let second = bisect(range, &mut passes_below(boundary), &cancel, &mut SilentReporter).unwrap();

        prop_assert_eq!(first.boundary, second.boundary);
        prop_assert_eq!(first.evaluations, second.evaluations);
    }

    /// Property: a discovered bracket has a passing low edge and a failing
    /// high edge, and bisecting it finds the true boundary.
    #[test]
    fn discovered_brackets_are_valid(start in 0i64..100, limit_gap in 1i64..100_000) {
        let limit = start + limit_gap;
        let cancel = CancelFlag::new();

        let range = discover_upper_bound(
            start,
            &mut passes_below(limit),
            &cancel,
            &mut SilentReporter,
        )
        .unwrap();

        let mut check = passes_below(limit);
        prop_assert_eq!(check(range.low).unwrap(), Verdict::Pass);
        prop_assert_eq!(check(range.high).unwrap(), Verdict::Fail);

        let result = bisect(range, &mut passes_below(limit), &cancel, &mut SilentReporter).unwrap();
        prop_assert_eq!(result.boundary, limit);
    }

    /// Property: discovery fails loudly when the baseline already fails.
    #[test]
    fn failing_baselines_never_yield_brackets(start in 0i64..1_000) {
        let result = discover_upper_bound(
            start,
            &mut passes_below(start),
            &CancelFlag::new(),
            &mut SilentReporter,
        );
        prop_assert!(result.is_err());
    }
}
