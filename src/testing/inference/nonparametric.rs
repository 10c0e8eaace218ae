//! Wald-Wolfowitz runs test for randomness of an ordered sequence.
//!
//! The series is binarised against its median and the number of runs
//! (maximal blocks of identical symbols, in the original order) is compared
//! with its expectation under randomness using the normal approximation.

use crate::descriptive::median;
use crate::error::{Result, StatsError};
use crate::testing::TestKind;
use crate::testing::distribution::standard_normal;
use crate::testing::inference::{HypothesisTest, Outcome};
use log::debug;
use serde::Serialize;
use statrs::distribution::ContinuousCDF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunSymbol {
    /// At or above the median (under the default tie-break).
    A,
    /// Below the median.
    B,
}

/// Where values exactly equal to the median are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TieBreak {
    /// `x >= median` maps to `A`.
    #[default]
    Above,
    /// `x > median` maps to `A`; ties go to `B`.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunsStatistics {
    pub runs: usize,
    pub n_a: usize,
    pub n_b: usize,
    pub expected_runs: f64,
    pub variance: f64,
    pub z: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunsTest {
    pub tie_break: TieBreak,
}

impl HypothesisTest<[f64]> for RunsTest {
    fn kind(&self) -> TestKind {
        TestKind::Runs
    }

    fn compute(&self, input: &[f64]) -> Result<Outcome> {
        let stats = runs_test(input, self.tie_break)?;
        Ok(Outcome::new(stats.z, stats.p_value)
            .with_metadata("runs", stats.runs as f64)
            .with_metadata("expected_runs", stats.expected_runs)
            .with_metadata("variance", stats.variance)
            .with_metadata("n_a", stats.n_a as f64)
            .with_metadata("n_b", stats.n_b as f64))
    }
}

/// Map each value to `A` or `B` relative to the median of `values`.
pub fn binarize(values: &[f64], tie_break: TieBreak) -> Result<Vec<RunSymbol>> {
    if values.is_empty() {
        return Err(StatsError::EmptySeries {
            column: "runs test input".to_string(),
        });
    }
    let m = median(values)?;
    Ok(values
        .iter()
        .map(|&x| {
            let above = match tie_break {
                TieBreak::Above => x >= m,
                TieBreak::Below => x > m,
            };
            if above { RunSymbol::A } else { RunSymbol::B }
        })
        .collect())
}

/// Number of maximal same-symbol blocks; 0 for an empty sequence.
pub fn count_runs(symbols: &[RunSymbol]) -> usize {
    if symbols.is_empty() {
        return 0;
    }
    1 + symbols.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Runs test on an already binarised sequence.
pub fn runs_test_symbols(symbols: &[RunSymbol]) -> Result<RunsStatistics> {
    if symbols.is_empty() {
        return Err(StatsError::EmptySeries {
            column: "runs test input".to_string(),
        });
    }

    let runs = count_runs(symbols);
    let n_a = symbols.iter().filter(|&&s| s == RunSymbol::A).count();
    let n_b = symbols.len() - n_a;
    if n_a == 0 || n_b == 0 {
        return Err(StatsError::zero_variance(
            "runs test needs both symbols present (sequence is a single run)",
        ));
    }

    let n1 = n_a as f64;
    let n2 = n_b as f64;
    let n = n1 + n2;
    let two_n1_n2 = 2.0 * n1 * n2;
    let expected_runs = two_n1_n2 / n + 1.0;
    let variance = (two_n1_n2 * (two_n1_n2 - n1 - n2)) / (n * n * (n - 1.0));
    if variance <= 0.0 {
        return Err(StatsError::zero_variance("runs test variance is zero"));
    }

    let z = (runs as f64 - expected_runs) / variance.sqrt();
    let p_value = (2.0 * standard_normal()?.sf(z.abs())).min(1.0);
    debug!(
        "runs test: runs={} n_a={} n_b={} E={:.4} Var={:.4} Z={:.4} p={:.4}",
        runs, n_a, n_b, expected_runs, variance, z, p_value
    );

    Ok(RunsStatistics {
        runs,
        n_a,
        n_b,
        expected_runs,
        variance,
        z,
        p_value,
    })
}

/// Runs test on `values` in their original order.
pub fn runs_test(values: &[f64], tie_break: TieBreak) -> Result<RunsStatistics> {
    let symbols = binarize(values, tie_break)?;
    runs_test_symbols(&symbols)
}
