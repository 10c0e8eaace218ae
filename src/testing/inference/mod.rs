//! Hypothesis tests.
//!
//! Every test kind is a pure computation from its input to a statistic and a
//! p-value ([`Outcome`]); the shared [`HypothesisTest::test`] step turns that
//! into a [`TestResult`] by comparing the p-value against alpha.

use crate::error::{Result, StatsError};
use crate::testing::{DegreesOfFreedom, TestKind, TestResult};

pub mod anova;
pub mod correlation;
pub mod nonparametric;
pub mod normality;
pub mod parametric;

pub use anova::{AnovaResult, AnovaTable, GroupMoments, OneWayAnova, anova_table, one_way_anova};
pub use correlation::{Correlation, PearsonCorrelation, pearson_correlation};
pub use nonparametric::{
    RunSymbol, RunsStatistics, RunsTest, TieBreak, binarize, count_runs, runs_test,
    runs_test_symbols,
};
pub use normality::{ShapiroWilk, ShapiroWilkTest, shapiro_wilk};
pub use parametric::{
    LargerSample, VarianceRatio, VarianceRatioTest, pairwise_variance_ratios, variance_ratio_test,
};

/// Raw output of a test before a decision is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: Option<DegreesOfFreedom>,
    pub metadata: Vec<(&'static str, f64)>,
}

impl Outcome {
    pub fn new(statistic: f64, p_value: f64) -> Self {
        Outcome {
            statistic,
            p_value,
            degrees_of_freedom: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_degrees_of_freedom(mut self, df: DegreesOfFreedom) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    pub fn with_metadata(mut self, key: &'static str, value: f64) -> Self {
        self.metadata.push((key, value));
        self
    }

    pub fn into_result(self, kind: TestKind, alpha: f64) -> TestResult {
        let mut result = TestResult::new(kind, self.statistic, self.p_value, alpha);
        if let Some(df) = self.degrees_of_freedom {
            result = result.with_degrees_of_freedom(df);
        }
        for (key, value) in self.metadata {
            result = result.with_metadata(key, value);
        }
        result
    }
}

pub(crate) fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(StatsError::InvalidParameter(format!(
            "alpha must lie in (0, 1), got {}",
            alpha
        )))
    }
}

/// A statistical test over input `I`.
pub trait HypothesisTest<I: ?Sized> {
    fn kind(&self) -> TestKind;

    /// Statistic and p-value for `input`.
    fn compute(&self, input: &I) -> Result<Outcome>;

    fn test(&self, input: &I, alpha: f64) -> Result<TestResult> {
        validate_alpha(alpha)?;
        let outcome = self.compute(input)?;
        Ok(outcome.into_result(self.kind(), alpha))
    }
}
