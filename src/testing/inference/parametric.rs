//! Parametric comparison of two sample variances (F-test).
//!
//! The ratio is always formed as larger over smaller sample variance, so
//! `F >= 1`; the degrees of freedom follow the same order and the group that
//! supplied the numerator is recorded.

use crate::data::GroupedSeries;
use crate::descriptive::variance;
use crate::error::{Result, StatsError};
use crate::testing::correction::Correction;
use crate::testing::inference::{HypothesisTest, Outcome, validate_alpha};
use crate::testing::utils::group_pairs;
use crate::testing::{DegreesOfFreedom, PairwiseComparison, TestKind};
use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Which of the two samples had the larger variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LargerSample {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarianceRatio {
    pub f: f64,
    pub df_numerator: f64,
    pub df_denominator: f64,
    pub p_value: f64,
    pub variance_first: f64,
    pub variance_second: f64,
    pub larger: LargerSample,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceRatioTest;

impl<'a> HypothesisTest<(&'a [f64], &'a [f64])> for VarianceRatioTest {
    fn kind(&self) -> TestKind {
        TestKind::VarianceRatio
    }

    fn compute(&self, input: &(&'a [f64], &'a [f64])) -> Result<Outcome> {
        let ratio = variance_ratio_test(input.0, input.1)?;
        let larger = match ratio.larger {
            LargerSample::First => 1.0,
            LargerSample::Second => 2.0,
        };
        Ok(Outcome::new(ratio.f, ratio.p_value)
            .with_degrees_of_freedom(DegreesOfFreedom::Pair(
                ratio.df_numerator,
                ratio.df_denominator,
            ))
            .with_metadata("variance_first", ratio.variance_first)
            .with_metadata("variance_second", ratio.variance_second)
            .with_metadata("larger_sample", larger))
    }
}

/// Two-sided F-test of equal variances, `p = min(1, 2 * min(cdf, 1 - cdf))`.
pub fn variance_ratio_test(first: &[f64], second: &[f64]) -> Result<VarianceRatio> {
    let variance_first = variance(first)?;
    let variance_second = variance(second)?;

    let (larger, numerator, denominator, n_num, n_den) = if variance_first >= variance_second {
        (
            LargerSample::First,
            variance_first,
            variance_second,
            first.len(),
            second.len(),
        )
    } else {
        (
            LargerSample::Second,
            variance_second,
            variance_first,
            second.len(),
            first.len(),
        )
    };

    if denominator <= 0.0 {
        return Err(StatsError::zero_variance(
            "variance ratio with a constant sample in the denominator",
        ));
    }

    let f = numerator / denominator;
    let df_numerator = (n_num - 1) as f64;
    let df_denominator = (n_den - 1) as f64;
    let p_value = f_two_sided_p_value(f, df_numerator, df_denominator)?;

    Ok(VarianceRatio {
        f,
        df_numerator,
        df_denominator,
        p_value,
        variance_first,
        variance_second,
        larger,
    })
}

fn f_two_sided_p_value(f: f64, df1: f64, df2: f64) -> Result<f64> {
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    let cdf = dist.cdf(f);
    Ok((2.0 * cdf.min(1.0 - cdf)).min(1.0))
}

/// F-tests for every unordered pair of groups, with adjusted p-values.
///
/// # Arguments
///
/// * `grouped` - Groups to compare, in label order
/// * `alpha` - Significance level for the per-pair decision
/// * `correction` - Adjustment applied across the family of pairs
///
/// # Returns
///
/// One `PairwiseComparison` per pair, flagged significant when its (adjusted)
/// p-value is below `alpha`.
pub fn pairwise_variance_ratios(
    grouped: &GroupedSeries,
    alpha: f64,
    correction: Correction,
) -> Result<Vec<PairwiseComparison>> {
    validate_alpha(alpha)?;

    let mut comparisons = Vec::new();
    for ((label_a, series_a), (label_b, series_b)) in group_pairs(grouped) {
        let ratio = variance_ratio_test(series_a.values(), series_b.values())?;
        let larger_label = match ratio.larger {
            LargerSample::First => label_a,
            LargerSample::Second => label_b,
        };
        debug!(
            "F-test {} vs {}: F={:.4} df=({}, {}) p={:.4}",
            label_a, label_b, ratio.f, ratio.df_numerator, ratio.df_denominator, ratio.p_value
        );
        comparisons.push(
            PairwiseComparison::new(
                label_a,
                label_b,
                ratio.f,
                DegreesOfFreedom::Pair(ratio.df_numerator, ratio.df_denominator),
                ratio.p_value,
            )
            .with_larger_variance_group(larger_label),
        );
    }

    let p_values: Vec<f64> = comparisons.iter().map(|c| c.p_value).collect();
    let adjusted = correction.apply(&p_values)?;

    Ok(comparisons
        .into_iter()
        .zip(adjusted)
        .map(|(comparison, adjusted)| {
            let comparison = match correction {
                Correction::None => comparison,
                _ => comparison.with_adjusted_p_value(adjusted),
            };
            let significant = comparison.decision_p_value() < alpha;
            comparison.with_significance(significant)
        })
        .collect())
}
