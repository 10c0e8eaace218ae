//! One-way analysis of variance across the groups of a [`GroupedSeries`].

use crate::data::GroupedSeries;
use crate::error::{Result, StatsError};
use crate::testing::effect::{eta_squared, omega_squared};
use crate::testing::inference::{HypothesisTest, Outcome, validate_alpha};
use crate::testing::utils::order_invariant_sum;
use crate::testing::{DegreesOfFreedom, TestKind, TestResult};
use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMoments {
    pub label: String,
    pub count: usize,
    pub mean: f64,
}

/// The classical ANOVA table plus effect sizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaTable {
    pub groups: Vec<GroupMoments>,
    pub grand_mean: f64,
    pub total_count: usize,
    pub ss_between: f64,
    pub ss_within: f64,
    pub ss_total: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub ms_between: f64,
    pub ms_within: f64,
    pub f_statistic: f64,
    pub p_value: f64,
    pub eta_squared: f64,
    pub omega_squared: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnovaResult {
    pub table: AnovaTable,
    pub result: TestResult,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OneWayAnova;

impl HypothesisTest<GroupedSeries> for OneWayAnova {
    fn kind(&self) -> TestKind {
        TestKind::OneWayAnova
    }

    fn compute(&self, input: &GroupedSeries) -> Result<Outcome> {
        let table = anova_table(input)?;
        Ok(outcome_from_table(&table))
    }
}

fn outcome_from_table(table: &AnovaTable) -> Outcome {
    Outcome::new(table.f_statistic, table.p_value)
        .with_degrees_of_freedom(DegreesOfFreedom::Pair(
            table.df_between as f64,
            table.df_within as f64,
        ))
        .with_metadata("ss_between", table.ss_between)
        .with_metadata("ss_within", table.ss_within)
        .with_metadata("ms_between", table.ms_between)
        .with_metadata("ms_within", table.ms_within)
        .with_metadata("eta_squared", table.eta_squared)
        .with_metadata("omega_squared", table.omega_squared)
}

/// Sums of squares, F statistic and upper-tail p-value.
///
/// Sums are accumulated in sorted order within each group, so permuting rows
/// inside a group leaves every figure bit-for-bit unchanged.
pub fn anova_table(grouped: &GroupedSeries) -> Result<AnovaTable> {
    let k = grouped.len();
    if k < 2 {
        return Err(StatsError::InsufficientGroups {
            required: 2,
            found: k,
        });
    }
    let total_count = grouped.total_count();
    if total_count <= k {
        return Err(StatsError::InsufficientObservations {
            required: k + 1,
            actual: total_count,
        });
    }

    let groups: Vec<GroupMoments> = grouped
        .iter()
        .map(|(label, series)| GroupMoments {
            label: label.to_string(),
            count: series.len(),
            mean: order_invariant_sum(series.values()) / series.len() as f64,
        })
        .collect();

    let grand_total: f64 = grouped
        .iter()
        .map(|(_, series)| order_invariant_sum(series.values()))
        .sum();
    let grand_mean = grand_total / total_count as f64;

    let ss_between: f64 = groups
        .iter()
        .map(|g| g.count as f64 * (g.mean - grand_mean).powi(2))
        .sum();

    let ss_within: f64 = grouped
        .iter()
        .zip(&groups)
        .map(|((_, series), g)| {
            let squared: Vec<f64> = series.values().iter().map(|&x| (x - g.mean).powi(2)).collect();
            order_invariant_sum(&squared)
        })
        .sum();

    if ss_within <= 0.0 {
        return Err(StatsError::zero_variance(
            "ANOVA with no within-group variation",
        ));
    }

    let df_between = k - 1;
    let df_within = total_count - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;
    let f_statistic = ms_between / ms_within;

    let dist = FisherSnedecor::new(df_between as f64, df_within as f64)
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    let p_value = dist.sf(f_statistic).clamp(0.0, 1.0);

    debug!(
        "anova: k={} N={} SSB={:.4} SSW={:.4} F={:.4} p={:.6}",
        k, total_count, ss_between, ss_within, f_statistic, p_value
    );

    Ok(AnovaTable {
        groups,
        grand_mean,
        total_count,
        ss_between,
        ss_within,
        ss_total: ss_between + ss_within,
        df_between,
        df_within,
        ms_between,
        ms_within,
        f_statistic,
        p_value,
        eta_squared: eta_squared(ss_between, ss_within),
        omega_squared: omega_squared(
            ss_between,
            ss_within,
            df_between as f64,
            df_within as f64,
        ),
    })
}

/// One-way ANOVA with the decision at `alpha`.
///
/// # Arguments
///
/// * `grouped` - At least two groups with at least one observation each
/// * `alpha` - Significance level in (0, 1)
///
/// # Returns
///
/// The full `AnovaTable` and a `TestResult` carrying F, its upper-tail
/// p-value and `(k - 1, N - k)` degrees of freedom.
pub fn one_way_anova(grouped: &GroupedSeries, alpha: f64) -> Result<AnovaResult> {
    validate_alpha(alpha)?;
    let table = anova_table(grouped)?;
    let result = outcome_from_table(&table).into_result(TestKind::OneWayAnova, alpha);
    Ok(AnovaResult { table, result })
}
