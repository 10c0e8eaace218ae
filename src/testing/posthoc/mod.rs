//! Pairwise mean comparisons after a significant one-way ANOVA.
//!
//! [`TukeyHsd`] controls the family-wise error rate across all
//! `k * (k - 1) / 2` pairs through the studentized range distribution,
//! using the Tukey-Kramer standard error for unequal group sizes.

use crate::data::GroupedSeries;
use crate::error::{Result, StatsError};
use crate::testing::distribution::{ptukey_upper, qtukey};
use crate::testing::effect::cohens_d;
use crate::testing::inference::{AnovaResult, validate_alpha};
use crate::testing::utils::unordered_pairs;
use crate::testing::{DegreesOfFreedom, PairwiseComparison};
use log::debug;

/// A post-hoc procedure run on the groups of a completed omnibus ANOVA.
pub trait PostHocAnalyzer {
    fn name(&self) -> &'static str;

    fn compare(
        &self,
        grouped: &GroupedSeries,
        anova: &AnovaResult,
    ) -> Result<Vec<PairwiseComparison>>;
}

#[derive(Debug, Clone, Copy)]
pub struct TukeyHsd {
    pub alpha: f64,
}

impl Default for TukeyHsd {
    fn default() -> Self {
        TukeyHsd {
            alpha: crate::testing::DEFAULT_ALPHA,
        }
    }
}

impl TukeyHsd {
    pub fn new(alpha: f64) -> Self {
        TukeyHsd { alpha }
    }
}

/// Harmonic mean of two group sizes, `2 / (1/n_a + 1/n_b)`.
pub fn harmonic_pair_size(n_a: usize, n_b: usize) -> f64 {
    2.0 / (1.0 / n_a as f64 + 1.0 / n_b as f64)
}

impl PostHocAnalyzer for TukeyHsd {
    fn name(&self) -> &'static str {
        "Tukey HSD"
    }

    fn compare(
        &self,
        grouped: &GroupedSeries,
        anova: &AnovaResult,
    ) -> Result<Vec<PairwiseComparison>> {
        validate_alpha(self.alpha)?;

        let table = &anova.table;
        if table.groups.len() != grouped.len() {
            return Err(StatsError::InvalidParameter(format!(
                "ANOVA covers {} groups but {} were supplied",
                table.groups.len(),
                grouped.len()
            )));
        }

        let k = table.groups.len() as f64;
        let df = table.df_within as f64;
        let mse = table.ms_within;
        let q_critical = qtukey(1.0 - self.alpha, k, df)?;
        debug!(
            "tukey hsd: k={} df={} mse={:.4} q_crit={:.4}",
            k, df, mse, q_critical
        );

        let samples: Vec<&[f64]> = grouped.iter().map(|(_, s)| s.values()).collect();
        let mut comparisons = Vec::new();
        for (i, j) in unordered_pairs(table.groups.len()) {
            let a = &table.groups[i];
            let b = &table.groups[j];

            let difference = b.mean - a.mean;
            let std_error = (mse / harmonic_pair_size(a.count, b.count)).sqrt();
            let q = difference.abs() / std_error;
            let p_value = ptukey_upper(q, k, df)?;
            let margin = q_critical * std_error;

            let mut comparison = PairwiseComparison::new(
                &a.label,
                &b.label,
                q,
                DegreesOfFreedom::Pair(k, df),
                p_value,
            )
            .with_mean_difference(difference)
            .with_confidence_interval(difference - margin, difference + margin)
            .with_significance(q > q_critical);

            // effect size is informative only; a degenerate pair does not void the row
            if let Ok(d) = cohens_d(samples[i], samples[j]) {
                comparison = comparison.with_effect_size(d);
            }
            comparisons.push(comparison);
        }

        Ok(comparisons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::inference::one_way_anova;
    use approx::assert_abs_diff_eq;

    fn three_groups() -> GroupedSeries {
        GroupedSeries::from_groups(
            "income",
            "kind",
            vec![
                ("a", vec![90.0, 95.0, 100.0, 105.0, 110.0]),
                ("b", vec![95.0, 100.0, 105.0, 110.0, 115.0]),
                ("c", vec![290.0, 295.0, 300.0, 305.0, 310.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn harmonic_size_of_equal_groups() {
        assert_abs_diff_eq!(harmonic_pair_size(5, 5), 5.0);
        assert_abs_diff_eq!(harmonic_pair_size(2, 6), 3.0);
    }

    #[test]
    fn tukey_separates_outlying_group() {
        let grouped = three_groups();
        let anova = one_way_anova(&grouped, 0.05).unwrap();
        assert_abs_diff_eq!(anova.table.ms_within, 62.5, epsilon = 1e-9);

        let rows = TukeyHsd::new(0.05).compare(&grouped, &anova).unwrap();
        assert_eq!(rows.len(), 3);

        let ab = &rows[0];
        assert_eq!((ab.group_a.as_str(), ab.group_b.as_str()), ("a", "b"));
        assert_abs_diff_eq!(ab.statistic, 2.0_f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(ab.p_value, 0.5907706083, epsilon = 1e-5);
        assert!(!ab.significant);
        assert_abs_diff_eq!(ab.mean_difference.unwrap(), 5.0, epsilon = 1e-9);

        let (lo, hi) = ab.confidence_interval.unwrap();
        let half_width = 3.772929 * 12.5_f64.sqrt();
        assert_abs_diff_eq!(lo, 5.0 - half_width, epsilon = 1e-3);
        assert_abs_diff_eq!(hi, 5.0 + half_width, epsilon = 1e-3);

        assert!(rows[1].significant);
        assert!(rows[2].significant);
        assert!(rows[1].p_value < 1e-6);
    }

    #[test]
    fn unequal_sizes_use_the_harmonic_standard_error() {
        // sizes 4, 6 and 5: df = 12, MSE = 14 / 12
        const Q_CRIT: f64 = 3.772929; // studentized range, 95%, k = 3, df = 12
        let se = (14.0 / 12.0 / harmonic_pair_size(4, 6)).sqrt();
        let shift = Q_CRIT * se;
        let grouped = GroupedSeries::from_groups(
            "income",
            "kind",
            vec![
                ("a", vec![9.0, 11.0, 9.0, 11.0]),
                (
                    "b",
                    [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]
                        .iter()
                        .map(|d| 10.0 + shift + d)
                        .collect(),
                ),
                ("c", vec![29.0, 31.0, 30.0, 29.0, 31.0]),
            ],
        )
        .unwrap();
        let anova = one_way_anova(&grouped, 0.05).unwrap();
        assert_eq!(anova.table.df_within, 12);
        assert_abs_diff_eq!(anova.table.ms_within, 14.0 / 12.0, epsilon = 1e-9);

        let rows = TukeyHsd::new(0.05).compare(&grouped, &anova).unwrap();
        let ab = &rows[0];
        assert_eq!(ab.degrees_of_freedom, DegreesOfFreedom::Pair(3.0, 12.0));
        assert_abs_diff_eq!(se, (35.0_f64 / 144.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(ab.statistic, Q_CRIT, epsilon = 1e-9);
        // sitting on the critical value: p = alpha and the interval touches zero
        assert_abs_diff_eq!(ab.p_value, 0.05, epsilon = 1e-4);
        let (lo, hi) = ab.confidence_interval.unwrap();
        assert_abs_diff_eq!(lo, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(hi, 2.0 * shift, epsilon = 1e-3);

        let bc = &rows[2];
        assert_abs_diff_eq!(bc.mean_difference.unwrap(), 20.0 - shift, epsilon = 1e-9);
        assert!(bc.significant);
    }
}
