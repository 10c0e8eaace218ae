//! Ordinary least squares with a categorical factor and its interaction
//! with a continuous predictor:
//!
//! `y ~ 1 + x + group + x:group`
//!
//! The first factor level in sorted order is the reference; every other level
//! contributes a dummy column and an `x * dummy` column.

use crate::data::Observations;
use crate::error::{Result, StatsError};
use crate::testing::inference::{HypothesisTest, Outcome};
use crate::testing::utils::slice_mean;
use crate::testing::{DegreesOfFreedom, TestKind, TestResult};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionFit {
    pub response: String,
    pub reference_level: String,
    pub coefficients: Vec<Coefficient>,
    pub n: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_df: usize,
    pub residual_std_error: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
}

impl RegressionFit {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    fn outcome(&self) -> Outcome {
        let model_df = (self.coefficients.len() - 1) as f64;
        Outcome::new(self.f_statistic, self.f_p_value)
            .with_degrees_of_freedom(DegreesOfFreedom::Pair(model_df, self.residual_df as f64))
            .with_metadata("r_squared", self.r_squared)
            .with_metadata("adj_r_squared", self.adj_r_squared)
    }

    /// Decision on the overall F-test at `alpha`.
    pub fn test_result(&self, alpha: f64) -> TestResult {
        self.outcome().into_result(TestKind::Regression, alpha)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionRegression;

impl HypothesisTest<Observations> for InteractionRegression {
    fn kind(&self) -> TestKind {
        TestKind::Regression
    }

    fn compute(&self, input: &Observations) -> Result<Outcome> {
        Ok(interaction_regression(input)?.outcome())
    }
}

/// Column names in design-matrix order.
pub fn design_columns(x_name: &str, group_name: &str, levels: &[&str]) -> Vec<String> {
    let mut names = vec!["Intercept".to_string(), x_name.to_string()];
    for level in levels.iter().skip(1) {
        names.push(format!("{}[T.{}]", group_name, level));
    }
    for level in levels.iter().skip(1) {
        names.push(format!("{}:{}[T.{}]", x_name, group_name, level));
    }
    names
}

fn design_matrix(obs: &Observations, levels: &[&str]) -> DMatrix<f64> {
    let dummies = levels.len() - 1;
    let p = 2 + 2 * dummies;
    DMatrix::from_fn(obs.len(), p, |row, col| {
        let x = obs.x[row];
        match col {
            0 => 1.0,
            1 => x,
            c if c < 2 + dummies => {
                if obs.groups[row] == levels[c - 1] { 1.0 } else { 0.0 }
            }
            c => {
                if obs.groups[row] == levels[c - 1 - dummies] { x } else { 0.0 }
            }
        }
    })
}

fn has_spread(obs: &Observations, level: &str) -> bool {
    let mut xs = obs
        .x
        .iter()
        .zip(&obs.groups)
        .filter(|(_, group)| group.as_str() == level)
        .map(|(x, _)| *x);
    match xs.next() {
        Some(first) => xs.any(|x| x != first),
        None => false,
    }
}

/// Fit `y ~ x * group` by least squares.
///
/// # Arguments
///
/// * `obs` - Complete (x, y, group) rows
///
/// # Returns
///
/// The fitted coefficients with standard errors, t statistics and two-sided
/// p-values, plus R², adjusted R² and the overall F-test. Fails with
/// `SingularDesign` when the design matrix is rank deficient, including a
/// level whose rows all share one x value.
pub fn interaction_regression(obs: &Observations) -> Result<RegressionFit> {
    let levels = obs.levels();
    if levels.len() < 2 {
        return Err(StatsError::InsufficientGroups {
            required: 2,
            found: levels.len(),
        });
    }

    let n = obs.len();
    let names = design_columns(&obs.x_name, &obs.group_name, &levels);
    let p = names.len();
    if n <= p {
        return Err(StatsError::InsufficientObservations {
            required: p + 1,
            actual: n,
        });
    }

    // every level gets its own intercept and slope
    if let Some(level) = levels.iter().find(|level| !has_spread(obs, level)) {
        debug!("ols: level '{}' has a single distinct x value", level);
        return Err(StatsError::SingularDesign);
    }

    let x = design_matrix(obs, &levels);
    let y = DVector::from_column_slice(&obs.y);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;
    let diagonal = xtx.diagonal();
    let cholesky = xtx.cholesky().ok_or(StatsError::SingularDesign)?;
    // L_jj^2 is the part of column j not explained by the earlier columns
    let pivots = cholesky.l_dirty().diagonal();
    if pivots
        .iter()
        .zip(diagonal.iter())
        .any(|(l, d)| !l.is_finite() || l * l <= RANK_TOLERANCE * d)
    {
        return Err(StatsError::SingularDesign);
    }
    let beta = cholesky.solve(&xty);
    let xtx_inv = cholesky.inverse();

    let fitted = &x * &beta;
    let residuals = &y - fitted;
    let sse = residuals.norm_squared();
    let mean_y = slice_mean(&obs.y);
    let sst: f64 = obs.y.iter().map(|v| (v - mean_y).powi(2)).sum();
    if sst <= 0.0 {
        return Err(StatsError::zero_variance("regression with a constant response"));
    }

    let residual_df = n - p;
    let model_df = p - 1;
    let sigma2 = sse / residual_df as f64;
    let r_squared = 1.0 - sse / sst;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / residual_df as f64;

    let t_dist = StudentsT::new(0.0, 1.0, residual_df as f64)
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    let coefficients = names
        .into_iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
            let (t, p_value) = if std_error > 0.0 {
                let t = estimate / std_error;
                (t, (2.0 * t_dist.sf(t.abs())).min(1.0))
            } else {
                (f64::INFINITY.copysign(estimate), 0.0)
            };
            debug!(
                "ols: {} = {:.6} (se {:.6}, t {:.4}, p {:.6})",
                name, estimate, std_error, t, p_value
            );
            Coefficient {
                name,
                estimate,
                std_error,
                t,
                p_value,
            }
        })
        .collect();

    let (f_statistic, f_p_value) = if sse > 0.0 {
        let f = ((sst - sse) / model_df as f64) / sigma2;
        let dist = FisherSnedecor::new(model_df as f64, residual_df as f64)
            .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
        (f, dist.sf(f).clamp(0.0, 1.0))
    } else {
        (f64::INFINITY, 0.0)
    };

    Ok(RegressionFit {
        response: obs.y_name.clone(),
        reference_level: levels[0].to_string(),
        coefficients,
        n,
        r_squared,
        adj_r_squared,
        residual_df,
        residual_std_error: sigma2.sqrt(),
        f_statistic,
        f_p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn column_names_follow_formula_order() {
        let names = design_columns("school", "kind", &["rural", "semi", "urban"]);
        assert_eq!(
            names,
            vec![
                "Intercept",
                "school",
                "kind[T.semi]",
                "kind[T.urban]",
                "school:kind[T.semi]",
                "school:kind[T.urban]",
            ]
        );
    }

    #[test]
    fn recovers_separate_lines_per_group() {
        // rural: y = 1 + 2x, urban: y = 4 + 5x, plus a small alternating perturbation
        let mut obs = Observations::empty("x", "y", "kind");
        for (i, x) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
            let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
            obs.push(*x, 1.0 + 2.0 * x + noise, "rural");
            obs.push(*x, 4.0 + 5.0 * x - noise, "urban");
        }

        let fit = interaction_regression(&obs).unwrap();
        assert_eq!(fit.reference_level, "rural");
        assert_eq!(fit.residual_df, 8);
        assert_abs_diff_eq!(fit.coefficient("Intercept").unwrap().estimate, 1.0, epsilon = 0.05);
        assert_abs_diff_eq!(fit.coefficient("x").unwrap().estimate, 2.0, epsilon = 0.01);
        assert_abs_diff_eq!(fit.coefficient("kind[T.urban]").unwrap().estimate, 3.0, epsilon = 0.1);
        assert_abs_diff_eq!(
            fit.coefficient("x:kind[T.urban]").unwrap().estimate,
            3.0,
            epsilon = 0.02
        );
        assert!(fit.r_squared > 0.999);
        assert!(fit.f_p_value < 1e-6);
    }

    #[test]
    fn collinear_design_is_singular() {
        // every x identical, so x is collinear with the intercept
        let mut obs = Observations::empty("x", "y", "kind");
        for (i, y) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
            obs.push(2.0, *y, if i < 3 { "a" } else { "b" });
        }
        assert!(matches!(
            interaction_regression(&obs),
            Err(StatsError::SingularDesign)
        ));
    }

    #[test]
    fn level_with_one_x_value_is_singular() {
        // "b" has a single row, so its intercept and slope cannot both be fitted
        let mut obs = Observations::empty("x", "y", "k");
        for (x, y) in [(1.0, 2.1), (2.0, 3.9), (3.0, 6.2), (4.0, 7.8), (5.0, 10.1), (6.0, 12.0)] {
            obs.push(x, y, "a");
        }
        obs.push(0.3, 4.0, "b");
        assert!(matches!(
            interaction_regression(&obs),
            Err(StatsError::SingularDesign)
        ));

        obs.push(0.3, 4.5, "b");
        assert!(matches!(
            interaction_regression(&obs),
            Err(StatsError::SingularDesign)
        ));

        obs.push(1.3, 5.0, "b");
        let fit = interaction_regression(&obs).unwrap();
        assert!(fit.coefficients.iter().all(|c| c.std_error.is_finite()));
        assert!(fit.coefficient("x:k[T.b]").unwrap().std_error < 10.0);
    }

    #[test]
    fn needs_more_rows_than_parameters() {
        let mut obs = Observations::empty("x", "y", "kind");
        obs.push(1.0, 1.0, "a");
        obs.push(2.0, 3.0, "a");
        obs.push(1.0, 2.0, "b");
        obs.push(3.0, 1.0, "b");
        assert!(matches!(
            interaction_regression(&obs),
            Err(StatsError::InsufficientObservations { required: 5, actual: 4 })
        ));
    }
}
