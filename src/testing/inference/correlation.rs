use crate::descriptive::is_constant;
use crate::error::{Result, StatsError};
use crate::testing::inference::{HypothesisTest, Outcome};
use crate::testing::utils::slice_mean;
use crate::testing::{DegreesOfFreedom, TestKind};
use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Pearson correlation plus the least-squares trend line of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub r: f64,
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonCorrelation;

impl<'a> HypothesisTest<(&'a [f64], &'a [f64])> for PearsonCorrelation {
    fn kind(&self) -> TestKind {
        TestKind::Correlation
    }

    fn compute(&self, input: &(&'a [f64], &'a [f64])) -> Result<Outcome> {
        let c = pearson_correlation(input.0, input.1)?;
        Ok(Outcome::new(c.r, c.p_value)
            .with_degrees_of_freedom(DegreesOfFreedom::One(c.df))
            .with_metadata("t", c.t)
            .with_metadata("slope", c.slope)
            .with_metadata("intercept", c.intercept))
    }
}

/// Pearson correlation between paired samples.
///
/// # Arguments
///
/// * `x` - Predictor values
/// * `y` - Response values, paired with `x` by position
///
/// # Returns
///
/// `r`, its t statistic on `n - 2` degrees of freedom with a two-sided
/// p-value, and the least-squares trend line `y = intercept + slope * x`.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Result<Correlation> {
    if x.len() != y.len() {
        return Err(StatsError::InvalidParameter(format!(
            "paired samples differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Err(StatsError::InsufficientObservations {
            required: 3,
            actual: n,
        });
    }
    if is_constant(x) || is_constant(y) {
        return Err(StatsError::zero_variance("correlation with a constant variable"));
    }

    let mean_x = slice_mean(x);
    let mean_y = slice_mean(y);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let (t, p_value) = if (1.0 - r * r) <= f64::EPSILON {
        (f64::INFINITY.copysign(r), 0.0)
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
        (t, (2.0 * dist.sf(t.abs())).min(1.0))
    };
    debug!("pearson: n={} r={:.4} t={:.4} p={:.6}", n, r, t, p_value);

    Ok(Correlation {
        r,
        t,
        df,
        p_value,
        n,
        slope,
        intercept,
    })
}
