//! Shapiro-Wilk test for normality, following Royston's algorithm AS R94:
//! approximate coefficients from Blom scores with polynomial corrections for
//! the extreme pair(s), and a normalising transformation of `1 - W` for the
//! p-value. The p-value for `n = 3` is exact.

use crate::descriptive::is_constant;
use crate::error::{Result, StatsError};
use crate::testing::TestKind;
use crate::testing::distribution::standard_normal;
use crate::testing::inference::{HypothesisTest, Outcome};
use log::debug;
use statrs::distribution::ContinuousCDF;
use std::cmp::Ordering;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

pub const MIN_SAMPLE: usize = 3;
pub const MAX_SAMPLE: usize = 5000;

// Polynomial coefficients, lowest order first.
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    pub w: f64,
    pub p_value: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShapiroWilkTest;

impl HypothesisTest<[f64]> for ShapiroWilkTest {
    fn kind(&self) -> TestKind {
        TestKind::Normality
    }

    fn compute(&self, input: &[f64]) -> Result<Outcome> {
        let sw = shapiro_wilk(input)?;
        Ok(Outcome::new(sw.w, sw.p_value).with_metadata("n", sw.n as f64))
    }
}

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Shapiro-Wilk test of `values`.
///
/// # Arguments
///
/// * `values` - Sample of size `3 <= n <= 5000`, in any order
///
/// # Returns
///
/// `ShapiroWilk` with the W statistic and its p-value. Small W means
/// departure from normality.
pub fn shapiro_wilk(values: &[f64]) -> Result<ShapiroWilk> {
    let n = values.len();
    if n < MIN_SAMPLE {
        return Err(StatsError::InsufficientObservations {
            required: MIN_SAMPLE,
            actual: n,
        });
    }
    if n > MAX_SAMPLE {
        return Err(StatsError::InvalidParameter(format!(
            "Shapiro-Wilk supports at most {} observations, got {}",
            MAX_SAMPLE, n
        )));
    }
    if is_constant(values) {
        return Err(StatsError::zero_variance("Shapiro-Wilk on a constant sample"));
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|&v| (v - mean).powi(2)).sum();

    let half = n / 2;
    let a = coefficients(n)?;
    let numerator: f64 = (0..half).map(|i| a[i] * (x[n - 1 - i] - x[i])).sum();
    let w = ((numerator * numerator) / ss).min(1.0);

    let p_value = p_value(w, n)?;
    debug!("shapiro-wilk: n={} W={:.6} p={:.6}", n, w, p_value);

    Ok(ShapiroWilk {
        w,
        p_value: p_value.clamp(0.0, 1.0),
        n,
    })
}

// Antisymmetric coefficients a_1..a_{n/2} for the upper half of the order statistics.
fn coefficients(n: usize) -> Result<Vec<f64>> {
    let half = n / 2;
    if n == 3 {
        return Ok(vec![FRAC_1_SQRT_2]);
    }

    let normal = standard_normal()?;
    let nf = n as f64;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    let mut a = vec![0.0; half];
    a[0] = a1;

    let (first_plain, fac_sq, denom) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        (
            2,
            summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1],
            1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2,
        )
    } else {
        (1, summ2 - 2.0 * m[0] * m[0], 1.0 - 2.0 * a1 * a1)
    };

    if fac_sq <= 0.0 || denom <= 0.0 {
        return Err(StatsError::InvalidParameter(format!(
            "Shapiro-Wilk coefficients undefined for n = {}",
            n
        )));
    }
    let fac = (fac_sq / denom).sqrt();
    for i in first_plain..half {
        a[i] = -m[i] / fac;
    }
    Ok(a)
}

fn p_value(w: f64, n: usize) -> Result<f64> {
    if n == 3 {
        return Ok((6.0 / PI * (w.sqrt().asin() - PI / 3.0)).max(0.0));
    }

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return Ok(1.0);
    }

    let nf = n as f64;
    let mut y = w1.ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, nf);
        if y >= gamma {
            return Ok(0.0);
        }
        y = -(gamma - y).ln();
        (poly(&C3, nf), poly(&C4, nf).exp())
    } else {
        let ln_n = nf.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    Ok(standard_normal()?.sf((y - m) / s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn horner_evaluation() {
        assert_abs_diff_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }

    #[test]
    fn coefficients_are_normalised() {
        for n in [4, 5, 6, 10, 25, 101] {
            let a = coefficients(n).unwrap();
            let sum_sq: f64 = 2.0 * a.iter().map(|v| v * v).sum::<f64>();
            assert_abs_diff_eq!(sum_sq, 1.0, epsilon = 1e-10);
            assert!(a.windows(2).all(|w| w[0] >= w[1]), "n={}: {:?}", n, a);
        }
    }
}
