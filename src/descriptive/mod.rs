//! Descriptive statistics for a single sample or for every group of a
//! [`GroupedSeries`].
//!
//! Variances use Bessel's correction (divisor `n - 1`) since they feed the
//! inferential tests. Shape statistics (skewness, kurtosis) are the
//! population moments, with kurtosis reported as excess kurtosis.

use crate::data::GroupedSeries;
use crate::error::{Result, StatsError};
use serde::Serialize;
use single_utilities::traits::FloatOps;
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample variance (divisor `n - 1`).
    pub variance: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    /// `std / mean * 100`; `None` when the mean is zero.
    pub coefficient_of_variation: Option<f64>,
}

impl Summary {
    pub fn quantile(&self, q: f64) -> Option<f64> {
        match q {
            q if q == 0.0 => Some(self.min),
            q if q == 0.25 => Some(self.q25),
            q if q == 0.5 => Some(self.median),
            q if q == 0.75 => Some(self.q75),
            q if q == 1.0 => Some(self.max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shape {
    pub skewness: f64,
    /// Excess kurtosis: 0 for a normal distribution.
    pub kurtosis: f64,
}

pub(crate) fn to_f64_values<T>(values: &[T]) -> Vec<f64>
where
    T: FloatOps,
{
    values
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .collect()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

// Linear interpolation between order statistics; `sorted` must be non-empty.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance with divisor `n - 1`.
///
/// Exactly zero when every value is identical.
pub fn variance(values: &[f64]) -> Result<f64> {
    let n = values.len();
    if n < 2 {
        return Err(StatsError::DegenerateSample { count: n });
    }
    if is_constant(values) {
        return Ok(0.0);
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|&x| (x - m).powi(2)).sum();
    Ok(ss / (n - 1) as f64)
}

pub(crate) fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Quantile `q` in `[0, 1]` using linear interpolation.
pub fn quantile<T>(values: &[T], q: f64) -> Result<f64>
where
    T: FloatOps,
{
    if !(0.0..=1.0).contains(&q) {
        return Err(StatsError::InvalidParameter(format!(
            "quantile must lie in [0, 1], got {}",
            q
        )));
    }
    let values = to_f64_values(values);
    if values.is_empty() {
        return Err(StatsError::EmptySeries {
            column: "sample".to_string(),
        });
    }
    Ok(quantile_sorted(&sorted(&values), q))
}

/// Median as the 0.5 quantile (mean of the middle pair for even `n`).
pub fn median(values: &[f64]) -> Result<f64> {
    quantile(values, 0.5)
}

/// Count, moments, extremes, quartiles and coefficient of variation.
///
/// Fails with [`StatsError::DegenerateSample`] below two values: the standard
/// deviation of a single value is undefined, not zero.
pub fn summarize<T>(values: &[T]) -> Result<Summary>
where
    T: FloatOps,
{
    let values = to_f64_values(values);
    let count = values.len();
    if count == 0 {
        return Err(StatsError::EmptySeries {
            column: "sample".to_string(),
        });
    }
    if count < 2 {
        return Err(StatsError::DegenerateSample { count });
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = variance(&values)?;
    let std = variance.sqrt();
    let sorted = sorted(&values);

    let coefficient_of_variation = if mean != 0.0 {
        Some(std / mean * 100.0)
    } else {
        None
    };

    Ok(Summary {
        count,
        mean,
        variance,
        std,
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[count - 1],
        coefficient_of_variation,
    })
}

/// Per-group summaries keyed by group label.
pub fn summarize_groups(grouped: &GroupedSeries) -> Result<BTreeMap<String, Summary>> {
    grouped
        .iter()
        .map(|(label, series)| Ok((label.to_string(), summarize(series.values())?)))
        .collect()
}

fn central_moments(values: &[f64]) -> Result<(f64, f64, f64)> {
    let n = values.len();
    if n < 2 {
        return Err(StatsError::DegenerateSample { count: n });
    }
    if is_constant(values) {
        return Err(StatsError::zero_variance("shape moments of a constant sample"));
    }
    let nf = n as f64;
    let m = values.iter().sum::<f64>() / nf;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &x in values {
        let d = x - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Ok((m2 / nf, m3 / nf, m4 / nf))
}

/// Population skewness `m3 / m2^1.5`.
pub fn skewness<T>(values: &[T]) -> Result<f64>
where
    T: FloatOps,
{
    let (m2, m3, _) = central_moments(&to_f64_values(values))?;
    Ok(m3 / m2.powf(1.5))
}

/// Population excess kurtosis `m4 / m2² - 3`.
pub fn kurtosis<T>(values: &[T]) -> Result<f64>
where
    T: FloatOps,
{
    let (m2, _, m4) = central_moments(&to_f64_values(values))?;
    Ok(m4 / (m2 * m2) - 3.0)
}

pub fn shape<T>(values: &[T]) -> Result<Shape>
where
    T: FloatOps,
{
    let (m2, m3, m4) = central_moments(&to_f64_values(values))?;
    Ok(Shape {
        skewness: m3 / m2.powf(1.5),
        kurtosis: m4 / (m2 * m2) - 3.0,
    })
}

/// Normal-approximation interval `mean ± z * std / sqrt(n)` at the given level.
pub fn mean_confidence_interval<T>(values: &[T], level: f64) -> Result<(f64, f64)>
where
    T: FloatOps,
{
    if !(level > 0.0 && level < 1.0) {
        return Err(StatsError::InvalidParameter(format!(
            "confidence level must lie in (0, 1), got {}",
            level
        )));
    }
    let summary = summarize(values)?;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    let z = normal.inverse_cdf(0.5 + level / 2.0);
    let half_width = z * summary.std / (summary.count as f64).sqrt();
    Ok((summary.mean - half_width, summary.mean + half_width))
}
