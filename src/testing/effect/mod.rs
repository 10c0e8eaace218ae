use crate::descriptive::variance;
use crate::error::{Result, StatsError};
use crate::testing::utils::slice_mean;

/// Cohen's d between two samples, `(mean2 - mean1) / pooled_sd`.
pub fn cohens_d(group1: &[f64], group2: &[f64]) -> Result<f64> {
    let n1 = group1.len() as f64;
    let n2 = group2.len() as f64;
    let var1 = variance(group1)?;
    let var2 = variance(group2)?;

    let pooled_sd = (((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / (n1 + n2 - 2.0)).sqrt();
    if pooled_sd <= 0.0 {
        return Err(StatsError::zero_variance("Cohen's d with zero pooled variance"));
    }

    Ok((slice_mean(group2) - slice_mean(group1)) / pooled_sd)
}

/// Share of total variance explained by the grouping, `SSB / SST`.
pub fn eta_squared(ss_between: f64, ss_within: f64) -> f64 {
    let ss_total = ss_between + ss_within;
    if ss_total > 0.0 { ss_between / ss_total } else { 0.0 }
}

/// Less biased variant of eta squared, floored at zero.
pub fn omega_squared(ss_between: f64, ss_within: f64, df_between: f64, df_within: f64) -> f64 {
    let ms_within = ss_within / df_within;
    let ss_total = ss_between + ss_within;
    let denom = ss_total + ms_within;
    if denom > 0.0 {
        ((ss_between - df_between * ms_within) / denom).max(0.0)
    } else {
        0.0
    }
}
