use crate::error::{Result, StatsError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Multiple-comparison corrections applied to a family of pairwise p-values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    /// Raw p-values, no adjustment.
    None,
    Bonferroni,
    /// Holm's step-down procedure.
    #[default]
    Holm,
    /// Benjamini-Hochberg false discovery rate.
    #[value(name = "benjamini_hochberg", alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
}

impl Correction {
    pub fn name(self) -> &'static str {
        match self {
            Correction::None => "none",
            Correction::Bonferroni => "Bonferroni",
            Correction::Holm => "Holm",
            Correction::BenjaminiHochberg => "Benjamini-Hochberg",
        }
    }

    /// Adjusted p-values in the same order as `p_values`.
    pub fn apply(self, p_values: &[f64]) -> Result<Vec<f64>> {
        match self {
            Correction::None => {
                validate(p_values)?;
                Ok(p_values.to_vec())
            }
            Correction::Bonferroni => bonferroni_correction(p_values),
            Correction::Holm => holm_bonferroni_correction(p_values),
            Correction::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        }
    }
}

fn validate(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(StatsError::InvalidParameter("empty p-value array".to_string()));
    }
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(StatsError::InvalidParameter(format!(
                "invalid p-value at index {}: {}",
                i, p
            )));
        }
    }
    Ok(())
}

fn ascending_order(p_values: &[f64]) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = p_values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    indexed
}

/// Multiply each p-value by the number of tests, capping at 1.
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Holm's step-down method, controlling the family-wise error rate.
///
/// The i-th smallest p-value (0-based) is multiplied by `n - i`, and adjusted
/// values are made monotone non-decreasing in rank.
pub fn holm_bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.len();
    let mut adjusted = vec![0.0; n];
    let mut running_max: f64 = 0.0;

    for (rank, (orig_idx, p)) in ascending_order(p_values).into_iter().enumerate() {
        let value = (p * (n - rank) as f64).min(1.0);
        running_max = running_max.max(value);
        adjusted[orig_idx] = running_max;
    }
    Ok(adjusted)
}

/// Benjamini-Hochberg step-up method, controlling the false discovery rate.
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.len();
    let indexed = ascending_order(p_values);

    let mut adjusted = vec![0.0; n];
    let mut current_min: f64 = 1.0;

    // largest to smallest p-value
    for i in (0..n).rev() {
        let (orig_idx, p) = indexed[i];
        let value = (p * n as f64 / (i + 1) as f64).min(1.0);
        current_min = current_min.min(value);
        adjusted[orig_idx] = current_min;
    }
    Ok(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bonferroni_caps_at_one() {
        let adjusted = bonferroni_correction(&[0.01, 0.02, 0.5]).unwrap();
        assert_abs_diff_eq!(adjusted[0], 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[1], 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[2], 1.0);
    }

    #[test]
    fn holm_is_monotone_in_rank() {
        // ranks: 0.01 * 3 = 0.03, 0.03 * 2 = 0.06, 0.04 * 1 -> raised to 0.06
        let adjusted = holm_bonferroni_correction(&[0.04, 0.01, 0.03]).unwrap();
        assert_abs_diff_eq!(adjusted[1], 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[2], 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[0], 0.06, epsilon = 1e-12);
    }

    #[test]
    fn benjamini_hochberg_reference() {
        let adjusted = benjamini_hochberg_correction(&[0.01, 0.04, 0.03]).unwrap();
        assert_abs_diff_eq!(adjusted[0], 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[1], 0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted[2], 0.04, epsilon = 1e-12);
    }

    #[test]
    fn parses_command_line_names() {
        assert_eq!(Correction::from_str("holm", false).unwrap(), Correction::Holm);
        assert_eq!(
            Correction::from_str("benjamini_hochberg", false).unwrap(),
            Correction::BenjaminiHochberg
        );
        assert_eq!(Correction::from_str("FDR", true).unwrap(), Correction::BenjaminiHochberg);
        assert!(Correction::from_str("sidak", true).is_err());
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(bonferroni_correction(&[]).is_err());
        assert!(Correction::Holm.apply(&[0.2, 1.5]).is_err());
    }
}
