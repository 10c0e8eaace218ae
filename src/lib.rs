//! # municipal-statistics
//!
//! Statistical analysis of a municipal indicators dataset: income and schooling
//! per municipality, split by municipality type.
//!
//! The crate loads a CSV table, derives numeric series and per-group partitions,
//! and runs a fixed battery of analyses on them. Every statistic is returned as
//! a typed result value; statistics that cannot be computed on the data surface
//! as [`error::StatsError`] instead of NaN.
//!
//! ## Core Features
//!
//! - **Descriptive statistics**: moments, quartiles, coefficient of variation, skewness and kurtosis
//! - **Hypothesis tests**: Shapiro-Wilk, Wald-Wolfowitz runs test, pairwise F-tests, one-way ANOVA
//! - **Post-hoc comparisons**: Tukey HSD, gated on a significant omnibus ANOVA
//! - **Regression**: OLS with a factor-by-covariate interaction, Pearson correlation
//! - **Multiple Testing Correction**: Bonferroni, Holm and Benjamini-Hochberg
//!
//! ## Quick Start
//!
//! Load a [`data::Dataset`], then pass it with an [`config::AnalysisConfig`] to
//! [`analysis::run_analysis`]. The resulting report can be rendered with
//! [`report::render_text`] or written out as CSV sheets and JSON.
//!
//! ## Module Organization
//!
//! - **[`data`]**: CSV loading, column selection and group partitioning
//! - **[`descriptive`]**: Summary and shape statistics
//! - **[`testing`]**: Statistical tests, post-hoc analysis, regression and corrections
//! - **[`analysis`]**: The full analysis run and the ANOVA workflow
//! - **[`report`]**: Text, CSV and JSON output

pub mod analysis;
pub mod config;
pub mod data;
pub mod descriptive;
pub mod error;
pub mod report;
pub mod testing;

pub use error::{Result, StatsError};
