//! Presentation of an [`AnalysisReport`]: a plain-text report, tabular sheets
//! written as CSV files, and a JSON dump of the whole report.
//!
//! Rendering is read-only; nothing here recomputes a statistic.

use crate::analysis::{AnalysisReport, AnovaWorkflow, DistributionCheck, Section};
use crate::descriptive::Summary;
use crate::error::StatsError;
use crate::testing::{DegreesOfFreedom, PairwiseComparison, TestResult};
use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// One tab of tabular output.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn new(name: &str, headers: &[&str]) -> Self {
        Sheet {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

fn fmt_p(p: f64) -> String {
    if p < 1e-4 {
        format!("{:.3e}", p)
    } else {
        format!("{:.4}", p)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n=== {} ===", title);
}

fn not_applicable(out: &mut String, err: &StatsError) {
    let _ = writeln!(out, "not applicable: {}", err);
}

fn write_test(out: &mut String, result: &TestResult) {
    let _ = write!(out, "{}: statistic = {:.4}", result.kind.name(), result.statistic);
    if let Some(df) = result.degrees_of_freedom {
        let _ = write!(out, ", df = {}", df);
    }
    let _ = writeln!(out, ", p-value = {}", fmt_p(result.p_value));
    let _ = writeln!(
        out,
        "decision at alpha = {}: {:?} ({})",
        result.alpha,
        result.decision,
        result.interpretation()
    );
}

fn write_summary(out: &mut String, summary: &Summary) {
    let _ = writeln!(
        out,
        "n = {}, mean = {:.4}, variance = {:.4}, std = {:.4}",
        summary.count, summary.mean, summary.variance, summary.std
    );
    let _ = writeln!(
        out,
        "min = {:.4}, q25 = {:.4}, median = {:.4}, q75 = {:.4}, max = {:.4}",
        summary.min, summary.q25, summary.median, summary.q75, summary.max
    );
    match summary.coefficient_of_variation {
        Some(cv) => {
            let _ = writeln!(out, "coefficient of variation = {:.2}%", cv);
        }
        None => {
            let _ = writeln!(out, "coefficient of variation: undefined (zero mean)");
        }
    }
}

fn write_section<T>(out: &mut String, section: &Section<T>, body: impl FnOnce(&mut String, &T)) {
    match section {
        Ok(value) => body(out, value),
        Err(err) => not_applicable(out, err),
    }
}

fn write_distribution(out: &mut String, check: &DistributionCheck) {
    heading(out, &format!("Distribution of '{}'", check.column));
    write_section(out, &check.normality, write_test);
    write_section(out, &check.shape, |out, shape| {
        let _ = writeln!(
            out,
            "skewness = {:.4}, excess kurtosis = {:.4}",
            shape.skewness, shape.kurtosis
        );
    });
}

fn write_pairs(out: &mut String, comparisons: &[PairwiseComparison]) {
    for c in comparisons {
        let _ = write!(
            out,
            "{} vs {}: statistic = {:.4}, df = {}, p = {}",
            c.group_a,
            c.group_b,
            c.statistic,
            c.degrees_of_freedom,
            fmt_p(c.p_value)
        );
        if let Some(adjusted) = c.adjusted_p_value {
            let _ = write!(out, ", adjusted p = {}", fmt_p(adjusted));
        }
        if let Some(diff) = c.mean_difference {
            let _ = write!(out, ", mean diff = {:.4}", diff);
        }
        if let Some((lo, hi)) = c.confidence_interval {
            let _ = write!(out, ", CI = [{:.4}, {:.4}]", lo, hi);
        }
        if let Some(label) = &c.larger_variance_group {
            let _ = write!(out, ", larger variance: {}", label);
        }
        let verdict = if c.significant { "significant" } else { "not significant" };
        let _ = writeln!(out, " -> {}", verdict);
    }
}

fn write_anova(out: &mut String, workflow: &AnovaWorkflow) {
    let Some(anova) = workflow.anova() else {
        let _ = writeln!(out, "omnibus test not run");
        return;
    };
    let t = &anova.table;
    let _ = writeln!(out, "{:<10} {:>16} {:>6} {:>16}", "source", "SS", "df", "MS");
    let _ = writeln!(
        out,
        "{:<10} {:>16.4} {:>6} {:>16.4}",
        "between", t.ss_between, t.df_between, t.ms_between
    );
    let _ = writeln!(
        out,
        "{:<10} {:>16.4} {:>6} {:>16.4}",
        "within", t.ss_within, t.df_within, t.ms_within
    );
    let _ = writeln!(
        out,
        "{:<10} {:>16.4} {:>6}",
        "total",
        t.ss_total,
        t.df_between + t.df_within
    );
    let _ = writeln!(
        out,
        "eta squared = {:.4}, omega squared = {:.4}",
        t.eta_squared, t.omega_squared
    );
    write_test(out, &anova.result);

    match workflow {
        AnovaWorkflow::PosthocDone {
            analyzer,
            comparisons,
            ..
        } => {
            heading(out, analyzer);
            write_pairs(out, comparisons);
        }
        AnovaWorkflow::PosthocFailed {
            analyzer, error, ..
        } => {
            heading(out, analyzer);
            not_applicable(out, error);
        }
        _ => {
            let _ = writeln!(out, "post-hoc comparisons skipped: the omnibus test did not reject");
        }
    }
}

/// Human-readable report with one block per section.
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let config = &report.config;
    let _ = writeln!(
        out,
        "Municipal indicators analysis: {} rows, alpha = {}",
        report.row_count, config.alpha
    );

    heading(&mut out, &format!("Descriptive statistics of '{}'", config.secondary_column));
    write_section(&mut out, &report.secondary_summary, write_summary);
    heading(&mut out, &format!("Descriptive statistics of '{}'", config.value_column));
    write_section(&mut out, &report.value_summary, write_summary);

    write_distribution(&mut out, &report.secondary_distribution);
    write_distribution(&mut out, &report.value_distribution);

    heading(&mut out, &format!("Runs test on '{}'", config.secondary_column));
    write_section(&mut out, &report.runs, |out, result| {
        let meta = |key: &str| result.metadata.get(key).copied().unwrap_or(f64::NAN);
        let _ = writeln!(
            out,
            "runs = {}, at or above median = {}, below median = {}, expected = {:.4}, variance = {:.4}",
            meta("runs"),
            meta("n_a"),
            meta("n_b"),
            meta("expected_runs"),
            meta("variance")
        );
        write_test(out, result);
    });

    heading(
        &mut out,
        &format!("'{}' by '{}'", config.value_column, config.group_column),
    );
    write_section(&mut out, &report.group_descriptives, |out, groups| {
        for (label, group) in groups {
            let _ = writeln!(out, "[{}]", label);
            write_summary(out, &group.summary);
            if let Some((lo, hi)) = group.mean_interval {
                let _ = writeln!(out, "95% interval for the mean = [{:.4}, {:.4}]", lo, hi);
            }
        }
    });

    heading(&mut out, "Pairwise F-tests for equality of variances");
    let _ = writeln!(out, "correction: {}", config.correction.name());
    write_section(&mut out, &report.variance_ratios, |out, pairs| write_pairs(out, pairs));

    heading(&mut out, "One-way ANOVA");
    write_section(&mut out, &report.anova, write_anova);

    heading(&mut out, "Interaction regression");
    write_section(&mut out, &report.regression, |out, section| {
        let fit = &section.fit;
        let _ = writeln!(
            out,
            "response '{}', reference level '{}', n = {}",
            fit.response, fit.reference_level, fit.n
        );
        for c in &fit.coefficients {
            let _ = writeln!(
                out,
                "{:<48} {:>14.4} {:>12.4} {:>9.3} {:>10}",
                c.name,
                c.estimate,
                c.std_error,
                c.t,
                fmt_p(c.p_value)
            );
        }
        let _ = writeln!(
            out,
            "R squared = {:.4}, adjusted R squared = {:.4}, residual std error = {:.4}",
            fit.r_squared, fit.adj_r_squared, fit.residual_std_error
        );
        write_test(out, &section.result);
    });

    heading(&mut out, "Correlation");
    write_section(&mut out, &report.correlation, |out, section| {
        let c = &section.correlation;
        let _ = writeln!(
            out,
            "'{}' vs '{}': r = {:.4}, n = {}, trend line y = {:.4} + {:.4} x",
            section.x_column, section.y_column, c.r, c.n, c.intercept, c.slope
        );
        write_test(out, &section.result);
    });

    out
}

fn summary_row(label: &str, s: &Summary) -> Vec<String> {
    vec![
        label.to_string(),
        s.count.to_string(),
        format!("{:.4}", s.mean),
        format!("{:.4}", s.variance),
        format!("{:.4}", s.std),
        format!("{:.4}", s.min),
        format!("{:.4}", s.q25),
        format!("{:.4}", s.median),
        format!("{:.4}", s.q75),
        format!("{:.4}", s.max),
        fmt_opt(s.coefficient_of_variation),
    ]
}

/// Per-group descriptive statistics, one row per group.
pub fn group_statistics_sheet(report: &AnalysisReport) -> Option<Sheet> {
    let groups = report.group_descriptives.as_ref().ok()?;
    let mut sheet = Sheet::new(
        "group_statistics",
        &[
            "group", "count", "mean", "variance", "std", "min", "q25", "median", "q75", "max",
            "cv_percent",
        ],
    );
    sheet.rows = groups
        .iter()
        .map(|(label, group)| summary_row(label, &group.summary))
        .collect();
    Some(sheet)
}

/// Pairwise variance-ratio tests, one row per pair.
pub fn pairwise_f_test_sheet(report: &AnalysisReport) -> Option<Sheet> {
    let pairs = report.variance_ratios.as_ref().ok()?;
    let mut sheet = Sheet::new(
        "pairwise_f_tests",
        &[
            "group_a",
            "group_b",
            "f",
            "df_numerator",
            "df_denominator",
            "p_value",
            "adjusted_p_value",
            "larger_variance",
            "significant",
        ],
    );
    sheet.rows = pairs
        .iter()
        .map(|c| {
            let (df1, df2) = match c.degrees_of_freedom {
                DegreesOfFreedom::Pair(a, b) => (a.to_string(), b.to_string()),
                DegreesOfFreedom::One(a) => (a.to_string(), String::new()),
            };
            vec![
                c.group_a.clone(),
                c.group_b.clone(),
                format!("{:.4}", c.statistic),
                df1,
                df2,
                format!("{:.6}", c.p_value),
                c.adjusted_p_value.map(|p| format!("{:.6}", p)).unwrap_or_default(),
                c.larger_variance_group.clone().unwrap_or_default(),
                c.significant.to_string(),
            ]
        })
        .collect();
    Some(sheet)
}

/// Post-hoc comparisons; `None` when post-hoc did not run.
pub fn posthoc_sheet(report: &AnalysisReport) -> Option<Sheet> {
    let comparisons = report.anova.as_ref().ok()?.comparisons()?;
    let mut sheet = Sheet::new(
        "posthoc",
        &[
            "group_a",
            "group_b",
            "mean_difference",
            "q",
            "p_value",
            "ci_lower",
            "ci_upper",
            "cohens_d",
            "significant",
        ],
    );
    sheet.rows = comparisons
        .iter()
        .map(|c| {
            let (lo, hi) = match c.confidence_interval {
                Some((lo, hi)) => (Some(lo), Some(hi)),
                None => (None, None),
            };
            vec![
                c.group_a.clone(),
                c.group_b.clone(),
                fmt_opt(c.mean_difference),
                format!("{:.4}", c.statistic),
                format!("{:.6}", c.p_value),
                fmt_opt(lo),
                fmt_opt(hi),
                fmt_opt(c.effect_size),
                c.significant.to_string(),
            ]
        })
        .collect();
    Some(sheet)
}

/// Every sheet the report can produce.
pub fn sheets(report: &AnalysisReport) -> Vec<Sheet> {
    [
        group_statistics_sheet(report),
        pairwise_f_test_sheet(report),
        posthoc_sheet(report),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Write each sheet to `<dir>/<name>.csv`, creating `dir` if needed.
pub fn write_sheets(dir: &Path, sheets: &[Sheet]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    for sheet in sheets {
        let path = dir.join(format!("{}.csv", sheet.name));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        writer.write_record(&sheet.headers)?;
        for row in &sheet.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} rows to {}", sheet.rows.len(), path.display());
    }
    Ok(())
}

/// Serialise the full report as pretty-printed JSON.
pub fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialise report")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote report to {}", path.display());
    Ok(())
}
