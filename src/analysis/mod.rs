//! The full analysis run over a municipal indicators dataset.
//!
//! Each section is computed independently and stored as a [`Section`]: a
//! statistic that cannot be computed on the data becomes a recorded
//! "not applicable" failure rather than aborting the run. Only a dataset that
//! cannot be loaded or lacks a configured column stops everything.
//!
//! The ANOVA section is driven by [`AnovaWorkflow`], which only lets a
//! post-hoc analyzer run after the omnibus test rejected equal means.

use crate::config::AnalysisConfig;
use crate::data::{Dataset, GroupedSeries};
use crate::descriptive::{self, Shape, Summary};
use crate::error::{Result, StatsError};
use crate::testing::inference::{
    AnovaResult, Correlation, HypothesisTest, PearsonCorrelation, RunsTest, ShapiroWilkTest,
    one_way_anova, pairwise_variance_ratios, pearson_correlation,
};
use crate::testing::posthoc::{PostHocAnalyzer, TukeyHsd};
use crate::testing::regression::{RegressionFit, interaction_regression};
use crate::testing::{PairwiseComparison, TestResult};
use log::{debug, info, warn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Confidence level of the per-group mean intervals.
pub const MEAN_INTERVAL_LEVEL: f64 = 0.95;

/// Result of one report section; `Err` means "not applicable" for that section.
pub type Section<T> = std::result::Result<T, StatsError>;

fn serialize_section<S, T>(
    section: &Section<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    match section {
        Ok(value) => value.serialize(serializer),
        Err(err) => {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("not_applicable", &err.to_string())?;
            map.end()
        }
    }
}

fn serialize_error<S: Serializer>(
    err: &StatsError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

/// States of the omnibus-then-post-hoc procedure.
///
/// A post-hoc failure lands in `PosthocFailed`, which still carries the
/// omnibus result.
#[derive(Debug, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnovaWorkflow {
    #[default]
    OmnibusPending,
    OmnibusDone {
        anova: AnovaResult,
    },
    PosthocDone {
        anova: AnovaResult,
        analyzer: String,
        comparisons: Vec<PairwiseComparison>,
    },
    PosthocFailed {
        anova: AnovaResult,
        analyzer: String,
        #[serde(serialize_with = "serialize_error")]
        error: StatsError,
    },
}

impl AnovaWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the omnibus ANOVA. Only valid from `OmnibusPending`.
    pub fn run_omnibus(self, grouped: &GroupedSeries, alpha: f64) -> Result<Self> {
        match self {
            AnovaWorkflow::OmnibusPending => {
                let anova = one_way_anova(grouped, alpha)?;
                debug!("omnibus decision: {:?}", anova.result.decision);
                Ok(AnovaWorkflow::OmnibusDone { anova })
            }
            _ => Err(StatsError::InvalidParameter(
                "omnibus test has already been run".to_string(),
            )),
        }
    }

    /// Advance to `PosthocDone` when the omnibus test rejected the null.
    ///
    /// On a fail-to-reject decision the workflow stays in `OmnibusDone` and
    /// `analyzer` is never invoked. An analyzer error moves the workflow to
    /// `PosthocFailed` instead of discarding the omnibus result.
    pub fn run_posthoc<A>(self, grouped: &GroupedSeries, analyzer: &A) -> Result<Self>
    where
        A: PostHocAnalyzer + ?Sized,
    {
        match self {
            AnovaWorkflow::OmnibusPending => Err(StatsError::InvalidParameter(
                "post-hoc comparisons requested before the omnibus test".to_string(),
            )),
            AnovaWorkflow::OmnibusDone { anova } if anova.result.decision.is_reject() => {
                let name = analyzer.name().to_string();
                match analyzer.compare(grouped, &anova) {
                    Ok(comparisons) => {
                        info!("{}: {} pairwise comparisons", name, comparisons.len());
                        Ok(AnovaWorkflow::PosthocDone {
                            anova,
                            analyzer: name,
                            comparisons,
                        })
                    }
                    Err(error) => {
                        warn!("{}: not applicable ({})", name, error);
                        Ok(AnovaWorkflow::PosthocFailed {
                            anova,
                            analyzer: name,
                            error,
                        })
                    }
                }
            }
            done => Ok(done),
        }
    }

    /// Both steps in sequence.
    pub fn run<A>(grouped: &GroupedSeries, alpha: f64, analyzer: &A) -> Result<Self>
    where
        A: PostHocAnalyzer + ?Sized,
    {
        AnovaWorkflow::new()
            .run_omnibus(grouped, alpha)?
            .run_posthoc(grouped, analyzer)
    }

    pub fn anova(&self) -> Option<&AnovaResult> {
        match self {
            AnovaWorkflow::OmnibusPending => None,
            AnovaWorkflow::OmnibusDone { anova }
            | AnovaWorkflow::PosthocDone { anova, .. }
            | AnovaWorkflow::PosthocFailed { anova, .. } => Some(anova),
        }
    }

    pub fn comparisons(&self) -> Option<&[PairwiseComparison]> {
        match self {
            AnovaWorkflow::PosthocDone { comparisons, .. } => Some(comparisons),
            _ => None,
        }
    }

    /// Why the post-hoc step could not be computed, if it failed.
    pub fn posthoc_error(&self) -> Option<&StatsError> {
        match self {
            AnovaWorkflow::PosthocFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            AnovaWorkflow::OmnibusPending => "omnibus pending",
            AnovaWorkflow::OmnibusDone { .. } => "omnibus done",
            AnovaWorkflow::PosthocDone { .. } => "post-hoc done",
            AnovaWorkflow::PosthocFailed { .. } => "post-hoc failed",
        }
    }
}

/// Normality test and shape statistics for one column.
#[derive(Debug, Serialize)]
pub struct DistributionCheck {
    pub column: String,
    #[serde(serialize_with = "serialize_section")]
    pub normality: Section<TestResult>,
    #[serde(serialize_with = "serialize_section")]
    pub shape: Section<Shape>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDescriptives {
    pub summary: Summary,
    /// Normal-approximation interval for the group mean.
    pub mean_interval: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionSection {
    pub fit: RegressionFit,
    pub result: TestResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationSection {
    pub x_column: String,
    pub y_column: String,
    pub correlation: Correlation,
    pub result: TestResult,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub config: AnalysisConfig,
    pub row_count: usize,
    #[serde(serialize_with = "serialize_section")]
    pub secondary_summary: Section<Summary>,
    #[serde(serialize_with = "serialize_section")]
    pub value_summary: Section<Summary>,
    pub secondary_distribution: DistributionCheck,
    pub value_distribution: DistributionCheck,
    #[serde(serialize_with = "serialize_section")]
    pub runs: Section<TestResult>,
    #[serde(serialize_with = "serialize_section")]
    pub group_descriptives: Section<BTreeMap<String, GroupDescriptives>>,
    #[serde(serialize_with = "serialize_section")]
    pub variance_ratios: Section<Vec<PairwiseComparison>>,
    #[serde(serialize_with = "serialize_section")]
    pub anova: Section<AnovaWorkflow>,
    #[serde(serialize_with = "serialize_section")]
    pub regression: Section<RegressionSection>,
    #[serde(serialize_with = "serialize_section")]
    pub correlation: Section<CorrelationSection>,
}

impl AnalysisReport {
    /// Every section that could not be computed, with its reason.
    pub fn not_applicable(&self) -> Vec<(&'static str, &StatsError)> {
        let sections = [
            ("secondary summary", self.secondary_summary.as_ref().err()),
            ("value summary", self.value_summary.as_ref().err()),
            ("secondary normality", self.secondary_distribution.normality.as_ref().err()),
            ("secondary shape", self.secondary_distribution.shape.as_ref().err()),
            ("value normality", self.value_distribution.normality.as_ref().err()),
            ("value shape", self.value_distribution.shape.as_ref().err()),
            ("runs test", self.runs.as_ref().err()),
            ("group descriptives", self.group_descriptives.as_ref().err()),
            ("variance ratios", self.variance_ratios.as_ref().err()),
            ("anova", self.anova.as_ref().err()),
            (
                "post-hoc",
                self.anova.as_ref().ok().and_then(AnovaWorkflow::posthoc_error),
            ),
            ("regression", self.regression.as_ref().err()),
            ("correlation", self.correlation.as_ref().err()),
        ];
        sections
            .into_iter()
            .filter_map(|(name, err)| err.map(|err| (name, err)))
            .collect()
    }

    /// The omnibus ANOVA, if that section ran.
    pub fn anova_result(&self) -> Option<&AnovaResult> {
        self.anova.as_ref().ok().and_then(AnovaWorkflow::anova)
    }
}

// Fatal errors propagate; anything else is recorded against the section.
fn section<T>(name: &str, result: Result<T>) -> Result<Section<T>> {
    match result {
        Ok(value) => {
            info!("{}: done", name);
            Ok(Ok(value))
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!("{}: not applicable ({})", name, err);
            Ok(Err(err))
        }
    }
}

fn distribution_check(dataset: &Dataset, column: &str, alpha: f64) -> Result<DistributionCheck> {
    let normality = dataset
        .select(column)
        .and_then(|s| ShapiroWilkTest.test(s.values(), alpha));
    let shape = dataset
        .select(column)
        .and_then(|s| descriptive::shape(s.values()));
    Ok(DistributionCheck {
        column: column.to_string(),
        normality: section(&format!("normality of '{}'", column), normality)?,
        shape: section(&format!("shape of '{}'", column), shape)?,
    })
}

fn describe_groups(grouped: &GroupedSeries) -> Result<BTreeMap<String, GroupDescriptives>> {
    let summaries = descriptive::summarize_groups(grouped)?;
    Ok(summaries
        .into_iter()
        .map(|(label, summary)| {
            let mean_interval = grouped.get(&label).and_then(|s| {
                descriptive::mean_confidence_interval(s.values(), MEAN_INTERVAL_LEVEL).ok()
            });
            (
                label,
                GroupDescriptives {
                    summary,
                    mean_interval,
                },
            )
        })
        .collect())
}

fn correlation_section(dataset: &Dataset, config: &AnalysisConfig) -> Result<CorrelationSection> {
    let (x, y) = dataset.select_paired(&config.secondary_column, &config.value_column)?;
    let correlation = pearson_correlation(x.values(), y.values())?;
    let result = PearsonCorrelation.test(&(x.values(), y.values()), config.alpha)?;
    Ok(CorrelationSection {
        x_column: config.secondary_column.clone(),
        y_column: config.value_column.clone(),
        correlation,
        result,
    })
}

/// Run every section with Tukey HSD as the post-hoc procedure.
pub fn run_analysis(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisReport> {
    run_analysis_with(dataset, config, &TukeyHsd::new(config.alpha))
}

/// Run every section, using `analyzer` for post-hoc comparisons.
///
/// # Arguments
///
/// * `dataset` - Loaded rows
/// * `config` - Column names, alpha and correction
/// * `analyzer` - Post-hoc procedure, called at most once and only after the
///   ANOVA rejects equal means
///
/// # Returns
///
/// An `AnalysisReport` where every section that could not be computed holds
/// its error. Only invalid configuration or a missing column fails the call.
pub fn run_analysis_with(
    dataset: &Dataset,
    config: &AnalysisConfig,
    analyzer: &dyn PostHocAnalyzer,
) -> Result<AnalysisReport> {
    config
        .validate()
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    dataset.require_columns(&config.required_columns())?;
    let alpha = config.alpha;
    info!(
        "analysing {} rows at alpha = {} ({} by {})",
        dataset.row_count(),
        alpha,
        config.value_column,
        config.group_column
    );

    let secondary_summary = section(
        "secondary summary",
        dataset
            .select(&config.secondary_column)
            .and_then(|s| descriptive::summarize(s.values())),
    )?;
    let value_summary = section(
        "value summary",
        dataset
            .select(&config.value_column)
            .and_then(|s| descriptive::summarize(s.values())),
    )?;
    let secondary_distribution = distribution_check(dataset, &config.secondary_column, alpha)?;
    let value_distribution = distribution_check(dataset, &config.value_column, alpha)?;
    let runs = section(
        "runs test",
        dataset
            .select(&config.secondary_column)
            .and_then(|s| RunsTest::default().test(s.values(), alpha)),
    )?;

    let grouped = || dataset.partition(&config.value_column, &config.group_column);
    let group_descriptives = section(
        "group descriptives",
        grouped().and_then(|g| describe_groups(&g)),
    )?;
    let variance_ratios = section(
        "pairwise variance ratios",
        grouped().and_then(|g| pairwise_variance_ratios(&g, alpha, config.correction)),
    )?;
    let anova = section(
        "anova",
        grouped().and_then(|g| AnovaWorkflow::run(&g, alpha, analyzer)),
    )?;

    let regression = section(
        "interaction regression",
        dataset
            .select_with_groups(
                &config.secondary_column,
                &config.value_column,
                &config.group_column,
            )
            .and_then(|obs| {
                let fit = interaction_regression(&obs)?;
                let result = fit.test_result(alpha);
                Ok(RegressionSection { fit, result })
            }),
    )?;
    let correlation = section("correlation", correlation_section(dataset, config))?;

    Ok(AnalysisReport {
        config: config.clone(),
        row_count: dataset.row_count(),
        secondary_summary,
        value_summary,
        secondary_distribution,
        value_distribution,
        runs,
        group_descriptives,
        variance_ratios,
        anova,
        regression,
        correlation,
    })
}
