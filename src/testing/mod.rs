use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub mod correction;
pub mod distribution;
pub mod effect;
pub mod inference;
pub mod posthoc;
pub mod regression;

pub mod utils;

/// Significance level used when a caller does not choose one.
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestKind {
    Normality,
    Runs,
    VarianceRatio,
    OneWayAnova,
    Correlation,
    Regression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    RejectNull,
    FailToReject,
}

impl Decision {
    pub fn from_p_value(p_value: f64, alpha: f64) -> Self {
        if p_value < alpha {
            Decision::RejectNull
        } else {
            Decision::FailToReject
        }
    }

    pub fn is_reject(self) -> bool {
        self == Decision::RejectNull
    }
}

impl TestKind {
    pub fn name(self) -> &'static str {
        match self {
            TestKind::Normality => "Shapiro-Wilk normality test",
            TestKind::Runs => "Runs test for randomness",
            TestKind::VarianceRatio => "F-test for equality of variances",
            TestKind::OneWayAnova => "One-way ANOVA",
            TestKind::Correlation => "Pearson correlation test",
            TestKind::Regression => "Overall F-test of the regression",
        }
    }

    /// Fixed conclusion text for each decision.
    pub fn interpretation(self, decision: Decision) -> &'static str {
        match (self, decision) {
            (TestKind::Normality, Decision::RejectNull) => {
                "the data do not follow a normal distribution"
            }
            (TestKind::Normality, Decision::FailToReject) => "normality is not rejected",
            (TestKind::Runs, Decision::RejectNull) => "the sequence is not random",
            (TestKind::Runs, Decision::FailToReject) => "randomness is not rejected",
            (TestKind::VarianceRatio, Decision::RejectNull) => "the variances differ",
            (TestKind::VarianceRatio, Decision::FailToReject) => {
                "equality of variances is not rejected"
            }
            (TestKind::OneWayAnova, Decision::RejectNull) => {
                "at least one group mean differs from the others"
            }
            (TestKind::OneWayAnova, Decision::FailToReject) => {
                "the group means do not differ significantly"
            }
            (TestKind::Correlation, Decision::RejectNull) => {
                "there is a significant linear association"
            }
            (TestKind::Correlation, Decision::FailToReject) => {
                "no significant linear association"
            }
            (TestKind::Regression, Decision::RejectNull) => {
                "the model explains a significant share of the variance"
            }
            (TestKind::Regression, Decision::FailToReject) => "the model is not significant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DegreesOfFreedom {
    One(f64),
    /// Numerator and denominator degrees of freedom, in that order.
    Pair(f64, f64),
}

impl fmt::Display for DegreesOfFreedom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegreesOfFreedom::One(df) => write!(f, "{}", df),
            DegreesOfFreedom::Pair(df1, df2) => write!(f, "({}, {})", df1, df2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub kind: TestKind,
    /// The test statistic value (W, Z, F, r, ...)
    pub statistic: f64,
    /// The p-value of the test, in [0, 1]
    pub p_value: f64,
    /// Significance level the decision was taken at
    pub alpha: f64,
    /// `RejectNull` exactly when `p_value < alpha`
    pub decision: Decision,
    pub degrees_of_freedom: Option<DegreesOfFreedom>,
    /// Additional test-specific values
    pub metadata: HashMap<String, f64>,
}

impl TestResult {
    /// Create a result; the decision is derived from the p-value and alpha.
    pub fn new(kind: TestKind, statistic: f64, p_value: f64, alpha: f64) -> Self {
        let p_value = p_value.clamp(0.0, 1.0);
        TestResult {
            kind,
            statistic,
            p_value,
            alpha,
            decision: Decision::from_p_value(p_value, alpha),
            degrees_of_freedom: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_degrees_of_freedom(mut self, df: DegreesOfFreedom) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: f64) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_significant(&self) -> bool {
        self.decision.is_reject()
    }

    pub fn interpretation(&self) -> &'static str {
        self.kind.interpretation(self.decision)
    }

    /// Metadata entries sorted by key, for stable rendering.
    pub fn sorted_metadata(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> =
            self.metadata.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// One row of a pairwise table: a single unordered pair of groups.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseComparison {
    pub group_a: String,
    pub group_b: String,
    pub statistic: f64,
    pub degrees_of_freedom: DegreesOfFreedom,
    pub p_value: f64,
    /// p-value after family-wise correction, when one was applied
    pub adjusted_p_value: Option<f64>,
    pub significant: bool,
    /// `mean_b - mean_a` for mean comparisons
    pub mean_difference: Option<f64>,
    pub confidence_interval: Option<(f64, f64)>,
    /// Group whose variance formed the numerator of a variance ratio
    pub larger_variance_group: Option<String>,
    pub effect_size: Option<f64>,
}

impl PairwiseComparison {
    pub fn new(
        group_a: &str,
        group_b: &str,
        statistic: f64,
        degrees_of_freedom: DegreesOfFreedom,
        p_value: f64,
    ) -> Self {
        PairwiseComparison {
            group_a: group_a.to_string(),
            group_b: group_b.to_string(),
            statistic,
            degrees_of_freedom,
            p_value: p_value.clamp(0.0, 1.0),
            adjusted_p_value: None,
            significant: false,
            mean_difference: None,
            confidence_interval: None,
            larger_variance_group: None,
            effect_size: None,
        }
    }

    pub fn with_significance(mut self, significant: bool) -> Self {
        self.significant = significant;
        self
    }

    pub fn with_adjusted_p_value(mut self, adjusted: f64) -> Self {
        self.adjusted_p_value = Some(adjusted.clamp(0.0, 1.0));
        self
    }

    pub fn with_mean_difference(mut self, difference: f64) -> Self {
        self.mean_difference = Some(difference);
        self
    }

    pub fn with_confidence_interval(mut self, lower: f64, upper: f64) -> Self {
        self.confidence_interval = Some((lower, upper));
        self
    }

    pub fn with_larger_variance_group(mut self, label: &str) -> Self {
        self.larger_variance_group = Some(label.to_string());
        self
    }

    pub fn with_effect_size(mut self, effect_size: f64) -> Self {
        self.effect_size = Some(effect_size);
        self
    }

    /// The p-value decisions are based on: adjusted if present, raw otherwise.
    pub fn decision_p_value(&self) -> f64 {
        self.adjusted_p_value.unwrap_or(self.p_value)
    }
}
