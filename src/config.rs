//! Analysis configuration: significance level and the dataset columns each
//! section reads. Values come from defaults, an optional TOML file and, in the
//! CLI, command-line overrides.

use crate::testing::correction::Correction;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_VALUE_COLUMN: &str = "Ingreso_Promedio_Mensual (MXN)";
pub const DEFAULT_SECONDARY_COLUMN: &str = "Promedio_Escolaridad (años)";
pub const DEFAULT_GROUP_COLUMN: &str = "Tipo_Municipio";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance level shared by every test.
    pub alpha: f64,
    /// Continuous outcome (income): grouped tests, ANOVA, regression response.
    pub value_column: String,
    /// Continuous predictor (schooling): normality, runs test, regression.
    pub secondary_column: String,
    /// Categorical factor (municipality type).
    pub group_column: String,
    /// Adjustment applied to the pairwise variance-ratio p-values.
    pub correction: Correction,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            alpha: DEFAULT_ALPHA,
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            secondary_column: DEFAULT_SECONDARY_COLUMN.to_string(),
            group_column: DEFAULT_GROUP_COLUMN.to_string(),
            correction: Correction::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }

        let columns = [
            ("value_column", &self.value_column),
            ("secondary_column", &self.secondary_column),
            ("group_column", &self.group_column),
        ];
        for (key, column) in columns {
            if column.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }
        if self.group_column == self.value_column || self.group_column == self.secondary_column {
            return Err(ConfigError::Invalid(
                "group_column must differ from the numeric columns".to_string(),
            ));
        }
        Ok(())
    }

    /// Every column a full analysis run reads.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = vec![
            self.value_column.as_str(),
            self.secondary_column.as_str(),
            self.group_column.as_str(),
        ];
        columns.dedup();
        columns
    }
}
