use crate::error::{Result, StatsError};
use std::collections::BTreeMap;

/// An ordered, non-empty sequence of finite values drawn from one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    values: Vec<f64>,
}

impl Series {
    /// Build a series, dropping non-finite values. Fails if nothing remains.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Err(StatsError::EmptySeries { column: name });
        }
        Ok(Series { name, values })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AsRef<[f64]> for Series {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// A numeric series split by the distinct labels of a categorical column.
///
/// Groups are kept in label order so pairwise output is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSeries {
    value_column: String,
    key_column: String,
    groups: BTreeMap<String, Series>,
}

impl GroupedSeries {
    pub fn new(
        value_column: &str,
        key_column: &str,
        groups: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self> {
        if groups.len() < 2 {
            return Err(StatsError::InsufficientGroups {
                required: 2,
                found: groups.len(),
            });
        }

        let groups = groups
            .into_iter()
            .map(|(label, values)| {
                let series = Series::new(format!("{}[{}]", value_column, label), values)?;
                Ok((label, series))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(GroupedSeries {
            value_column: value_column.to_string(),
            key_column: key_column.to_string(),
            groups,
        })
    }

    /// Convenience constructor from `(label, values)` pairs.
    pub fn from_groups<L, I>(value_column: &str, key_column: &str, groups: I) -> Result<Self>
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, Vec<f64>)>,
    {
        let mut map: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (label, values) in groups {
            map.entry(label.into()).or_default().extend(values);
        }
        Self::new(value_column, key_column, map)
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn labels(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn get(&self, label: &str) -> Option<&Series> {
        self.groups.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.groups.iter().map(|(label, series)| (label.as_str(), series))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of observations across all groups.
    pub fn total_count(&self) -> usize {
        self.groups.values().map(Series::len).sum()
    }
}

/// Row-aligned predictor, response and factor label, as used by the
/// interaction regression and the correlation section.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    pub x_name: String,
    pub y_name: String,
    pub group_name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub groups: Vec<String>,
}

impl Observations {
    pub fn empty(x_name: &str, y_name: &str, group_name: &str) -> Self {
        Observations {
            x_name: x_name.to_string(),
            y_name: y_name.to_string(),
            group_name: group_name.to_string(),
            x: Vec::new(),
            y: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, group: &str) {
        self.x.push(x);
        self.y.push(y);
        self.groups.push(group.to_string());
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Distinct factor levels in sorted order; the first is the reference level.
    pub fn levels(&self) -> Vec<&str> {
        let mut levels: Vec<&str> = self.groups.iter().map(String::as_str).collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }
}
