//! Samples, modalities, and datasets.
//!
//! A [`Sample`] is one column's observations with an explicit tag: numeric
//! or categorical. The tag says how the values are stored, not how they are
//! treated; the classifier may still regard a numeric column with few
//! distinct values as categorical.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::{CompareError, Result};

/// An ordered sequence of observations for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Numeric storage.
    Numeric(Vec<f64>),
    /// Categorical labels.
    Categorical(Vec<String>),
}

impl Sample {
    /// Number of observations.
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct values in the sample.
    ///
    /// Numeric values compare by total order, so an empty sample yields 0
    /// and repeated floats collapse.
    pub fn distinct_count(&self) -> usize {
        match self {
            Self::Numeric(v) => {
                let mut sorted = v.clone();
                sorted.sort_by(f64::total_cmp);
                sorted.dedup_by(|a, b| a.total_cmp(b) == std::cmp::Ordering::Equal);
                sorted.len()
            }
            Self::Categorical(v) => {
                let mut sorted = v.clone();
                sorted.sort();
                sorted.dedup();
                sorted.len()
            }
        }
    }

    /// Counts occurrences of each modality, keyed in sorted order.
    pub fn modality_counts(&self) -> BTreeMap<Modality, f64> {
        let mut counts = BTreeMap::new();
        match self {
            Self::Numeric(v) => {
                for &x in v {
                    *counts.entry(Modality::Number(x)).or_insert(0.0) += 1.0;
                }
            }
            Self::Categorical(v) => {
                for s in v {
                    *counts.entry(Modality::Label(s.clone())).or_insert(0.0) += 1.0;
                }
            }
        }
        counts
    }

    /// Borrows the numeric values, or fails for categorical storage.
    pub fn as_numeric(&self) -> Result<&[f64]> {
        match self {
            Self::Numeric(v) => Ok(v),
            Self::Categorical(_) => Err(CompareError::DegenerateInput(
                "expected a numeric sample".to_string(),
            )),
        }
    }
}

/// A distinct categorical level appearing in a sample.
///
/// Orders numbers by `total_cmp`, labels lexically, and numbers before
/// labels, so contingency rows come out sorted by value.
#[derive(Debug, Clone)]
pub enum Modality {
    Number(f64),
    Label(String),
}

impl PartialEq for Modality {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Modality {}

impl PartialOrd for Modality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Modality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Label(a), Self::Label(b)) => a.cmp(b),
            (Self::Number(_), Self::Label(_)) => std::cmp::Ordering::Less,
            (Self::Label(_), Self::Number(_)) => std::cmp::Ordering::Greater,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x}"),
            Self::Label(s) => write!(f, "{s}"),
        }
    }
}

/// A named collection of columns, all sharing one row count.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: BTreeMap<String, Sample>,
}

impl Dataset {
    /// Builds a dataset, validating that every column has the same length.
    pub fn from_columns<I>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Sample)>,
    {
        let columns: BTreeMap<String, Sample> = columns.into_iter().collect();
        let mut rows: Option<usize> = None;
        for (name, sample) in &columns {
            match rows {
                None => rows = Some(sample.len()),
                Some(n) if n != sample.len() => {
                    return Err(CompareError::InvalidParameter(format!(
                        "column '{name}' has {} rows, expected {n}",
                        sample.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self { columns })
    }

    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.columns.get(name)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Sample)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// One cell of a dataset file: a number or a label.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Label(String),
}

type RawColumns = BTreeMap<String, Vec<RawValue>>;

fn build_dataset(raw: RawColumns) -> anyhow::Result<Dataset> {
    let mut columns = Vec::with_capacity(raw.len());
    for (name, values) in raw {
        let numbers: Option<Vec<f64>> = values
            .iter()
            .map(|v| match v {
                RawValue::Number(x) => Some(*x),
                RawValue::Label(_) => None,
            })
            .collect();
        let sample = match numbers {
            Some(numbers) => Sample::Numeric(numbers),
            // Mixed columns coerce everything to labels.
            None => Sample::Categorical(
                values
                    .into_iter()
                    .map(|v| match v {
                        RawValue::Number(x) => x.to_string(),
                        RawValue::Label(s) => s,
                    })
                    .collect(),
            ),
        };
        columns.push((name, sample));
    }
    Ok(Dataset::from_columns(columns)?)
}

/// Loads a dataset from a JSON object mapping column name to value array.
pub fn load_dataset_json(content: &str) -> anyhow::Result<Dataset> {
    let raw: RawColumns = serde_json::from_str(content)?;
    build_dataset(raw)
}

/// Loads a dataset from the equivalent YAML mapping.
pub fn load_dataset_yaml(content: &str) -> anyhow::Result<Dataset> {
    let raw: RawColumns = serde_yaml_ng::from_str(content)?;
    build_dataset(raw)
}
