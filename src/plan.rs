//! Operation plan model.
//!
//! A plan arrives from the chart recommender as loosely shaped JSON (or YAML
//! when written by hand). The wire structs below accept that shape
//! permissively; operator and function names stay as strings until the engine
//! resolves them through [`FilterOperator`] and [`AggregateFunction`], which
//! reject anything outside the known set.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{data::Value, error::PlanError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlan {
    #[serde(default)]
    pub plan_version: String,
    pub x: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub y: Vec<YField>,
    /// Reserved for multi-series splits; the engine does not consult it.
    #[serde(rename = "seriesBy", default, skip_serializing_if = "Option::is_none")]
    pub series_by: Option<String>,
    #[serde(default)]
    pub output_format: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ops: Vec<PlanStep>,
}

/// An explicit `null` list reads the same as an absent one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YField {
    pub field: String,
    #[serde(rename = "fn", default)]
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Vec<AggregateSpec>>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(rename = "fn")]
    pub function: String,
    pub col: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub col: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<Operand>,
}

/// Right-hand side of a filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    List(Vec<Value>),
    Scalar(Value),
    /// Objects and nested lists. Kept so the plan still loads; such an
    /// operand never equals, orders against or contains a cell value.
    Other(serde_json::Value),
}

impl Operand {
    /// Scalar form; a list collapses to its comma-joined text. Anything else
    /// is NaN, which no cell equals or compares against.
    pub fn scalar(&self) -> Value {
        match self {
            Operand::Scalar(value) => value.clone(),
            Operand::List(_) => Value::Text(self.text()),
            Operand::Other(_) => Value::Number(f64::NAN),
        }
    }

    /// Membership set; a scalar counts as a one-element list.
    pub fn members(&self) -> &[Value] {
        match self {
            Operand::List(items) => items,
            Operand::Scalar(value) => std::slice::from_ref(value),
            Operand::Other(_) => &[],
        }
    }

    /// Stringified form used by substring matching.
    pub fn text(&self) -> String {
        match self {
            Operand::Scalar(value) => value.as_display(),
            Operand::List(items) => items.iter().map(Value::as_display).join(","),
            Operand::Other(raw) => raw.to_string(),
        }
    }
}

/// Interpreted view of one [`PlanStep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<'a> {
    Filter(&'a [Condition]),
    GroupBy(&'a [String]),
    Aggregate(&'a [AggregateSpec]),
    /// A known step name whose payload is missing.
    Incomplete(&'a str),
    Unknown(&'a str),
}

impl PlanStep {
    pub fn interpret(&self) -> Step<'_> {
        match self.op.as_str() {
            "filter" => self
                .conditions
                .as_deref()
                .map_or(Step::Incomplete(&self.op), Step::Filter),
            "groupby" => self
                .by
                .as_deref()
                .map_or(Step::Incomplete(&self.op), Step::GroupBy),
            "aggregate" => self
                .aggs
                .as_deref()
                .map_or(Step::Incomplete(&self.op), Step::Aggregate),
            other => Step::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    NotEq,
    In,
    NotIn,
    Ge,
    Le,
    Gt,
    Lt,
    Contains,
    NotContains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "neq",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "nin",
            FilterOperator::Ge => "gte",
            FilterOperator::Le => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "eq" => Ok(FilterOperator::Eq),
            "neq" => Ok(FilterOperator::NotEq),
            "in" => Ok(FilterOperator::In),
            "nin" => Ok(FilterOperator::NotIn),
            "gte" => Ok(FilterOperator::Ge),
            "lte" => Ok(FilterOperator::Le),
            "gt" => Ok(FilterOperator::Gt),
            "lt" => Ok(FilterOperator::Lt),
            "contains" => Ok(FilterOperator::Contains),
            "not_contains" => Ok(FilterOperator::NotContains),
            other => Err(PlanError::UnsupportedOperation(other.to_string())),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Size,
    Sum,
    Mean,
    Median,
    Min,
    Max,
    NUnique,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Size => "size",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Mean => "mean",
            AggregateFunction::Median => "median",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::NUnique => "nunique",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "count" => Ok(AggregateFunction::Count),
            "size" => Ok(AggregateFunction::Size),
            "sum" => Ok(AggregateFunction::Sum),
            "mean" | "avg" => Ok(AggregateFunction::Mean),
            "median" => Ok(AggregateFunction::Median),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            "nunique" => Ok(AggregateFunction::NUnique),
            other => Err(PlanError::UnsupportedAggregation(other.to_string())),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OperationPlan {
    /// Loads a plan from `.yml`/`.yaml` or, for any other extension, JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening plan file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        if is_yaml {
            serde_yaml::from_reader(reader).context("Parsing plan YAML")
        } else {
            serde_json::from_reader(reader).context("Parsing plan JSON")
        }
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Parsing plan JSON")
    }

    /// Output columns: `x` followed by every `y` field, duplicates removed.
    pub fn projection(&self) -> Vec<&str> {
        let mut columns = vec![self.x.as_str()];
        for y in &self.y {
            if !columns.contains(&y.field.as_str()) {
                columns.push(y.field.as_str());
            }
        }
        columns
    }
}
