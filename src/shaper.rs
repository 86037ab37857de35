//! Chart data shaping for manually configured axes.
//!
//! Turns positional store rows into the series a chart renderer expects,
//! without an operation plan. Column types are inferred on the fly:
//!
//! - **Bar**: rows are grouped by the x cell and the y column is summed,
//!   averaged or counted depending on how numeric it looks and what it is
//!   called. Only the top groups survive.
//! - **Line / Composed**: each requested series is sampled and kept only when
//!   it is predominantly numeric; every input row becomes one point.
//! - **Scatter**: both axes are parsed as numbers and unparseable points are
//!   dropped.
//!
//! Misconfiguration never fails: the shaper logs a warning and returns no
//! rows so an interactive editor can keep rendering a placeholder.

use std::{collections::HashMap, fmt, str::FromStr};

use anyhow::{Error, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Record, Value},
    store::TabularStore,
};

pub const DEFAULT_CATEGORICAL_THRESHOLD: f64 = 0.5;
pub const DEFAULT_SERIES_SAMPLE_SIZE: usize = 50;
pub const DEFAULT_SERIES_NUMERIC_THRESHOLD: f64 = 0.8;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_AVERAGE_KEYWORDS: &[&str] = &["intent", "rating", "score", "appeal", "importance"];

#[derive(Debug, Clone, PartialEq)]
pub struct ShaperSettings {
    /// Bar y columns whose finite-number share falls below this are counted.
    pub categorical_threshold: f64,
    /// Rows sampled when classifying a line series.
    pub series_sample_size: usize,
    /// A line series is kept only when its numeric share exceeds this.
    pub series_numeric_threshold: f64,
    pub top_n: usize,
    /// Lower-case substrings that make a numeric bar column averaged instead of summed.
    pub average_keywords: Vec<String>,
}

impl Default for ShaperSettings {
    fn default() -> Self {
        Self {
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            series_sample_size: DEFAULT_SERIES_SAMPLE_SIZE,
            series_numeric_threshold: DEFAULT_SERIES_NUMERIC_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            average_keywords: DEFAULT_AVERAGE_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Composed,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "BAR_CHART",
            ChartKind::Line => "LINE_CHART",
            ChartKind::Scatter => "SCATTER_CHART",
            ChartKind::Composed => "COMPOSED_CHART",
        }
    }
}

impl FromStr for ChartKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BAR_CHART" | "BAR" => Ok(ChartKind::Bar),
            "LINE_CHART" | "LINE" => Ok(ChartKind::Line),
            "SCATTER_CHART" | "SCATTER" => Ok(ChartKind::Scatter),
            "COMPOSED_CHART" | "COMPOSED" => Ok(ChartKind::Composed),
            _ => Err(anyhow!("Unknown chart type '{value}'")),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    Sum,
    Average,
    Count,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_axis_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis_keys: Option<YAxisKeys>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_y_axis_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_axis_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis_label: Option<String>,
}

/// Series columns: a flat list, or per-mark lists for composed charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YAxisKeys {
    List(Vec<String>),
    Composed(ComposedKeys),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposedKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Vec<String>>,
}

impl YAxisKeys {
    /// Series in render order; composed keys list bars, then lines, then areas.
    pub fn series(&self) -> Vec<&str> {
        match self {
            YAxisKeys::List(keys) => keys.iter().map(String::as_str).collect(),
            YAxisKeys::Composed(keys) => [&keys.bar, &keys.line, &keys.area]
                .into_iter()
                .flatten()
                .flatten()
                .map(String::as_str)
                .collect(),
        }
    }
}

impl ChartConfig {
    pub fn new(x_axis_key: impl Into<String>) -> Self {
        Self {
            x_axis_key: Some(x_axis_key.into()),
            ..Self::default()
        }
    }

    pub fn with_series<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.y_axis_keys = Some(YAxisKeys::List(keys.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_y_axis_key(mut self, key: impl Into<String>) -> Self {
        self.y_axis_key = Some(key.into());
        self
    }

    pub fn series(&self) -> Vec<&str> {
        self.y_axis_keys
            .as_ref()
            .map(YAxisKeys::series)
            .unwrap_or_default()
    }

    fn bar_y_key(&self) -> Option<&str> {
        self.series()
            .first()
            .copied()
            .or(self.primary_y_axis_key.as_deref())
    }

    fn scatter_y_key(&self) -> Option<&str> {
        self.y_axis_key
            .as_deref()
            .or(self.primary_y_axis_key.as_deref())
    }
}

pub fn shape(store: &TabularStore, config: &ChartConfig, kind: ChartKind) -> Vec<Record> {
    shape_with(&ShaperSettings::default(), store, config, kind)
}

/// Parses `chart_type` first; an unrecognized chart type shapes to nothing.
pub fn shape_named(store: &TabularStore, config: &ChartConfig, chart_type: &str) -> Vec<Record> {
    match chart_type.parse::<ChartKind>() {
        Ok(kind) => shape(store, config, kind),
        Err(err) => {
            warn!("{err}; no chart data produced");
            Vec::new()
        }
    }
}

pub fn shape_with(
    settings: &ShaperSettings,
    store: &TabularStore,
    config: &ChartConfig,
    kind: ChartKind,
) -> Vec<Record> {
    let Some(x_key) = config.x_axis_key.as_deref().filter(|key| !key.is_empty()) else {
        warn!("{kind} configuration has no x-axis key");
        return Vec::new();
    };
    let rows = match kind {
        ChartKind::Bar => match config.bar_y_key() {
            Some(y_key) => shape_bar(settings, store, x_key, y_key),
            None => {
                warn!("Bar chart configuration has no y-axis key");
                Vec::new()
            }
        },
        ChartKind::Line | ChartKind::Composed => {
            shape_series(settings, store, x_key, &config.series())
        }
        ChartKind::Scatter => match config.scatter_y_key() {
            Some(y_key) => shape_scatter(store, x_key, y_key),
            None => {
                warn!("Scatter chart configuration has no y-axis key");
                Vec::new()
            }
        },
    };
    debug!("Shaped {} row(s) for {kind}", rows.len());
    rows
}

struct BarGroup {
    label: String,
    sum: f64,
    numeric_count: usize,
    total_count: usize,
}

impl BarGroup {
    fn value(&self, policy: AggregationPolicy) -> f64 {
        match policy {
            AggregationPolicy::Sum => self.sum,
            AggregationPolicy::Average if self.numeric_count > 0 => {
                self.sum / self.numeric_count as f64
            }
            AggregationPolicy::Average => 0.0,
            AggregationPolicy::Count => self.total_count as f64,
        }
    }
}

fn shape_bar(settings: &ShaperSettings, store: &TabularStore, x_key: &str, y_key: &str) -> Vec<Record> {
    let (Some(x_idx), Some(y_idx)) = (store.column_index(x_key), store.column_index(y_key)) else {
        warn!("Bar chart axes '{x_key}' / '{y_key}' not found in headers");
        return Vec::new();
    };

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<BarGroup> = Vec::new();
    for row in store.rows() {
        let label = TabularStore::cell(row, x_idx).as_display();
        if label.trim().is_empty() {
            continue;
        }
        let position = *positions.entry(label.clone()).or_insert_with(|| {
            groups.push(BarGroup {
                label,
                sum: 0.0,
                numeric_count: 0,
                total_count: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[position];
        if let Some(value) = TabularStore::cell(row, y_idx).parse_finite() {
            group.sum += value;
            group.numeric_count += 1;
        }
        group.total_count += 1;
    }

    let numeric: usize = groups.iter().map(|group| group.numeric_count).sum();
    let total: usize = groups.iter().map(|group| group.total_count).sum();
    let policy = choose_policy(settings, y_key, numeric, total);
    debug!("Bar column '{y_key}': {numeric}/{total} numeric cell(s), using {policy:?}");

    let mut ranked = groups
        .iter()
        .map(|group| (group.label.as_str(), group.value(policy)))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(settings.top_n);

    ranked
        .into_iter()
        .map(|(label, value)| {
            let mut record = Record::new();
            record.insert(x_key.to_string(), Value::from(label));
            record.insert(y_key.to_string(), Value::Number(value));
            record
        })
        .collect()
}

/// Counts when fewer than `categorical_threshold` of the cells are numeric,
/// otherwise averages rating-like columns and sums the rest.
pub fn choose_policy(
    settings: &ShaperSettings,
    column: &str,
    numeric_cells: usize,
    total_cells: usize,
) -> AggregationPolicy {
    if total_cells == 0 || (numeric_cells as f64 / total_cells as f64) < settings.categorical_threshold {
        return AggregationPolicy::Count;
    }
    let lowered = column.to_lowercase();
    if settings
        .average_keywords
        .iter()
        .any(|keyword| lowered.contains(keyword.as_str()))
    {
        AggregationPolicy::Average
    } else {
        AggregationPolicy::Sum
    }
}

/// Samples the leading rows of a column; numeric when more than
/// `series_numeric_threshold` of the non-blank sampled cells parse as finite.
pub fn is_column_numeric(settings: &ShaperSettings, rows: &[Vec<Value>], column: usize) -> bool {
    let mut non_empty = 0usize;
    let mut numeric = 0usize;
    for row in rows.iter().take(settings.series_sample_size) {
        let cell = TabularStore::cell(row, column);
        if cell.is_null() || cell.as_display().trim().is_empty() {
            continue;
        }
        non_empty += 1;
        if cell.parse_finite().is_some() {
            numeric += 1;
        }
    }
    non_empty > 0 && (numeric as f64 / non_empty as f64) > settings.series_numeric_threshold
}

fn shape_series(
    settings: &ShaperSettings,
    store: &TabularStore,
    x_key: &str,
    series: &[&str],
) -> Vec<Record> {
    let Some(x_idx) = store.column_index(x_key) else {
        warn!("X-axis column '{x_key}' not found in headers");
        return Vec::new();
    };
    if series.is_empty() {
        warn!("No y-axis series configured");
        return Vec::new();
    }

    let kept = series
        .iter()
        .filter_map(|name| match store.column_index(name) {
            None => {
                warn!("Series '{name}' not found in headers; skipping");
                None
            }
            Some(idx) if !is_column_numeric(settings, store.rows(), idx) => {
                warn!("Series '{name}' is not predominantly numeric; skipping");
                None
            }
            Some(idx) => Some((*name, idx)),
        })
        .collect::<Vec<_>>();
    if kept.is_empty() {
        warn!("No numeric series left to plot");
        return Vec::new();
    }

    store
        .rows()
        .iter()
        .map(|row| {
            let mut record = Record::new();
            record.insert(x_key.to_string(), TabularStore::cell(row, x_idx).clone());
            for (name, idx) in &kept {
                let value = TabularStore::cell(row, *idx)
                    .parse_float()
                    .map_or(Value::Null, Value::Number);
                record.insert(name.to_string(), value);
            }
            record
        })
        .collect()
}

fn shape_scatter(store: &TabularStore, x_key: &str, y_key: &str) -> Vec<Record> {
    let (Some(x_idx), Some(y_idx)) = (store.column_index(x_key), store.column_index(y_key)) else {
        warn!("Scatter chart axes '{x_key}' / '{y_key}' not found in headers");
        return Vec::new();
    };
    store
        .rows()
        .iter()
        .filter_map(|row| {
            let x = TabularStore::cell(row, x_idx).parse_float()?;
            let y = TabularStore::cell(row, y_idx).parse_float()?;
            let mut record = Record::new();
            record.insert(x_key.to_string(), Value::Number(x));
            record.insert(y_key.to_string(), Value::Number(y));
            Some(record)
        })
        .collect()
}
