//! Chart suggestions produced by the recommender.
//!
//! A suggestion pairs a chart.js-style preview (with a handful of literal data
//! points) with the operation plan that computes the real series. Rendering a
//! suggestion means translating the preview into a [`ChartConfig`] keyed by the
//! plan's columns, running the plan, and falling back to the preview's labels
//! when the plan yields nothing.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Record, Value},
    engine,
    error::PlanError,
    plan::OperationPlan,
    shaper::{ChartConfig, YAxisKeys},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub reasoning: String,
    pub chart_config: SuggestionChart,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops_plan: Option<OperationPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionChart {
    #[serde(rename = "type")]
    pub chart_type: String,
    #[serde(default)]
    pub data: ChartData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChartOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Plugins>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scales: IndexMap<String, Scale>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugins {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Title {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SuggestionChart {
    pub fn title(&self) -> Option<&str> {
        self.options
            .as_ref()?
            .plugins
            .as_ref()?
            .title
            .as_ref()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }

    pub fn axis_title(&self, axis: &str) -> Option<&str> {
        self.options
            .as_ref()?
            .scales
            .get(axis)?
            .title
            .as_ref()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

/// Reads either a `{"suggestions": [...]}` envelope or a bare array.
pub fn load_suggestions(path: &Path) -> Result<Vec<Suggestion>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Document {
        Envelope(SuggestionsResponse),
        List(Vec<Suggestion>),
    }

    let file = File::open(path).with_context(|| format!("Opening suggestions file {path:?}"))?;
    let document: Document = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing suggestions from {path:?}"))?;
    Ok(match document {
        Document::Envelope(response) => response.suggestions,
        Document::List(suggestions) => suggestions,
    })
}

impl ChartConfig {
    /// Axis configuration keyed by the plan's columns. Without a plan only the
    /// titles carry over.
    pub fn from_suggestion(suggestion: &Suggestion) -> Self {
        let chart = &suggestion.chart_config;
        let chart_title = chart
            .title()
            .map(str::to_string)
            .or_else(|| Some(suggestion.recommendation.clone()).filter(|r| !r.is_empty()));
        let x_axis_label = chart.axis_title("x").map(str::to_string);

        let Some(plan) = &suggestion.ops_plan else {
            return ChartConfig {
                chart_title,
                x_axis_label,
                y_axis_label: chart.axis_title("y").map(str::to_string),
                ..ChartConfig::default()
            };
        };
        let primary = plan.y.first().map(|y| y.field.clone());
        ChartConfig {
            chart_title,
            x_axis_key: Some(plan.x.clone()),
            y_axis_key: None,
            y_axis_keys: Some(YAxisKeys::List(
                plan.y.iter().map(|y| y.field.clone()).collect(),
            )),
            y_axis_label: chart.axis_title("y").map(str::to_string).or(primary.clone()),
            primary_y_axis_key: primary,
            x_axis_label,
        }
    }
}

/// Rows rebuilt from the preview's literal labels and datasets, one per label.
pub fn fallback_rows(chart: &SuggestionChart, x_key: Option<&str>) -> Vec<Record> {
    let x_key = x_key.filter(|key| !key.is_empty()).unwrap_or("name");
    chart
        .data
        .labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let mut record = Record::new();
            record.insert(x_key.to_string(), Value::from(label.as_str()));
            for dataset in &chart.data.datasets {
                if let Some(value) = dataset.data.get(idx) {
                    record.insert(dataset.label.clone(), value.clone());
                }
            }
            record
        })
        .collect()
}

/// Runs the suggestion's plan over `records`, falling back to the preview's
/// label rows when the plan is missing or produces nothing.
pub fn resolve_rows(records: &[Record], suggestion: &Suggestion) -> Result<Vec<Record>, PlanError> {
    let rows = match &suggestion.ops_plan {
        Some(plan) => engine::run_plan(records, plan)?,
        None => {
            warn!("Suggestion '{}' has no operation plan", suggestion.recommendation);
            Vec::new()
        }
    };
    if !rows.is_empty() {
        return Ok(rows);
    }

    let chart = &suggestion.chart_config;
    if chart.data.labels.is_empty() {
        warn!("Plan produced no rows and the suggestion has no fallback labels");
        return Ok(Vec::new());
    }
    debug!(
        "Plan produced no rows; falling back to {} preview label(s)",
        chart.data.labels.len()
    );
    let x_key = suggestion.ops_plan.as_ref().map(|plan| plan.x.as_str());
    Ok(fallback_rows(chart, x_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUGGESTION: &str = r##"{
        "recommendation": "Sales by region",
        "reasoning": "Regions differ",
        "chartConfig": {
            "type": "BAR_CHART",
            "data": {
                "labels": ["East", "West"],
                "datasets": [{"label": "sales", "data": [3, 4], "backgroundColor": "#336699"}]
            },
            "options": {
                "plugins": {"title": {"display": true, "text": "Regional sales"}},
                "scales": {"x": {"title": {"text": "Region"}}, "y": {"beginAtZero": true}}
            }
        },
        "opsPlan": {
            "plan_version": "1",
            "x": "region",
            "y": [{"field": "sales", "fn": "sum"}, {"field": "units", "fn": "sum"}],
            "output_format": "wide",
            "ops": []
        }
    }"##;

    fn suggestion() -> Suggestion {
        serde_json::from_str(SUGGESTION).unwrap()
    }

    #[test]
    fn chart_config_follows_plan_columns() {
        let config = ChartConfig::from_suggestion(&suggestion());
        assert_eq!(config.chart_title.as_deref(), Some("Regional sales"));
        assert_eq!(config.x_axis_key.as_deref(), Some("region"));
        assert_eq!(config.series(), vec!["sales", "units"]);
        assert_eq!(config.primary_y_axis_key.as_deref(), Some("sales"));
        assert_eq!(config.x_axis_label.as_deref(), Some("Region"));
        assert_eq!(config.y_axis_label.as_deref(), Some("sales"));
    }

    #[test]
    fn title_falls_back_to_recommendation() {
        let mut suggestion = suggestion();
        suggestion.chart_config.options = None;
        let config = ChartConfig::from_suggestion(&suggestion);
        assert_eq!(config.chart_title.as_deref(), Some("Sales by region"));
        assert_eq!(config.x_axis_label, None);
    }

    #[test]
    fn fallback_rows_zip_labels_with_datasets() {
        let suggestion = suggestion();
        let rows = fallback_rows(&suggestion.chart_config, Some("region"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["region"], Value::from("West"));
        assert_eq!(rows[1]["sales"], Value::Number(4.0));

        let rows = fallback_rows(&suggestion.chart_config, None);
        assert_eq!(rows[0]["name"], Value::from("East"));
    }

    #[test]
    fn hex_colors_survive_parsing() {
        let dataset = &suggestion().chart_config.data.datasets[0];
        assert_eq!(dataset.background_color.as_deref(), Some("#336699"));
        assert_eq!(dataset.border_color, None);
    }

    #[test]
    fn short_datasets_leave_keys_absent() {
        let mut suggestion = suggestion();
        suggestion.chart_config.data.datasets[0].data.truncate(1);
        let rows = fallback_rows(&suggestion.chart_config, Some("region"));
        assert!(rows[1].get("sales").is_none());
    }
}
