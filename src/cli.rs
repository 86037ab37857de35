use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::shaper::ChartKind;

#[derive(Debug, Parser)]
#[command(author, version, about = "Shape CSV data into chart-ready series", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run an operation plan (filter, groupby, aggregate) over a CSV file
    Run(RunArgs),
    /// Shape a CSV file for a manually configured chart
    Shape(ShapeArgs),
    /// Resolve chart data for one suggestion from a recommender response
    Suggest(SuggestArgs),
    /// Preview the first few rows of a CSV file in a formatted table
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Render rows as an aligned text table instead of JSON
    #[arg(long)]
    pub table: bool,
    /// Output file (defaults to stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Operation plan file (.json, or .yml/.yaml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct ShapeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Chart type: BAR_CHART, LINE_CHART, SCATTER_CHART or COMPOSED_CHART
    #[arg(short = 'c', long = "chart", value_parser = parse_chart_kind)]
    pub chart: ChartKind,
    /// Column for the x axis
    #[arg(short = 'x', long = "x-axis")]
    pub x_axis: String,
    /// Column(s) for the y axis; repeat for multiple line series
    #[arg(short = 'y', long = "y-axis", action = clap::ArgAction::Append, required = true)]
    pub y_axis: Vec<String>,
    /// Bar groups kept after ranking
    #[arg(long = "top", default_value_t = crate::shaper::DEFAULT_TOP_N)]
    pub top_n: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Recommender response (JSON envelope or array of suggestions)
    #[arg(short = 's', long = "suggestions")]
    pub suggestions: PathBuf,
    /// Zero-based suggestion to resolve
    #[arg(long, default_value_t = 0)]
    pub index: usize,
    /// Print the derived chart configuration instead of the rows
    #[arg(long = "config")]
    pub config_only: bool,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_chart_kind(value: &str) -> Result<ChartKind, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}
