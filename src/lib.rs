pub mod aggregate;
pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod io_utils;
pub mod plan;
pub mod shaper;
pub mod store;
pub mod suggestion;
pub mod table;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputArgs},
    data::Record,
    io_utils::InputFormat,
    plan::OperationPlan,
    shaper::{ChartConfig, ShaperSettings},
    store::TabularStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("chartops", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Shape(args) => handle_shape(&args),
        Commands::Suggest(args) => handle_suggest(&args),
        Commands::Preview(args) => handle_preview(&args),
    }
}

fn load_store(args: &InputArgs) -> Result<TabularStore> {
    let format = InputFormat::for_path(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
    )?;
    info!(
        "Loading '{}' with delimiter '{}' ({})",
        args.input.display(),
        printable_delimiter(format.delimiter),
        format.encoding.name()
    );
    let store = TabularStore::from_path(&args.input, format)
        .with_context(|| format!("Reading CSV {:?}", args.input))?;
    debug!(
        "Loaded {} row(s) with headers {:?}",
        store.len(),
        store.headers()
    );
    Ok(store)
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let plan = OperationPlan::load(&args.plan)
        .with_context(|| format!("Loading operation plan {:?}", args.plan))?;
    let store = load_store(&args.input)?;
    let rows = engine::run_plan(&store.records(), &plan)
        .with_context(|| format!("Running plan {:?}", args.plan))?;
    info!(
        "Plan with {} step(s) produced {} row(s)",
        plan.ops.len(),
        rows.len()
    );
    emit_rows(&rows, &args.output)
}

fn handle_shape(args: &cli::ShapeArgs) -> Result<()> {
    let store = load_store(&args.input)?;
    let mut config = ChartConfig::new(args.x_axis.as_str()).with_series(args.y_axis.iter().cloned());
    config.y_axis_key = args.y_axis.first().cloned();
    let settings = ShaperSettings {
        top_n: args.top_n,
        ..ShaperSettings::default()
    };
    let rows = shaper::shape_with(&settings, &store, &config, args.chart);
    info!("Shaped {} row(s) for {}", rows.len(), args.chart);
    emit_rows(&rows, &args.output)
}

fn handle_suggest(args: &cli::SuggestArgs) -> Result<()> {
    let suggestions = suggestion::load_suggestions(&args.suggestions)?;
    let selected = suggestions.get(args.index).ok_or_else(|| {
        anyhow!(
            "Suggestion index {} out of range ({} available)",
            args.index,
            suggestions.len()
        )
    })?;
    info!(
        "Resolving suggestion {} '{}' ({})",
        args.index, selected.recommendation, selected.chart_config.chart_type
    );

    if args.config_only {
        let config = ChartConfig::from_suggestion(selected);
        let mut writer = io_utils::open_output(args.output.output.as_deref())?;
        serde_json::to_writer_pretty(&mut writer, &config).context("Writing chart config")?;
        writeln!(writer)?;
        return writer.flush().context("Flushing output");
    }

    let store = load_store(&args.input)?;
    let rows = suggestion::resolve_rows(&store.records(), selected)
        .with_context(|| format!("Resolving suggestion {}", args.index))?;
    info!("Suggestion resolved to {} row(s)", rows.len());
    emit_rows(&rows, &args.output)
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let store = load_store(&args.input)?;
    print!("{}", table::render_store(&store, args.rows));
    Ok(())
}

/// Writes rows as pretty JSON or as a text table. Non-finite numbers (an
/// empty `min`/`max` bucket, for one) become `null` in JSON.
fn emit_rows(rows: &[Record], output: &OutputArgs) -> Result<()> {
    let mut writer = io_utils::open_output(output.output.as_deref())?;
    if output.table {
        writer
            .write_all(table::render_records(rows).as_bytes())
            .context("Writing table")?;
    } else {
        serde_json::to_writer_pretty(&mut writer, rows).context("Serializing rows")?;
        writeln!(writer)?;
    }
    writer.flush().context("Flushing output")
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
