//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the trend pipeline or the table/sample helpers
//! - prints reports

use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, PopulationArgs, SampleArgs, TrendArgs};
use crate::domain::{SampleConfig, TrendConfig, TrendSource};
use crate::error::{AppError, Result};

pub mod pipeline;

/// Entry point for the `srt` binary.
pub fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Trend(args) => handle_trend(&args),
        Command::Population(args) => handle_population(&args),
        Command::Sample(args) => handle_sample(&args),
    }
}

fn init_tracing() {
    // Logs go to stderr so reports on stdout can be piped.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sr_trend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn handle_trend(args: &TrendArgs) -> Result<()> {
    let config = trend_config_from_args(args)?;
    let run = pipeline::run_trend(&config)?;

    if !run.row_errors.is_empty() {
        eprintln!(
            "Skipped {} of {} input rows (first: line {}: {})",
            run.row_errors.len(),
            run.rows_read,
            run.row_errors[0].line,
            run.row_errors[0].message
        );
    }
    println!(
        "{}",
        crate::report::format_trend_summary(config.area.as_deref(), &run.series, &run.fit, config.show_rows)
    );
    Ok(())
}

fn handle_population(args: &PopulationArgs) -> Result<()> {
    let created = Local::now().date_naive();
    let table = crate::io::ingest::load_population_csv(&args.input, created)?.data;
    info!(records = table.cleaned().len(), "population table loaded");

    if let Some(country) = &args.country {
        let value = table.value(country, args.province.as_deref(), args.date)?;
        println!("{value}");
        return Ok(());
    }

    let map = table.to_map(!args.by_province);
    if map.is_empty() {
        return Err(AppError::NotFound(if args.by_province {
            "No province-level records in the population table.".to_string()
        } else {
            "No country-level records in the population table.".to_string()
        }));
    }
    println!("{}", crate::report::format_population_map(&map));
    Ok(())
}

fn handle_sample(args: &SampleArgs) -> Result<()> {
    let config = sample_config_from_args(args);
    let series = crate::data::generate_sample(&config)?;
    crate::io::export::write_sr_csv(&args.output, &series)?;
    info!(
        observations = series.len(),
        path = %args.output.display(),
        "wrote synthetic S-R series"
    );
    Ok(())
}

pub fn trend_config_from_args(args: &TrendArgs) -> Result<TrendConfig> {
    let source = match (&args.input, &args.cases, args.population) {
        (Some(path), None, _) => TrendSource::SrCsv(path.clone()),
        (None, Some(path), Some(population)) => TrendSource::CasesCsv {
            path: path.clone(),
            population,
        },
        (None, Some(_), None) => {
            return Err(AppError::Usage("`--cases` requires `--population`.".to_string()));
        }
        _ => {
            return Err(AppError::Usage(
                "Provide exactly one of `--input` or `--cases`.".to_string(),
            ));
        }
    };
    if args.max_iter == 0 {
        return Err(AppError::Usage("`--max-iter` must be > 0.".to_string()));
    }

    Ok(TrendConfig {
        source,
        area: args.area.clone(),
        start: args.start,
        end: args.end,
        max_iter: args.max_iter,
        show_rows: !args.quiet_rows,
        export_rows: args.export.clone(),
        export_json: args.json.clone(),
    })
}

pub fn sample_config_from_args(args: &SampleArgs) -> SampleConfig {
    SampleConfig {
        model: args.model,
        params: [args.a, args.b],
        days: args.days,
        start: args.start,
        recovered_step: args.recovered_step,
        noise: args.noise,
        seed: args.seed,
    }
}
