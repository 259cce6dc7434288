//! Shared trend pipeline.
//!
//! load -> (cases -> S-R) -> phase window -> fit both models -> select -> exports
//!
//! The CLI only handles presentation; integration tests drive this directly.

use tracing::info;

use crate::data::to_sr;
use crate::domain::{SrSeries, TrendConfig, TrendFit, TrendSource};
use crate::error::Result;
use crate::fit::{FitOptions, fit_trend};
use crate::io::export::{write_trend_csv, write_trend_json};
use crate::io::ingest::{RowError, load_cases_csv, load_sr_csv};

/// All computed outputs of a single `srt trend` run.
#[derive(Debug, Clone)]
pub struct TrendRun {
    /// The phase actually fitted.
    pub series: SrSeries,
    pub fit: TrendFit,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

/// Execute the trend pipeline and write the requested exports.
pub fn run_trend(config: &TrendConfig) -> Result<TrendRun> {
    let (full, rows_read, row_errors) = match &config.source {
        TrendSource::SrCsv(path) => {
            let ingested = load_sr_csv(path)?;
            (ingested.data, ingested.rows_read, ingested.row_errors)
        }
        TrendSource::CasesCsv { path, population } => {
            let ingested = load_cases_csv(path)?;
            let series = to_sr(&ingested.data, *population)?;
            (series, ingested.rows_read, ingested.row_errors)
        }
    };

    let series = full.window(config.start, config.end)?;
    info!(
        observations = series.len(),
        start = ?series.start_date(),
        end = ?series.end_date(),
        "fitting S-R trend"
    );

    let opts = FitOptions {
        max_iter: config.max_iter,
        ..FitOptions::default()
    };
    let fit = fit_trend(&series, &opts)?;
    info!(model = fit.best.display_name(), score = fit.rmsle(), "trend selected");

    if let Some(path) = &config.export_rows {
        write_trend_csv(path, &fit)?;
        info!(path = %path.display(), "wrote trend rows");
    }
    if let Some(path) = &config.export_json {
        write_trend_json(path, &fit)?;
        info!(path = %path.display(), "wrote trend JSON");
    }

    Ok(TrendRun {
        series,
        fit,
        rows_read,
        row_errors,
    })
}
