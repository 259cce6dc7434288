//! Export trend results and S-R series.
//!
//! CSV exports are meant to be easy to consume in spreadsheets or downstream
//! scripts; the JSON export keeps both candidate fits for later comparison.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{SrSeries, TrendFit};
use crate::error::{AppError, Result};

/// Write the selected model's rows
/// (`Date,Recovered,Susceptible_actual,Susceptible_predicted`).
pub fn write_trend_csv(path: &Path, fit: &TrendFit) -> Result<()> {
    let file = create(path, "trend CSV")?;
    write_trend_rows(file, fit)
}

pub fn write_trend_rows<W: Write>(writer: W, fit: &TrendFit) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in fit.rows() {
        csv.serialize(row)?;
    }
    csv.flush()
        .map_err(|e| AppError::io("Failed to flush trend CSV", e))
}

/// Write the full fit (both candidates) as pretty JSON.
pub fn write_trend_json(path: &Path, fit: &TrendFit) -> Result<()> {
    let file = create(path, "trend JSON")?;
    serde_json::to_writer_pretty(file, fit)
        .map_err(|e| AppError::io("Failed to write trend JSON", e.into()))
}

#[derive(Serialize)]
struct SrCsvRow {
    #[serde(rename = "Date")]
    date: chrono::NaiveDate,
    #[serde(rename = "Recovered")]
    recovered: u64,
    #[serde(rename = "Susceptible")]
    susceptible: u64,
}

/// Write an S-R series in the same layout `load_sr_csv` reads.
pub fn write_sr_csv(path: &Path, series: &SrSeries) -> Result<()> {
    let file = create(path, "S-R CSV")?;
    write_sr_rows(file, series)
}

pub fn write_sr_rows<W: Write>(writer: W, series: &SrSeries) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for obs in series.observations() {
        csv.serialize(SrCsvRow {
            date: obs.date,
            recovered: obs.recovered,
            susceptible: obs.susceptible,
        })?;
    }
    csv.flush().map_err(|e| AppError::io("Failed to flush S-R CSV", e))
}

fn create(path: &Path, what: &str) -> Result<File> {
    File::create(path).map_err(|e| AppError::io(format!("Failed to create {what} '{}'", path.display()), e))
}
