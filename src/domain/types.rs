//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - rebuilt from CSV inputs or synthetic samples

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Minimum number of observations needed to fit a trend.
pub const MIN_OBSERVATIONS: usize = 3;

/// Placeholder used for unknown ISO3 codes and country-level provinces.
pub const UNKNOWN: &str = "-";

/// One dated observation of an S-R pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrObservation {
    pub date: NaiveDate,
    pub recovered: u64,
    pub susceptible: u64,
}

/// Date-ordered S-R observations.
///
/// Construction sorts by date and rejects duplicated dates, so every consumer can
/// rely on a strictly increasing time index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrSeries {
    observations: Vec<SrObservation>,
}

impl SrSeries {
    pub fn new(mut observations: Vec<SrObservation>) -> Result<Self> {
        observations.sort_by_key(|o| o.date);
        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(AppError::Validation(format!(
                "duplicated observation date {}",
                pair[0].date
            )));
        }
        Ok(Self { observations })
    }

    pub fn observations(&self) -> &[SrObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Inclusive date sub-range, used to cut a phase out of the full history.
    pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(AppError::Usage(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        let observations = self
            .observations
            .iter()
            .filter(|o| start.is_none_or(|s| o.date >= s) && end.is_none_or(|e| o.date <= e))
            .copied()
            .collect();
        Ok(Self { observations })
    }
}

/// Daily case counts for one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub date: NaiveDate,
    pub confirmed: u64,
    pub fatal: u64,
    pub recovered: u64,
}

impl CaseRecord {
    /// Currently infected cases: `Confirmed - Fatal - Recovered`.
    pub fn infected(&self) -> u64 {
        self.confirmed
            .saturating_sub(self.fatal)
            .saturating_sub(self.recovered)
    }
}

/// Candidate trend model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `f(x) = a·x + b`
    Linear,
    /// `f(x) = a·exp(-b·x)`
    NegativeExponential,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Linear, ModelKind::NegativeExponential];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::NegativeExponential => "negative_exponential",
        }
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    /// Gradient, cost or step tolerance reached.
    Converged,
    /// Iteration cap reached; the best iterate is reported.
    MaxIterations,
    /// Damping grew without finding a better step.
    Stalled,
    /// The starting point already produced non-finite residuals.
    NonFiniteStart,
}

impl FitStatus {
    pub fn is_converged(self) -> bool {
        self == FitStatus::Converged
    }
}

/// One row of a trend fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Recovered")]
    pub recovered: u64,
    #[serde(rename = "Susceptible_actual")]
    pub susceptible_actual: u64,
    #[serde(rename = "Susceptible_predicted")]
    pub susceptible_predicted: u64,
}

/// Fit of a single candidate model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFit {
    pub model: ModelKind,
    /// Fitted `(a, b)`.
    pub params: [f64; 2],
    /// Starting `(a, b)` derived from the data.
    pub initial_params: [f64; 2],
    /// Half sum of squared residuals in log space.
    pub cost: f64,
    pub iterations: usize,
    pub status: FitStatus,
    /// RMSLE-like score; `0` means undefined.
    pub score: f64,
    pub rows: Vec<TrendRow>,
}

impl CandidateFit {
    /// Whether the optimizer stopped on a tolerance rather than a cap/failure.
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }
}

/// Selected trend with both candidates kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFit {
    pub best: ModelKind,
    pub candidates: Vec<CandidateFit>,
}

impl TrendFit {
    pub fn best_fit(&self) -> Option<&CandidateFit> {
        self.candidate(self.best)
    }

    pub fn candidate(&self, model: ModelKind) -> Option<&CandidateFit> {
        self.candidates.iter().find(|c| c.model == model)
    }

    /// Score of the selected model.
    pub fn rmsle(&self) -> f64 {
        self.best_fit().map(|c| c.score).unwrap_or(0.0)
    }

    /// Rows of the selected model.
    pub fn rows(&self) -> &[TrendRow] {
        self.best_fit().map(|c| c.rows.as_slice()).unwrap_or(&[])
    }
}

/// One row of the cleaned population table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopulationRecord {
    #[serde(rename = "ISO3")]
    pub iso3: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Population")]
    pub population: u64,
}

/// Where the S-R series for a trend run comes from.
#[derive(Debug, Clone)]
pub enum TrendSource {
    /// CSV with `Date,Recovered,Susceptible`.
    SrCsv(PathBuf),
    /// CSV with `Date,Confirmed,Fatal,Recovered` plus the total population.
    CasesCsv { path: PathBuf, population: u64 },
}

/// A trend run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrendConfig {
    pub source: TrendSource,
    pub area: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub max_iter: usize,
    pub show_rows: bool,
    pub export_rows: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Settings for the synthetic S-R generator.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub model: ModelKind,
    pub params: [f64; 2],
    pub days: usize,
    pub start: NaiveDate,
    pub recovered_step: u64,
    /// Standard deviation of the additive noise on `ln(Susceptible)`.
    pub noise: f64,
    pub seed: u64,
}
