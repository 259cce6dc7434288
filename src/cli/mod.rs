//! Command-line parsing for the S-R trend fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code. Parsed args are turned into plain config structs in `app`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::ModelKind;
use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "srt", version, about = "Susceptible-Recovered trend fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit linear and negative-exponential trends of ln(Susceptible) against Recovered.
    Trend(TrendArgs),
    /// Query a cleaned population table.
    Population(PopulationArgs),
    /// Write a synthetic S-R series drawn from one of the trend models.
    Sample(SampleArgs),
}

#[derive(Debug, Args, Clone)]
pub struct TrendArgs {
    /// S-R CSV (`Date,Recovered,Susceptible`).
    #[arg(short, long, value_name = "CSV", conflicts_with = "cases", required_unless_present = "cases")]
    pub input: Option<PathBuf>,

    /// Case CSV (`Date,Confirmed,Fatal,Recovered`); requires `--population`.
    #[arg(long, value_name = "CSV", requires = "population")]
    pub cases: Option<PathBuf>,

    /// Total population used to derive Susceptible from case counts.
    #[arg(long)]
    pub population: Option<u64>,

    /// First date of the phase (inclusive).
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Last date of the phase (inclusive).
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Area name shown in the report.
    #[arg(long)]
    pub area: Option<String>,

    /// Iteration cap for each least squares fit.
    #[arg(long, env = "SRT_MAX_ITER", default_value_t = 5000)]
    pub max_iter: usize,

    /// Export the selected model's rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export both candidate fits to JSON.
    #[arg(long, value_name = "JSON")]
    pub json: Option<PathBuf>,

    /// Do not print per-date rows.
    #[arg(long)]
    pub quiet_rows: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PopulationArgs {
    /// Population CSV (`ISO3,Country,Province,Date,Population`).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Country name or ISO3 code to look up.
    #[arg(long)]
    pub country: Option<String>,

    /// Province to look up (country-level value when omitted).
    #[arg(long, requires = "country")]
    pub province: Option<String>,

    /// Latest record on or before this date.
    #[arg(long, requires = "country", value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// List province-level values instead of country totals.
    #[arg(long, conflicts_with = "country")]
    pub by_province: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Model the series is drawn from.
    #[arg(long, value_enum)]
    pub model: ModelKind,

    /// First model parameter.
    #[arg(long, allow_negative_numbers = true)]
    pub a: f64,

    /// Second model parameter.
    #[arg(long, allow_negative_numbers = true)]
    pub b: f64,

    /// Number of daily observations.
    #[arg(long, default_value_t = 30)]
    pub days: usize,

    /// Date of the first observation.
    #[arg(long, value_parser = parse_date, default_value = "2020-04-01")]
    pub start: NaiveDate,

    /// Increase of Recovered per day.
    #[arg(long, default_value_t = 100)]
    pub recovered_step: u64,

    /// Standard deviation of the noise added to ln(Susceptible).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, env = "SRT_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trend_requires_a_source() {
        assert!(Cli::try_parse_from(["srt", "trend"]).is_err());
        assert!(Cli::try_parse_from(["srt", "trend", "--cases", "c.csv"]).is_err());
        let cli = Cli::try_parse_from(["srt", "trend", "--cases", "c.csv", "--population", "1000"]).unwrap();
        let Command::Trend(args) = cli.command else {
            panic!("expected trend");
        };
        assert_eq!(args.population, Some(1000));
        assert!(args.input.is_none());
    }

    #[test]
    fn trend_parses_dates() {
        let cli = Cli::try_parse_from([
            "srt", "trend", "-i", "sr.csv", "--start", "01Apr2020", "--end", "2020-04-30",
        ])
        .unwrap();
        let Command::Trend(args) = cli.command else {
            panic!("expected trend");
        };
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2020, 4, 1));
        assert_eq!(args.end, NaiveDate::from_ymd_opt(2020, 4, 30));
    }

    #[test]
    fn sample_accepts_negative_parameters() {
        let cli = Cli::try_parse_from([
            "srt", "sample", "--model", "negative-exponential", "--a", "12", "--b", "-0.01", "-o", "out.csv",
        ])
        .unwrap();
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!(args.model, ModelKind::NegativeExponential);
        assert_eq!(args.b, -0.01);
    }
}
