//! CSV ingest and validation.
//!
//! This module is responsible for turning already-cleaned CSV tables into
//! typed values that are safe to fit or query.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no fitting logic here

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::data::{PopulationData, RawPopulationRow};
use crate::domain::{CaseRecord, SrObservation, SrSeries};
use crate::error::{AppError, Result};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the parsed table plus what was skipped.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub data: T,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

type HeaderMap = HashMap<String, usize>;

/// Load an S-R table (`Date,Recovered,Susceptible`).
pub fn load_sr_csv(path: &Path) -> Result<Ingested<SrSeries>> {
    read_sr_csv(open(path)?)
}

/// Load case records (`Date,Confirmed,Fatal,Recovered`).
pub fn load_cases_csv(path: &Path) -> Result<Ingested<Vec<CaseRecord>>> {
    read_cases_csv(open(path)?)
}

/// Load a cleaned population table (`ISO3,Country,Province,Date,Population`).
///
/// `ISO3`, `Province` and `Date` are optional columns; a missing date means
/// `created`.
pub fn load_population_csv(path: &Path, created: NaiveDate) -> Result<Ingested<PopulationData>> {
    read_population_csv(open(path)?, created)
}

/// Read an S-R table; a repeated date is a row error and the first row wins.
pub fn read_sr_csv<R: Read>(reader: R) -> Result<Ingested<SrSeries>> {
    let mut seen = HashSet::new();
    let ingested = read_rows(reader, &["date", "recovered", "susceptible"], |record, headers| {
        let obs = SrObservation {
            date: parse_date(get_required(record, headers, "date")?)?,
            recovered: parse_count(get_required(record, headers, "recovered")?, "recovered")?,
            susceptible: parse_count(get_required(record, headers, "susceptible")?, "susceptible")?,
        };
        if !seen.insert(obs.date) {
            return Err(format!("Duplicate date {}; the earlier row is kept.", obs.date));
        }
        Ok(obs)
    })?;
    let series = SrSeries::new(ingested.data)?;
    Ok(Ingested {
        data: series,
        row_errors: ingested.row_errors,
        rows_read: ingested.rows_read,
        rows_used: ingested.rows_used,
    })
}

pub fn read_cases_csv<R: Read>(reader: R) -> Result<Ingested<Vec<CaseRecord>>> {
    read_rows(reader, &["date", "confirmed", "fatal", "recovered"], |record, headers| {
        let row = CaseRecord {
            date: parse_date(get_required(record, headers, "date")?)?,
            confirmed: parse_count(get_required(record, headers, "confirmed")?, "confirmed")?,
            fatal: parse_count(get_required(record, headers, "fatal")?, "fatal")?,
            recovered: parse_count(get_required(record, headers, "recovered")?, "recovered")?,
        };
        if row.fatal.saturating_add(row.recovered) > row.confirmed {
            return Err(format!(
                "Fatal + Recovered ({}) exceeds Confirmed ({}).",
                row.fatal.saturating_add(row.recovered),
                row.confirmed
            ));
        }
        Ok(row)
    })
}

pub fn read_population_csv<R: Read>(reader: R, created: NaiveDate) -> Result<Ingested<PopulationData>> {
    let ingested = read_rows(reader, &["country", "population"], |record, headers| {
        let date = match get_optional(record, headers, "date") {
            Some(s) => parse_date(s)?,
            None => created,
        };
        let population = get_optional(record, headers, "population")
            .map(|s| parse_count(s, "population"))
            .transpose()?;
        Ok(RawPopulationRow {
            iso3: get_optional(record, headers, "iso3").map(str::to_string),
            country: get_required(record, headers, "country")?.to_string(),
            province: get_optional(record, headers, "province").map(str::to_string),
            date,
            population,
        })
    })?;
    Ok(Ingested {
        data: PopulationData::from_records(ingested.data, created),
        row_errors: ingested.row_errors,
        rows_read: ingested.rows_read,
        rows_used: ingested.rows_used,
    })
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| AppError::io(format!("Failed to open CSV '{}'", path.display()), e))
}

fn read_rows<R, T, F>(reader: R, required: &[&str], mut parse: F) -> Result<Ingested<Vec<T>>>
where
    R: Read,
    F: FnMut(&StringRecord, &HeaderMap) -> std::result::Result<T, String>,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = build_header_map(reader.headers()?);
    for name in required {
        if !headers.contains_key(*name) {
            return Err(AppError::Csv(format!("Missing required column: `{name}`")));
        }
    }

    let mut data = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse(&record, &headers));
        match parsed {
            Ok(row) => data.push(row),
            Err(message) => {
                warn!(line, %message, "skipping CSV row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    let rows_used = data.len();
    if rows_used == 0 {
        return Err(AppError::Validation(
            "No valid rows remain after validation.".to_string(),
        ));
    }
    info!(rows_read, rows_used, skipped = row_errors.len(), "CSV ingested");

    Ok(Ingested {
        data,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HeaderMap {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes carry a UTF-8 BOM on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, headers: &HeaderMap, name: &str) -> std::result::Result<&'a str, String> {
    let idx = headers
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, headers: &HeaderMap, name: &str) -> Option<&'a str> {
    let idx = headers.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a date in one of the accepted formats.
pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    // ISO dates are preferred; `01Jun2020` is the compact form used in reports.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d%b%Y", "%m/%d/%Y", "%Y/%m/%d"];
    let s = s.trim();
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DDMonYYYY, MM/DD/YYYY, YYYY/MM/DD."
    ))
}

/// Parse a non-negative count; integral floats such as `120.0` are accepted.
fn parse_count(s: &str, name: &str) -> std::result::Result<u64, String> {
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 => Ok(v as u64),
        _ => Err(format!("Invalid `{name}` value '{s}' (expected a non-negative integer).")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_date_accepts_known_formats() {
        assert_eq!(parse_date("2020-06-01").unwrap(), date(2020, 6, 1));
        assert_eq!(parse_date("01Jun2020").unwrap(), date(2020, 6, 1));
        assert_eq!(parse_date("06/01/2020").unwrap(), date(2020, 6, 1));
        assert!(parse_date("June first").is_err());
    }

    #[test]
    fn parse_count_accepts_integral_floats() {
        assert_eq!(parse_count("120", "x").unwrap(), 120);
        assert_eq!(parse_count("120.0", "x").unwrap(), 120);
        assert!(parse_count("-1", "x").is_err());
        assert!(parse_count("1.5", "x").is_err());
    }

    #[test]
    fn sr_csv_skips_bad_rows_and_sorts() {
        let csv = "\u{feff}Date,Recovered,Susceptible\n\
                   2020-04-02,20,980\n\
                   2020-04-01,10,990\n\
                   bad-date,30,970\n\
                   2020-04-03,,960\n";
        let ingested = read_sr_csv(csv.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 4);
        assert_eq!(ingested.rows_used, 2);
        assert_eq!(ingested.row_errors.len(), 2);
        assert_eq!(ingested.row_errors[0].line, 4);
        let obs = ingested.data.observations();
        assert_eq!(obs[0].date, date(2020, 4, 1));
        assert_eq!(obs[1].susceptible, 980);
    }

    #[test]
    fn sr_csv_skips_repeated_dates() {
        let csv = "Date,Recovered,Susceptible\n\
                   2020-04-01,10,990\n\
                   2020-04-02,20,980\n\
                   2020-04-01,11,989\n";
        let ingested = read_sr_csv(csv.as_bytes()).unwrap();
        assert_eq!(ingested.rows_used, 2);
        assert_eq!(ingested.row_errors.len(), 1);
        assert_eq!(ingested.row_errors[0].line, 4);
        assert!(ingested.row_errors[0].message.contains("2020-04-01"));
        assert_eq!(ingested.data.observations()[0].recovered, 10);
    }

    #[test]
    fn sr_csv_requires_columns() {
        let err = read_sr_csv("Date,Recovered\n2020-04-01,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Csv(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_table_is_an_error() {
        let err = read_sr_csv("Date,Recovered,Susceptible\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn cases_csv_checks_consistency() {
        let csv = "Date,Confirmed,Fatal,Recovered\n\
                   2020-04-01,100,5,20\n\
                   2020-04-02,100,50,60\n";
        let ingested = read_cases_csv(csv.as_bytes()).unwrap();
        assert_eq!(ingested.rows_used, 1);
        assert_eq!(ingested.data[0].infected(), 75);
    }

    #[test]
    fn population_csv_defaults_optional_columns() {
        let created = date(2020, 7, 1);
        let csv = "Country,Population\nJapan,126500000\nMoon,\n";
        let ingested = read_population_csv(csv.as_bytes(), created).unwrap();
        let table = ingested.data;
        assert_eq!(table.cleaned().len(), 1);
        assert_eq!(table.cleaned()[0].date, created);
        assert_eq!(table.value("Japan", None, None).unwrap(), 126_500_000);
    }
}
