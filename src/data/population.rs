//! Cleaned total-population table.
//!
//! Rows are `(ISO3, Country, Province, Date, Population)`. Country-level values
//! use the province placeholder `"-"`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{PopulationRecord, UNKNOWN};
use crate::error::{AppError, Result};

/// Separator between country and province in province-level keys.
pub const KEY_SEP: &str = "/";

/// Pseudo-country that groups places which are not countries (cruise ships etc.).
const OTHERS: &str = "Others";

const COUNTRY_ALIASES: [(&str, &str); 2] = [
    (
        "Congo, the Democratic Republic of the",
        "Democratic Republic of the Congo",
    ),
    ("Congo", "Republic of the Congo"),
];

/// A population row before cleaning; every field may be blank.
#[derive(Debug, Clone)]
pub struct RawPopulationRow {
    pub iso3: Option<String>,
    pub country: String,
    pub province: Option<String>,
    pub date: NaiveDate,
    pub population: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PopulationData {
    records: Vec<PopulationRecord>,
    created: NaiveDate,
    citation: String,
}

impl PopulationData {
    /// Empty table; `created` is the default date for [`PopulationData::update`].
    pub fn new(created: NaiveDate) -> Self {
        Self {
            records: Vec::new(),
            created,
            citation: String::new(),
        }
    }

    /// Clean raw rows into a table.
    ///
    /// - known country aliases are replaced with canonical names
    /// - blank ISO3/province become `"-"`
    /// - `"Diamond Princess"` becomes province of the pseudo-country `"Others"`
    /// - rows without a population value are dropped
    /// - exact duplicates are removed (first occurrence kept)
    pub fn from_records(rows: Vec<RawPopulationRow>, created: NaiveDate) -> Self {
        let total = rows.len();
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(total);

        for row in rows {
            let Some(population) = row.population else {
                continue;
            };
            let mut country = canonical_country(row.country.trim()).to_string();
            let mut province = non_blank(row.province).unwrap_or_else(|| UNKNOWN.to_string());
            if country == "Diamond Princess" {
                country = OTHERS.to_string();
                province = "Diamond Princess".to_string();
            }
            let record = PopulationRecord {
                iso3: non_blank(row.iso3).unwrap_or_else(|| UNKNOWN.to_string()),
                country,
                province,
                date: row.date,
                population,
            };
            if seen.insert(record.clone()) {
                records.push(record);
            }
        }

        debug!(rows = total, kept = records.len(), "population table cleaned");
        Self {
            records,
            created,
            citation: String::new(),
        }
    }

    pub fn cleaned(&self) -> &[PopulationRecord] {
        &self.records
    }

    pub fn citation(&self) -> &str {
        &self.citation
    }

    pub fn set_citation(&mut self, citation: impl Into<String>) {
        self.citation = citation.into();
    }

    pub fn created(&self) -> NaiveDate {
        self.created
    }

    /// Sum of every population value in the table.
    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.population).sum()
    }

    /// Population keyed by country (`country_level`) or by `"Country/Province"`.
    ///
    /// When a key appears on several rows the later row wins.
    pub fn to_map(&self, country_level: bool) -> BTreeMap<String, u64> {
        self.records
            .iter()
            .filter(|r| (r.province == UNKNOWN) == country_level)
            .map(|r| {
                let key = if country_level {
                    r.country.clone()
                } else {
                    format!("{}{KEY_SEP}{}", r.country, r.province)
                };
                (key, r.population)
            })
            .collect()
    }

    /// Population of a place.
    ///
    /// `country` may be a country name or an ISO3 code (case-insensitive).
    /// Without a date the latest record is used; with one, the latest record on
    /// or before that date.
    pub fn value(&self, country: &str, province: Option<&str>, date: Option<NaiveDate>) -> Result<u64> {
        let province = province.unwrap_or(UNKNOWN);
        self.records
            .iter()
            .filter(|r| matches_country(r, country) && r.province == province)
            .filter(|r| date.is_none_or(|d| r.date <= d))
            .max_by_key(|r| r.date)
            .map(|r| r.population)
            .ok_or_else(|| {
                let mut place = format!("population of {country}");
                if province != UNKNOWN {
                    place.push_str(&format!("{KEY_SEP}{province}"));
                }
                if let Some(d) = date {
                    place.push_str(&format!(" on or before {d}"));
                }
                AppError::NotFound(place)
            })
    }

    /// Register or overwrite the population of a place.
    ///
    /// `province` defaults to `"-"` and `date` to the creation date of the table.
    pub fn update(
        &mut self,
        value: u64,
        country: &str,
        province: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<&mut Self> {
        if value == 0 {
            return Err(AppError::Validation(
                "population must be a natural number (>= 1)".to_string(),
            ));
        }
        let province = province.unwrap_or(UNKNOWN);
        let date = date.unwrap_or(self.created);

        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.country == country && r.province == province && r.date == date)
        {
            existing.population = value;
            return Ok(self);
        }

        self.records.push(PopulationRecord {
            iso3: UNKNOWN.to_string(),
            country: country.to_string(),
            province: province.to_string(),
            date,
            population: value,
        });
        Ok(self)
    }

    /// Sorted country names, excluding the `"Others"` pseudo-country.
    pub fn countries(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.country != OTHERS)
            .map(|r| r.country.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn canonical_country(name: &str) -> &str {
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn matches_country(record: &PopulationRecord, query: &str) -> bool {
    let query = query.trim();
    record.country.eq_ignore_ascii_case(query)
        || (record.iso3 != UNKNOWN && record.iso3.eq_ignore_ascii_case(query))
}
