//! Case records → S-R series conversion.

use crate::domain::{CaseRecord, SrObservation, SrSeries};
use crate::error::{AppError, Result};

/// Convert daily case records of one place into an S-R series.
///
/// `Susceptible = population - Confirmed` and `Recovered` is taken as-is.
pub fn to_sr(records: &[CaseRecord], population: u64) -> Result<SrSeries> {
    if population == 0 {
        return Err(AppError::Validation("population must be >= 1".to_string()));
    }

    let observations = records
        .iter()
        .map(|r| {
            let susceptible = population.checked_sub(r.confirmed).ok_or_else(|| {
                AppError::Validation(format!(
                    "Confirmed ({}) exceeds population ({population}) on {}",
                    r.confirmed, r.date
                ))
            })?;
            Ok(SrObservation {
                date: r.date,
                recovered: r.recovered,
                susceptible,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    SrSeries::new(observations)
}
