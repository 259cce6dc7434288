//! Synthetic S-R series generation.
//!
//! `Recovered` grows by a fixed step per day and `ln(Susceptible)` follows the
//! chosen model with additive Gaussian noise. The generator is deterministic for
//! a given seed.

use chrono::Duration;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{SampleConfig, SrObservation, SrSeries};
use crate::error::{AppError, Result};
use crate::models::evaluate;

pub fn generate_sample(config: &SampleConfig) -> Result<SrSeries> {
    if config.days == 0 {
        return Err(AppError::Usage("Sample days must be > 0.".to_string()));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::Usage("Noise must be finite and >= 0.".to_string()));
    }
    if !config.params.iter().all(|p| p.is_finite()) {
        return Err(AppError::Usage("Model parameters must be finite.".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::Numerical(format!("Noise distribution error: {e}")))?;

    let mut observations = Vec::with_capacity(config.days);
    for day in 0..config.days {
        let recovered = config.recovered_step.saturating_mul(day as u64);
        let ln_s = evaluate(config.model, recovered as f64, &config.params);
        let noisy = ln_s + config.noise * normal.sample(&mut rng);
        let susceptible = noisy.exp().round();
        if !(susceptible.is_finite() && susceptible >= 1.0) {
            return Err(AppError::Numerical(format!(
                "Generated Susceptible is out of range on day {day} (ln S = {noisy:.3})."
            )));
        }

        observations.push(SrObservation {
            date: config.start + Duration::days(day as i64),
            recovered,
            susceptible: susceptible as u64,
        });
    }

    SrSeries::new(observations)
}
