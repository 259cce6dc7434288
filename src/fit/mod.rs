//! Trend fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit each candidate model on `ln(Susceptible)` vs `Recovered`
//! - score each fit on the count scale
//! - select the better model

pub mod fitter;
pub mod score;
pub mod selection;

pub use fitter::*;
pub use score::*;
pub use selection::*;
