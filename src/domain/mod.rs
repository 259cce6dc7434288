//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - S-R observations and case records (`SrSeries`, `CaseRecord`)
//! - fit outputs (`TrendFit`, `CandidateFit`, `TrendRow`)
//! - population rows and run configuration

pub mod types;

pub use types::*;
