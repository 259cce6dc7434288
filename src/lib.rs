//! `sr-trend` library crate.
//!
//! The binary (`srt`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitter can be reused by other front-ends

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
