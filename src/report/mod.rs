//! Reporting utilities: human-readable summaries of fits and tables.

pub mod format;

pub use format::*;
