//! Data sources and cleaned tables.
//!
//! - population table cleaning and lookups (`population`)
//! - case records → S-R conversion (`records`)
//! - seeded synthetic S-R series (`sample`)

pub mod population;
pub mod records;
pub mod sample;

pub use population::*;
pub use records::*;
pub use sample::*;
