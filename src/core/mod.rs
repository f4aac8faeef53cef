//! Foundational types shared by every engine: records, currencies and
//! rate tables, positions, configuration and the issue taxonomy.

pub mod config;
pub mod currency;
pub mod error;
pub mod parallel;
pub mod position;
pub mod record;
