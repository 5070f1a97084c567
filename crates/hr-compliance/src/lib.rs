//! Compliance rule engine and alert lifecycle for HR administration records.

pub mod clock;
pub mod compliance;
pub mod config;
pub mod error;
pub mod telemetry;
