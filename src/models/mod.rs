//! Core data models for analogia: records, configuration and errors.

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
