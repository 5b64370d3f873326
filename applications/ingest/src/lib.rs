//! Soul Ingest CLI Library
//!
//! Configuration and wiring for the `soul-ingest` binary, exposed for testing.

pub mod config;
pub mod error;

pub use config::IngestConfig;
pub use error::{CliError, Result};
