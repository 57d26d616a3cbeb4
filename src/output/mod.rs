//! Output module for writing crawl results
//!
//! This module handles:
//! - The `Sink` contract used by the result consumer
//! - CSV output (file or stdout)
//! - SQLite output with per-run records

mod csv_sink;
mod sqlite_sink;
mod traits;

pub use csv_sink::CsvSink;
pub use sqlite_sink::{ResultRecord, SqliteSink, SCHEMA_SQL};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::{Config, OutputFormat};
use std::path::Path;

/// Opens the sink described by the configuration
///
/// CSV goes to the configured file, or to stdout when no output is set.
/// SQLite always needs a path (enforced by config validation).
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `config_hash` - Hash of the configuration file, stored with SQLite runs
pub fn open_sink(config: &Config, config_hash: &str) -> SinkResult<Box<dyn Sink>> {
    match (config.format, config.output_path()) {
        (OutputFormat::Csv, Some(path)) => {
            tracing::info!("Writing CSV results to {}", path);
            Ok(Box::new(CsvSink::create(Path::new(path))?))
        }
        (OutputFormat::Csv, None) => Ok(Box::new(CsvSink::stdout()?)),
        (OutputFormat::Sqlite, Some(path)) => {
            tracing::info!("Writing SQLite results to {}", path);
            Ok(Box::new(SqliteSink::open(
                Path::new(path),
                &config.url,
                config_hash,
            )?))
        }
        (OutputFormat::Sqlite, None) => Err(SinkError::Write(
            "sqlite output requires an output path".to_string(),
        )),
    }
}
