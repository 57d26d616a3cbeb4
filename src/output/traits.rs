//! Sink trait and error types
//!
//! A sink receives one record per successfully fetched page. Sinks are
//! append-only: records already written are never updated or removed.

use thiserror::Error;

/// Errors that can occur while writing result records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write output: {0}")]
    Write(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for successful crawl results
pub trait Sink: Send {
    /// Appends one (address, title) record
    fn write(&mut self, address: &str, title: &str) -> SinkResult<()>;

    /// Flushes buffered records to the destination
    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }

    /// Called once after the run stops, with the stop reason
    fn finish(&mut self, _stop_reason: &str) -> SinkResult<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, address: &str, title: &str) -> SinkResult<()> {
        (**self).write(address, title)
    }

    fn flush(&mut self) -> SinkResult<()> {
        (**self).flush()
    }

    fn finish(&mut self, stop_reason: &str) -> SinkResult<()> {
        (**self).finish(stop_reason)
    }
}
