//! CSV sink writing `URL,Title` rows

use crate::output::traits::{Sink, SinkError, SinkResult};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Sink that writes one CSV row per result, after a `URL,Title` header
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    /// Wraps `inner` and writes the header row
    pub fn new(inner: W) -> SinkResult<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(["URL", "Title"])?;
        Ok(Self { writer })
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> SinkResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl CsvSink<File> {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> SinkResult<Self> {
        Self::new(File::create(path)?)
    }
}

impl CsvSink<io::Stdout> {
    /// Writes to standard output
    pub fn stdout() -> SinkResult<Self> {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Sink for CsvSink<W> {
    fn write(&mut self, address: &str, title: &str) -> SinkResult<()> {
        self.writer.write_record([address, title])?;
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        sink.write("https://telegram.org/help", "Telegram Title").unwrap();
        sink.write("https://telegram.org/first", "First, with comma")
            .unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "URL,Title\n\
             https://telegram.org/help,Telegram Title\n\
             https://telegram.org/first,\"First, with comma\"\n"
        );
    }

    #[test]
    fn test_empty_title() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        sink.write("https://example.com/", "").unwrap();

        let out = sink.into_inner().unwrap();
        let mut reader = csv::Reader::from_reader(out.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "https://example.com/");
        assert_eq!(&rows[0][1], "");
    }

    #[test]
    fn test_file_sink() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = CsvSink::create(file.path()).unwrap();
        sink.write("https://example.com/", "Example").unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "URL,Title\nhttps://example.com/,Example\n");
    }
}
