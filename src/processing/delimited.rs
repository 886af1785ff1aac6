//! Delimited-row output stage.

use std::fmt;
use std::io::{self, Write};

use crate::error::MapResult;
use crate::ingestion::csv::DelimitedFormat;
use crate::types::Record;

use super::{run_upstream, RecordProcessor};

/// Writes records as delimited rows under a fixed header and passes them on unchanged.
///
/// The header line is written before the first record, or on [`flush`](Self::flush) when no
/// record came through. Fields missing from a record, and null values, are written as empty cells.
pub struct DelimitedOutputProcessor {
    header: Vec<String>,
    writer: csv::Writer<Box<dyn Write + Send>>,
    records_written: usize,
    header_written: bool,
    upstream: Option<Box<dyn RecordProcessor>>,
}

impl DelimitedOutputProcessor {
    /// Write to stdout.
    pub fn new(header: Vec<String>, format: DelimitedFormat) -> Self {
        Self::with_writer(header, format, io::stdout())
    }

    pub fn with_writer(header: Vec<String>, format: DelimitedFormat, writer: impl Write + Send + 'static) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        Self {
            header,
            writer: format.writer_builder().from_writer(boxed),
            records_written: 0,
            header_written: false,
            upstream: None,
        }
    }

    pub fn with_upstream(mut self, upstream: impl RecordProcessor + 'static) -> Self {
        self.upstream = Some(Box::new(upstream));
        self
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush buffered rows to the underlying writer.
    pub fn flush(&mut self) -> MapResult<()> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_header(&mut self) -> MapResult<()> {
        if !self.header_written {
            self.writer.write_record(&self.header)?;
            self.header_written = true;
        }
        Ok(())
    }

    fn write_row(&mut self, record: &Record) -> MapResult<()> {
        self.write_header()?;
        let row = self
            .header
            .iter()
            .map(|field| record.get(field).map(ToString::to_string).unwrap_or_default());
        self.writer.write_record(row)?;
        self.records_written += 1;
        Ok(())
    }
}

impl fmt::Debug for DelimitedOutputProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelimitedOutputProcessor")
            .field("header", &self.header)
            .field("records_written", &self.records_written)
            .field("upstream_set", &self.upstream.is_some())
            .finish()
    }
}

impl RecordProcessor for DelimitedOutputProcessor {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let record = run_upstream(&mut self.upstream, record)?;
        self.write_row(&record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use super::DelimitedOutputProcessor;
    use crate::ingestion::csv::DelimitedFormat;
    use crate::processing::RecordProcessor;
    use crate::types::{record_from_pairs, Value};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_header_then_every_record() {
        let buf = SharedBuf::default();
        let header = vec!["fullname".to_string(), "status".to_string(), "age".to_string()];
        let mut p = DelimitedOutputProcessor::with_writer(header, DelimitedFormat::new(b'|', b'"'), buf.clone());

        let mut first = record_from_pairs([("fullname", "Jane Doe"), ("status", "active")]);
        first.insert("age".to_string(), Value::Int64(41));
        p.process(first).unwrap();
        let mut second = record_from_pairs([("fullname", "A|B")]);
        second.insert("status".to_string(), Value::Null);
        p.process(second).unwrap();
        p.flush().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "fullname|status|age\nJane Doe|active|41\n\"A|B\"||\n");
        assert_eq!(p.records_written(), 2);
    }

    #[test]
    fn empty_stream_still_writes_header_once() {
        let buf = SharedBuf::default();
        let header = vec!["name".to_string(), "email".to_string()];
        let mut p = DelimitedOutputProcessor::with_writer(header, DelimitedFormat::new(b'|', b'"'), buf.clone());

        p.flush().unwrap();
        p.flush().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "name|email\n");
        assert_eq!(p.records_written(), 0);
    }
}
