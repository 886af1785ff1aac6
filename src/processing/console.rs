//! Console echo stage.

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::MapResult;
use crate::types::Record;

use super::{run_upstream, RecordProcessor};

/// Writes each record as pretty-printed JSON (four-space indent) and passes it on unchanged.
pub struct ConsoleProcessor {
    writer: Box<dyn Write + Send>,
    upstream: Option<Box<dyn RecordProcessor>>,
}

impl ConsoleProcessor {
    /// Echo to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Echo to an arbitrary writer.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            upstream: None,
        }
    }

    pub fn with_upstream(mut self, upstream: impl RecordProcessor + 'static) -> Self {
        self.upstream = Some(Box::new(upstream));
        self
    }
}

impl Default for ConsoleProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConsoleProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleProcessor")
            .field("upstream_set", &self.upstream.is_some())
            .finish()
    }
}

impl RecordProcessor for ConsoleProcessor {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let record = run_upstream(&mut self.upstream, record)?;
        let mut ser = Serializer::with_formatter(&mut self.writer, PrettyFormatter::with_indent(b"    "));
        record.serialize(&mut ser)?;
        writeln!(self.writer)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use super::ConsoleProcessor;
    use crate::processing::RecordProcessor;
    use crate::types::record_from_pairs;

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
    fn echoes_pretty_json_and_returns_record() {
        let buf = SharedBuf::default();
        let mut p = ConsoleProcessor::with_writer(buf.clone());
        let input = record_from_pairs([("b", "2"), ("a", "1")]);

        let out = p.process(input.clone()).unwrap();
        assert_eq!(out, input);

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "{\n    \"a\": \"1\",\n    \"b\": \"2\"\n}\n");
    }
}
