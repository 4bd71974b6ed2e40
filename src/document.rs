use std::fmt;
use std::io::{self, BufReader, BufWriter, Read, Write};

use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::reader::{ReadRecordResult, Reader};
use crate::registry::{FieldRegistry, StandardFields};
use crate::{Config, Record, Writer};

/// A whole ADI document held in memory.
///
/// Reading is capped at [`Config::max_document_size`] bytes, checked between
/// records; use a [`Reader`] directly to stream larger inputs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::serialize::deserialize_header")
    )]
    pub header: Option<Record>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub records: Vec<Record>,
}

impl Document {
    pub fn new() -> Document {
        Document {
            header: None,
            records: Vec::with_capacity(64),
        }
    }

    pub fn clear(&mut self) {
        self.header = None;
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.records.is_empty()
    }

    /// Reads records from `input` and appends them to the document, with the default
    /// configuration and the built-in field table. Returns the bytes consumed.
    pub fn read_from<R: Read>(&mut self, input: R) -> Result<u64> {
        self.read_from_with(input, &Config::default(), &StandardFields)
    }

    /// Reads records from `input` and appends them to the document.
    ///
    /// The first record becomes the header if it was closed by `<EOH>` or if
    /// `registry` classifies it as one. A header already in the document is replaced.
    pub fn read_from_with<R: Read>(
        &mut self,
        input: R,
        config: &Config,
        registry: &dyn FieldRegistry,
    ) -> Result<u64> {
        let limit = config.max_document_size;
        let mut reader = Reader::with_config(BufReader::new(input), config);
        let mut first = true;
        loop {
            let mut record = Record::new();
            let result = reader.read_record(&mut record)?;
            if reader.position() > limit {
                warn!(limit, position = reader.position(), "document too large");
                return Err(Error::new(
                    ErrorKind::DocumentTooLarge { limit },
                    reader.position(),
                ));
            }
            match result {
                ReadRecordResult::End(_) => break,
                ReadRecordResult::Header(_) | ReadRecordResult::Record(_) => {}
            }

            if first && (record.is_header() || record.classify(registry).is_header()) {
                record.set_is_header(true);
                self.header = Some(record);
            } else {
                self.records.push(record);
            }
            first = false;
        }
        debug!(
            bytes = reader.position(),
            records = self.records.len(),
            header = self.header.is_some(),
            "read document"
        );
        Ok(reader.position())
    }

    /// Writes the document in ADI format with the default preamble. Returns the bytes written.
    pub fn write_to<W: Write>(&self, out: W) -> Result<u64> {
        self.write_to_with(out, &Config::default())
    }

    /// Writes the document in ADI format. The preamble is only written along with a header.
    ///
    /// Returns the bytes `out` accepted. On failure, [`Error::position`] holds the same count.
    pub fn write_to_with<W: Write>(&self, out: W, config: &Config) -> Result<u64> {
        let sink = Counted {
            inner: out,
            written: 0,
        };
        let mut writer = Writer::with_config(BufWriter::new(sink), config);
        let res = self.write_records(&mut writer);
        // Flush what was accepted even if a record failed, then report the first error.
        let flushed = writer.flush();
        let written = writer.get_ref().get_ref().written;
        if let Err(e) = res.and(flushed) {
            return Err(Error::new(e.into_kind(), written));
        }
        debug!(
            bytes = written,
            records = writer.records_written(),
            "wrote document"
        );
        Ok(written)
    }

    fn write_records<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if let Some(header) = &self.header {
            writer.write_header(header)?;
        }
        for record in &self.records {
            writer.write_record(record)?;
        }
        Ok(())
    }
}

/// Counts the bytes the wrapped writer accepts.
struct Counted<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for Counted<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The document in ADI format. An empty document displays as an empty string.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut out = Vec::new();
        self.write_to(&mut out).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&out))
    }
}
