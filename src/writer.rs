use std::borrow::Cow;
use std::io::{self, Write};

use crate::error::{Error, ErrorKind, Result};
use crate::{Config, Record, EOH, EOR};

const EOH_TAG: &[u8] = b"<EOH>\n";
const EOR_TAG: &[u8] = b"<EOR>\n";

/// Writes an ADI document: an optional header followed by data records.
///
/// Each record is encoded into a reused buffer that is sized up front, then
/// handed to the underlying writer in one piece. Fields are written in
/// lexicographic order of their names.
pub struct Writer<W: Write> {
    inner: W,
    buf: Vec<u8>,
    preamble: Cow<'static, str>,
    header_written: bool,
    bytes_written: u64,
    records_written: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Writer<W> {
        Writer::with_config(inner, &Config::default())
    }

    pub fn with_config(inner: W, config: &Config) -> Writer<W> {
        Self {
            inner,
            buf: Vec::new(),
            preamble: config.preamble.clone(),
            header_written: false,
            bytes_written: 0,
            records_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Data records written so far. Empty records are not counted since they aren't written.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Writes the preamble followed by the header fields and `<EOH>`.
    /// An empty header produces just the preamble. Only one header may be written.
    pub fn write_header(&mut self, header: &Record) -> Result<usize> {
        if self.header_written {
            return Err(Error::new(ErrorKind::HeaderAlreadyWritten, self.bytes_written));
        }
        self.header_written = true;

        self.buf.clear();
        self.buf.extend_from_slice(self.preamble.as_bytes());
        if !self.buf.ends_with(b"\n") {
            self.buf.push(b'\n');
        }
        encode_terminated(header, EOH_TAG, &mut self.buf);
        write_counted(&mut self.inner, &self.buf, &mut self.bytes_written)
    }

    /// Writes the record fields followed by `<EOR>`. A record with nothing to
    /// encode writes nothing.
    ///
    /// If the underlying writer fails, [`Error::position`] holds the total bytes
    /// it accepted before failing.
    pub fn write_record(&mut self, record: &Record) -> Result<usize> {
        self.buf.clear();
        encode_terminated(record, EOR_TAG, &mut self.buf);
        if self.buf.is_empty() {
            return Ok(0);
        }
        let written = write_counted(&mut self.inner, &self.buf, &mut self.bytes_written)?;
        self.records_written += 1;
        Ok(written)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| Error::new(ErrorKind::Io(e), self.bytes_written))
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Appends the fields and `tag` to `buf`, unless there are no fields to encode.
fn encode_terminated(record: &Record, tag: &[u8], buf: &mut Vec<u8>) {
    let fields_len = encoded_len(record);
    if fields_len == 0 {
        return;
    }
    let len = fields_len + tag.len();
    buf.reserve(len);
    let start = buf.len();
    encode_fields(record, buf);
    buf.extend_from_slice(tag);
    debug_assert_eq!(buf.len() - start, len);
}

/// Size of `<NAME:LEN>VALUE` for every field with an encodable name.
pub(crate) fn encoded_len(record: &Record) -> usize {
    record
        .iter()
        .filter(|(name, _)| is_encodable(name))
        .map(|(name, value)| 3 + name.len() + digit_count(value.len()) + value.len())
        .sum()
}

pub(crate) fn encode_fields(record: &Record, buf: &mut Vec<u8>) {
    for (name, value) in record.iter().filter(|(name, _)| is_encodable(name)) {
        buf.push(b'<');
        buf.extend_from_slice(name.as_bytes());
        buf.push(b':');
        push_decimal(buf, value.len());
        buf.push(b'>');
        buf.extend_from_slice(value);
    }
}

/// Names that would read back as something else are never written: empty names,
/// names holding `:` or `>`, and the terminators.
fn is_encodable(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c == ':' || c == '>') && name != EOH && name != EOR
}

fn digit_count(n: usize) -> usize {
    n.checked_ilog10().map_or(1, |log| log as usize + 1)
}

fn push_decimal(buf: &mut Vec<u8>, mut n: usize) {
    let start = buf.len();
    buf.resize(start + digit_count(n), b'0');
    for slot in buf[start..].iter_mut().rev() {
        *slot = b'0' + (n % 10) as u8;
        n /= 10;
    }
}

/// Writes all of `data`, adding every accepted byte to `written` even when a later write fails.
pub(crate) fn write_counted<W: Write + ?Sized>(
    out: &mut W,
    mut data: &[u8],
    written: &mut u64,
) -> Result<usize> {
    let total = data.len();
    while !data.is_empty() {
        match out.write(data) {
            Ok(0) => {
                let e = io::Error::new(io::ErrorKind::WriteZero, "failed to write whole record");
                return Err(Error::new(ErrorKind::Io(e), *written));
            }
            Ok(n) => {
                *written += n as u64;
                data = &data[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::new(ErrorKind::Io(e), *written)),
        }
    }
    Ok(total)
}
