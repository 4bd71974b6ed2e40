use std::collections::HashMap;
use std::io::{self, BufRead, Read};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, ErrorKind, LengthError, Malformed, Result};
use crate::{Config, Record, EOH, EOR};

/// Lower bound for the Data-Specifier length limit, so that a small
/// `max_field_size` still admits long field names.
const MIN_TAG_LIMIT: usize = 4096;
/// The name cache is dropped when it gets this big, so unique names can't grow it forever.
const MAX_INTERNED_NAMES: usize = 512;
const DEFAULT_FIELD_HINT: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// A data record was read. Carries the bytes consumed by this call.
    Record(u64),
    /// The header was read. Carries the bytes consumed by this call.
    Header(u64),
    /// The input is exhausted. Carries the trailing bytes consumed by this call.
    End(u64),
}

/// What a Data-Specifier turned out to be.
enum Tag {
    Field(Arc<str>),
    EndOfHeader,
    EndOfRecord,
}

/// Reads ADI records one at a time from a buffered byte stream.
///
/// Anything before the first `<` is header preamble and gets skipped, as does
/// text between a field's data and the next tag. A record missing its `<EOR>`
/// at the end of input is still returned.
pub struct Reader<R> {
    input: R,
    specifier: Vec<u8>,     // The current Data-Specifier, without '<' and '>'
    value: Vec<u8>,         // The current field's data
    names: HashMap<Box<[u8]>, Arc<str>>,
    field_hint: usize,      // Largest field count seen so far, used to size new records
    max_field_size: usize,
    skip_header: bool,
    bytes_read: u64,
    records_read: u64,
}

/// Iterator returned by [`Reader::records`]. Stops after the first error.
pub struct Records<'r, R> {
    reader: &'r mut Reader<R>,
    done: bool,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R) -> Reader<R> {
        Reader::with_config(input, &Config::default())
    }

    pub fn with_config(input: R, config: &Config) -> Reader<R> {
        Reader {
            input,
            specifier: Vec::new(),
            value: Vec::new(),
            names: HashMap::new(),
            field_hint: DEFAULT_FIELD_HINT,
            max_field_size: config.max_field_size,
            skip_header: config.skip_header,
            bytes_read: 0,
            records_read: 0,
        }
    }

    /// Total bytes consumed from the input.
    pub fn position(&self) -> u64 {
        self.bytes_read
    }

    /// Records and headers returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn get_ref(&self) -> &R {
        &self.input
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Reads the next record into `record`, replacing its contents.
    ///
    /// On error, `record` keeps the fields parsed before the failure and
    /// [`Error::position`] tells how far into the input the reader got.
    pub fn read_record(&mut self, record: &mut Record) -> Result<ReadRecordResult> {
        record.clear();
        record.reserve(self.field_hint);
        let start = self.bytes_read;
        loop {
            if !self.skip_to_tag()? {
                if record.is_empty() {
                    return Ok(ReadRecordResult::End(self.bytes_read - start));
                }
                return Ok(self.close(record, false, start));
            }

            match self.read_field()? {
                // A repeated field replaces the earlier value
                Tag::Field(name) => record.set_parsed(name, &self.value),
                Tag::EndOfHeader => {
                    if self.skip_header || record.is_empty() {
                        record.clear();
                        continue;
                    }
                    return Ok(self.close(record, true, start));
                }
                Tag::EndOfRecord => {
                    if record.is_empty() {
                        continue;
                    }
                    return Ok(self.close(record, false, start));
                }
            }
        }
    }

    /// Reads the next record, or `None` at the end of the input.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let mut record = Record::with_capacity(self.field_hint);
        match self.read_record(&mut record)? {
            ReadRecordResult::End(_) => Ok(None),
            ReadRecordResult::Record(_) | ReadRecordResult::Header(_) => Ok(Some(record)),
        }
    }

    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            reader: self,
            done: false,
        }
    }

    fn close(&mut self, record: &mut Record, is_header: bool, start: u64) -> ReadRecordResult {
        record.set_is_header(is_header);
        self.field_hint = self.field_hint.max(record.len());
        self.records_read += 1;
        let bytes = self.bytes_read - start;
        trace!(bytes, fields = record.len(), is_header, "read record");
        if is_header {
            ReadRecordResult::Header(bytes)
        } else {
            ReadRecordResult::Record(bytes)
        }
    }

    /// Consumes input up to and including the next `<`. Returns false at the end of input.
    fn skip_to_tag(&mut self) -> Result<bool> {
        loop {
            let (found, used) = {
                let available = match self.input.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::new(ErrorKind::Io(e), self.bytes_read)),
                };
                if available.is_empty() {
                    return Ok(false);
                }
                match available.iter().position(|&b| b == b'<') {
                    Some(i) => (true, i + 1),
                    None => (false, available.len()),
                }
            };
            self.input.consume(used);
            self.bytes_read += used as u64;
            if found {
                return Ok(true);
            }
        }
    }

    /// Reads a Data-Specifier `F[:L[:T]]>` and the `L` bytes of data that follow it.
    /// The data is left in `self.value`.
    fn read_field(&mut self) -> Result<Tag> {
        // The specifier may span several refills of the input buffer; `read_until` collects them all.
        let limit = self.max_field_size.max(MIN_TAG_LIMIT);
        self.specifier.clear();
        let res = (&mut self.input)
            .take(limit as u64)
            .read_until(b'>', &mut self.specifier);
        self.bytes_read += self.specifier.len() as u64;
        if let Err(e) = res {
            return Err(Error::new(ErrorKind::Io(e), self.bytes_read));
        }
        if self.specifier.pop() != Some(b'>') {
            let reason = if self.specifier.len() + 1 >= limit {
                Malformed::TagTooLong { limit }
            } else {
                Malformed::UnclosedTag
            };
            return Err(malformed(reason, self.bytes_read));
        }

        let (name, rest) = match self.specifier.iter().position(|&b| b == b':') {
            Some(i) => {
                let (name, rest) = self.specifier.split_at_mut(i);
                (name, Some(&rest[1..]))
            }
            None => (&mut self.specifier[..], None),
        };
        if name.is_empty() {
            return Err(malformed(Malformed::EmptyFieldName, self.bytes_read));
        }
        name.make_ascii_uppercase();

        let length = match rest {
            Some(rest) => {
                // The data type indicator after a second colon is not interpreted.
                let digits = match rest.iter().position(|&b| b == b':') {
                    Some(i) => &rest[..i],
                    None => rest,
                };
                parse_length(digits, self.max_field_size).map_err(|e| {
                    Error::new(ErrorKind::InvalidFieldLength(e), self.bytes_read)
                })?
            }
            None => 0,
        };

        let tag = if name == EOH.as_bytes() {
            Tag::EndOfHeader
        } else if name == EOR.as_bytes() {
            Tag::EndOfRecord
        } else {
            Tag::Field(intern(&mut self.names, name))
        };

        // A missing or zero length means no data; whatever text follows the tag is skipped later.
        self.value.clear();
        if length > 0 {
            self.value.reserve(length);
            let res = (&mut self.input)
                .take(length as u64)
                .read_to_end(&mut self.value);
            self.bytes_read += self.value.len() as u64;
            if let Err(e) = res {
                return Err(Error::new(ErrorKind::Io(e), self.bytes_read));
            }
            if self.value.len() < length {
                let reason = Malformed::TruncatedValue {
                    expected: length,
                    got: self.value.len(),
                };
                return Err(malformed(reason, self.bytes_read));
            }
        }
        Ok(tag)
    }
}

impl<R: BufRead> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if self.done {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn malformed(reason: Malformed, position: u64) -> Error {
    Error::new(ErrorKind::Malformed(reason), position)
}

/// Names that aren't UTF-8 are kept with the bad bytes replaced by U+FFFD.
fn intern(names: &mut HashMap<Box<[u8]>, Arc<str>>, raw: &[u8]) -> Arc<str> {
    if let Some(name) = names.get(raw) {
        return Arc::clone(name);
    }
    let name: Arc<str> = Arc::from(&*String::from_utf8_lossy(raw));
    if names.len() >= MAX_INTERNED_NAMES {
        names.clear();
    }
    names.insert(raw.into(), Arc::clone(&name));
    name
}

/// Parses a decimal field length without allocating.
pub(crate) fn parse_length(digits: &[u8], max: usize) -> std::result::Result<usize, LengthError> {
    if digits.is_empty() {
        return Err(LengthError::Empty);
    }
    let mut value: usize = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(LengthError::NonDigit(b));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(usize::from(b - b'0')))
            .ok_or(LengthError::Overflow)?;
        if value > max {
            return Err(LengthError::TooLarge { limit: max });
        }
    }
    Ok(value)
}
