use std::borrow::Cow;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::Result;
use crate::pool::BUFFERS;
use crate::reader::Reader;
use crate::registry::{is_userdef, Classification, FieldKind, FieldRegistry};
use crate::{printer, writer, Config};

const DEFAULT_CAPACITY: usize = 8;

/// One ADIF record: a set of uppercase field names mapped to non-empty byte values.
///
/// Setting a field to an empty value removes it. Iteration is in lexicographic
/// order of the field names; that order has nothing to do with the order the
/// fields had on the wire, so compare records as sets.
#[derive(Clone, Default)]
pub struct Record {
    fields: HashMap<Arc<str>, Vec<u8>>,
    // Sorted field names, rebuilt on demand after a field is added or removed.
    order: OnceLock<Vec<Arc<str>>>,
    is_header: bool,
}

/// Iterator over the fields of a [`Record`], sorted by name.
pub struct Fields<'a> {
    names: core::slice::Iter<'a, Arc<str>>,
    fields: &'a HashMap<Arc<str>, Vec<u8>>,
}

impl Record {
    pub fn new() -> Record {
        Record::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Record {
        Record {
            fields: HashMap::with_capacity(capacity),
            order: OnceLock::new(),
            is_header: false,
        }
    }

    /// Reads the first data record from `input`, skipping a header if there is one.
    /// Returns `None` if the input holds no data record, along with the bytes consumed.
    pub fn read_from<R: BufRead>(input: R) -> Result<(Option<Record>, u64)> {
        let config = Config {
            skip_header: true,
            ..Config::default()
        };
        let mut reader = Reader::with_config(input, &config);
        let record = reader.next_record()?;
        Ok((record, reader.position()))
    }

    pub fn is_header(&self) -> bool {
        self.is_header
    }

    pub fn set_is_header(&mut self, is_header: bool) {
        self.is_header = is_header;
    }

    /// Returns the value of `name`, or an empty slice if the field is absent.
    pub fn get(&self, name: &str) -> &[u8] {
        self.fields
            .get(&*normalize(name))
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the value of `name` as a string, or `None` if it isn't valid UTF-8.
    /// Absent fields read as `""`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        std::str::from_utf8(self.get(name)).ok()
    }

    /// Sets `name` to `value`. An empty value removes the field.
    ///
    /// Any name is stored, but the writer skips names it can't encode: empty
    /// names, names holding `:` or `>`, and `EOH`/`EOR`.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<Vec<u8>>) {
        let name = name.as_ref();
        let value = value.into();
        if value.is_empty() {
            self.remove(name);
            return;
        }
        // Most callers already use uppercase names.
        if let Some(slot) = self.fields.get_mut(name) {
            *slot = value;
            return;
        }
        let name = normalize(name);
        match self.fields.get_mut(&*name) {
            Some(slot) => *slot = value,
            None => {
                self.fields.insert(Arc::from(&*name), value);
                self.order.take();
            }
        }
    }

    /// Stores a value the reader parsed. `name` is already uppercase.
    pub(crate) fn set_parsed(&mut self, name: Arc<str>, value: &[u8]) {
        if value.is_empty() {
            if self.fields.remove(&name).is_some() {
                self.order.take();
            }
            return;
        }
        match self.fields.entry(name) {
            Entry::Occupied(mut slot) => {
                let slot = slot.get_mut();
                slot.clear();
                slot.extend_from_slice(value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                self.order.take();
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let removed = self.fields.remove(&*normalize(name));
        if removed.is_some() {
            self.order.take();
        }
        removed
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Removes all fields and the header flag, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.order.take();
        self.is_header = false;
    }

    pub fn reserve(&mut self, additional: usize) {
        self.fields.reserve(additional);
    }

    pub fn iter(&self) -> Fields<'_> {
        let names = self.order.get_or_init(|| {
            let mut names: Vec<_> = self.fields.keys().cloned().collect();
            names.sort_unstable();
            names
        });
        Fields {
            names: names.iter(),
            fields: &self.fields,
        }
    }

    /// Trims ASCII whitespace around every value, dropping fields that end up empty.
    pub fn trim(&mut self) {
        let before = self.fields.len();
        self.fields.retain(|_, value| {
            let end = value.len() - value.iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
            value.truncate(end);
            let start = value.iter().take_while(|b| b.is_ascii_whitespace()).count();
            value.drain(..start);
            !value.is_empty()
        });
        if self.fields.len() != before {
            self.order.take();
        }
    }

    /// Guesses whether this is a header record from the names of its fields.
    ///
    /// Any field the registry knows as a data field makes it data, since some
    /// loggers copy header fields such as `PROGRAMID` into every record.
    /// Otherwise a header-only field or a `USERDEFn` field makes it a header.
    pub fn classify(&self, registry: &dyn FieldRegistry) -> Classification {
        let mut header = false;
        for name in self.fields.keys() {
            match registry.lookup(name) {
                FieldKind::Data => return Classification::Data,
                FieldKind::HeaderOnly => header = true,
                FieldKind::Unknown => header |= is_userdef(name),
            }
        }
        if header {
            Classification::Header
        } else {
            debug!(fields = self.fields.len(), "record classification inconclusive");
            Classification::Inconclusive
        }
    }

    /// Length of the ADI encoding of the fields, without a terminator tag.
    pub fn encoded_len(&self) -> usize {
        writer::encoded_len(self)
    }

    /// Appends the ADI encoding of the fields to `buf`, without a terminator tag.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        writer::encode_fields(self, buf);
    }

    /// Writes the fields in ADI format, without a terminator tag. Returns the bytes written.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<usize> {
        let mut buf = BUFFERS.acquire(self.encoded_len());
        writer::encode_fields(self, &mut buf);
        let mut written = 0;
        writer::write_counted(&mut out, &buf, &mut written)?;
        Ok(written as usize)
    }
}

/// Uppercases ASCII letters, borrowing when there's nothing to change.
fn normalize(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_lowercase()) {
        Cow::Owned(name.to_ascii_uppercase())
    } else {
        Cow::Borrowed(name)
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = (&'a str, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        Some((&**name, self.fields[name].as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

impl ExactSizeIterator for Fields<'_> {}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a str, &'a [u8]);
    type IntoIter = Fields<'a>;

    fn into_iter(self) -> Fields<'a> {
        self.iter()
    }
}

impl<N: AsRef<str>, V: Into<Vec<u8>>> FromIterator<(N, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Record {
        let mut record = Record::new();
        record.extend(iter);
        record
    }
}

impl<N: AsRef<str>, V: Into<Vec<u8>>> Extend<(N, V)> for Record {
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.is_header == other.is_header && self.fields == other.fields
    }
}

impl Eq for Record {}

/// The ADI encoding of the fields. Bytes that aren't UTF-8 are replaced.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = BUFFERS.acquire(self.encoded_len());
        writer::encode_fields(self, &mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_header {
            f.write_str("Header ")?;
        }
        printer::write_record(f, self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StandardFields;

    fn qso_with_lou() -> Record {
        let mut qso = Record::new();
        qso.set("CALL", "W9PVA");
        qso.set("RST_RCVD", "58");
        qso.set("RST_SENT", "59");
        qso.set("COMMENT", "Eyeball QSO 👀");
        qso.set("QSO_DATE", "");
        qso
    }

    #[test]
    fn test_set_normalizes_name() {
        let mut record = Record::new();
        record.set("call", "K9CTS");
        assert_eq!(record.get("CALL"), b"K9CTS");
        assert_eq!(record.get("Call"), b"K9CTS");
        assert_eq!(record.iter().next(), Some(("CALL", &b"K9CTS"[..])));
    }

    #[test]
    fn test_empty_means_absent() {
        let mut record = Record::new();
        assert_eq!(record.get("CALL"), b"");
        record.set("CALL", "K9CTS");
        record.set("call", "");
        assert_eq!(record.len(), 0);
        assert_eq!(record.get("CALL"), b"");
        assert_eq!(record.iter().count(), 0);
    }

    #[test]
    fn test_overwrite() {
        let mut record = Record::new();
        record.set("BAND", "40M");
        record.set("band", "20M");
        record.set("BAND", "20M");
        assert_eq!(record.get("BAND"), b"20M");
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_iter_sorted_and_cache_invalidated() {
        let mut record = Record::new();
        record.set("MODE", "SSB");
        record.set("CALL", "K9CTS");
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["CALL", "MODE"]);

        record.set("BAND", "20M");
        record.remove("MODE");
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["BAND", "CALL"]);
    }

    #[test]
    fn test_clear_resets_header_flag() {
        let mut record = qso_with_lou();
        record.set_is_header(true);
        record.clear();
        assert!(record.is_empty());
        assert!(!record.is_header());
        assert_eq!(record, Record::new());
    }

    #[test]
    fn test_get_str() {
        let mut record = Record::new();
        record.set("COMMENT", &b"caf\xe9"[..]);
        record.set("NAME", "Lou");
        assert_eq!(record.get_str("COMMENT"), None);
        assert_eq!(record.get_str("NAME"), Some("Lou"));
        assert_eq!(record.get_str("QTH"), Some(""));
    }

    #[test]
    fn test_trim() {
        let mut record = Record::new();
        record.set("CALL", "W9PVA ");
        record.set("COMMENT", " COMMENT ");
        record.set("NOTES", "   ");
        record.trim();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("CALL"), b"W9PVA");
        assert_eq!(record.get("COMMENT"), b"COMMENT");
        assert_eq!(record.iter().count(), 2);
    }

    #[test]
    fn test_classify() {
        let header: Record = [("ADIF_VER", "3.1.5")].into_iter().collect();
        assert_eq!(header.classify(&StandardFields), Classification::Header);

        let qso: Record = [("CALL", "W9PVA")].into_iter().collect();
        assert_eq!(qso.classify(&StandardFields), Classification::Data);

        let userdef: Record = [("USERDEF1", "Concertina")].into_iter().collect();
        assert_eq!(userdef.classify(&StandardFields), Classification::Header);
        assert_eq!(userdef.classify(&()), Classification::Header);

        let unknown: Record = [("APP_UNKNOWN", "Concertina")].into_iter().collect();
        assert_eq!(unknown.classify(&StandardFields), Classification::Inconclusive);

        let mixed: Record = [("PROGRAMID", "Log4OM"), ("CALL", "W9PVA")].into_iter().collect();
        assert_eq!(mixed.classify(&StandardFields), Classification::Data);
    }

    #[test]
    fn test_write_to() {
        let mut out = Vec::new();
        let written = qso_with_lou().write_to(&mut out).unwrap();
        assert_eq!(written, 69);
        assert_eq!(written, out.len());

        let record = Record::read_from(&out[..]).unwrap().0.unwrap();
        assert_eq!(record, qso_with_lou());
    }

    #[test]
    fn test_display() {
        let record: Record = [("CALL", "K9CTS"), ("BAND", "20M")].into_iter().collect();
        assert_eq!(record.to_string(), "<BAND:3>20M<CALL:5>K9CTS");
        assert_eq!(format!("{:?}", record), "{BAND: 20M, CALL: K9CTS}");
    }

    #[test]
    fn test_read_from_skips_header() {
        let input = b"<PROGRAMID:7>MonoLog<EOH>\n<COMMENT:4>GOOD<EOR>";
        let (record, n) = Record::read_from(&input[..]).unwrap();
        let record = record.unwrap();
        assert_eq!(n, input.len() as u64);
        assert_eq!(record.get("PROGRAMID"), b"");
        assert_eq!(record.get("COMMENT"), b"GOOD");

        // Stops after the first record.
        let (_, n) = Record::read_from(&b"<CALL:4>W1AW<EOR>\n<CALL:4>K1AR<EOR>"[..]).unwrap();
        assert_eq!(n, 17);
        assert_eq!(Record::read_from(&b"<EOH>"[..]).unwrap(), (None, 5));
    }
}
