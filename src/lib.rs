//! A streaming reader and writer for ADI, the tagged text format of ADIF logbooks.
//!
//! An ADI document is an optional header followed by data records. Each field is
//! written as a Data-Specifier `<NAME:LENGTH>` followed by `LENGTH` bytes of data;
//! `<EOH>` closes the header and `<EOR>` closes a data record.
//!
//! ```
//! use sleek_adif::{Reader, Record};
//!
//! let mut reader = Reader::new(&b"<CaLL:5>W9PVA<EOR>"[..]);
//! let record = reader.next_record().unwrap().unwrap();
//! assert_eq!(record.get("CALL"), b"W9PVA");
//! assert_eq!(reader.position(), 18);
//! assert!(reader.next_record().unwrap().is_none());
//! ```
use std::borrow::Cow;

mod document;
pub mod error;
mod pool;
mod printer;
pub mod reader;
pub mod record;
pub mod registry;
#[cfg(feature = "serde")]
mod serialize;
pub mod writer;

pub use document::Document;
pub use error::{Error, ErrorKind, Result};
pub use reader::{ReadRecordResult, Reader};
pub use record::Record;
pub use registry::{Classification, FieldKind, FieldRegistry, StandardFields};
pub use writer::Writer;

/// Field name that closes the header.
pub const EOH: &str = "EOH";
/// Field name that closes a data record.
pub const EOR: &str = "EOR";

/// Default ceiling for a single field value: 1 MiB.
pub const DEFAULT_MAX_FIELD_SIZE: usize = 1024 * 1024;
/// Default ceiling for a document read into memory: 256 MiB.
pub const DEFAULT_MAX_DOCUMENT_SIZE: u64 = 256 * 1024 * 1024;
/// Text written before the header. A header must not start with `<`.
pub const DEFAULT_PREAMBLE: &str = concat!("sleek_adif ", env!("CARGO_PKG_VERSION"), "\n");

/// Settings shared by [`Reader`], [`Writer`] and [`Document`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Largest accepted field value, in bytes. Also bounds the length of a Data-Specifier.
    pub max_field_size: usize,
    /// Largest document [`Document::read_from`] will hold in memory, in bytes.
    ///
    /// Checked after each record, so a single record is read in full before the
    /// limit applies. [`max_field_size`](Config::max_field_size) bounds each of its fields.
    pub max_document_size: u64,
    /// Written before the header. A newline is appended if it doesn't end with one.
    /// It must not start with `<`.
    pub preamble: Cow<'static, str>,
    /// Drop the header instead of returning it from the reader.
    pub skip_header: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            preamble: Cow::Borrowed(DEFAULT_PREAMBLE),
            skip_header: false,
        }
    }
}
