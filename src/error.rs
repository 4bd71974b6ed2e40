use std::io;

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// An error from reading or writing ADI data.
///
/// `position` is the absolute byte offset in the stream at which the error surfaced:
/// bytes consumed so far for readers, bytes successfully written so far for writers.
#[derive(Debug, ThisError)]
#[error("{kind} (at byte {position})")]
pub struct Error {
    kind: ErrorKind,
    position: u64,
}

impl Error {
    pub fn new(kind: ErrorKind, position: u64) -> Self {
        Self { kind, position }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// True for any input that doesn't follow the ADI syntax, including bad field lengths.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Malformed(_) | ErrorKind::InvalidFieldLength(_)
        )
    }

    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io(_))
    }
}

#[derive(Debug, ThisError)]
pub enum ErrorKind {
    #[error("malformed ADI data: {0}")]
    Malformed(Malformed),

    #[error("invalid field length: {0}")]
    InvalidFieldLength(LengthError),

    #[error("document is larger than {limit} bytes; read it record by record instead")]
    DocumentTooLarge { limit: u64 },

    #[error("a header has already been written")]
    HeaderAlreadyWritten,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ThisError)]
pub enum Malformed {
    #[error("tag opened with '<' is never closed")]
    UnclosedTag,

    #[error("tag is longer than {limit} bytes")]
    TagTooLong { limit: usize },

    #[error("field name is empty")]
    EmptyFieldName,

    #[error("field value truncated: expected {expected} bytes, got {got}")]
    TruncatedValue { expected: usize, got: usize },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ThisError)]
pub enum LengthError {
    #[error("no digits")]
    Empty,

    #[error("non-digit byte {0:#04x}")]
    NonDigit(u8),

    #[error("integer overflow")]
    Overflow,

    #[error("exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = Error::new(ErrorKind::Malformed(Malformed::EmptyFieldName), 42);
        assert_eq!(
            err.to_string(),
            "malformed ADI data: field name is empty (at byte 42)"
        );
    }

    #[test]
    fn test_invalid_length_counts_as_malformed() {
        let err = Error::new(ErrorKind::InvalidFieldLength(LengthError::Empty), 0);
        assert!(err.is_malformed());
        assert!(!err.is_io());

        let err = Error::new(ErrorKind::DocumentTooLarge { limit: 10 }, 11);
        assert!(!err.is_malformed());
    }
}
