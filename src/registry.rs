//! Lookup of well-known field names, used to tell header records from data records.

/// What a registry knows about a field name.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// Only meaningful in a header record.
    HeaderOnly,
    /// A field of a data record.
    Data,
    Unknown,
}

/// The result of [`Record::classify`](crate::Record::classify).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    Header,
    Data,
    /// No field was recognized. Such records are treated as data.
    Inconclusive,
}

impl Classification {
    pub fn is_header(self) -> bool {
        self == Classification::Header
    }
}

/// A source of field name knowledge. Names passed in are already uppercase.
pub trait FieldRegistry {
    fn lookup(&self, name: &str) -> FieldKind;
}

/// No registry: every name is unknown.
impl FieldRegistry for () {
    fn lookup(&self, _name: &str) -> FieldKind {
        FieldKind::Unknown
    }
}

impl<T: FieldRegistry + ?Sized> FieldRegistry for &T {
    fn lookup(&self, name: &str) -> FieldKind {
        (**self).lookup(name)
    }
}

/// A small built-in table of the header fields and the most common data fields.
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardFields;

const HEADER_FIELDS: &[&str] = &[
    "ADIF_VER",
    "CREATED_TIMESTAMP",
    "PROGRAMID",
    "PROGRAMVERSION",
];

// Sorted, for binary search.
const DATA_FIELDS: &[&str] = &[
    "ADDRESS",
    "AGE",
    "ANT_AZ",
    "BAND",
    "BAND_RX",
    "CALL",
    "CNTY",
    "COMMENT",
    "CONT",
    "CONTEST_ID",
    "COUNTRY",
    "CQZ",
    "DXCC",
    "EMAIL",
    "FREQ",
    "FREQ_RX",
    "GRIDSQUARE",
    "ITUZ",
    "LAT",
    "LON",
    "LOTW_QSL_RCVD",
    "LOTW_QSL_SENT",
    "MODE",
    "MY_CITY",
    "MY_CNTY",
    "MY_COUNTRY",
    "MY_CQ_ZONE",
    "MY_DXCC",
    "MY_GRIDSQUARE",
    "MY_ITU_ZONE",
    "MY_STATE",
    "NAME",
    "NOTES",
    "OPERATOR",
    "PFX",
    "QSLMSG",
    "QSLRDATE",
    "QSLSDATE",
    "QSL_RCVD",
    "QSL_SENT",
    "QSO_DATE",
    "QSO_DATE_OFF",
    "QTH",
    "RST_RCVD",
    "RST_SENT",
    "RX_PWR",
    "SRX",
    "STATE",
    "STATION_CALLSIGN",
    "STX",
    "SUBMODE",
    "TIME_OFF",
    "TIME_ON",
    "TX_PWR",
];

impl FieldRegistry for StandardFields {
    fn lookup(&self, name: &str) -> FieldKind {
        if HEADER_FIELDS.contains(&name) {
            FieldKind::HeaderOnly
        } else if DATA_FIELDS.binary_search(&name).is_ok() {
            FieldKind::Data
        } else {
            FieldKind::Unknown
        }
    }
}

/// `USERDEF1`, `USERDEF2`, ...: user-defined field declarations, which only appear in headers.
pub(crate) fn is_userdef(name: &str) -> bool {
    match name.strip_prefix("USERDEF") {
        Some(n) => !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
