//! Core types for OpenBMP message bus data.
//!
//! This module defines the protocol version, the record types carried on the
//! bus, and the decoded value/record structures handed back to callers.

use crate::decoder::RowError;
use crate::envelope::Envelope;
use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Timestamp layout used on the wire and when rendering values back to text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Error returned when a type name or version string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),

    #[error("Unknown record type: {0:?}")]
    UnknownRecordType(String),
}

/// Message bus protocol version (`V` header), e.g. `1.3`.
///
/// The header value is a decimal number. The fractional part is kept in
/// fixed-point thousandths, so `1.3` and `1.30` are the same version and
/// threshold checks never go through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    major: u16,
    thousandths: u16,
}

impl Version {
    pub const V1_0: Version = Version::new(1, 0);
    pub const V1_1: Version = Version::new(1, 100);
    pub const V1_2: Version = Version::new(1, 200);
    pub const V1_3: Version = Version::new(1, 300);
    pub const V1_4: Version = Version::new(1, 400);

    /// Creates `major + thousandths / 1000`. `thousandths` must be below 1000.
    #[inline]
    pub const fn new(major: u16, thousandths: u16) -> Self {
        assert!(thousandths < 1000);
        Self { major, thousandths }
    }

    /// Integer part of the version.
    #[inline]
    pub fn major(&self) -> u16 {
        self.major
    }

    /// Fractional part in thousandths (`1.3` gives 300).
    #[inline]
    pub fn thousandths(&self) -> u16 {
        self.thousandths
    }
}

impl FromStr for Version {
    type Err = TypeParseError;

    /// Parses `"1.3"`, `"1.30"`, `"1"` or `" 1.4 "`.
    ///
    /// At most three significant fractional digits are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || TypeParseError::InvalidVersion(s.to_string());

        let (major, fraction) = match s.split_once('.') {
            Some((major, fraction)) => (major, fraction),
            None => (s, "0"),
        };

        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(major) || !all_digits(fraction) {
            return Err(invalid());
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 3 {
            return Err(invalid());
        }

        let mut thousandths = 0u16;
        for (digit, scale) in fraction.bytes().zip([100u16, 10, 1]) {
            thousandths += u16::from(digit - b'0') * scale;
        }

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            thousandths,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fraction = format!("{:03}", self.thousandths);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            write!(f, "{}.0", self.major)
        } else {
            write!(f, "{}.{}", self.major, fraction)
        }
    }
}

/// Record types published on the message bus.
///
/// Each one corresponds to an `openbmp.parsed.<name>` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordType {
    Collector,
    Router,
    Peer,
    BmpStat,
    BaseAttribute,
    UnicastPrefix,
    LsNode,
    LsLink,
    LsPrefix,
}

impl RecordType {
    /// Every supported record type.
    pub const ALL: [RecordType; 9] = [
        RecordType::Collector,
        RecordType::Router,
        RecordType::Peer,
        RecordType::BmpStat,
        RecordType::BaseAttribute,
        RecordType::UnicastPrefix,
        RecordType::LsNode,
        RecordType::LsLink,
        RecordType::LsPrefix,
    ];

    /// Short name as used in topic suffixes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Router => "router",
            Self::Peer => "peer",
            Self::BmpStat => "bmp_stat",
            Self::BaseAttribute => "base_attribute",
            Self::UnicastPrefix => "unicast_prefix",
            Self::LsNode => "ls_node",
            Self::LsLink => "ls_link",
            Self::LsPrefix => "ls_prefix",
        }
    }
}

impl FromStr for RecordType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        RecordType::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| TypeParseError::UnknownRecordType(s.to_string()))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Text value (identifiers, addresses, paths, ...)
    Str(String),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Timestamp in UTC, microsecond precision on the wire
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `i64`, widening `Int` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// One decoded content row.
///
/// Fields keep the order of the schema they were decoded against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    /// Creates a record from already-ordered `(name, value)` pairs.
    pub fn new(fields: Vec<(&'static str, Value)>) -> Self {
        Self { fields }
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Value::as_i32)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.get(name).and_then(Value::as_timestamp)
    }

    /// Iterates over `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a record holding only the named fields, in the given order.
    /// Names the record does not have are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Record {
        let fields = names
            .iter()
            .filter_map(|name| {
                self.fields
                    .iter()
                    .find(|(field, _)| *field == name.as_ref())
                    .cloned()
            })
            .collect();
        Record { fields }
    }

    /// Renders the record as a compact JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Renders the record as an indented JSON object.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of decoding one raw message.
#[derive(Debug)]
pub struct DecodedMessage {
    /// Parsed header
    pub envelope: Envelope,
    /// Record type the content was decoded as
    pub record_type: RecordType,
    /// One entry per non-empty content row, in row order
    pub rows: Vec<Result<Record, RowError>>,
}

impl DecodedMessage {
    /// Successfully decoded records.
    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.rows.iter().filter_map(|row| row.as_ref().ok())
    }

    /// Rows that failed to decode.
    pub fn errors(&self) -> impl Iterator<Item = &RowError> + '_ {
        self.rows.iter().filter_map(|row| row.as_ref().err())
    }

    /// Returns true if every row decoded.
    pub fn is_clean(&self) -> bool {
        self.rows.iter().all(Result::is_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.3".parse::<Version>().unwrap(), Version::V1_3);
        assert_eq!(" 1.4 ".parse::<Version>().unwrap(), Version::V1_4);
        assert_eq!("2".parse::<Version>().unwrap(), Version::new(2, 0));
        assert!("".parse::<Version>().is_err());
        assert!("1.".parse::<Version>().is_err());
        assert!("abc".parse::<Version>().is_err());
        assert!("1.-3".parse::<Version>().is_err());
        assert!("1.0001".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::V1_0 < Version::V1_1);
        assert!(Version::V1_4 > Version::V1_3);
        assert!(Version::new(2, 0) > Version::V1_4);
        assert!(Version::V1_3 >= Version::V1_3);
        assert!("1.25".parse::<Version>().unwrap() > Version::V1_2);
        assert!("1.25".parse::<Version>().unwrap() < Version::V1_3);
    }

    #[test]
    fn test_version_trailing_zeros_are_decimal() {
        assert_eq!("1.30".parse::<Version>().unwrap(), Version::V1_3);
        assert_eq!("1.40".parse::<Version>().unwrap(), Version::V1_4);
        assert_eq!("1.300".parse::<Version>().unwrap(), Version::V1_3);
        assert!("1.30".parse::<Version>().unwrap() < Version::V1_4);
        assert!("1.10".parse::<Version>().unwrap() < Version::V1_4);
        assert_eq!("1.10".parse::<Version>().unwrap(), Version::V1_1);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::V1_3.to_string(), "1.3");
        assert_eq!(Version::new(2, 0).to_string(), "2.0");
        assert_eq!("1.25".parse::<Version>().unwrap().to_string(), "1.25");
        assert_eq!(Version::new(1, 5).to_string(), "1.005");
    }

    #[test]
    fn test_record_type_names() {
        for record_type in RecordType::ALL {
            assert_eq!(record_type.name().parse::<RecordType>().unwrap(), record_type);
        }
        assert_eq!("LS_PREFIX".parse::<RecordType>().unwrap(), RecordType::LsPrefix);
        assert!("rib".parse::<RecordType>().is_err());
    }

    #[test]
    fn test_record_json_keeps_field_order() {
        let record = Record::new(vec![
            ("action", Value::Str("add".to_string())),
            ("seq", Value::Long(7)),
            ("prefix_len", Value::Int(24)),
        ]);

        assert_eq!(
            record.to_json().unwrap(),
            r#"{"action":"add","seq":7,"prefix_len":24}"#
        );
        assert_eq!(record.get_i64("prefix_len"), Some(24));
        assert_eq!(record.get_str("action"), Some("add"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_record_select() {
        let record = Record::new(vec![
            ("action", Value::Str("del".to_string())),
            ("seq", Value::Long(8)),
            ("prefix", Value::Str("192.0.2.0".to_string())),
        ]);

        let selected = record.select(&["prefix", "missing", "action"]);
        let names: Vec<_> = selected.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["prefix", "action"]);
    }
}
