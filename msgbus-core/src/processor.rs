//! Field processors applied to single content tokens.
//!
//! A processor is a pure policy that turns one tab-separated token into a
//! typed [`Value`], or rejects it. An empty token is the wire encoding of a
//! null field.

use crate::types::Value;
use chrono::NaiveDateTime;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors produced by a single field processor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("null value not allowed")]
    Null,

    #[error("invalid integer {token:?}: {source}")]
    InvalidInteger {
        token: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid timestamp {token:?}: {source}")]
    InvalidTimestamp {
        token: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Decoding policy for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldProcessor {
    /// Non-empty string, passed through unchanged
    NotNull,
    /// String, empty allowed
    ParseNullAsEmpty,
    /// 64-bit integer, empty reads as 0
    ParseLongEmptyAsZero,
    /// Required 32-bit integer
    ParseInt,
    /// Required 64-bit integer
    ParseLong,
    /// Required `YYYY-MM-DD HH:MM:SS[.ffffff]` timestamp
    ParseTimestamp,
}

impl FieldProcessor {
    /// Applies this policy to one token.
    pub fn process(&self, token: &str) -> Result<Value, ProcessorError> {
        match self {
            Self::NotNull => {
                if token.is_empty() {
                    Err(ProcessorError::Null)
                } else {
                    Ok(Value::Str(token.to_string()))
                }
            }
            Self::ParseNullAsEmpty => Ok(Value::Str(token.to_string())),
            Self::ParseLongEmptyAsZero => {
                if token.is_empty() {
                    Ok(Value::Long(0))
                } else {
                    parse_integer(token).map(Value::Long)
                }
            }
            Self::ParseInt => required(token).and_then(parse_integer::<i32>).map(Value::Int),
            Self::ParseLong => required(token).and_then(parse_integer::<i64>).map(Value::Long),
            Self::ParseTimestamp => required(token).and_then(parse_timestamp).map(Value::Timestamp),
        }
    }
}

#[inline]
fn required(token: &str) -> Result<&str, ProcessorError> {
    if token.is_empty() {
        Err(ProcessorError::Null)
    } else {
        Ok(token)
    }
}

#[inline]
fn parse_integer<T>(token: &str) -> Result<T, ProcessorError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    token
        .parse()
        .map_err(|source| ProcessorError::InvalidInteger {
            token: token.to_string(),
            source,
        })
}

/// Accepts any number of fractional digits, or none.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parses a wire timestamp; the fractional part is optional.
pub fn parse_timestamp(token: &str) -> Result<NaiveDateTime, ProcessorError> {
    NaiveDateTime::parse_from_str(token, TIMESTAMP_PARSE_FORMAT).map_err(|source| {
        ProcessorError::InvalidTimestamp {
            token: token.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_not_null() {
        assert_eq!(FieldProcessor::NotNull.process(""), Err(ProcessorError::Null));
        assert_eq!(
            FieldProcessor::NotNull.process("add").unwrap(),
            Value::Str("add".to_string())
        );
    }

    #[test]
    fn test_null_as_empty() {
        assert_eq!(
            FieldProcessor::ParseNullAsEmpty.process("").unwrap(),
            Value::Str(String::new())
        );
        assert_eq!(
            FieldProcessor::ParseNullAsEmpty.process("64512 65000").unwrap(),
            Value::Str("64512 65000".to_string())
        );
    }

    #[test]
    fn test_long_empty_as_zero() {
        let p = FieldProcessor::ParseLongEmptyAsZero;
        assert_eq!(p.process("").unwrap(), Value::Long(0));
        assert_eq!(p.process("42").unwrap(), Value::Long(42));
        assert!(matches!(
            p.process("abc"),
            Err(ProcessorError::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_parse_int_and_long() {
        assert_eq!(FieldProcessor::ParseInt.process("24").unwrap(), Value::Int(24));
        assert_eq!(FieldProcessor::ParseInt.process(""), Err(ProcessorError::Null));
        // Out of i32 range, fine as i64
        assert!(FieldProcessor::ParseInt.process("4294967296").is_err());
        assert_eq!(
            FieldProcessor::ParseLong.process("4294967296").unwrap(),
            Value::Long(4_294_967_296)
        );
        assert!(FieldProcessor::ParseLong.process("12x").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = FieldProcessor::ParseTimestamp
            .process("2016-02-24 18:54:33.084071")
            .unwrap()
            .as_timestamp()
            .unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2016, 2, 24).unwrap());
        assert_eq!(ts.nanosecond(), 84_071_000);

        // Fraction is optional
        assert!(FieldProcessor::ParseTimestamp
            .process("2016-02-24 18:54:33")
            .is_ok());

        assert!(matches!(
            FieldProcessor::ParseTimestamp.process("yesterday"),
            Err(ProcessorError::InvalidTimestamp { .. })
        ));
        assert_eq!(
            FieldProcessor::ParseTimestamp.process(""),
            Err(ProcessorError::Null)
        );
    }
}
