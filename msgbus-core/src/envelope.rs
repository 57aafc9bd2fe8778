//! Message bus envelope (header) parsing.
//!
//! A raw message is a block of `ATTR: value` header lines, a blank line, and
//! the content block:
//!
//! ```text
//! V: 1.3
//! C_HASH_ID: 1a2b...
//! L: 412
//! R: 2
//!
//! <row>\n<row>\n
//! ```

use crate::types::Version;
use thiserror::Error;
use tracing::trace;

/// Separator between the header block and the content block.
const HEADER_SEPARATOR: &str = "\n\n";

/// Errors that make a whole message unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl EnvelopeError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }
}

/// Parsed header of one raw message.
///
/// `content_length` and `record_count` are what the sender declared; they
/// are not checked against the content here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Message bus protocol version (`V`)
    pub version: Version,
    /// Collector hash id (`C_HASH_ID`)
    pub collector_hash_id: String,
    /// Declared content length in bytes (`L`)
    pub content_length: u64,
    /// Declared number of content rows (`R`)
    pub record_count: u64,
    /// Router hash id (`R_HASH_ID`)
    pub router_hash_id: String,
    /// Router IP address (`R_IP`)
    pub router_ip: String,
    /// Everything after the header separator
    pub content: String,
    /// Byte offset of `content` within the raw message
    pub content_offset: usize,
}

impl Envelope {
    /// Parses a raw message given as bytes. The message must be UTF-8.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let raw = std::str::from_utf8(raw)
            .map_err(|e| EnvelopeError::malformed(format!("message is not valid UTF-8: {}", e)))?;
        parse(raw)
    }

    /// Parses a single `ATTR: value` header line into this envelope.
    fn parse_header_line(&mut self, line: &str) -> Result<(), EnvelopeError> {
        let (attr, value) = line
            .split_once(':')
            .ok_or_else(|| EnvelopeError::malformed(format!("header line without ':': {:?}", line)))?;

        let attr = attr.trim();
        let value = value.trim();

        match attr {
            "V" => {
                self.version = value
                    .parse()
                    .map_err(|_| invalid_value(attr, value))?;
            }
            "C_HASH_ID" => self.collector_hash_id = value.to_string(),
            "L" => {
                self.content_length = value
                    .parse()
                    .map_err(|_| invalid_value(attr, value))?;
            }
            "R" => {
                self.record_count = value
                    .parse()
                    .map_err(|_| invalid_value(attr, value))?;
            }
            "R_HASH_ID" => self.router_hash_id = value.to_string(),
            "R_IP" => self.router_ip = value.to_string(),
            _ => {
                trace!(attr, value, "ignoring unknown header attribute");
            }
        }

        Ok(())
    }
}

fn invalid_value(attr: &str, value: &str) -> EnvelopeError {
    EnvelopeError::malformed(format!("invalid value for header {}: {:?}", attr, value))
}

/// Splits a raw message into header and content and parses the header.
pub fn parse(raw: &str) -> Result<Envelope, EnvelopeError> {
    if raw.trim().is_empty() {
        return Err(EnvelopeError::malformed("empty message"));
    }

    let header_end = raw
        .find(HEADER_SEPARATOR)
        .ok_or_else(|| EnvelopeError::malformed("no blank line between header and content"))?;

    let content_offset = header_end + HEADER_SEPARATOR.len();
    let mut envelope = Envelope {
        content: raw[content_offset..].to_string(),
        content_offset,
        ..Envelope::default()
    };

    for line in raw[..header_end].split('\n') {
        envelope.parse_header_line(line)?;
    }

    Ok(envelope)
}
