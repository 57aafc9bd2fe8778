//! Record decoding.
//!
//! Content rows are separated by `\n` and fields within a row by `\t`.
//! Each row is decoded against a resolved [`SchemaDefinition`] by applying
//! the schema's processors positionally. A row decodes completely or fails
//! as a whole; failures never affect sibling rows.

use crate::envelope::{self, Envelope, EnvelopeError};
use crate::processor::ProcessorError;
use crate::schema::{SchemaDefinition, SchemaResolver};
use crate::topic::{TopicError, TopicMap};
use crate::types::{DecodedMessage, Record, RecordType, Version};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Separator between content rows.
pub const ROW_DELIMITER: char = '\n';

/// Separator between fields within a row.
pub const FIELD_DELIMITER: char = '\t';

/// Errors confined to a single content row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("{record_type} row {row}: expected {expected} fields, found {found}")]
    FieldCountMismatch {
        record_type: RecordType,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{record_type} row {row}: field {field:?} (token {token:?}): {cause}")]
    FieldDecode {
        record_type: RecordType,
        row: usize,
        field: &'static str,
        token: String,
        #[source]
        cause: ProcessorError,
    },
}

impl RowError {
    /// Zero-based line number of the failing row within the content block.
    pub fn row(&self) -> usize {
        match self {
            Self::FieldCountMismatch { row, .. } | Self::FieldDecode { row, .. } => *row,
        }
    }
}

/// Decodes every non-empty row of `content` against `schema`.
///
/// Returns one result per non-empty row, in order. A trailing `\r` on a row
/// is ignored.
pub fn decode(content: &str, schema: &SchemaDefinition) -> Vec<Result<Record, RowError>> {
    content
        .split(ROW_DELIMITER)
        .enumerate()
        .map(|(row, line)| (row, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty())
        .map(|(row, line)| decode_row(row, line, schema))
        .collect()
}

/// Decodes a single row.
pub fn decode_row(row: usize, line: &str, schema: &SchemaDefinition) -> Result<Record, RowError> {
    let tokens: Vec<&str> = line.split(FIELD_DELIMITER).collect();

    if tokens.len() != schema.len() {
        return Err(RowError::FieldCountMismatch {
            record_type: schema.record_type(),
            row,
            expected: schema.len(),
            found: tokens.len(),
        });
    }

    let fields = schema
        .fields()
        .zip(tokens)
        .map(|((name, processor), token)| {
            processor
                .process(token)
                .map(|value| (name, value))
                .map_err(|cause| RowError::FieldDecode {
                    record_type: schema.record_type(),
                    row,
                    field: name,
                    token: token.to_string(),
                    cause,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Record::new(fields))
}

/// Decoder behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Warn when the number of content rows differs from the envelope's
    /// declared record count. Never fails the message.
    pub check_record_count: bool,
}

/// Decodes raw messages end to end.
///
/// Holds the schema cache, so one instance should be shared (it is
/// `Send + Sync`) rather than created per message.
#[derive(Debug, Default)]
pub struct MsgBusDecoder {
    resolver: SchemaResolver,
    pub config: DecoderConfig,
}

impl MsgBusDecoder {
    /// Creates a new decoder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            resolver: SchemaResolver::new(),
            config,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Resolves the schema for a record type and version through the cache.
    pub fn schema(&self, record_type: RecordType, version: Version) -> Arc<SchemaDefinition> {
        self.resolver.resolve(record_type, version)
    }

    /// Parses the envelope of `raw` and decodes its content as `record_type`.
    ///
    /// Only envelope failures are returned as `Err`; row failures are
    /// reported inside the returned message.
    pub fn decode_message(
        &self,
        raw: &str,
        record_type: RecordType,
    ) -> Result<DecodedMessage, EnvelopeError> {
        let envelope = envelope::parse(raw)?;
        Ok(self.decode_envelope(envelope, record_type))
    }

    /// Same as [`decode_message`](Self::decode_message) for a raw byte payload.
    pub fn decode_bytes(
        &self,
        raw: &[u8],
        record_type: RecordType,
    ) -> Result<DecodedMessage, EnvelopeError> {
        let envelope = Envelope::from_bytes(raw)?;
        Ok(self.decode_envelope(envelope, record_type))
    }

    /// Looks the record type up from the topic name, then decodes.
    pub fn decode_topic_message(
        &self,
        topic: &str,
        raw: &[u8],
        topics: &TopicMap,
    ) -> Result<DecodedMessage, TopicError> {
        let record_type = topics
            .lookup(topic)
            .ok_or_else(|| TopicError::UnknownTopic(topic.to_string()))?;
        Ok(self.decode_bytes(raw, record_type)?)
    }

    /// Decodes the content of an already parsed envelope.
    pub fn decode_envelope(&self, envelope: Envelope, record_type: RecordType) -> DecodedMessage {
        let schema = self.resolver.resolve(record_type, envelope.version);
        let rows = decode(&envelope.content, &schema);

        if self.config.check_record_count && rows.len() as u64 != envelope.record_count {
            warn!(
                record_type = %record_type,
                declared = envelope.record_count,
                actual = rows.len(),
                router_ip = %envelope.router_ip,
                "record count does not match envelope"
            );
        }

        let failed = rows.iter().filter(|row| row.is_err()).count();
        debug!(
            record_type = %record_type,
            version = %envelope.version,
            rows = rows.len(),
            failed,
            "decoded message"
        );

        DecodedMessage {
            envelope,
            record_type,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolve;
    use crate::types::Value;

    fn collector_row(action: &str, seq: &str, count: &str) -> String {
        [
            action,
            seq,
            "collector1",
            "c7d3a8b2",
            "10.0.0.1:17900",
            count,
            "2016-02-24 18:54:33.084071",
        ]
        .join("\t")
    }

    #[test]
    fn test_decode_collector_rows() {
        let schema = resolve(RecordType::Collector, Version::V1_0);
        let content = format!(
            "{}\n{}\n",
            collector_row("started", "1", "0"),
            collector_row("change", "2", "1")
        );

        let rows = decode(&content, &schema);
        assert_eq!(rows.len(), 2);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.len(), schema.len());
        assert_eq!(first.get_str("action"), Some("started"));
        assert_eq!(first.get("seq"), Some(&Value::Long(1)));
        assert_eq!(first.get("router_count"), Some(&Value::Int(0)));

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.get_i64("seq"), Some(2));
    }

    #[test]
    fn test_field_count_mismatch_is_per_row() {
        let schema = resolve(RecordType::Collector, Version::V1_0);
        let content = format!(
            "{}\nonly\ttwo\n{}",
            collector_row("started", "1", "0"),
            collector_row("change", "3", "2")
        );

        let rows = decode(&content, &schema);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert_eq!(
            rows[1],
            Err(RowError::FieldCountMismatch {
                record_type: RecordType::Collector,
                row: 1,
                expected: 7,
                found: 2,
            })
        );
        assert!(rows[2].is_ok());
    }

    #[test]
    fn test_field_decode_error_names_field() {
        let schema = resolve(RecordType::Collector, Version::V1_0);
        let content = collector_row("", "1", "0");

        let rows = decode(&content, &schema);
        match &rows[0] {
            Err(RowError::FieldDecode {
                field, token, cause, ..
            }) => {
                assert_eq!(*field, "action");
                assert_eq!(token, "");
                assert_eq!(*cause, ProcessorError::Null);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let rows = decode(&collector_row("add", "x", "0"), &schema);
        assert!(matches!(
            &rows[0],
            Err(RowError::FieldDecode { field: "seq", .. })
        ));
    }

    #[test]
    fn test_empty_rows_and_crlf() {
        let schema = resolve(RecordType::Collector, Version::V1_0);
        let content = format!("\n{}\r\n\n", collector_row("add", "5", "3"));

        let rows = decode(&content, &schema);
        assert_eq!(rows.len(), 1);
        let record = rows[0].as_ref().unwrap();
        assert_eq!(record.get_str("hash"), Some("c7d3a8b2"));
        assert!(record.get_timestamp("timestamp").is_some());
    }

    #[test]
    fn test_decode_message_uses_envelope_version() {
        let decoder = MsgBusDecoder::new();
        let row = collector_row("heartbeat", "9", "4");
        let raw = format!("V: 1.4\nC_HASH_ID: c7d3a8b2\nR: 1\n\n{}\n", row);

        let message = decoder
            .decode_message(&raw, RecordType::Collector)
            .unwrap();
        assert_eq!(message.envelope.version, Version::V1_4);
        assert!(message.is_clean());
        assert_eq!(message.records().count(), 1);
        assert_eq!(decoder.resolver().len(), 1);
    }

    #[test]
    fn test_decode_message_malformed() {
        let decoder = MsgBusDecoder::new();
        assert!(decoder
            .decode_message("V: 1.3 no separator", RecordType::Router)
            .is_err());
    }
}
