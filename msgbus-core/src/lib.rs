//! OpenBMP message bus decoder library.
//!
//! This crate decodes the line-oriented, tab-separated records that OpenBMP
//! publishes on its message bus (`openbmp.parsed.*` topics). Each message
//! carries a small header declaring the protocol version, and the layout of
//! every record type grows with that version.
//!
//! # Example
//!
//! ```
//! use msgbus_core::{MsgBusDecoder, RecordType};
//!
//! let raw = "V: 1.0\nC_HASH_ID: c7d3\nR: 1\n\n\
//!            started\t1\tcollector1\tc7d3\t\t0\t2016-02-24 18:54:33.084071\n";
//!
//! let decoder = MsgBusDecoder::new();
//! let message = decoder.decode_message(raw, RecordType::Collector).unwrap();
//!
//! for record in message.records() {
//!     println!("{}", record.to_json().unwrap());
//! }
//! ```
//!
//! # Features
//!
//! - Header (envelope) parsing with forward-compatible attribute handling
//! - Version-aware schemas for all `openbmp.parsed` record types
//! - Per-field null and type policies, per-row failure isolation
//! - Shared, thread-safe schema cache
//! - CSV and JSON Lines output

pub mod decoder;
pub mod envelope;
pub mod output;
pub mod processor;
pub mod schema;
pub mod topic;
pub mod types;

// Re-export commonly used types
pub use decoder::{DecoderConfig, MsgBusDecoder, RowError};
pub use envelope::{Envelope, EnvelopeError};
pub use output::{FieldSelection, OutputError};
pub use processor::{FieldProcessor, ProcessorError};
pub use schema::{SchemaDefinition, SchemaResolver};
pub use topic::{TopicError, TopicMap};
pub use types::{DecodedMessage, Record, RecordType, Value, Version};
