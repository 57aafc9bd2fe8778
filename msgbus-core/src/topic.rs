//! Topic name to record type mapping.
//!
//! The transport decides which topic a message came from; this map turns
//! that topic into the record type to decode it as. It is passed in by the
//! caller so deployments with renamed or extra topics can supply their own.

use crate::envelope::EnvelopeError;
use crate::types::RecordType;
use std::collections::HashMap;
use thiserror::Error;

/// Prefix of the standard OpenBMP parsed-message topics.
pub const OPENBMP_PARSED_PREFIX: &str = "openbmp.parsed.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("No record type registered for topic {0:?}")]
    UnknownTopic(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Mapping from topic name to record type.
#[derive(Debug, Clone, Default)]
pub struct TopicMap {
    topics: HashMap<String, RecordType>,
}

impl TopicMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard `openbmp.parsed.<record type>` topics.
    pub fn openbmp_default() -> Self {
        let mut map = Self::new();
        for record_type in RecordType::ALL {
            map.insert(
                format!("{}{}", OPENBMP_PARSED_PREFIX, record_type.name()),
                record_type,
            );
        }
        map
    }

    /// Registers a topic, returning the record type it previously mapped to.
    pub fn insert(&mut self, topic: impl Into<String>, record_type: RecordType) -> Option<RecordType> {
        self.topics.insert(topic.into(), record_type)
    }

    pub fn lookup(&self, topic: &str) -> Option<RecordType> {
        self.topics.get(topic).copied()
    }

    /// Registered topic names, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topics() {
        let map = TopicMap::openbmp_default();
        assert_eq!(map.len(), RecordType::ALL.len());
        assert_eq!(
            map.lookup("openbmp.parsed.unicast_prefix"),
            Some(RecordType::UnicastPrefix)
        );
        assert_eq!(map.lookup("openbmp.parsed.ls_prefix"), Some(RecordType::LsPrefix));
        assert_eq!(map.lookup("openbmp.parsed.l3vpn"), None);
    }

    #[test]
    fn test_custom_topics() {
        let mut map = TopicMap::new();
        assert!(map.is_empty());
        assert_eq!(map.insert("bmp.prefixes", RecordType::UnicastPrefix), None);
        assert_eq!(
            map.insert("bmp.prefixes", RecordType::LsPrefix),
            Some(RecordType::UnicastPrefix)
        );
        assert_eq!(map.lookup("bmp.prefixes"), Some(RecordType::LsPrefix));
        assert_eq!(map.topics(), vec!["bmp.prefixes"]);
    }
}
