//! Per record type, per version field schemas.
//!
//! Every record type has a minimum field list that is valid at the oldest
//! supported protocol version, plus extensions that newer versions append to
//! the end of each row. Fields are never removed or reordered.
//!
//! Each field is declared together with its processor as one [`FieldSpec`].
//! Name and processor lists are derived from the same pairs, so they always
//! have the same length and line up by position.

use crate::processor::FieldProcessor;
use crate::types::{RecordType, Version};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::processor::FieldProcessor::{
    NotNull, ParseInt, ParseLong, ParseLongEmptyAsZero, ParseNullAsEmpty, ParseTimestamp,
};

/// A field name paired with the processor that decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub processor: FieldProcessor,
}

const fn field(name: &'static str, processor: FieldProcessor) -> FieldSpec {
    FieldSpec { name, processor }
}

/// Fields appended to a record type starting at `since`.
#[derive(Debug, Clone, Copy)]
pub struct Extension {
    pub since: Version,
    pub fields: &'static [FieldSpec],
}

/// Declarative schema of one record type across all versions.
#[derive(Debug, Clone, Copy)]
pub struct SchemaTable {
    pub record_type: RecordType,
    /// Fields present at the lowest supported version
    pub minimum: &'static [FieldSpec],
    /// Version-gated additions, ascending by `since`
    pub extensions: &'static [Extension],
}

impl SchemaTable {
    /// Lowest version at which every field of this table is present.
    pub fn latest_version(&self) -> Version {
        self.extensions
            .last()
            .map(|ext| ext.since)
            .unwrap_or(Version::V1_0)
    }
}

// ============================================================================
// collector (openbmp.parsed.collector)
// ============================================================================

static COLLECTOR: SchemaTable = SchemaTable {
    record_type: RecordType::Collector,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("admin_id", NotNull),
        field("hash", NotNull),
        field("routers", ParseNullAsEmpty),
        field("router_count", ParseInt),
        field("timestamp", ParseTimestamp),
    ],
    extensions: &[],
};

// ============================================================================
// router (openbmp.parsed.router)
// ============================================================================

static ROUTER: SchemaTable = SchemaTable {
    record_type: RecordType::Router,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("name", ParseNullAsEmpty),
        field("hash", NotNull),
        field("ip_address", NotNull),
        field("description", ParseNullAsEmpty),
        field("term_code", ParseLongEmptyAsZero),
        field("term_reason", ParseNullAsEmpty),
        field("init_data", ParseNullAsEmpty),
        field("term_data", ParseNullAsEmpty),
        field("timestamp", ParseTimestamp),
    ],
    extensions: &[Extension {
        since: Version::V1_3,
        fields: &[field("bgp_id", ParseNullAsEmpty)],
    }],
};

// ============================================================================
// peer (openbmp.parsed.peer)
// ============================================================================

static PEER: SchemaTable = SchemaTable {
    record_type: RecordType::Peer,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("router_hash", NotNull),
        field("name", ParseNullAsEmpty),
        field("remote_bgp_id", NotNull),
        field("router_ip", NotNull),
        field("timestamp", ParseTimestamp),
        field("remote_asn", ParseLong),
        field("remote_ip", NotNull),
        field("peer_rd", ParseNullAsEmpty),
        field("remote_port", ParseLongEmptyAsZero),
        field("local_asn", ParseLongEmptyAsZero),
        field("local_ip", ParseNullAsEmpty),
        field("local_port", ParseLongEmptyAsZero),
        field("local_bgp_id", ParseNullAsEmpty),
        field("info_data", ParseNullAsEmpty),
        field("adv_cap", ParseNullAsEmpty),
        field("recv_cap", ParseNullAsEmpty),
        field("remote_holddown", ParseLongEmptyAsZero),
        field("adv_holddown", ParseLongEmptyAsZero),
        field("bmp_reason", ParseLongEmptyAsZero),
        field("bgp_error_code", ParseLongEmptyAsZero),
        field("bgp_error_sub_code", ParseLongEmptyAsZero),
        field("error_text", ParseNullAsEmpty),
        field("isL3VPN", ParseLongEmptyAsZero),
        field("isPrePolicy", ParseLongEmptyAsZero),
        field("isIPv4", ParseLongEmptyAsZero),
    ],
    extensions: &[Extension {
        since: Version::V1_4,
        fields: &[
            field("isLocRib", ParseLongEmptyAsZero),
            field("isLocRibFiltered", ParseLongEmptyAsZero),
            field("table_name", ParseNullAsEmpty),
        ],
    }],
};

// ============================================================================
// bmp_stat (openbmp.parsed.bmp_stat)
// ============================================================================

static BMP_STAT: SchemaTable = SchemaTable {
    record_type: RecordType::BmpStat,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("rejected", ParseLongEmptyAsZero),
        field("known_dup_updates", ParseLongEmptyAsZero),
        field("known_dup_withdraws", ParseLongEmptyAsZero),
        field("invalid_cluster_list", ParseLongEmptyAsZero),
        field("invalid_as_path", ParseLongEmptyAsZero),
        field("invalid_originator_id", ParseLongEmptyAsZero),
        field("invalid_as_confed", ParseLongEmptyAsZero),
        field("prefixes_pre_policy", ParseLongEmptyAsZero),
        field("prefixes_post_policy", ParseLongEmptyAsZero),
    ],
    extensions: &[],
};

// ============================================================================
// base_attribute (openbmp.parsed.base_attribute)
// ============================================================================

static BASE_ATTRIBUTE: SchemaTable = SchemaTable {
    record_type: RecordType::BaseAttribute,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("origin", ParseNullAsEmpty),
        field("as_path", ParseNullAsEmpty),
        field("as_path_count", ParseLongEmptyAsZero),
        field("origin_as", ParseLongEmptyAsZero),
        field("nexthop", ParseNullAsEmpty),
        field("med", ParseLongEmptyAsZero),
        field("local_pref", ParseLongEmptyAsZero),
        field("aggregator", ParseNullAsEmpty),
        field("community_list", ParseNullAsEmpty),
        field("ext_community_list", ParseNullAsEmpty),
        field("cluster_list", ParseNullAsEmpty),
        field("isAtomicAgg", ParseLongEmptyAsZero),
        field("isNexthopIPv4", ParseLongEmptyAsZero),
        field("originator_id", ParseNullAsEmpty),
    ],
    extensions: &[Extension {
        since: Version::V1_3,
        fields: &[field("large_community_list", ParseNullAsEmpty)],
    }],
};

// ============================================================================
// unicast_prefix (openbmp.parsed.unicast_prefix)
// ============================================================================

static UNICAST_PREFIX: SchemaTable = SchemaTable {
    record_type: RecordType::UnicastPrefix,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("base_attr_hash", ParseNullAsEmpty),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("prefix", NotNull),
        field("prefix_len", ParseInt),
        field("isIPv4", ParseInt),
        field("origin", ParseNullAsEmpty),
        field("as_path", ParseNullAsEmpty),
        field("as_path_count", ParseLongEmptyAsZero),
        field("origin_as", ParseLongEmptyAsZero),
        field("nexthop", ParseNullAsEmpty),
        field("med", ParseLongEmptyAsZero),
        field("local_pref", ParseLongEmptyAsZero),
        field("aggregator", ParseNullAsEmpty),
        field("community_list", ParseNullAsEmpty),
        field("ext_community_list", ParseNullAsEmpty),
        field("cluster_list", ParseNullAsEmpty),
        field("isAtomicAgg", ParseLongEmptyAsZero),
        field("isNexthopIPv4", ParseLongEmptyAsZero),
        field("originator_id", ParseNullAsEmpty),
    ],
    extensions: &[
        Extension {
            since: Version::V1_1,
            fields: &[
                field("path_id", ParseLongEmptyAsZero),
                field("labels", ParseNullAsEmpty),
            ],
        },
        Extension {
            since: Version::V1_3,
            fields: &[
                field("isPrePolicy", ParseLongEmptyAsZero),
                field("isAdjRibIn", ParseLongEmptyAsZero),
            ],
        },
        Extension {
            since: Version::V1_4,
            fields: &[field("large_community_list", ParseNullAsEmpty)],
        },
    ],
};

// ============================================================================
// ls_node (openbmp.parsed.ls_node)
// ============================================================================

static LS_NODE: SchemaTable = SchemaTable {
    record_type: RecordType::LsNode,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("base_attr_hash", NotNull),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("igp_router_id", ParseNullAsEmpty),
        field("router_id", ParseNullAsEmpty),
        field("routing_id", ParseNullAsEmpty),
        field("ls_id", ParseLongEmptyAsZero),
        field("mt_id", ParseNullAsEmpty),
        field("ospf_area_id", ParseNullAsEmpty),
        field("isis_area_id", ParseNullAsEmpty),
        field("protocol", ParseNullAsEmpty),
        field("flags", ParseNullAsEmpty),
        field("as_path", ParseNullAsEmpty),
        field("local_pref", ParseLongEmptyAsZero),
        field("med", ParseLongEmptyAsZero),
        field("nexthop", ParseNullAsEmpty),
        field("name", ParseNullAsEmpty),
    ],
    extensions: &[
        Extension {
            since: Version::V1_3,
            fields: &[
                field("isPrePolicy", ParseLongEmptyAsZero),
                field("isAdjRibIn", ParseLongEmptyAsZero),
            ],
        },
        Extension {
            since: Version::V1_4,
            fields: &[field("ls_sr_capabilities", ParseNullAsEmpty)],
        },
    ],
};

// ============================================================================
// ls_link (openbmp.parsed.ls_link)
// ============================================================================

static LS_LINK: SchemaTable = SchemaTable {
    record_type: RecordType::LsLink,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("base_attr_hash", NotNull),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("igp_router_id", ParseNullAsEmpty),
        field("router_id", ParseNullAsEmpty),
        field("routing_id", ParseNullAsEmpty),
        field("ls_id", ParseLongEmptyAsZero),
        field("ospf_area_id", ParseNullAsEmpty),
        field("isis_area_id", ParseNullAsEmpty),
        field("protocol", ParseNullAsEmpty),
        field("as_path", ParseNullAsEmpty),
        field("local_pref", ParseLongEmptyAsZero),
        field("med", ParseLongEmptyAsZero),
        field("nexthop", ParseNullAsEmpty),
        field("mt_id", ParseNullAsEmpty),
        field("local_link_id", ParseLongEmptyAsZero),
        field("remote_link_id", ParseLongEmptyAsZero),
        field("intf_ip", ParseNullAsEmpty),
        field("nei_ip", ParseNullAsEmpty),
        field("igp_metric", ParseLongEmptyAsZero),
        field("admin_group", ParseLongEmptyAsZero),
        field("max_link_bw", ParseNullAsEmpty),
        field("max_resv_bw", ParseNullAsEmpty),
        field("unreserved_bw", ParseNullAsEmpty),
        field("te_def_metric", ParseLongEmptyAsZero),
        field("protection_type", ParseNullAsEmpty),
        field("mpls_proto_mask", ParseNullAsEmpty),
        field("srlg", ParseNullAsEmpty),
        field("link_name", ParseNullAsEmpty),
        field("remote_node_hash", ParseNullAsEmpty),
        field("local_node_hash", ParseNullAsEmpty),
    ],
    extensions: &[
        Extension {
            since: Version::V1_2,
            fields: &[
                field("remote_igp_router_id", ParseNullAsEmpty),
                field("remote_router_id", ParseNullAsEmpty),
                field("local_node_asn", ParseLongEmptyAsZero),
                field("remote_node_asn", ParseLongEmptyAsZero),
                field("peer_node_sid", ParseNullAsEmpty),
            ],
        },
        Extension {
            since: Version::V1_3,
            fields: &[
                field("isPrePolicy", ParseLongEmptyAsZero),
                field("isAdjRibIn", ParseLongEmptyAsZero),
            ],
        },
        Extension {
            since: Version::V1_4,
            fields: &[field("ls_adjacency_sid", ParseNullAsEmpty)],
        },
    ],
};

// ============================================================================
// ls_prefix (openbmp.parsed.ls_prefix)
// ============================================================================

static LS_PREFIX: SchemaTable = SchemaTable {
    record_type: RecordType::LsPrefix,
    minimum: &[
        field("action", NotNull),
        field("seq", ParseLong),
        field("hash", NotNull),
        field("base_attr_hash", NotNull),
        field("router_hash", NotNull),
        field("router_ip", NotNull),
        field("peer_hash", NotNull),
        field("peer_ip", NotNull),
        field("peer_asn", ParseLong),
        field("timestamp", ParseTimestamp),
        field("igp_router_id", ParseNullAsEmpty),
        field("router_id", ParseNullAsEmpty),
        field("routing_id", ParseNullAsEmpty),
        field("ls_id", ParseLongEmptyAsZero),
        field("ospf_area_id", ParseNullAsEmpty),
        field("isis_area_id", ParseNullAsEmpty),
        field("protocol", ParseNullAsEmpty),
        field("as_path", ParseNullAsEmpty),
        field("local_pref", ParseLongEmptyAsZero),
        field("med", ParseLongEmptyAsZero),
        field("nexthop", ParseNullAsEmpty),
        field("local_node_hash", ParseNullAsEmpty),
        field("mt_id", ParseNullAsEmpty),
        field("ospf_route_type", ParseNullAsEmpty),
        field("igp_flags", ParseNullAsEmpty),
        field("route_tag", ParseLongEmptyAsZero),
        field("ext_route_tag", ParseLongEmptyAsZero),
        field("ospf_fwd_addr", ParseNullAsEmpty),
        field("igp_metric", ParseLongEmptyAsZero),
        field("prefix", NotNull),
        field("prefix_len", ParseInt),
    ],
    extensions: &[
        Extension {
            since: Version::V1_3,
            fields: &[
                field("isPrePolicy", ParseLongEmptyAsZero),
                field("isAdjRibIn", ParseLongEmptyAsZero),
            ],
        },
        Extension {
            since: Version::V1_4,
            fields: &[field("ls_prefix_sid", ParseNullAsEmpty)],
        },
    ],
};

/// Returns the declarative schema table for a record type.
pub fn table(record_type: RecordType) -> &'static SchemaTable {
    match record_type {
        RecordType::Collector => &COLLECTOR,
        RecordType::Router => &ROUTER,
        RecordType::Peer => &PEER,
        RecordType::BmpStat => &BMP_STAT,
        RecordType::BaseAttribute => &BASE_ATTRIBUTE,
        RecordType::UnicastPrefix => &UNICAST_PREFIX,
        RecordType::LsNode => &LS_NODE,
        RecordType::LsLink => &LS_LINK,
        RecordType::LsPrefix => &LS_PREFIX,
    }
}

/// Ordered field names and processors for one record type at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    record_type: RecordType,
    version: Version,
    field_names: Vec<&'static str>,
    processors: Vec<FieldProcessor>,
}

impl SchemaDefinition {
    fn from_specs<'a>(
        record_type: RecordType,
        version: Version,
        specs: impl Iterator<Item = &'a FieldSpec>,
    ) -> Self {
        let (field_names, processors) = specs.map(|spec| (spec.name, spec.processor)).unzip();
        Self {
            record_type,
            version,
            field_names,
            processors,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Version this schema was resolved for.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn field_names(&self) -> &[&'static str] {
        &self.field_names
    }

    pub fn processors(&self) -> &[FieldProcessor] {
        &self.processors
    }

    /// Number of fields (tokens) per content row.
    pub fn len(&self) -> usize {
        self.field_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_names.is_empty()
    }

    /// Position of a field within a row.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|field| *field == name)
    }

    /// Iterates over `(name, processor)` pairs in row order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldProcessor)> + '_ {
        self.field_names
            .iter()
            .copied()
            .zip(self.processors.iter().copied())
    }
}

/// Shorthand for `table(record_type).latest_version()`.
pub fn latest_version(record_type: RecordType) -> Version {
    table(record_type).latest_version()
}

/// Builds the schema of `record_type` as seen at `version`.
///
/// Starts from the minimum field set and appends every extension whose
/// threshold is at or below `version`.
pub fn resolve(record_type: RecordType, version: Version) -> SchemaDefinition {
    let table = table(record_type);
    let extensions = table
        .extensions
        .iter()
        .filter(|ext| version >= ext.since)
        .flat_map(|ext| ext.fields.iter());

    SchemaDefinition::from_specs(
        record_type,
        version,
        table.minimum.iter().chain(extensions),
    )
}

/// Memoizing resolver shared between decoding threads.
///
/// Each `(record type, version)` schema is built at most once.
#[derive(Debug, Default)]
pub struct SchemaResolver {
    cache: DashMap<(RecordType, Version), Arc<SchemaDefinition>>,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema, resolving it on first use.
    pub fn resolve(&self, record_type: RecordType, version: Version) -> Arc<SchemaDefinition> {
        if let Some(schema) = self.cache.get(&(record_type, version)) {
            return Arc::clone(schema.value());
        }

        let schema = self
            .cache
            .entry((record_type, version))
            .or_insert_with(|| {
                let schema = resolve(record_type, version);
                debug!(
                    record_type = %record_type,
                    version = %version,
                    fields = schema.len(),
                    "resolved schema"
                );
                Arc::new(schema)
            });
        Arc::clone(schema.value())
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
