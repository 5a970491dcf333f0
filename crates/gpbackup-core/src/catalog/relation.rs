use super::{class, make_fqn, Acl, UniqueId};

/// Any object stored in `pg_class`: tables, views, sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Relation {
    pub schema_oid: u32,
    pub oid: u32,

    /// Quoted schema name
    pub schema: String,

    /// Quoted relation name
    pub name: String,
}

impl Relation {
    pub fn new(oid: u32, schema: impl Into<String>, name: impl Into<String>) -> Relation {
        Relation {
            schema_oid: 0,
            oid,
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_CLASS, self.oid)
    }
}

/// A table and everything needed to recreate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub relation: Relation,

    pub columns: Vec<ColumnDefinition>,

    /// Rendered distribution clause, e.g. `DISTRIBUTED BY (id)`.
    pub dist_policy: String,

    pub partition_level: PartitionLevel,

    /// Legacy partition definition (`PARTITION BY RANGE ...`), as rendered
    /// by `pg_get_partition_def`.
    pub part_def: String,

    pub part_template_def: String,

    /// Declarative partition key (`PARTITION BY` on version 7).
    pub partition_key_def: String,

    /// Quoted FQNs of parent tables.
    pub inherits: Vec<String>,

    pub tablespace: String,

    /// Contents of the `WITH (...)` clause.
    pub storage_opts: String,

    pub access_method: String,

    /// `OF typename` for typed tables.
    pub of_type: String,

    pub is_unlogged: bool,

    pub force_row_security: bool,

    pub replica_identity: ReplicaIdentity,

    pub external: Option<ExternalTableDefinition>,

    pub foreign: Option<ForeignTableDefinition>,

    pub attach_partition: Option<AttachPartitionInfo>,

    /// Partitions that were moved to another schema after creation.
    pub altered_partition_schemas: Vec<AlteredPartitionSchema>,

    /// Set for external leaf partitions of legacy partitioned tables.
    pub is_external_partition: bool,

    pub depends_upon: Vec<UniqueId>,
}

impl Table {
    pub fn fqn(&self) -> String {
        self.relation.fqn()
    }

    pub fn unique_id(&self) -> UniqueId {
        self.relation.unique_id()
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    pub fn is_foreign(&self) -> bool {
        self.foreign.is_some()
    }

    /// Whether COPY has rows to extract from this relation.
    pub fn has_data(&self) -> bool {
        !self.is_external() && !self.is_foreign()
    }

    pub fn object_type(&self) -> &'static str {
        if self.is_foreign() {
            "FOREIGN TABLE"
        } else {
            "TABLE"
        }
    }
}

/// Position of a table within a legacy partition hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PartitionLevel {
    /// Not partitioned
    #[default]
    None,
    Root,
    Intermediate,
    Leaf,
}

impl PartitionLevel {
    pub fn from_code(code: &str) -> PartitionLevel {
        match code {
            "p" => PartitionLevel::Root,
            "i" => PartitionLevel::Intermediate,
            "l" => PartitionLevel::Leaf,
            _ => PartitionLevel::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReplicaIdentity {
    #[default]
    Default,
    Nothing,
    Full,
    Index,
}

impl ReplicaIdentity {
    pub fn from_code(code: &str) -> ReplicaIdentity {
        match code {
            "n" => ReplicaIdentity::Nothing,
            "f" => ReplicaIdentity::Full,
            "i" => ReplicaIdentity::Index,
            _ => ReplicaIdentity::Default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDefinition {
    /// Quoted column name
    pub name: String,

    /// Formatted type, e.g. `character varying(20)`
    pub ty: String,

    pub not_null: bool,

    /// Default expression, or the generation expression when
    /// `is_generated` is set.
    pub default: Option<String>,

    pub is_generated: bool,

    pub collation: String,

    pub storage: String,

    /// `-1` keeps the system default.
    pub stat_target: i32,

    /// Column compression options (`ENCODING (...)`).
    pub encoding: String,

    pub options: String,

    pub fdw_options: String,

    pub comment: String,

    pub privileges: Vec<Acl>,

    pub security_label_provider: String,

    pub security_label: String,

    pub is_inherited: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> ColumnDefinition {
        ColumnDefinition {
            name: name.into(),
            ty: ty.into(),
            stat_target: -1,
            ..ColumnDefinition::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignTableDefinition {
    pub server: String,
    pub options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachPartitionInfo {
    pub relname: String,
    pub parent: String,
    pub expr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlteredPartitionSchema {
    pub old_schema: String,
    pub name: String,
    pub new_schema: String,
}

/// Where an external web table's command runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecLocation {
    #[default]
    AllSegments,
    Coordinator,
    Host(Option<String>),
    PerHost,
    Segment(i32),
    Count(i32),
}

impl ExecLocation {
    /// Parses `pg_exttable` execute-location text (`ALL_SEGMENTS`,
    /// `HOST:foo`, `SEGMENT_ID:0`, `TOTAL_SEGS:3`, ...).
    pub fn parse(text: &str) -> ExecLocation {
        match text.split_once(':') {
            Some(("HOST", host)) => ExecLocation::Host(Some(host.to_string())),
            Some(("SEGMENT_ID", id)) => ExecLocation::Segment(id.parse().unwrap_or(0)),
            Some(("TOTAL_SEGS", n)) => ExecLocation::Count(n.parse().unwrap_or(0)),
            _ => match text {
                "MASTER_ONLY" | "COORDINATOR_ONLY" => ExecLocation::Coordinator,
                "PER_HOST" => ExecLocation::PerHost,
                _ => ExecLocation::AllSegments,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RejectLimitType {
    #[default]
    Rows,
    Percent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalTableDefinition {
    pub oid: u32,

    pub uris: Vec<String>,

    /// Command of an `EXECUTE` web table.
    pub command: String,

    pub exec_location: ExecLocation,

    /// `t`, `c`, `b`, `a` or `p`.
    pub format_type: String,

    pub format_opts: String,

    /// Free-form `OPTIONS` body, already one option per line.
    pub options: String,

    pub encoding: String,

    pub writable: bool,

    pub reject_limit: i32,

    pub reject_limit_type: RejectLimitType,

    pub log_errors: bool,

    pub error_table_schema: String,

    pub error_table_name: String,
}

impl ExternalTableDefinition {
    /// `http(s)://` locations and commands make a web table.
    pub fn is_web(&self) -> bool {
        !self.command.is_empty()
            || self
                .uris
                .iter()
                .any(|uri| uri.starts_with("http://") || uri.starts_with("https://"))
    }

    pub fn format_keyword(&self) -> &str {
        match self.format_type.as_str() {
            "c" => "CSV",
            "b" => "CUSTOM",
            "a" => "AVRO",
            "p" => "PARQUET",
            _ => "TEXT",
        }
    }
}

/// A legacy partition rule, used to re-attach external leaf partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionInfo {
    pub rule_oid: u32,

    /// `0` for a first-level partition.
    pub parent_rule_oid: u32,

    pub parent_relation_oid: u32,
    pub parent_schema: String,
    pub parent_relation_name: String,
    pub relation_oid: u32,

    /// Quoted partition name, empty for unnamed partitions.
    pub partition_name: String,

    pub rank: i32,
    pub is_external: bool,
}

impl PartitionInfo {
    pub fn parent_fqn(&self) -> String {
        make_fqn(&self.parent_schema, &self.parent_relation_name)
    }
}

const EXT_PART_SUFFIX: &str = "_ext_part_";
const MAX_IDENT_LEN: usize = 63;

/// Name of the standalone table an external leaf partition is created as
/// before it is exchanged into its parent. The result never exceeds the
/// identifier length limit.
pub fn ext_part_name(name: &str) -> String {
    if let Some(unquoted) = name.strip_suffix('"') {
        let max = MAX_IDENT_LEN + 2;
        if name.len() + EXT_PART_SUFFIX.len() > max {
            return format!("{}{EXT_PART_SUFFIX}\"", &name[..max - EXT_PART_SUFFIX.len()]);
        }
        return format!("{unquoted}{EXT_PART_SUFFIX}\"");
    }
    if name.len() + EXT_PART_SUFFIX.len() > MAX_IDENT_LEN {
        return format!(
            "{}{EXT_PART_SUFFIX}",
            &name[..MAX_IDENT_LEN + 1 - EXT_PART_SUFFIX.len()]
        );
    }
    format!("{name}{EXT_PART_SUFFIX}")
}
