use crate::{
    async_trait,
    catalog::*,
    filter::{Filters, FilteredRelation, PartitionLink},
    version::DbVersion,
    Result,
};
use indexmap::IndexMap;
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
};

/// Reported as `application_name` by every backup session; hung COPY
/// sessions are found by it.
pub const APPLICATION_NAME: &str = "gpbackup";

/// What the catalog queries of one backup are restricted to.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub filters: Filters,
    /// Resolved oids of `--include-table`, expanded to partitions.
    pub include_oids: Vec<u32>,
    /// Resolved oids of `--exclude-table`.
    pub exclude_oids: Vec<u32>,
    pub leaf_partition_data: bool,
}

impl Scope {
    /// Namespace predicate for the namespace aliased `alias`.
    pub fn schema_clause(&self, alias: &str) -> String {
        self.filters.schema_filter_clause(alias)
    }

    /// Namespace and relation predicate for queries over `pg_class c` joined
    /// to `pg_namespace n`.
    pub fn relation_clause(&self) -> String {
        let mut clause = self.schema_clause("n");
        clause.push_str(&crate::filter::relation_filter_clause(
            &self.include_oids,
            &self.exclude_oids,
        ));
        clause
    }

    pub fn is_table_filtered(&self) -> bool {
        !self.filters.include_relations.is_empty()
    }
}

/// One primary segment, or the coordinator with content id `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    pub content_id: i32,
    pub hostname: String,
    pub data_dir: String,
}

/// Object kinds whose owner, comment, label and grants are fetched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Aggregate,
    Cast,
    Collation,
    Constraint,
    Conversion,
    Database,
    EventTrigger,
    Extension,
    ExternalProtocol,
    ForeignDataWrapper,
    ForeignServer,
    Function,
    Index,
    Language,
    Operator,
    OperatorClass,
    OperatorFamily,
    Relation,
    ResourceGroup,
    ResourceQueue,
    Role,
    Rule,
    Schema,
    Tablespace,
    TextSearchConfiguration,
    TextSearchDictionary,
    TextSearchParser,
    TextSearchTemplate,
    Trigger,
    Type,
}

/// Opens catalog connections. The engine holds one connection per job.
#[async_trait]
pub trait Driver: Debug + Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Catalog>>;
}

/// Read access to a cluster's catalog from inside the backup snapshot.
///
/// Names, schemas and owners come back already identifier-quoted.
/// Extension-owned objects and objects outside [`Scope`] are never
/// returned.
#[async_trait]
pub trait Catalog: Debug + Send + Sync {
    /// Release of the connected cluster.
    fn version(&self) -> &DbVersion;

    /// Runs a statement and returns the number of rows it affected; for
    /// `COPY` this is the number of rows copied.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Exports the snapshot of the open transaction so other connections
    /// can join it with `SET TRANSACTION SNAPSHOT`.
    async fn export_snapshot(&self) -> Result<String>;

    async fn segments(&self) -> Result<Vec<SegmentConfig>>;

    async fn current_database(&self) -> Result<Database>;

    /// `pg_size_pretty` of the current database.
    async fn database_size(&self) -> Result<String>;

    async fn session_gucs(&self) -> Result<SessionGucs>;

    /// `SET` clauses configured on the current database.
    async fn database_gucs(&self) -> Result<Vec<String>>;

    // ---- globals

    async fn tablespaces(&self) -> Result<Vec<Tablespace>>;

    async fn resource_queues(&self) -> Result<Vec<ResourceQueue>>;

    async fn resource_groups(&self) -> Result<Vec<ResourceGroup>>;

    async fn roles(&self) -> Result<Vec<Role>>;

    async fn role_gucs(&self) -> Result<Vec<RoleGucs>>;

    async fn role_members(&self) -> Result<Vec<RoleMember>>;

    // ---- filter resolution

    /// The subset of `names` that exist as schemas.
    async fn existing_schemas(&self, names: &[String]) -> Result<HashSet<String>>;

    /// Looks up relations by their unquoted `schema.name`.
    async fn lookup_relations(&self, fqns: &[String]) -> Result<Vec<FilteredRelation>>;

    async fn partition_links(&self) -> Result<Vec<PartitionLink>>;

    /// Number of relations in each schema in scope, by unquoted name.
    async fn schema_object_counts(&self, scope: &Scope) -> Result<HashMap<String, usize>>;

    // ---- predata

    async fn schemas(&self, scope: &Scope) -> Result<Vec<Schema>>;

    async fn extensions(&self, scope: &Scope) -> Result<Vec<Extension>>;

    async fn languages(&self, scope: &Scope) -> Result<Vec<Language>>;

    async fn functions(&self, scope: &Scope) -> Result<Vec<Function>>;

    async fn aggregates(&self, scope: &Scope) -> Result<Vec<Aggregate>>;

    async fn types(&self, scope: &Scope) -> Result<Vec<Type>>;

    async fn collations(&self, scope: &Scope) -> Result<Vec<Collation>>;

    async fn casts(&self, scope: &Scope) -> Result<Vec<Cast>>;

    async fn transforms(&self, scope: &Scope) -> Result<Vec<Transform>>;

    async fn conversions(&self, scope: &Scope) -> Result<Vec<Conversion>>;

    async fn operators(&self, scope: &Scope) -> Result<Vec<Operator>>;

    async fn operator_families(&self, scope: &Scope) -> Result<Vec<OperatorFamily>>;

    async fn operator_classes(&self, scope: &Scope) -> Result<Vec<OperatorClass>>;

    async fn text_search_parsers(&self, scope: &Scope) -> Result<Vec<TextSearchParser>>;

    async fn text_search_templates(&self, scope: &Scope) -> Result<Vec<TextSearchTemplate>>;

    async fn text_search_dictionaries(&self, scope: &Scope) -> Result<Vec<TextSearchDictionary>>;

    async fn text_search_configurations(
        &self,
        scope: &Scope,
    ) -> Result<Vec<TextSearchConfiguration>>;

    async fn foreign_data_wrappers(&self, scope: &Scope) -> Result<Vec<ForeignDataWrapper>>;

    async fn foreign_servers(&self, scope: &Scope) -> Result<Vec<ForeignServer>>;

    async fn user_mappings(&self, scope: &Scope) -> Result<Vec<UserMapping>>;

    async fn external_protocols(&self, scope: &Scope) -> Result<Vec<ExternalProtocol>>;

    /// Tables in oid order, with column, storage, partition and external
    /// definitions filled in.
    async fn tables(&self, scope: &Scope) -> Result<Vec<Table>>;

    async fn sequences(&self, scope: &Scope) -> Result<Vec<Sequence>>;

    async fn views(&self, scope: &Scope) -> Result<Vec<View>>;

    async fn constraints(&self, scope: &Scope) -> Result<Vec<Constraint>>;

    async fn partition_infos(&self, scope: &Scope) -> Result<Vec<PartitionInfo>>;

    /// Edges between dependency-sorted objects: each object maps to the
    /// objects it must be created after.
    async fn dependencies(&self, scope: &Scope) -> Result<HashMap<UniqueId, Vec<UniqueId>>>;

    async fn object_metadata(&self, scope: &Scope, kind: MetadataKind) -> Result<MetadataMap>;

    // ---- postdata

    async fn indexes(&self, scope: &Scope) -> Result<Vec<Index>>;

    async fn rules(&self, scope: &Scope) -> Result<Vec<Rule>>;

    async fn triggers(&self, scope: &Scope) -> Result<Vec<Trigger>>;

    async fn event_triggers(&self, scope: &Scope) -> Result<Vec<EventTrigger>>;

    async fn default_privileges(&self, scope: &Scope) -> Result<Vec<DefaultPrivileges>>;

    // ---- statistics

    async fn tuple_statistics(&self, oids: &[u32]) -> Result<Vec<TupleStatistic>>;

    async fn attribute_statistics(&self, oids: &[u32]) -> Result<Vec<AttributeStatistic>>;

    // ---- incremental

    /// Sum of `modcount` over the segment files of each append-optimized
    /// table, keyed by FQN.
    async fn ao_mod_counts(&self, scope: &Scope) -> Result<IndexMap<String, i64>>;

    /// Time of the last DDL statement on each append-optimized table.
    async fn ao_last_ddl(&self, scope: &Scope) -> Result<HashMap<String, String>>;

    // ---- data

    /// Terminates other sessions of `application_name` whose running query
    /// contains `query_contains`, returning how many were signalled.
    async fn terminate_sessions(&self, application_name: &str, query_contains: &str)
        -> Result<u64>;
}
