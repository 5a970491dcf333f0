#![allow(dead_code)]

use async_trait::async_trait;
use gpbackup::cluster::{CommandOutput, Executor, Target};
use gpbackup_core::{
    catalog::*,
    driver::{MetadataKind, Scope, SegmentConfig},
    filter::{FilteredRelation, PartitionLink},
    err,
    version::DbVersion,
    Catalog, Driver, Result,
};
use indexmap::IndexMap;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

pub const TIMESTAMP: &str = "20240102030405";

/// What the fake cluster holds and everything the engine did to it.
#[derive(Debug, Default)]
pub struct State {
    pub segments: Vec<SegmentConfig>,
    pub tables: Vec<Table>,
    pub ao_mod_counts: IndexMap<String, i64>,
    /// COPY statements mentioning one of these fail.
    pub failing_copies: Vec<String>,
    /// COPY statements never complete.
    pub hang_copies: bool,
    /// Rolling back to a savepoint fails, as on a lost connection.
    pub broken_rollbacks: bool,
    /// The table query fails.
    pub broken_catalog: bool,
    pub rows_per_copy: u64,
    pub extensions: Vec<Extension>,
    pub text_search_parsers: Vec<TextSearchParser>,
    /// Owner, comment and grants per object kind.
    pub metadata: HashMap<MetadataKind, MetadataMap>,

    pub executed: Mutex<Vec<String>>,
    pub terminated: Mutex<Vec<String>>,
    pub connections: Mutex<usize>,
}

impl State {
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.starts_with("COPY "))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FakeDriver {
    pub state: Arc<State>,
    pub version: DbVersion,
}

impl FakeDriver {
    pub fn new(state: State) -> FakeDriver {
        FakeDriver {
            state: Arc::new(state),
            version: DbVersion::from_release("6.25.0").unwrap(),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn connect(&self) -> Result<Box<dyn Catalog>> {
        *self.state.connections.lock().unwrap() += 1;
        Ok(Box::new(FakeCatalog {
            state: self.state.clone(),
            version: self.version.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FakeCatalog {
    state: Arc<State>,
    version: DbVersion,
}

#[async_trait]
impl Catalog for FakeCatalog {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.state.executed.lock().unwrap().push(sql.to_string());
        if self.state.broken_rollbacks && sql.starts_with("ROLLBACK TO SAVEPOINT") {
            return Err(err!("server closed the connection unexpectedly"));
        }
        if !sql.starts_with("COPY ") {
            return Ok(0);
        }
        if self.state.hang_copies {
            std::future::pending::<()>().await;
        }
        if let Some(table) = self
            .state
            .failing_copies
            .iter()
            .find(|table| sql.contains(&format!("COPY {table} ")))
        {
            return Err(err!(
                "ERROR: could not write to pipe for {table} (seg1 10.0.0.2:6001 pid=42)"
            ));
        }
        Ok(self.state.rows_per_copy)
    }

    async fn export_snapshot(&self) -> Result<String> {
        Ok("00000003-0000001B-1".to_string())
    }

    async fn segments(&self) -> Result<Vec<SegmentConfig>> {
        Ok(self.state.segments.clone())
    }

    async fn current_database(&self) -> Result<Database> {
        Ok(Database {
            oid: 16384,
            name: "sales".to_string(),
            ..Database::default()
        })
    }

    async fn database_size(&self) -> Result<String> {
        Ok("42 MB".to_string())
    }

    async fn session_gucs(&self) -> Result<SessionGucs> {
        Ok(SessionGucs::default())
    }

    async fn database_gucs(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn tablespaces(&self) -> Result<Vec<Tablespace>> {
        Ok(vec![])
    }

    async fn resource_queues(&self) -> Result<Vec<ResourceQueue>> {
        Ok(vec![])
    }

    async fn resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        Ok(vec![])
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(vec![])
    }

    async fn role_gucs(&self) -> Result<Vec<RoleGucs>> {
        Ok(vec![])
    }

    async fn role_members(&self) -> Result<Vec<RoleMember>> {
        Ok(vec![])
    }

    async fn existing_schemas(&self, names: &[String]) -> Result<HashSet<String>> {
        Ok(names.iter().filter(|name| *name == "public").cloned().collect())
    }

    async fn lookup_relations(&self, fqns: &[String]) -> Result<Vec<FilteredRelation>> {
        Ok(self
            .state
            .tables
            .iter()
            .filter(|table| fqns.contains(&table.fqn()))
            .map(|table| FilteredRelation {
                fqn: table.fqn(),
                oid: table.relation.oid,
                partition_level: table.partition_level,
                is_extension_matview: false,
            })
            .collect())
    }

    async fn partition_links(&self) -> Result<Vec<PartitionLink>> {
        Ok(vec![])
    }

    async fn schema_object_counts(&self, _: &Scope) -> Result<HashMap<String, usize>> {
        Ok(HashMap::from([("public".to_string(), self.state.tables.len())]))
    }

    async fn schemas(&self, _: &Scope) -> Result<Vec<Schema>> {
        Ok(vec![Schema {
            oid: 2200,
            name: "public".to_string(),
        }])
    }

    async fn extensions(&self, _: &Scope) -> Result<Vec<Extension>> {
        Ok(self.state.extensions.clone())
    }

    async fn languages(&self, _: &Scope) -> Result<Vec<Language>> {
        Ok(vec![])
    }

    async fn functions(&self, _: &Scope) -> Result<Vec<Function>> {
        Ok(vec![])
    }

    async fn aggregates(&self, _: &Scope) -> Result<Vec<Aggregate>> {
        Ok(vec![])
    }

    async fn types(&self, _: &Scope) -> Result<Vec<Type>> {
        Ok(vec![])
    }

    async fn collations(&self, _: &Scope) -> Result<Vec<Collation>> {
        Ok(vec![])
    }

    async fn casts(&self, _: &Scope) -> Result<Vec<Cast>> {
        Ok(vec![])
    }

    async fn transforms(&self, _: &Scope) -> Result<Vec<Transform>> {
        Ok(vec![])
    }

    async fn conversions(&self, _: &Scope) -> Result<Vec<Conversion>> {
        Ok(vec![])
    }

    async fn operators(&self, _: &Scope) -> Result<Vec<Operator>> {
        Ok(vec![])
    }

    async fn operator_families(&self, _: &Scope) -> Result<Vec<OperatorFamily>> {
        Ok(vec![])
    }

    async fn operator_classes(&self, _: &Scope) -> Result<Vec<OperatorClass>> {
        Ok(vec![])
    }

    async fn text_search_parsers(&self, _: &Scope) -> Result<Vec<TextSearchParser>> {
        Ok(self.state.text_search_parsers.clone())
    }

    async fn text_search_templates(&self, _: &Scope) -> Result<Vec<TextSearchTemplate>> {
        Ok(vec![])
    }

    async fn text_search_dictionaries(&self, _: &Scope) -> Result<Vec<TextSearchDictionary>> {
        Ok(vec![])
    }

    async fn text_search_configurations(&self, _: &Scope) -> Result<Vec<TextSearchConfiguration>> {
        Ok(vec![])
    }

    async fn foreign_data_wrappers(&self, _: &Scope) -> Result<Vec<ForeignDataWrapper>> {
        Ok(vec![])
    }

    async fn foreign_servers(&self, _: &Scope) -> Result<Vec<ForeignServer>> {
        Ok(vec![])
    }

    async fn user_mappings(&self, _: &Scope) -> Result<Vec<UserMapping>> {
        Ok(vec![])
    }

    async fn external_protocols(&self, _: &Scope) -> Result<Vec<ExternalProtocol>> {
        Ok(vec![])
    }

    async fn tables(&self, scope: &Scope) -> Result<Vec<Table>> {
        if self.state.broken_catalog {
            return Err(err!("ERROR: relation \"pg_class\" does not exist"));
        }
        Ok(self
            .state
            .tables
            .iter()
            .filter(|table| {
                scope.include_oids.is_empty() || scope.include_oids.contains(&table.relation.oid)
            })
            .filter(|table| !scope.exclude_oids.contains(&table.relation.oid))
            .cloned()
            .collect())
    }

    async fn sequences(&self, _: &Scope) -> Result<Vec<Sequence>> {
        Ok(vec![])
    }

    async fn views(&self, _: &Scope) -> Result<Vec<View>> {
        Ok(vec![])
    }

    async fn constraints(&self, _: &Scope) -> Result<Vec<Constraint>> {
        Ok(vec![])
    }

    async fn partition_infos(&self, _: &Scope) -> Result<Vec<PartitionInfo>> {
        Ok(vec![])
    }

    async fn dependencies(&self, _: &Scope) -> Result<HashMap<UniqueId, Vec<UniqueId>>> {
        Ok(HashMap::new())
    }

    async fn object_metadata(&self, _: &Scope, kind: MetadataKind) -> Result<MetadataMap> {
        Ok(self.state.metadata.get(&kind).cloned().unwrap_or_default())
    }

    async fn indexes(&self, _: &Scope) -> Result<Vec<Index>> {
        Ok(vec![])
    }

    async fn rules(&self, _: &Scope) -> Result<Vec<Rule>> {
        Ok(vec![])
    }

    async fn triggers(&self, _: &Scope) -> Result<Vec<Trigger>> {
        Ok(vec![])
    }

    async fn event_triggers(&self, _: &Scope) -> Result<Vec<EventTrigger>> {
        Ok(vec![])
    }

    async fn default_privileges(&self, _: &Scope) -> Result<Vec<DefaultPrivileges>> {
        Ok(vec![])
    }

    async fn tuple_statistics(&self, oids: &[u32]) -> Result<Vec<TupleStatistic>> {
        Ok(self
            .state
            .tables
            .iter()
            .filter(|table| oids.contains(&table.relation.oid))
            .map(|table| TupleStatistic {
                oid: table.relation.oid,
                schema: table.relation.schema.clone(),
                table: table.relation.name.clone(),
                rel_pages: 1,
                rel_tuples: 10.0,
            })
            .collect())
    }

    async fn attribute_statistics(&self, _: &[u32]) -> Result<Vec<AttributeStatistic>> {
        Ok(vec![])
    }

    async fn ao_mod_counts(&self, _: &Scope) -> Result<IndexMap<String, i64>> {
        Ok(self.state.ao_mod_counts.clone())
    }

    async fn ao_last_ddl(&self, _: &Scope) -> Result<HashMap<String, String>> {
        Ok(self
            .state
            .ao_mod_counts
            .keys()
            .map(|fqn| (fqn.clone(), "2024-01-01 00:00:00".to_string()))
            .collect())
    }

    async fn terminate_sessions(&self, application_name: &str, query_contains: &str) -> Result<u64> {
        self.state
            .terminated
            .lock()
            .unwrap()
            .push(format!("{application_name}:{query_contains}"));
        Ok(0)
    }
}

/// Runs nothing and records every command; all commands succeed. A plugin
/// asked for its API version answers `0.5.0`.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub commands: Mutex<Vec<(Target, String)>>,
}

impl RecordingExecutor {
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(&self, target: &Target, command: &str) -> CommandOutput {
        self.commands
            .lock()
            .unwrap()
            .push((target.clone(), command.to_string()));
        let stdout = if command.contains("plugin_api_version") {
            "0.5.0\n".to_string()
        } else {
            String::new()
        };
        CommandOutput {
            stdout,
            ..CommandOutput::default()
        }
    }
}

/// A fake cluster laid out under one temporary directory.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub driver: FakeDriver,
    pub executor: Arc<RecordingExecutor>,
}

impl Fixture {
    pub fn new(mut state: State) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("coordinator")).unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        let segment = |content_id: i32, host: &str, data_dir: &str| SegmentConfig {
            content_id,
            hostname: host.to_string(),
            data_dir: dir.path().join(data_dir).to_string_lossy().into_owned(),
        };
        state.segments = vec![
            segment(-1, "cdw", "coordinator"),
            segment(0, "sdw1", "gpseg0"),
            segment(1, "sdw2", "gpseg1"),
        ];
        Fixture {
            dir,
            driver: FakeDriver::new(state),
            executor: Arc::new(RecordingExecutor::default()),
        }
    }

    pub fn state(&self) -> &State {
        &self.driver.state
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.path().join("coordinator").join("gpbackup_history.yaml")
    }

    pub fn backup_dir(&self) -> String {
        self.dir.path().join("backups").to_string_lossy().into_owned()
    }

    /// The coordinator directory of the backup taken at `timestamp`.
    pub fn timestamp_dir(&self, timestamp: &str) -> PathBuf {
        Path::new(&self.backup_dir())
            .join("backups")
            .join(&timestamp[..8])
            .join(timestamp)
    }

    pub fn artifact(&self, timestamp: &str, suffix: &str) -> PathBuf {
        self.timestamp_dir(timestamp)
            .join(format!("gpbackup_{timestamp}_{suffix}"))
    }

    /// An artifact of a backup kept in the coordinator data directory.
    pub fn coordinator_artifact(&self, timestamp: &str, suffix: &str) -> PathBuf {
        self.dir
            .path()
            .join("coordinator")
            .join("backups")
            .join(&timestamp[..8])
            .join(timestamp)
            .join(format!("gpbackup_{timestamp}_{suffix}"))
    }
}

pub fn make_table(oid: u32, name: &str) -> Table {
    Table {
        relation: Relation::new(oid, "public", name),
        columns: vec![
            ColumnDefinition::new("id", "integer"),
            ColumnDefinition::new("amount", "numeric"),
        ],
        dist_policy: "DISTRIBUTED BY (id)".to_string(),
        ..Table::default()
    }
}

pub fn make_external_table(oid: u32, name: &str) -> Table {
    Table {
        relation: Relation::new(oid, "public", name),
        columns: vec![ColumnDefinition::new("line", "text")],
        external: Some(ExternalTableDefinition::default()),
        ..Table::default()
    }
}
