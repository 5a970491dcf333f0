mod builder;
pub use builder::Builder;

use crate::{
    data::{self, Agents, CopyPlan},
    incremental, metadata, scope, tables, Outcome,
};
use chrono::NaiveDateTime;
use gpbackup_cluster::{compress, plugin::Verb, shell, Cluster, Executor, Plugin, PluginConfig, Reach};
use gpbackup_core::{
    artifact, bail,
    catalog::Table,
    driver::{Scope, SegmentConfig, APPLICATION_NAME},
    err,
    filepath::{FilePathInfo, COORDINATOR},
    history::History,
    manifest::BackupStatus,
    options::BackupOptions,
    report::{self, Report, TIMESTAMP_FORMAT},
    toc::{DataEntry, Section, Toc},
    Catalog, Driver, Error, Result,
};
use gpbackup_sql::MetadataWriter;
use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    future::Future,
    io::{self, BufWriter},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Mode of the plugin config copy shipped to every host.
const PLUGIN_CONFIG_COPY: u32 = 0o644;

const TERMINATE_INTERVAL: Duration = Duration::from_secs(1);

/// Everything one backup run owns: its options, the database session, the
/// cluster, the artifact paths and the TOC and report being filled in.
///
/// A context is built with [`BackupContext::builder`] and consumed by
/// [`BackupContext::run`], which always finalizes the run before returning.
#[derive(Debug)]
pub struct BackupContext {
    options: BackupOptions,
    driver: Arc<dyn Driver>,
    report: Report,
    toc: Toc,

    executor: Option<Arc<dyn Executor>>,
    tmp_dir: PathBuf,
    agents: Agents,
    terminate_timeout: Duration,

    conn: Option<Box<dyn Catalog>>,
    in_transaction: bool,
    scope: Scope,
    cluster: Option<Cluster>,
    paths: Option<FilePathInfo>,
    plugin: Option<Plugin>,
    lock_file: Option<PathBuf>,
    agents_running: bool,
    terminated: bool,
}

impl BackupContext {
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn new(options: BackupOptions, driver: Arc<dyn Driver>, report: Report) -> BackupContext {
        BackupContext {
            options,
            driver,
            report,
            toc: Toc::default(),
            executor: None,
            tmp_dir: PathBuf::from(builder::DEFAULT_TMP_DIR),
            agents: Agents::default(),
            terminate_timeout: builder::DEFAULT_TERMINATE_TIMEOUT,
            conn: None,
            in_transaction: false,
            scope: Scope::default(),
            cluster: None,
            paths: None,
            plugin: None,
            lock_file: None,
            agents_running: false,
            terminated: false,
        }
    }

    /// The `YYYYMMDDHHMMSS` key of this backup.
    pub fn timestamp(&self) -> &str {
        &self.report.config.timestamp
    }

    pub fn options(&self) -> &BackupOptions {
        &self.options
    }

    /// Runs the backup until it finishes or `shutdown` resolves.
    ///
    /// Whatever happens, the manifest, report and history entry are written
    /// before this returns, and the session, helper agents and lock file are
    /// released.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Outcome {
        let finished = tokio::select! {
            result = self.execute() => Some(result),
            () = shutdown => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                tracing::warn!("Received a termination signal, aborting backup process");
                self.terminated = true;
                Err(err!("backup interrupted by a termination signal"))
            }
        };

        let outcome = self.teardown(result).await;
        match &outcome {
            Outcome::Succeeded => tracing::info!("Backup completed successfully"),
            Outcome::TableFailures(_) => tracing::warn!("{outcome}"),
            Outcome::Aborted(_) => tracing::error!("{outcome}"),
        }
        outcome
    }

    async fn execute(&mut self) -> Result<()> {
        self.setup().await?;
        self.backup().await
    }

    async fn setup(&mut self) -> Result<()> {
        let timestamp = self.report.config.timestamp.clone();
        tracing::info!("Starting backup of database {}", self.options.dbname);
        tracing::info!("Backup Timestamp = {timestamp}");
        self.lock_file = Some(take_lock(&self.tmp_dir, &timestamp)?);

        let conn: &dyn Catalog = &**self.conn.insert(self.driver.connect().await?);
        conn.execute("BEGIN ISOLATION LEVEL SERIALIZABLE").await?;
        self.in_transaction = true;
        self.report.config.databaseversion = conn.version().version_string.clone();
        tracing::debug!(version = %conn.version().semver, "connected");

        let mut cluster = Cluster::new(conn.segments().await?);
        if let Some(executor) = &self.executor {
            cluster = cluster.with_executor(executor.clone());
        }
        let paths = FilePathInfo::new(
            cluster.data_dirs(),
            self.options.backup_dir.clone(),
            timestamp.as_str(),
        );
        let cluster = self.cluster.insert(cluster);
        let paths = self.paths.insert(paths);
        create_backup_dirs(cluster, paths).await?;

        if let Some(config_path) = &self.options.plugin_config {
            let (plugin, version) =
                start_plugin(cluster, paths, &self.tmp_dir, Path::new(config_path)).await?;
            self.report.config.plugin = plugin.config.executable_path.clone();
            self.report.config.pluginversion = version;
            self.plugin = Some(plugin);
        }

        self.scope = scope::resolve(conn, &self.options).await?;
        Ok(())
    }

    async fn backup(&mut self) -> Result<()> {
        let (Some(conn), Some(cluster), Some(paths)) =
            (self.conn.as_deref(), self.cluster.as_ref(), self.paths.as_ref())
        else {
            bail!("backup started without a database session");
        };
        let options = &self.options;
        let scope = &self.scope;
        let version = conn.version();

        self.report.database_size = conn.database_size().await?;
        let split = tables::split_tables(conn.tables(scope).await?, scope, version);
        tracing::info!(
            tables = split.metadata.len(),
            data_tables = split.data.len(),
            "Gathering table state information"
        );

        let lockable: Vec<Table> = split
            .metadata
            .iter()
            .filter(|table| !table.is_external())
            .cloned()
            .collect();
        for statement in data::lock_statements(&lockable, version) {
            conn.execute(&statement).await?;
        }

        let mut backs_up_data = options.backs_up_data();
        if backs_up_data && split.data.is_empty() && !options.data_only {
            tracing::warn!("No tables in backup set contain data. Performing metadata-only backup instead.");
            self.report.config.metadataonly = true;
            backs_up_data = false;
        }

        let all = if backs_up_data { split.data_fqns() } else { vec![] };
        let plan = incremental::plan(
            conn,
            scope,
            &self.report.config,
            paths,
            options.from_timestamp.as_deref(),
            &all,
        )
        .await?;
        self.report.config.restoreplan = plan.restore_plan;
        if options.incremental || options.leaf_partition_data {
            self.toc.incrementalmetadata.ao = plan.ao;
        }

        let mut data_tables: Vec<Table> = if backs_up_data {
            split
                .data
                .iter()
                .filter(|table| {
                    plan.changed
                        .as_ref()
                        .map_or(true, |changed| changed.contains(&table.fqn()))
                })
                .cloned()
                .collect()
        } else {
            vec![]
        };
        data_tables.sort_by_key(|table| table.relation.oid);

        let roots = if options.leaf_partition_data && !data_tables.is_empty() {
            tables::partition_roots(&conn.partition_links().await?, &split.metadata)
        } else {
            HashMap::new()
        };
        for table in &data_tables {
            self.toc.add_data_entry(DataEntry {
                schema: table.relation.schema.clone(),
                name: table.relation.name.clone(),
                oid: table.relation.oid,
                attributestring: tables::attribute_string(&table.columns),
                partitionroot: roots.get(&table.relation.oid).cloned().unwrap_or_default(),
                ..DataEntry::default()
            });
        }

        // Global and predata share a file with postdata, which is written
        // after the data.
        let metadata_path = paths.metadata_file_path();
        let mut predata = None;
        if options.backs_up_metadata() {
            let file = create_file(&metadata_path)?;
            let mut out = MetadataWriter::new(file, &metadata_path, &mut self.toc, Section::Global);
            metadata::backup_global(conn, scope, options, &mut out).await?;
            out.set_section(Section::Predata);
            metadata::backup_predata(conn, scope, &split.metadata, &mut out).await?;
            out.flush()?;
            let offset = out.byte_count();
            predata = Some((out.into_inner(), offset));
        }

        if !data_tables.is_empty() {
            tracing::info!("Writing data to file");
            let snapshot = if options.jobs > 1 && version.at_least("6") {
                Some(conn.export_snapshot().await?)
            } else {
                None
            };
            let mut jobs = Vec::with_capacity(options.jobs.saturating_sub(1));
            for _ in 1..options.jobs {
                let job = self.driver.connect().await?;
                data::synchronize(&*job, snapshot.as_deref()).await?;
                jobs.push(job);
            }

            if options.single_data_file {
                self.agents_running = true;
                self.agents.start(cluster, paths).await?;
            }

            let plan = CopyPlan {
                paths,
                version,
                compression: options.compression,
                plugin: self.plugin.as_ref(),
                single_data_file: options.single_data_file,
            };
            let mut conns: Vec<&dyn Catalog> = vec![conn];
            conns.extend(jobs.iter().map(|job| &**job));
            let copied = data::copy_tables(&conns, &data_tables, &plan).await?;
            for job in &jobs {
                job.execute("COMMIT").await?;
            }

            if options.single_data_file {
                self.agents.stop(cluster, paths).await;
                self.agents_running = false;
                if let Some(plugin) = &self.plugin {
                    back_up_segment_files(cluster, paths, plugin, options).await?;
                }
            }

            let mut succeeded = 0;
            for copied in copied {
                match copied.result {
                    Ok(rows) => {
                        succeeded += 1;
                        if let Some(entry) =
                            self.toc.dataentries.iter_mut().find(|entry| entry.oid == copied.oid)
                        {
                            entry.rowscopied = i64::try_from(rows).unwrap_or(i64::MAX);
                        }
                    }
                    Err(_) => {
                        self.toc.mark_data_entry_failed(copied.oid);
                        if let Some(table) =
                            data_tables.iter().find(|table| table.relation.oid == copied.oid)
                        {
                            self.report.failed_tables.push(table.fqn());
                        }
                    }
                }
            }

            let files_per_segment = if options.single_data_file { 2 } else { succeeded };
            for segment in cluster.segments() {
                if segment.content_id != COORDINATOR {
                    self.report
                        .segment_file_counts
                        .insert(segment.content_id, files_per_segment);
                }
            }
            tracing::info!(
                tables = data_tables.len(),
                failed = self.report.failed_tables.len(),
                "Data backup complete"
            );
        }

        if let Some((file, offset)) = predata {
            let mut out = MetadataWriter::new(file, &metadata_path, &mut self.toc, Section::Postdata)
                .starting_at(offset);
            metadata::backup_postdata(conn, scope, &mut out).await?;
            out.flush()?;
            drop(out);
            make_read_only(&metadata_path)?;
        }

        if options.with_stats && options.backs_up_metadata() {
            tracing::info!("Writing query planner statistics");
            let path = paths.statistics_file_path();
            let mut out = MetadataWriter::new(create_file(&path)?, &path, &mut self.toc, Section::Statistics);
            metadata::backup_statistics(conn, &split.metadata, &mut out).await?;
            out.flush()?;
            drop(out);
            make_read_only(&path)?;
        }

        self.toc.write(&paths.toc_file_path())?;
        conn.execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Releases everything the run holds and writes the closing artifacts.
    /// Each step runs at most once.
    async fn teardown(&mut self, result: Result<()>) -> Outcome {
        if self.terminated {
            self.terminate_copies().await;
        }

        if self.agents_running {
            if let (Some(cluster), Some(paths)) = (&self.cluster, &self.paths) {
                self.agents.stop(cluster, paths).await;
            }
            self.agents_running = false;
        }

        if let Some(conn) = self.conn.take() {
            if self.in_transaction {
                if let Err(err) = conn.execute("ROLLBACK").await {
                    tracing::warn!("could not roll back the backup transaction: {err}");
                }
                self.in_transaction = false;
            }
        }

        let failed_tables = self.report.failed_tables.clone();
        let end = report::local_now();
        let config = &mut self.report.config;
        config.status = if result.is_ok() && failed_tables.is_empty() {
            BackupStatus::Succeeded
        } else {
            BackupStatus::Failed
        };
        config.endtime = end.format(TIMESTAMP_FORMAT).to_string();
        if let Err(err) = &result {
            self.report.error = Some(err.to_string());
        }
        self.report.object_counts = object_counts(&self.toc);

        let mut result = result;
        if let Err(err) = self.finalize(end).await {
            tracing::error!("{err}");
            if result.is_ok() {
                result = Err(err);
            }
        }
        self.release_lock();

        match result {
            Err(err) => Outcome::Aborted(err),
            Ok(()) if !failed_tables.is_empty() => Outcome::TableFailures(failed_tables),
            Ok(()) => Outcome::Succeeded,
        }
    }

    /// Writes the manifest, report and history entry, then hands the
    /// coordinator artifacts to the plugin.
    async fn finalize(&mut self, end: NaiveDateTime) -> Result<()> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        if !paths.dir_for_content(COORDINATOR).is_dir() {
            return Ok(());
        }

        self.report.config.write(&paths.config_file_path())?;
        self.report.write(&paths.report_file_path(), end)?;
        History::append(&paths.history_file_path(), self.report.config.clone())?;

        let (Some(plugin), Some(cluster)) = (self.plugin.take(), &self.cluster) else {
            return Ok(());
        };
        for path in [
            paths.metadata_file_path(),
            paths.statistics_file_path(),
            paths.toc_file_path(),
            paths.config_file_path(),
            paths.report_file_path(),
            paths.plugin_config_path(),
        ] {
            if path.exists() {
                plugin.backup_file(cluster, &path).await?;
            }
        }
        plugin.cleanup(cluster, |seg| dir_for(paths, seg)).await
    }

    /// Ends COPY sessions still writing for this backup, such as ones left
    /// blocked on a helper pipe.
    async fn terminate_copies(&self) {
        let Some(paths) = &self.paths else {
            return;
        };
        let sentinel = data::copy_sentinel(paths);
        let conn = match self.driver.connect().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("could not connect to terminate COPY sessions: {err}");
                return;
            }
        };

        let deadline = tokio::time::Instant::now() + self.terminate_timeout;
        loop {
            match conn.terminate_sessions(APPLICATION_NAME, &sentinel).await {
                Ok(0) => return,
                Ok(sessions) => tracing::info!(sessions, "Terminated hanging COPY sessions"),
                Err(err) => {
                    tracing::warn!("could not terminate COPY sessions: {err}");
                    return;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("COPY sessions of this backup are still running");
                return;
            }
            tokio::time::sleep(TERMINATE_INTERVAL).await;
        }
    }

    fn release_lock(&mut self) {
        if let Some(path) = self.lock_file.take() {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!("could not remove lock file {}: {err}", path.display());
            }
        }
    }
}

/// Claims `<dir>/<timestamp>.lck`, failing when another backup holds it.
fn take_lock(dir: &Path, timestamp: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{timestamp}.lck"));
    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(path),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            bail!(
                "a backup with timestamp {timestamp} is already in progress; remove {} if it is not",
                path.display()
            )
        }
        Err(err) => Err(Error::artifact_io(&path, err)),
    }
}

async fn create_backup_dirs(cluster: &Cluster, paths: &FilePathInfo) -> Result<()> {
    let coordinator = paths.dir_for_content(COORDINATOR);
    fs::create_dir_all(&coordinator).map_err(|err| Error::artifact_io(&coordinator, err))?;

    let commands = cluster.per_content(Reach::SegmentsOnly, |seg| {
        format!("mkdir -p {}", shell::quote(&dir_for(paths, seg)))
    });
    cluster
        .execute_on_all(commands)
        .await
        .check("create segment backup directories")
}

/// Ships a copy of the plugin config to every host, checks the plugin
/// speaks a supported API and prepares the remote backup set.
///
/// Returns the plugin and the API version it reported.
async fn start_plugin(
    cluster: &Cluster,
    paths: &FilePathInfo,
    tmp_dir: &Path,
    config_path: &Path,
) -> Result<(Plugin, String)> {
    let config = PluginConfig::read(config_path)?;
    let yaml = config.to_yaml()?;
    let file_name = config_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin_config.yaml".to_string());
    let copy = tmp_dir.join(format!("{}_{file_name}", paths.timestamp));
    artifact::write_atomically(&copy, yaml.as_bytes(), PLUGIN_CONFIG_COPY)?;

    let plugin = Plugin::new(config, copy.to_string_lossy());
    plugin.distribute_config(cluster, &copy).await?;
    let version = plugin.check_api_version(cluster).await?;
    plugin.setup(cluster, |seg| dir_for(paths, seg)).await?;
    artifact::write_atomically(&paths.plugin_config_path(), yaml.as_bytes(), artifact::READ_ONLY)?;
    tracing::info!(plugin = %plugin.config.executable_path, %version, "Plugin setup complete");
    Ok((plugin, version.to_string()))
}

/// Streams each segment's single data file and its SegmentTOC to the
/// plugin from the segment hosts.
async fn back_up_segment_files(
    cluster: &Cluster,
    paths: &FilePathInfo,
    plugin: &Plugin,
    options: &BackupOptions,
) -> Result<()> {
    let extension = compress::extension(options.compression);
    let commands = cluster.per_content(Reach::SegmentsOnly, |seg| {
        let data_file = paths.table_backup_file_path(seg.content_id, 0, extension, true);
        let toc_file = paths.segment_toc_file_path(seg.content_id);
        format!(
            "{} && {}",
            plugin.command(Verb::BackupFile, &[&data_file]),
            plugin.command(Verb::BackupFile, &[&toc_file.to_string_lossy()])
        )
    });
    cluster
        .execute_on_all(commands)
        .await
        .check("back up segment data files through the plugin")
        .map_err(|err| Error::plugin_io(err.to_string()))
}

fn dir_for(paths: &FilePathInfo, seg: &SegmentConfig) -> String {
    paths
        .dir_for_content(seg.content_id)
        .to_string_lossy()
        .into_owned()
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|err| Error::artifact_io(path, err))
}

fn make_read_only(path: &Path) -> Result<()> {
    artifact::set_mode(path, artifact::READ_ONLY).map_err(|err| Error::artifact_io(path, err))
}

/// Metadata entries per object type, as listed in the report.
fn object_counts(toc: &Toc) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for section in [Section::Global, Section::Predata, Section::Postdata] {
        for entry in toc.entries(section) {
            *counts.entry(entry.objecttype.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::toc::MetadataEntry;

    #[test]
    fn lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = take_lock(dir.path(), "20240101010101").unwrap();
        assert!(path.exists());

        let err = take_lock(dir.path(), "20240101010101").unwrap_err();
        assert!(err.to_string().contains("already in progress"));

        fs::remove_file(&path).unwrap();
        take_lock(dir.path(), "20240101010101").unwrap();
    }

    #[test]
    fn counts_skip_statistics() {
        let mut toc = Toc::default();
        toc.add_metadata_entry(Section::Predata, MetadataEntry::new("public", "t", "TABLE"), 0, 10);
        toc.add_metadata_entry(Section::Predata, MetadataEntry::new("public", "u", "TABLE"), 10, 20);
        toc.add_metadata_entry(Section::Postdata, MetadataEntry::new("public", "i", "INDEX"), 20, 30);
        toc.add_metadata_entry(
            Section::Statistics,
            MetadataEntry::new("public", "t", "STATISTICS"),
            0,
            5,
        );

        let counts = object_counts(&toc);
        assert_eq!(counts.get("TABLE"), Some(&2));
        assert_eq!(counts.get("INDEX"), Some(&1));
        assert_eq!(counts.get("STATISTICS"), None);
    }
}
