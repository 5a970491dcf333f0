use super::BackupContext;
use gpbackup_cluster::Executor;
use gpbackup_core::{
    bail,
    filepath::is_valid_timestamp,
    manifest::BackupConfig,
    options::BackupOptions,
    report::{current_timestamp, Report},
    Driver, Result,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Where the timestamp lock file and the plugin config copy are kept.
pub const DEFAULT_TMP_DIR: &str = "/tmp";

/// How long cancellation keeps terminating stray COPY sessions.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct Builder {
    options: BackupOptions,
    command_line: String,
    executor: Option<Arc<dyn Executor>>,
    timestamp: Option<String>,
    tmp_dir: Option<PathBuf>,
    agent_stop_timeout: Option<Duration>,
    terminate_timeout: Option<Duration>,
}

impl Builder {
    pub fn options(&mut self, options: BackupOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// The command line echoed into the report.
    pub fn command_line(&mut self, command_line: impl Into<String>) -> &mut Self {
        self.command_line = command_line.into();
        self
    }

    /// Runs cluster commands through `executor` instead of local processes
    /// and ssh.
    pub fn executor(&mut self, executor: Arc<dyn Executor>) -> &mut Self {
        self.executor = Some(executor);
        self
    }

    /// Uses `timestamp` as the backup key instead of the current time.
    pub fn timestamp(&mut self, timestamp: impl Into<String>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Directory for the `<timestamp>.lck` lock file and the plugin config
    /// copy handed to every host.
    pub fn tmp_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    /// How long single-file helper agents get to exit before being killed.
    pub fn agent_stop_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.agent_stop_timeout = Some(timeout);
        self
    }

    pub fn terminate_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.terminate_timeout = Some(timeout);
        self
    }

    /// Validates the options and prepares a backup against `driver`.
    /// Nothing is connected or written until the backup runs.
    pub fn build(&mut self, driver: Arc<dyn Driver>) -> Result<BackupContext> {
        self.options.validate()?;

        let timestamp = match &self.timestamp {
            Some(timestamp) if !is_valid_timestamp(timestamp) => {
                bail!("timestamp {timestamp} must have the form YYYYMMDDHHMMSS")
            }
            Some(timestamp) => timestamp.clone(),
            None => current_timestamp(),
        };

        let config = manifest_for(&self.options, &timestamp);
        let mut context = BackupContext::new(
            self.options.clone(),
            driver,
            Report::new(config, self.command_line.clone()),
        );
        context.executor = self.executor.clone();
        context.tmp_dir = self
            .tmp_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TMP_DIR));
        if let Some(timeout) = self.agent_stop_timeout {
            context.agents.stop_timeout = timeout;
        }
        context.terminate_timeout = self.terminate_timeout.unwrap_or(DEFAULT_TERMINATE_TIMEOUT);
        Ok(context)
    }
}

/// The manifest of a backup before anything has run.
pub(crate) fn manifest_for(options: &BackupOptions, timestamp: &str) -> BackupConfig {
    let filters = &options.filters;
    BackupConfig {
        backupdir: options.backup_dir.clone().unwrap_or_default(),
        backupversion: env!("CARGO_PKG_VERSION").to_string(),
        compressed: options.compression.is_some(),
        compressiontype: options
            .compression
            .map(|c| c.ty.as_str().to_string())
            .unwrap_or_default(),
        compressionlevel: options.compression.map(|c| c.level).unwrap_or(0),
        databasename: options.dbname.clone(),
        dataonly: options.data_only,
        excluderelations: filters.exclude_relations.clone(),
        excludeschemafiltered: !filters.exclude_schemas.is_empty(),
        excludeschemas: filters.exclude_schemas.clone(),
        excludetablefiltered: !filters.exclude_relations.is_empty(),
        includerelations: filters.include_relations.clone(),
        includeschemafiltered: !filters.include_schemas.is_empty(),
        includeschemas: filters.include_schemas.clone(),
        includetablefiltered: !filters.include_relations.is_empty(),
        incremental: options.incremental,
        leafpartitiondata: options.leaf_partition_data,
        metadataonly: options.metadata_only,
        singledatafile: options.single_data_file,
        timestamp: timestamp.to_string(),
        withoutglobals: options.without_globals,
        withstatistics: options.with_stats,
        ..BackupConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::{
        filter::Filters,
        options::{Compression, CompressionType},
    };

    #[test]
    fn manifest_records_flags() {
        let options = BackupOptions {
            dbname: "sales".into(),
            single_data_file: true,
            compression: Some(Compression::new(CompressionType::Zstd, 3).unwrap()),
            filters: Filters {
                include_schemas: vec!["public".into()],
                ..Filters::default()
            },
            ..BackupOptions::default()
        };
        let config = manifest_for(&options, "20240101010101");
        assert_eq!(config.databasename, "sales");
        assert_eq!(config.compressiontype, "zstd");
        assert_eq!(config.compressionlevel, 3);
        assert!(config.singledatafile);
        assert!(config.includeschemafiltered);
        assert!(!config.includetablefiltered);
        assert_eq!(config.timestamp, "20240101010101");
        assert!(!config.is_succeeded());
    }

    #[test]
    fn uncompressed_manifest() {
        let options = BackupOptions {
            compression: None,
            ..BackupOptions::default()
        };
        let config = manifest_for(&options, "20240101010101");
        assert!(!config.compressed);
        assert_eq!(config.compressiontype, "");
    }
}
