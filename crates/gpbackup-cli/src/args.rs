use crate::Config;
use anyhow::{Context, Result};
use clap::Parser;
use gpbackup_core::{
    filter::Filters,
    options::{read_list_file, BackupOptions, Compression, CompressionType},
};
use std::path::{Path, PathBuf};

/// Flags of the `gpbackup` command.
#[derive(Parser, Debug, Default)]
#[command(name = "gpbackup")]
#[command(about = "Parallel logical backup of a Greenplum database")]
#[command(version)]
pub struct BackupArgs {
    /// Database to back up; a postgresql:// URL is accepted as well
    #[arg(long, default_value = "")]
    pub dbname: String,

    /// Absolute path under which every host writes its backup files
    #[arg(long)]
    pub backup_dir: Option<String>,

    /// Back up only this schema (repeatable)
    #[arg(long, conflicts_with = "exclude_schema")]
    pub include_schema: Vec<String>,

    #[arg(long, value_name = "FILE")]
    pub include_schema_file: Option<PathBuf>,

    /// Skip this schema (repeatable)
    #[arg(long)]
    pub exclude_schema: Vec<String>,

    #[arg(long, value_name = "FILE")]
    pub exclude_schema_file: Option<PathBuf>,

    /// Back up only this table, given as schema.table (repeatable)
    #[arg(long)]
    pub include_table: Vec<String>,

    #[arg(long, value_name = "FILE")]
    pub include_table_file: Option<PathBuf>,

    /// Skip this table, given as schema.table (repeatable)
    #[arg(long)]
    pub exclude_table: Vec<String>,

    #[arg(long, value_name = "FILE")]
    pub exclude_table_file: Option<PathBuf>,

    /// Write one data file per leaf partition instead of one per root
    #[arg(long)]
    pub leaf_partition_data: bool,

    #[arg(long, conflicts_with_all = ["data_only", "incremental"])]
    pub metadata_only: bool,

    #[arg(long, conflicts_with = "incremental")]
    pub data_only: bool,

    /// Append every table of a segment to a single data file
    #[arg(long)]
    pub single_data_file: bool,

    /// Also back up query planner statistics
    #[arg(long)]
    pub with_stats: bool,

    /// Leave roles, resource queues and other cluster-wide objects out
    #[arg(long)]
    pub without_globals: bool,

    /// Number of parallel connections copying table data
    #[arg(long, conflicts_with = "single_data_file")]
    pub jobs: Option<usize>,

    #[arg(long, conflicts_with = "compression_level")]
    pub no_compression: bool,

    #[arg(long, value_parser = ["gzip", "zstd"])]
    pub compression_type: Option<String>,

    #[arg(long)]
    pub compression_level: Option<i32>,

    /// Copy only append-optimized tables changed since the last matching
    /// backup
    #[arg(long)]
    pub incremental: bool,

    /// Base the incremental backup on this timestamp
    #[arg(long, requires = "incremental")]
    pub from_timestamp: Option<String>,

    /// Hand every backup file to the storage plugin described in this YAML
    /// file
    #[arg(long, conflicts_with = "backup_dir")]
    pub plugin_config: Option<String>,

    /// Fail when an included schema matches nothing
    #[arg(long)]
    pub strict_filters: bool,

    /// TOML file with defaults for the location, jobs and compression
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, short, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(long, short)]
    pub quiet: bool,
}

impl BackupArgs {
    /// Reads the `--config` file, if one was given.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }

    /// Merges the flags over `config` and validates the result.
    pub fn into_options(self, config: &Config) -> Result<BackupOptions> {
        let filters = Filters {
            include_schemas: with_list_file(self.include_schema, self.include_schema_file.as_deref())?,
            exclude_schemas: with_list_file(self.exclude_schema, self.exclude_schema_file.as_deref())?,
            include_relations: with_list_file(self.include_table, self.include_table_file.as_deref())?,
            exclude_relations: with_list_file(self.exclude_table, self.exclude_table_file.as_deref())?,
        };

        // The configured location only applies when no flag chose one.
        let (backup_dir, plugin_config) = match (self.backup_dir, self.plugin_config) {
            (None, None) => (config.backup_dir.clone(), config.plugin_config.clone()),
            flags => flags,
        };

        let compression = if self.no_compression {
            None
        } else {
            let ty: CompressionType = self
                .compression_type
                .or_else(|| config.compression_type.clone())
                .as_deref()
                .unwrap_or("gzip")
                .parse()?;
            let level = self
                .compression_level
                .or(config.compression_level)
                .unwrap_or(1);
            Some(Compression::new(ty, level)?)
        };

        let options = BackupOptions {
            dbname: self.dbname,
            backup_dir,
            plugin_config,
            filters,
            leaf_partition_data: self.leaf_partition_data,
            metadata_only: self.metadata_only,
            data_only: self.data_only,
            single_data_file: self.single_data_file,
            with_stats: self.with_stats,
            without_globals: self.without_globals,
            incremental: self.incremental,
            from_timestamp: self.from_timestamp,
            jobs: self.jobs.or(config.jobs).unwrap_or(1),
            compression,
            strict_filters: self.strict_filters,
        };
        options.validate()?;
        Ok(options)
    }
}

fn with_list_file(mut values: Vec<String>, file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(file) = file {
        let entries = read_list_file(file)
            .with_context(|| format!("reading filter file {}", file.display()))?;
        values.extend(entries);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> BackupArgs {
        BackupArgs::try_parse_from(std::iter::once("gpbackup").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let options = parse(&["--dbname", "sales"])
            .into_options(&Config::default())
            .unwrap();
        assert_eq!(options.dbname, "sales");
        assert_eq!(options.jobs, 1);
        assert_eq!(
            options.compression,
            Some(Compression::new(CompressionType::Gzip, 1).unwrap())
        );
    }

    #[test]
    fn repeated_filters() {
        let options = parse(&[
            "--include-table",
            "public.a",
            "--include-table",
            "public.b",
        ])
        .into_options(&Config::default())
        .unwrap();
        assert_eq!(options.filters.include_relations, ["public.a", "public.b"]);
    }

    #[test]
    fn no_compression() {
        let options = parse(&["--no-compression"])
            .into_options(&Config::default())
            .unwrap();
        assert_eq!(options.compression, None);
    }
}
