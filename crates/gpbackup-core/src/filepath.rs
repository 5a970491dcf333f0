//! Where every artifact of a backup lives.
//!
//! Segment paths are produced in two forms: concrete paths for one content
//! id, and templates containing `<SEG_DATA_DIR>` and `<SEGID>` that the
//! database expands on each segment when running `COPY ... ON SEGMENT`.

use crate::history::HISTORY_FILE_NAME;
use regex::Regex;
use std::{collections::HashMap, path::PathBuf, sync::LazyLock};

/// Placeholder for a segment's data directory in COPY templates.
pub const SEG_DATA_DIR: &str = "<SEG_DATA_DIR>";

/// Placeholder for a segment's content id in COPY templates.
pub const SEGID: &str = "<SEGID>";

/// Content id of the coordinator.
pub const COORDINATOR: i32 = -1;

/// The coordinator-only files of a backup set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFile {
    Config,
    Metadata,
    Statistics,
    Toc,
    Report,
    PluginConfig,
}

impl BackupFile {
    fn suffix(self) -> &'static str {
        match self {
            BackupFile::Config => "config.yaml",
            BackupFile::Metadata => "metadata.sql",
            BackupFile::Statistics => "statistics.sql",
            BackupFile::Toc => "toc.yaml",
            BackupFile::Report => "report",
            BackupFile::PluginConfig => "plugin_config.yaml",
        }
    }
}

/// Path layout of one backup, keyed by its timestamp.
#[derive(Debug, Clone)]
pub struct FilePathInfo {
    pub pid: u32,
    pub timestamp: String,
    /// Data directory of each content id, the coordinator included.
    pub seg_dirs: HashMap<i32, String>,
    /// `--backup-dir`, when the backup does not go to the data directories.
    pub backup_dir: Option<String>,
}

impl FilePathInfo {
    pub fn new(
        seg_dirs: HashMap<i32, String>,
        backup_dir: Option<String>,
        timestamp: impl Into<String>,
    ) -> FilePathInfo {
        FilePathInfo {
            pid: std::process::id(),
            timestamp: timestamp.into(),
            seg_dirs,
            backup_dir: backup_dir.filter(|dir| !dir.is_empty()),
        }
    }

    fn date(&self) -> &str {
        self.timestamp.get(0..8).unwrap_or(&self.timestamp)
    }

    fn base_dir(&self, content: i32) -> &str {
        match &self.backup_dir {
            Some(dir) => dir,
            None => self.seg_dirs.get(&content).map(String::as_str).unwrap_or(""),
        }
    }

    /// `<base>/backups/<YYYYMMDD>/<ts>` for `content`.
    pub fn dir_for_content(&self, content: i32) -> PathBuf {
        PathBuf::from(self.base_dir(content))
            .join("backups")
            .join(self.date())
            .join(&self.timestamp)
    }

    pub fn backup_file_path(&self, file: BackupFile) -> PathBuf {
        self.dir_for_content(COORDINATOR)
            .join(format!("gpbackup_{}_{}", self.timestamp, file.suffix()))
    }

    pub fn metadata_file_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::Metadata)
    }

    pub fn statistics_file_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::Statistics)
    }

    pub fn toc_file_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::Toc)
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::Config)
    }

    pub fn report_file_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::Report)
    }

    pub fn plugin_config_path(&self) -> PathBuf {
        self.backup_file_path(BackupFile::PluginConfig)
    }

    /// The history file in the coordinator data directory.
    pub fn history_file_path(&self) -> PathBuf {
        PathBuf::from(self.seg_dirs.get(&COORDINATOR).map(String::as_str).unwrap_or(""))
            .join(HISTORY_FILE_NAME)
    }

    pub fn segment_toc_file_path(&self, content: i32) -> PathBuf {
        self.dir_for_content(content)
            .join(format!("gpbackup_{content}_{}_toc.yaml", self.timestamp))
    }

    /// Data file template for `COPY ... ON SEGMENT`.
    ///
    /// In single-data-file mode every table of a segment shares one file, so
    /// the oid is left out.
    pub fn table_backup_file_template(&self, oid: u32, extension: &str, single_data_file: bool) -> String {
        let mut file = format!("gpbackup_{SEGID}_{}", self.timestamp);
        if !single_data_file {
            file.push_str(&format!("_{oid}"));
        }
        file.push_str(extension);

        let base = self.backup_dir.as_deref().unwrap_or(SEG_DATA_DIR);
        format!(
            "{}/backups/{}/{}/{file}",
            base.trim_end_matches('/'),
            self.date(),
            self.timestamp
        )
    }

    pub fn table_backup_file_path(
        &self,
        content: i32,
        oid: u32,
        extension: &str,
        single_data_file: bool,
    ) -> String {
        self.expand(&self.table_backup_file_template(oid, extension, single_data_file), content)
    }

    /// Named pipe template held open by the helper agent on each segment.
    pub fn segment_pipe_template(&self) -> String {
        format!("{SEG_DATA_DIR}/gpbackup_{SEGID}_{}_pipe_{}", self.timestamp, self.pid)
    }

    pub fn segment_pipe_path(&self, content: i32) -> String {
        self.expand(&self.segment_pipe_template(), content)
    }

    /// A per-segment scratch file of the helper, such as its pid file.
    pub fn segment_helper_file_path(&self, content: i32, suffix: &str) -> PathBuf {
        PathBuf::from(self.seg_dirs.get(&content).map(String::as_str).unwrap_or("")).join(format!(
            "gpbackup_{content}_{}_{suffix}_{}",
            self.timestamp, self.pid
        ))
    }

    /// Replaces the segment placeholders of `template` for `content`.
    pub fn expand(&self, template: &str, content: i32) -> String {
        let dir = self.seg_dirs.get(&content).map(String::as_str).unwrap_or("");
        template
            .replace(SEG_DATA_DIR, dir)
            .replace(SEGID, &content.to_string())
    }
}

/// Whether `timestamp` has the `YYYYMMDDHHMMSS` shape of a backup key.
///
/// Only the shape is checked; a backup taken in a time zone ahead of the
/// local one may carry a future timestamp.
pub fn is_valid_timestamp(timestamp: &str) -> bool {
    TIMESTAMP.is_match(timestamp)
}

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{14}$").expect("valid regex"));
