//! The human-readable `gpbackup_<ts>_report` file.

use crate::{
    artifact,
    manifest::{BackupConfig, BackupStatus},
    Result,
};
use chrono::{Local, NaiveDateTime, TimeZone};
use std::{collections::BTreeMap, fmt::Write, path::Path};

/// Format of backup timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub config: BackupConfig,
    pub command_line: String,
    pub database_size: String,
    /// Number of objects of each kind written to the metadata file.
    pub object_counts: BTreeMap<String, usize>,
    /// Number of data files written on each segment.
    pub segment_file_counts: BTreeMap<i32, usize>,
    pub failed_tables: Vec<String>,
    /// The error that ended the backup, if any.
    pub error: Option<String>,
}

impl Report {
    pub fn new(config: BackupConfig, command_line: impl Into<String>) -> Report {
        Report {
            config,
            command_line: command_line.into(),
            ..Report::default()
        }
    }

    /// The `Compression` through `Data File Format` lines of the header.
    pub fn params_string(&self) -> String {
        let c = &self.config;
        let compression = if c.compressed {
            c.compressiontype.as_str()
        } else {
            "None"
        };
        let section = if c.dataonly {
            "Data Only"
        } else if c.metadataonly {
            "Metadata Only"
        } else {
            "All Sections"
        };
        let filter = if c.includeschemafiltered || c.excludeschemafiltered {
            "Schema Filter"
        } else if c.includetablefiltered || c.excludetablefiltered {
            "Table Filter"
        } else {
            "None"
        };
        let stats = if c.withstatistics { "Yes" } else { "No" };
        let files = if c.metadataonly {
            "No Data Files"
        } else if c.singledatafile {
            "Single Data File Per Segment"
        } else {
            "Multiple Data Files Per Segment"
        };

        let mut out = format!(
            "Compression: {compression}\nBackup Section: {section}\nObject Filtering: {filter}\nIncludes Statistics: {stats}\nData File Format: {files}"
        );
        if !c.plugin.is_empty() {
            let _ = write!(out, "\nPlugin Executable: {} {}", c.plugin, c.pluginversion);
        }
        if c.incremental {
            out.push_str("\nIncremental: Yes");
        }
        for (label, list) in [
            ("Include Schemas", &c.includeschemas),
            ("Exclude Schemas", &c.excludeschemas),
            ("Include Tables", &c.includerelations),
            ("Exclude Tables", &c.excluderelations),
        ] {
            if !list.is_empty() {
                let _ = write!(out, "\n{label}: {}", list.join(", "));
            }
        }
        out
    }

    /// Renders the report for a backup that ended at `end`.
    pub fn render(&self, end: NaiveDateTime) -> String {
        let c = &self.config;
        let (start, end, duration) = time_info(&c.timestamp, end);

        let mut out = format!(
            "Greenplum Database Backup Report\n\nTimestamp Key: {}\nGPDB Version: {}\ngpbackup Version: {}\n\nDatabase Name: {}\nCommand Line: {}\n{}\n\nStart Time: {start}\nEnd Time: {end}\nDuration: {duration}\n\nBackup Status: ",
            c.timestamp,
            c.databaseversion,
            c.backupversion,
            c.databasename,
            self.command_line,
            self.params_string(),
        );

        match (&self.error, c.status) {
            (Some(err), _) => {
                let _ = write!(out, "Failure\nBackup Error: {err}");
            }
            (None, BackupStatus::Failed) => out.push_str("Failure"),
            (None, _) => out.push_str("Success"),
        }
        if !self.failed_tables.is_empty() {
            let _ = write!(out, "\nFailed Tables: {}", self.failed_tables.join(", "));
        }
        if !self.database_size.is_empty() {
            let _ = write!(out, "\nDatabase Size: {}", self.database_size);
        }
        out.push('\n');

        out.push_str("\nCount of Database Objects in Backup:\n");
        for (object, count) in &self.object_counts {
            let _ = writeln!(out, "{object:<29}{count}");
        }

        if !self.segment_file_counts.is_empty() {
            out.push_str("\nData Files per Segment:\n");
            for (content, count) in &self.segment_file_counts {
                let _ = writeln!(out, "{content:<29}{count}");
            }
        }
        out
    }

    pub fn write(&self, path: &Path, end: NaiveDateTime) -> Result<()> {
        artifact::write_atomically(path, self.render(end).as_bytes(), artifact::READ_ONLY)
    }
}

/// Start, end and `H:MM:SS` duration of a backup keyed by `timestamp`.
fn time_info(timestamp: &str, end: NaiveDateTime) -> (String, String, String) {
    let display = "%Y-%m-%d %H:%M:%S";
    let end_str = end.format(display).to_string();
    let Ok(start) = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT) else {
        return (String::new(), end_str, String::new());
    };

    let secs = (end - start).num_seconds().max(0);
    let duration = format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60);
    (start.format(display).to_string(), end_str, duration)
}

/// The current local time as a backup timestamp.
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// The current local time without a zone, as used for end times.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parses a backup timestamp into local time.
pub fn parse_timestamp(timestamp: &str) -> Option<chrono::DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}
