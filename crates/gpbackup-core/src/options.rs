//! Validated backup options.

use crate::{filepath, filter::Filters, Error, Result};
use std::{fmt, path::Path, str::FromStr};

/// Compressor applied to data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Gzip,
    Zstd,
}

impl CompressionType {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionType::Gzip => "gzip",
            CompressionType::Zstd => "zstd",
        }
    }

    /// Suffix of compressed data files.
    pub fn extension(self) -> &'static str {
        match self {
            CompressionType::Gzip => ".gz",
            CompressionType::Zstd => ".zst",
        }
    }

    /// Inclusive range of accepted levels.
    pub fn levels(self) -> (i32, i32) {
        match self {
            CompressionType::Gzip => (1, 9),
            CompressionType::Zstd => (1, 19),
        }
    }
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<CompressionType> {
        match s {
            "gzip" => Ok(CompressionType::Gzip),
            "zstd" => Ok(CompressionType::Zstd),
            _ => Err(Error::filter_validation(format!(
                "unknown compression type \"{s}\"; valid values are 'gzip' and 'zstd'"
            ))),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub ty: CompressionType,
    pub level: i32,
}

impl Compression {
    pub fn new(ty: CompressionType, level: i32) -> Result<Compression> {
        let (min, max) = ty.levels();
        if level < min || level > max {
            return Err(Error::filter_validation(format!(
                "compression type '{ty}' only allows compression levels between {min} and {max}, but the provided level is {level}"
            )));
        }
        Ok(Compression { ty, level })
    }

    /// Shell command compressing stdin to stdout, used by multi-file COPY.
    pub fn program(&self) -> String {
        match self.ty {
            CompressionType::Gzip => format!("gzip -c -{}", self.level),
            CompressionType::Zstd => format!("zstd --compress -{} -c", self.level),
        }
    }
}

/// Everything a backup run was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOptions {
    pub dbname: String,
    pub backup_dir: Option<String>,
    pub plugin_config: Option<String>,
    pub filters: Filters,
    pub leaf_partition_data: bool,
    pub metadata_only: bool,
    pub data_only: bool,
    pub single_data_file: bool,
    pub with_stats: bool,
    pub without_globals: bool,
    pub incremental: bool,
    pub from_timestamp: Option<String>,
    pub jobs: usize,
    /// `None` when data files are written uncompressed.
    pub compression: Option<Compression>,
    pub strict_filters: bool,
}

impl Default for BackupOptions {
    fn default() -> BackupOptions {
        BackupOptions {
            dbname: String::new(),
            backup_dir: None,
            plugin_config: None,
            filters: Filters::default(),
            leaf_partition_data: false,
            metadata_only: false,
            data_only: false,
            single_data_file: false,
            with_stats: false,
            without_globals: false,
            incremental: false,
            from_timestamp: None,
            jobs: 1,
            compression: Some(Compression {
                ty: CompressionType::Gzip,
                level: 1,
            }),
            strict_filters: false,
        }
    }
}

impl BackupOptions {
    /// Checks option combinations and values that cannot be decided by
    /// looking at a single flag.
    pub fn validate(&self) -> Result<()> {
        let f = &self.filters;
        exclusive(&[
            ("data-only", self.data_only),
            ("metadata-only", self.metadata_only),
            ("incremental", self.incremental),
        ])?;
        exclusive(&[
            ("include-schema", !f.include_schemas.is_empty()),
            ("include-table", !f.include_relations.is_empty()),
        ])?;
        exclusive(&[
            ("exclude-schema", !f.exclude_schemas.is_empty()),
            ("include-schema", !f.include_schemas.is_empty()),
        ])?;
        exclusive(&[
            ("exclude-schema", !f.exclude_schemas.is_empty()),
            ("exclude-table", !f.exclude_relations.is_empty()),
            ("include-table", !f.include_relations.is_empty()),
        ])?;
        exclusive(&[
            ("exclude-table", !f.exclude_relations.is_empty()),
            ("leaf-partition-data", self.leaf_partition_data),
        ])?;
        exclusive(&[
            ("jobs", self.jobs > 1),
            ("metadata-only", self.metadata_only),
            ("single-data-file", self.single_data_file),
        ])?;
        exclusive(&[
            ("metadata-only", self.metadata_only),
            ("leaf-partition-data", self.leaf_partition_data),
        ])?;
        exclusive(&[
            ("plugin-config", self.plugin_config.is_some()),
            ("backup-dir", self.backup_dir.is_some()),
        ])?;

        if self.from_timestamp.is_some() && !self.incremental {
            return Err(Error::filter_validation(
                "--from-timestamp must be specified with --incremental",
            ));
        }
        if self.incremental && !self.leaf_partition_data {
            return Err(Error::filter_validation(
                "--leaf-partition-data must be specified with --incremental",
            ));
        }
        if self.jobs == 0 {
            return Err(Error::filter_validation("--jobs must be at least 1"));
        }

        for path in [&self.backup_dir, &self.plugin_config].into_iter().flatten() {
            validate_full_path(path)?;
        }
        if let Some(timestamp) = &self.from_timestamp {
            if !filepath::is_valid_timestamp(timestamp) {
                return Err(Error::filter_validation(format!(
                    "Timestamp {timestamp} is invalid.  Timestamps must be in the format YYYYMMDDHHMMSS."
                )));
            }
        }
        if let Some(compression) = self.compression {
            Compression::new(compression.ty, compression.level)?;
        }

        f.validate_shape()
    }

    /// Whether the backup writes metadata files.
    pub fn backs_up_metadata(&self) -> bool {
        !self.data_only
    }

    pub fn backs_up_data(&self) -> bool {
        !self.metadata_only
    }

    /// Whether cluster-wide objects go into the global section.
    pub fn backs_up_globals(&self) -> bool {
        !self.without_globals && !self.filters.has_include()
    }
}

/// At most one of `flags` may be set.
fn exclusive(flags: &[(&str, bool)]) -> Result<()> {
    let set: Vec<String> = flags
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| format!("--{name}"))
        .collect();
    if set.len() > 1 {
        return Err(Error::filter_validation(format!(
            "The following flags may not be specified together: {}",
            set.join(", ")
        )));
    }
    Ok(())
}

fn validate_full_path(path: &str) -> Result<()> {
    if !path.is_empty() && !(path.starts_with('/') || path.starts_with('~')) {
        return Err(Error::filter_validation(format!("{path} is not an absolute path.")));
    }
    Ok(())
}

/// Reads a filter file holding one entry per line; blank lines are skipped.
pub fn read_list_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|err| Error::artifact_io(path, err))?;
    Ok(contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        BackupOptions::default().validate().unwrap();
    }

    #[test]
    fn exclusive_groups() {
        let options = BackupOptions {
            data_only: true,
            metadata_only: true,
            ..BackupOptions::default()
        };
        assert_eq!(
            options.validate().unwrap_err().to_string(),
            "The following flags may not be specified together: --data-only, --metadata-only"
        );

        let options = BackupOptions {
            jobs: 4,
            single_data_file: true,
            ..BackupOptions::default()
        };
        assert!(options.validate().unwrap_err().is_filter_validation());
    }

    #[test]
    fn incremental_requirements() {
        let options = BackupOptions {
            incremental: true,
            ..BackupOptions::default()
        };
        assert!(options
            .validate()
            .unwrap_err()
            .to_string()
            .contains("--leaf-partition-data"));

        let options = BackupOptions {
            from_timestamp: Some("20240101000000".into()),
            ..BackupOptions::default()
        };
        assert!(options.validate().is_err());

        let options = BackupOptions {
            incremental: true,
            leaf_partition_data: true,
            from_timestamp: Some("2024".into()),
            ..BackupOptions::default()
        };
        assert!(options.validate().unwrap_err().to_string().contains("YYYYMMDDHHMMSS"));
    }

    #[test]
    fn relative_backup_dir() {
        let options = BackupOptions {
            backup_dir: Some("backups".into()),
            ..BackupOptions::default()
        };
        assert_eq!(
            options.validate().unwrap_err().to_string(),
            "backups is not an absolute path."
        );
    }

    #[test]
    fn compression_levels() {
        assert!(Compression::new(CompressionType::Gzip, 9).is_ok());
        assert!(Compression::new(CompressionType::Gzip, 10).is_err());
        assert!(Compression::new(CompressionType::Zstd, 19).is_ok());
        assert!(Compression::new(CompressionType::Zstd, 0).is_err());
        assert!("lz4".parse::<CompressionType>().is_err());
        assert_eq!(
            Compression::new(CompressionType::Zstd, 3).unwrap().program(),
            "zstd --compress -3 -c"
        );
    }

    #[test]
    fn list_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables");
        std::fs::write(&path, "public.a\n\n  \npublic.b\n").unwrap();
        assert_eq!(read_list_file(&path).unwrap(), ["public.a", "public.b"]);
    }
}
