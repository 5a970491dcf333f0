//! The per-backup configuration manifest, `gpbackup_<ts>_config.yaml`.

use crate::{artifact, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupStatus {
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Success")]
    Succeeded,
    #[serde(rename = "Failure")]
    Failed,
}

/// One entry of a restore plan: the backup holding the live data of the
/// listed tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePlanEntry {
    pub timestamp: String,
    pub tablefqns: Vec<String>,
}

/// Everything a restore needs to know about how a backup was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub backupdir: String,
    pub backupversion: String,
    pub compressed: bool,
    pub compressiontype: String,
    pub compressionlevel: i32,
    pub databasename: String,
    pub databaseversion: String,
    pub dataonly: bool,
    pub datedeleted: String,
    pub excluderelations: Vec<String>,
    pub excludeschemafiltered: bool,
    pub excludeschemas: Vec<String>,
    pub excludetablefiltered: bool,
    pub includerelations: Vec<String>,
    pub includeschemafiltered: bool,
    pub includeschemas: Vec<String>,
    pub includetablefiltered: bool,
    pub incremental: bool,
    pub leafpartitiondata: bool,
    pub metadataonly: bool,
    pub plugin: String,
    pub pluginversion: String,
    pub restoreplan: Vec<RestorePlanEntry>,
    pub singledatafile: bool,
    pub timestamp: String,
    pub endtime: String,
    pub withoutglobals: bool,
    pub withstatistics: bool,
    pub status: BackupStatus,
}

impl BackupConfig {
    /// Whether `other` was taken with the same object filters, so that its
    /// data can seed an incremental backup of this one.
    pub fn matches_filters(&self, other: &BackupConfig) -> bool {
        self.databasename == other.databasename
            && self.leafpartitiondata == other.leafpartitiondata
            && sorted(&self.includeschemas) == sorted(&other.includeschemas)
            && sorted(&self.excludeschemas) == sorted(&other.excludeschemas)
            && sorted(&self.includerelations) == sorted(&other.includerelations)
            && sorted(&self.excluderelations) == sorted(&other.excluderelations)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == BackupStatus::Succeeded
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<BackupConfig> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Writes the manifest atomically and makes it read-only.
    pub fn write(&self, path: &Path) -> Result<()> {
        artifact::write_atomically(path, self.to_yaml()?.as_bytes(), artifact::READ_ONLY)
    }

    pub fn read(path: &Path) -> Result<BackupConfig> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::artifact_io(path, err))?;
        BackupConfig::from_yaml(&text)
    }
}

fn sorted(list: &[String]) -> Vec<&str> {
    let mut list: Vec<&str> = list.iter().map(String::as_str).collect();
    list.sort_unstable();
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_display_names() {
        let config = BackupConfig {
            status: BackupStatus::Succeeded,
            ..BackupConfig::default()
        };
        assert!(config.to_yaml().unwrap().contains("status: Success"));
    }

    #[test]
    fn filter_order_does_not_matter() {
        let a = BackupConfig {
            databasename: "db".into(),
            includeschemas: vec!["b".into(), "a".into()],
            ..BackupConfig::default()
        };
        let mut b = a.clone();
        b.includeschemas.reverse();
        assert!(a.matches_filters(&b));

        b.leafpartitiondata = true;
        assert!(!a.matches_filters(&b));
    }
}
