//! The history file listing every backup taken from a cluster.

use crate::{artifact, manifest::BackupConfig, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const HISTORY_FILE_NAME: &str = "gpbackup_history.yaml";

/// Backups ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub backupconfigs: Vec<BackupConfig>,
}

impl History {
    /// Loads the history. A missing or empty file is an empty history.
    pub fn load(path: &Path) -> Result<History> {
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(History::default()),
            Ok(text) => History::from_yaml(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(History::default()),
            Err(err) => Err(Error::artifact_io(path, err)),
        }
    }

    pub fn from_yaml(text: &str) -> Result<History> {
        let mut history: History = serde_yaml::from_str(text)?;
        history.sort();
        Ok(history)
    }

    /// Adds `config`, replacing an entry with the same timestamp.
    pub fn add(&mut self, config: BackupConfig) {
        self.backupconfigs
            .retain(|existing| existing.timestamp != config.timestamp);
        self.backupconfigs.push(config);
        self.sort();
    }

    fn sort(&mut self) {
        self.backupconfigs
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn find_backup_config(&self, timestamp: &str) -> Option<&BackupConfig> {
        self.backupconfigs
            .iter()
            .find(|config| config.timestamp == timestamp)
    }

    /// Rewrites the whole file through a temporary file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        artifact::write_atomically(path, text.as_bytes(), artifact::READ_ONLY)
    }

    /// Loads the history at `path`, records `config` and writes it back.
    pub fn append(path: &Path, config: BackupConfig) -> Result<History> {
        let mut history = History::load(path)?;
        history.add(config);
        history.write(path)?;
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(timestamp: &str) -> BackupConfig {
        BackupConfig {
            timestamp: timestamp.into(),
            ..BackupConfig::default()
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::load(&dir.path().join(HISTORY_FILE_NAME)).unwrap();
        assert!(history.backupconfigs.is_empty());
    }

    #[test]
    fn empty_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);
        std::fs::write(&path, "").unwrap();
        assert!(History::load(&path).unwrap().backupconfigs.is_empty());
    }

    #[test]
    fn entries_are_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);

        History::append(&path, config("20240101000000")).unwrap();
        History::append(&path, config("20240301000000")).unwrap();
        let history = History::append(&path, config("20240201000000")).unwrap();

        let timestamps: Vec<_> = history
            .backupconfigs
            .iter()
            .map(|c| c.timestamp.as_str())
            .collect();
        assert_eq!(timestamps, ["20240301000000", "20240201000000", "20240101000000"]);
        assert_eq!(History::load(&path).unwrap(), history);
        assert!(history.find_backup_config("20240201000000").is_some());
        assert!(history.find_backup_config("20990101000000").is_none());
    }
}
