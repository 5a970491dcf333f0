use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Defaults read from a `gpbackup.toml` file. Flags given on the command
/// line take precedence over every value here.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backup_dir: Option<String>,
    pub jobs: Option<usize>,
    pub compression_type: Option<String>,
    pub compression_level: Option<i32>,
    pub plugin_config: Option<String>,
}

impl Config {
    /// Create a new Config with no defaults set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn backup_dir(mut self, backup_dir: impl Into<String>) -> Self {
        self.backup_dir = Some(backup_dir.into());
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn compression(mut self, ty: impl Into<String>, level: i32) -> Self {
        self.compression_type = Some(ty.into());
        self.compression_level = Some(level);
        self
    }

    pub fn plugin_config(mut self, plugin_config: impl Into<String>) -> Self {
        self.plugin_config = Some(plugin_config.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file() {
        let config = Config::parse("jobs = 4\ncompression_type = \"zstd\"\n").unwrap();
        assert_eq!(
            config,
            Config {
                jobs: Some(4),
                compression_type: Some("zstd".into()),
                ..Config::new()
            }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("threads = 4\n").is_err());
    }
}
