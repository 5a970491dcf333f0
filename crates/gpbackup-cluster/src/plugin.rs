//! The storage plugin wire contract.
//!
//! A plugin is an executable invoked as `plugin <verb> <config-path> [args]`.
//! A non-zero exit fails the enclosing step.

use crate::{
    dispatch::{Cluster, Reach},
    shell,
};
use gpbackup_core::{driver::SegmentConfig, filepath::COORDINATOR, Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::Path, time::Duration};

/// Oldest plugin API this engine speaks.
pub const REQUIRED_API_VERSION: &str = "0.4.0";

/// Per-host limit for the version check.
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Contents of `--plugin-config`. Only the executable path is interpreted;
/// options are passed through to the plugin untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "executablepath")]
    pub executable_path: String,
    #[serde(default)]
    pub options: serde_yaml::Mapping,
}

impl PluginConfig {
    pub fn from_yaml(text: &str) -> Result<PluginConfig> {
        let config: PluginConfig = serde_yaml::from_str(text)?;
        if config.executable_path.is_empty() {
            return Err(Error::filter_validation(
                "plugin config must set executablepath",
            ));
        }
        Ok(config)
    }

    pub fn read(path: &Path) -> Result<PluginConfig> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::artifact_io(path, err))?;
        PluginConfig::from_yaml(&text).map_err(|err| {
            err.context(gpbackup_core::err!("reading plugin config {}", path.display()))
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    PluginApiVersion,
    SetupPluginForBackup,
    BackupFile,
    BackupData,
    CleanupPluginForBackup,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::PluginApiVersion => "plugin_api_version",
            Verb::SetupPluginForBackup => "setup_plugin_for_backup",
            Verb::BackupFile => "backup_file",
            Verb::BackupData => "backup_data",
            Verb::CleanupPluginForBackup => "cleanup_plugin_for_backup",
        }
    }
}

/// A configured plugin and where its config lives on every host.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub config: PluginConfig,
    pub config_path: String,
    pub check_timeout: Duration,
}

impl Plugin {
    pub fn new(config: PluginConfig, config_path: impl Into<String>) -> Plugin {
        Plugin {
            config,
            config_path: config_path.into(),
            check_timeout: VERSION_CHECK_TIMEOUT,
        }
    }

    /// The command line for `verb` with trailing `args`.
    pub fn command(&self, verb: Verb, args: &[&str]) -> String {
        let mut words = vec![self.config.executable_path.as_str(), verb.as_str()];
        if verb != Verb::PluginApiVersion {
            words.push(&self.config_path);
        }
        words.extend_from_slice(args);
        shell::join(words)
    }

    /// Pipeline stage streaming stdin to the remote store under `path`.
    ///
    /// `path` may be a segment template, so it is left unquoted for the
    /// database to expand.
    pub fn backup_data_stage(&self, path: &str) -> String {
        format!("{} {path}", self.command(Verb::BackupData, &[]))
    }

    /// Asks every host for the plugin API version and checks that all hosts
    /// agree and meet [`REQUIRED_API_VERSION`].
    pub async fn check_api_version(&self, cluster: &Cluster) -> Result<Version> {
        let command = self.command(Verb::PluginApiVersion, &[]);
        let checker = cluster.clone().with_timeout(self.check_timeout);
        let output = checker
            .execute_on_all(checker.per_content(Reach::WithCoordinator, |_| command.clone()))
            .await;
        output
            .check("query the plugin API version")
            .map_err(|err| Error::plugin_io(err.to_string()))?;

        let mut versions = BTreeSet::new();
        for (content, result) in &output.results {
            let text = result.stdout.trim();
            let version = Version::parse(text).map_err(|err| {
                Error::plugin_io(format!(
                    "segment {content} reported unparseable plugin version \"{text}\": {err}"
                ))
            })?;
            versions.insert(version);
        }

        let required = Version::parse(REQUIRED_API_VERSION)?;
        let Some(found) = versions.iter().next().cloned() else {
            return Ok(required);
        };
        if versions.len() > 1 {
            let list: Vec<String> = versions.iter().map(Version::to_string).collect();
            return Err(Error::plugin_io(format!(
                "plugin API versions differ across hosts: {}",
                list.join(", ")
            )));
        }
        if found < required {
            return Err(Error::plugin_incompatible(found.to_string(), REQUIRED_API_VERSION));
        }
        tracing::debug!(version = %found, "plugin API version");
        Ok(found)
    }

    /// Copies the plugin config to every segment host.
    pub async fn distribute_config(&self, cluster: &Cluster, local_path: &Path) -> Result<()> {
        let hosts: BTreeSet<&str> = cluster
            .segments()
            .iter()
            .filter(|seg| seg.content_id != COORDINATOR)
            .map(|seg| seg.hostname.as_str())
            .collect();
        for host in hosts {
            let command = shell::join([
                "scp".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                local_path.to_string_lossy().into_owned(),
                format!("{host}:{}", self.config_path),
            ]);
            cluster
                .execute_local(&command)
                .await
                .map_err(|err| Error::plugin_io(err.to_string()))?;
        }
        Ok(())
    }

    pub async fn setup(&self, cluster: &Cluster, dir_for: impl Fn(&SegmentConfig) -> String) -> Result<()> {
        self.on_all(cluster, Verb::SetupPluginForBackup, dir_for).await
    }

    pub async fn cleanup(&self, cluster: &Cluster, dir_for: impl Fn(&SegmentConfig) -> String) -> Result<()> {
        self.on_all(cluster, Verb::CleanupPluginForBackup, dir_for).await
    }

    /// Streams a finished coordinator file to the remote store.
    pub async fn backup_file(&self, cluster: &Cluster, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        let command = self.command(Verb::BackupFile, &[path.as_ref()]);
        cluster
            .execute_local(&command)
            .await
            .map(|_| ())
            .map_err(|err| Error::plugin_io(err.to_string()))
    }

    async fn on_all(
        &self,
        cluster: &Cluster,
        verb: Verb,
        dir_for: impl Fn(&SegmentConfig) -> String,
    ) -> Result<()> {
        let commands = cluster.per_content(Reach::WithCoordinator, |seg| {
            self.command(verb, &[dir_for(seg).as_str()])
        });
        cluster
            .execute_on_all(commands)
            .await
            .check(verb.as_str())
            .map_err(|err| Error::plugin_io(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{CommandOutput, Executor, Target};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Versions(Vec<&'static str>, Duration);

    #[async_trait]
    impl Executor for Versions {
        async fn run(&self, target: &Target, _command: &str) -> CommandOutput {
            tokio::time::sleep(self.1).await;
            let version = match target {
                Target::Local => self.0[0],
                Target::Ssh(host) if host == "sdw1" => self.0[1],
                Target::Ssh(_) => self.0[2],
            };
            CommandOutput {
                stdout: format!("{version}\n"),
                ..CommandOutput::default()
            }
        }
    }

    fn cluster(versions: Vec<&'static str>, delay: Duration) -> Cluster {
        let seg = |content_id, hostname: &str| SegmentConfig {
            content_id,
            hostname: hostname.into(),
            data_dir: format!("/data/gpseg{content_id}"),
        };
        Cluster::new(vec![seg(-1, "cdw"), seg(0, "sdw1"), seg(1, "sdw2")])
            .with_executor(Arc::new(Versions(versions, delay)))
    }

    fn plugin() -> Plugin {
        let config = PluginConfig::from_yaml("executablepath: /usr/local/bin/s3plugin\noptions:\n  bucket: backups\n").unwrap();
        Plugin::new(config, "/tmp/plugin_config.yaml")
    }

    #[test]
    fn config_parses() {
        let config = plugin().config;
        assert_eq!(config.executable_path, "/usr/local/bin/s3plugin");
        assert_eq!(config.options.len(), 1);
        assert!(PluginConfig::from_yaml("options: {}\n").is_err());
    }

    #[test]
    fn verb_commands() {
        let plugin = plugin();
        assert_eq!(
            plugin.command(Verb::PluginApiVersion, &[]),
            "/usr/local/bin/s3plugin plugin_api_version"
        );
        assert_eq!(
            plugin.command(Verb::BackupFile, &["/data/backups/20240101/20240101010101/gpbackup_20240101010101_toc.yaml"]),
            "/usr/local/bin/s3plugin backup_file /tmp/plugin_config.yaml /data/backups/20240101/20240101010101/gpbackup_20240101010101_toc.yaml"
        );
        assert_eq!(
            plugin.backup_data_stage("<SEG_DATA_DIR>/backups/x_<SEGID>"),
            "/usr/local/bin/s3plugin backup_data /tmp/plugin_config.yaml <SEG_DATA_DIR>/backups/x_<SEGID>"
        );
    }

    #[tokio::test]
    async fn matching_versions_pass() {
        let cluster = cluster(vec!["0.5.0", "0.5.0", "0.5.0"], Duration::ZERO);
        let version = plugin().check_api_version(&cluster).await.unwrap();
        assert_eq!(version, Version::new(0, 5, 0));
    }

    #[tokio::test]
    async fn old_version_is_incompatible() {
        let cluster = cluster(vec!["0.3.0", "0.3.0", "0.3.0"], Duration::ZERO);
        let err = plugin().check_api_version(&cluster).await.unwrap_err();
        assert!(err.is_plugin_incompatible());
    }

    #[tokio::test]
    async fn mixed_versions_fail() {
        let cluster = cluster(vec!["0.5.0", "0.5.0", "0.4.1"], Duration::ZERO);
        let err = plugin().check_api_version(&cluster).await.unwrap_err();
        assert!(err.is_plugin_io());
        assert!(err.to_string().contains("0.4.1, 0.5.0"));
    }

    #[tokio::test]
    async fn slow_hosts_time_out() {
        let cluster = cluster(vec!["0.5.0", "0.5.0", "0.5.0"], Duration::from_secs(5));
        let mut plugin = plugin();
        plugin.check_timeout = Duration::from_millis(20);
        let err = plugin.check_api_version(&cluster).await.unwrap_err();
        assert!(err.is_plugin_io());
        assert!(err.to_string().contains("timed out"));
    }
}
