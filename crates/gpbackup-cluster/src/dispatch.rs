use crate::shell;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use gpbackup_core::{driver::SegmentConfig, err, filepath::COORDINATOR, Error, Result};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
    time::Duration,
};
use tokio::process::Command;

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A child process of the coordinator.
    Local,
    /// A remote host reached through ssh.
    Ssh(String),
}

/// Result of one command on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Set when the command could not be run at all.
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == 0
    }

    fn failed_to_run(message: impl Into<String>) -> CommandOutput {
        CommandOutput {
            exit_code: -1,
            error: Some(message.into()),
            ..CommandOutput::default()
        }
    }

    fn describe(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None if self.stderr.trim().is_empty() => format!("exit status {}", self.exit_code),
            None => format!("exit status {}: {}", self.exit_code, self.stderr.trim()),
        }
    }
}

/// Runs shell command lines.
///
/// Implementations never fail: anything that goes wrong is reported in the
/// returned [`CommandOutput`].
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    async fn run(&self, target: &Target, command: &str) -> CommandOutput;
}

/// Spawns `bash -c` locally and `ssh` for remote hosts.
#[derive(Debug, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(&self, target: &Target, command: &str) -> CommandOutput {
        let mut child = match target {
            Target::Local => {
                let mut cmd = Command::new("bash");
                cmd.arg("-c").arg(command);
                cmd
            }
            Target::Ssh(host) => {
                let mut cmd = Command::new("ssh");
                cmd.args(shell::ssh_args(host, command));
                cmd
            }
        };
        child.kill_on_drop(true);

        match child.output().await {
            Ok(output) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
                error: None,
            },
            Err(err) => CommandOutput::failed_to_run(err.to_string()),
        }
    }
}

/// Which content ids a per-content command is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    WithCoordinator,
    SegmentsOnly,
}

/// Per-content results of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub results: BTreeMap<i32, CommandOutput>,
}

impl RemoteOutput {
    pub fn failures(&self) -> impl Iterator<Item = (i32, &CommandOutput)> {
        self.results
            .iter()
            .filter(|(_, output)| !output.succeeded())
            .map(|(content, output)| (*content, output))
    }

    pub fn num_errors(&self) -> usize {
        self.failures().count()
    }

    pub fn stdout(&self, content: i32) -> Option<&str> {
        self.results.get(&content).map(|output| output.stdout.as_str())
    }

    /// Turns any failure into a [`Error::segment_unreachable`] naming every
    /// failed content id.
    pub fn check(&self, action: &str) -> Result<()> {
        let failed: Vec<String> = self
            .failures()
            .map(|(content, output)| {
                tracing::warn!(content, error = %output.describe(), "{action} failed");
                format!("segment {content}: {}", output.describe())
            })
            .collect();
        if failed.is_empty() {
            return Ok(());
        }
        Err(Error::segment_unreachable(format!(
            "unable to {action} on {} segment(s): {}",
            failed.len(),
            failed.join("; ")
        )))
    }
}

/// The hosts of a database cluster and the means to run commands on them.
#[derive(Debug, Clone)]
pub struct Cluster {
    segments: Vec<SegmentConfig>,
    executor: Arc<dyn Executor>,
    timeout: Option<Duration>,
}

impl Cluster {
    /// `segments` includes the coordinator (content id -1).
    pub fn new(segments: Vec<SegmentConfig>) -> Cluster {
        Cluster {
            segments,
            executor: Arc::new(ProcessExecutor),
            timeout: None,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Cluster {
        self.executor = executor;
        self
    }

    /// Gives up on a command that has not finished after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Cluster {
        self.timeout = Some(timeout);
        self
    }

    pub fn segments(&self) -> &[SegmentConfig] {
        &self.segments
    }

    pub fn segment(&self, content: i32) -> Option<&SegmentConfig> {
        self.segments.iter().find(|seg| seg.content_id == content)
    }

    /// Primary segment count, the coordinator excluded.
    pub fn num_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|seg| seg.content_id != COORDINATOR)
            .count()
    }

    /// Data directory of every content id, keyed the way
    /// [`gpbackup_core::filepath::FilePathInfo`] expects.
    pub fn data_dirs(&self) -> HashMap<i32, String> {
        self.segments
            .iter()
            .map(|seg| (seg.content_id, seg.data_dir.clone()))
            .collect()
    }

    /// The coordinator runs commands as local processes, segments over ssh.
    pub fn target(&self, content: i32) -> Option<Target> {
        if content == COORDINATOR {
            return Some(Target::Local);
        }
        self.segment(content)
            .map(|seg| Target::Ssh(seg.hostname.clone()))
    }

    /// Builds one command per content id in `reach`.
    pub fn per_content(
        &self,
        reach: Reach,
        command: impl Fn(&SegmentConfig) -> String,
    ) -> BTreeMap<i32, String> {
        self.segments
            .iter()
            .filter(|seg| reach == Reach::WithCoordinator || seg.content_id != COORDINATOR)
            .map(|seg| (seg.content_id, command(seg)))
            .collect()
    }

    /// Runs every command to completion and reports each outcome. All
    /// hosts are contacted at once.
    ///
    /// Failures are not raised; see [`RemoteOutput::check`].
    pub async fn execute_on_all(&self, commands: BTreeMap<i32, String>) -> RemoteOutput {
        let tasks = commands.into_iter().map(|(content, command)| async move {
            let Some(target) = self.target(content) else {
                return (
                    content,
                    CommandOutput::failed_to_run(format!("unknown content id {content}")),
                );
            };
            tracing::debug!(content, %command, "dispatching");
            (content, self.run(&target, &command).await)
        });

        let fan_out = self.segments.len().max(1);
        let results = stream::iter(tasks)
            .buffer_unordered(fan_out)
            .collect::<BTreeMap<_, _>>()
            .await;
        RemoteOutput { results }
    }

    /// Runs `command` on the coordinator and returns its stdout.
    pub async fn execute_local(&self, command: &str) -> Result<String> {
        tracing::debug!(%command, "running locally");
        let output = self.run(&Target::Local, command).await;
        if output.succeeded() {
            Ok(output.stdout)
        } else {
            Err(err!("command `{command}` failed: {}", output.describe()))
        }
    }

    async fn run(&self, target: &Target, command: &str) -> CommandOutput {
        let run = self.executor.run(target, command);
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(output) => output,
                Err(_) => CommandOutput::failed_to_run(format!(
                    "timed out after {} seconds",
                    limit.as_secs()
                )),
            },
            None => run.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<(Target, String)>>,
    }

    #[async_trait]
    impl Executor for Recorder {
        async fn run(&self, target: &Target, command: &str) -> CommandOutput {
            self.calls
                .lock()
                .unwrap()
                .push((target.clone(), command.to_string()));
            if command.contains("fail") {
                return CommandOutput {
                    exit_code: 1,
                    stderr: "no such directory".into(),
                    ..CommandOutput::default()
                };
            }
            CommandOutput {
                stdout: command.to_string(),
                ..CommandOutput::default()
            }
        }
    }

    fn cluster(recorder: Arc<Recorder>) -> Cluster {
        let seg = |content_id, hostname: &str| SegmentConfig {
            content_id,
            hostname: hostname.into(),
            data_dir: format!("/data/gpseg{content_id}"),
        };
        Cluster::new(vec![seg(-1, "cdw"), seg(0, "sdw1"), seg(1, "sdw2")]).with_executor(recorder)
    }

    #[tokio::test]
    async fn coordinator_runs_locally() {
        let recorder = Arc::new(Recorder::default());
        let cluster = cluster(recorder.clone());
        let commands = cluster.per_content(Reach::WithCoordinator, |seg| format!("mkdir -p {}", seg.data_dir));
        let output = cluster.execute_on_all(commands).await;

        assert_eq!(output.num_errors(), 0);
        assert_eq!(output.stdout(1), Some("mkdir -p /data/gpseg1"));
        let mut calls = recorder.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(calls[0].0, Target::Local);
        assert_eq!(calls[1].0, Target::Ssh("sdw1".into()));
        assert_eq!(calls[2].0, Target::Ssh("sdw2".into()));
    }

    #[tokio::test]
    async fn failures_are_reported() {
        let recorder = Arc::new(Recorder::default());
        let cluster = cluster(recorder);
        let commands = cluster.per_content(Reach::SegmentsOnly, |seg| {
            if seg.content_id == 1 {
                "fail".to_string()
            } else {
                "true".to_string()
            }
        });
        assert_eq!(commands.len(), 2);

        let output = cluster.execute_on_all(commands).await;
        assert_eq!(output.num_errors(), 1);
        let err = output.check("create backup directories").unwrap_err();
        assert!(err.is_segment_unreachable());
        assert!(err.to_string().contains("segment 1: exit status 1: no such directory"));
    }

    /// Finishes only once every expected command has started.
    #[derive(Debug)]
    struct Rendezvous(tokio::sync::Barrier);

    #[async_trait]
    impl Executor for Rendezvous {
        async fn run(&self, _target: &Target, command: &str) -> CommandOutput {
            self.0.wait().await;
            CommandOutput {
                stdout: command.to_string(),
                ..CommandOutput::default()
            }
        }
    }

    #[tokio::test]
    async fn every_host_runs_concurrently() {
        let rendezvous = Arc::new(Rendezvous(tokio::sync::Barrier::new(3)));
        let cluster = cluster(Arc::new(Recorder::default())).with_executor(rendezvous);
        let commands = cluster.per_content(Reach::WithCoordinator, |seg| format!("ls {}", seg.data_dir));

        let output = tokio::time::timeout(Duration::from_secs(5), cluster.execute_on_all(commands))
            .await
            .expect("commands were run one at a time");
        assert_eq!(output.num_errors(), 0);
        assert_eq!(output.results.len(), 3);
    }

    #[tokio::test]
    async fn unknown_content_is_a_failure() {
        let cluster = cluster(Arc::new(Recorder::default()));
        let output = cluster
            .execute_on_all(BTreeMap::from([(7, "true".to_string())]))
            .await;
        assert_eq!(output.results[&7].error.as_deref(), Some("unknown content id 7"));
    }

    #[tokio::test]
    async fn local_processes() {
        let cluster = Cluster::new(vec![]);
        assert_eq!(cluster.execute_local("echo hello").await.unwrap(), "hello\n");
        assert!(cluster.execute_local("exit 3").await.is_err());
    }
}
