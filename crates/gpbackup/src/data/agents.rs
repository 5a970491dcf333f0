use gpbackup_cluster::{helper, Cluster, Reach};
use gpbackup_core::{filepath::FilePathInfo, Result};
use std::time::Duration;

/// How long stopped agents get to remove their pipes before being killed.
pub(crate) const STOP_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The helper agents holding each segment's pipe in single-data-file mode.
#[derive(Debug, Clone)]
pub(crate) struct Agents {
    pub stop_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Agents {
    fn default() -> Agents {
        Agents {
            stop_timeout: STOP_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl Agents {
    pub async fn start(&self, cluster: &Cluster, paths: &FilePathInfo) -> Result<()> {
        let commands = cluster.per_content(Reach::SegmentsOnly, |seg| {
            helper::start_agent_command(
                &paths.segment_pipe_path(seg.content_id),
                &paths.segment_helper_file_path(seg.content_id, "pid"),
            )
        });
        cluster
            .execute_on_all(commands)
            .await
            .check("start the backup helper")?;
        tracing::debug!(segments = cluster.num_segments(), "helper agents started");
        Ok(())
    }

    /// Sends SIGTERM, waits for every agent to exit, then sends SIGKILL to
    /// whatever is left.
    pub async fn stop(&self, cluster: &Cluster, paths: &FilePathInfo) {
        self.signal(cluster, paths, "TERM").await;

        let deadline = tokio::time::Instant::now() + self.stop_timeout;
        loop {
            let exited = cluster
                .execute_on_all(cluster.per_content(Reach::SegmentsOnly, |seg| {
                    helper::agent_exited_command(&paths.segment_helper_file_path(seg.content_id, "pid"))
                }))
                .await;
            if exited.num_errors() == 0 {
                tracing::debug!("helper agents stopped");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining = exited.num_errors(),
                    "helper agents did not exit in time; killing them"
                );
                self.signal(cluster, paths, "KILL").await;
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn signal(&self, cluster: &Cluster, paths: &FilePathInfo, signal: &str) {
        let output = cluster
            .execute_on_all(cluster.per_content(Reach::SegmentsOnly, |seg| {
                helper::stop_agent_command(&paths.segment_helper_file_path(seg.content_id, "pid"), signal)
            }))
            .await;
        if let Err(err) = output.check("signal the backup helper") {
            tracing::warn!("{err}");
        }
    }
}
