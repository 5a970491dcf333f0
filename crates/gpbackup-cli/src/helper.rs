use crate::shutdown_signal;
use anyhow::{bail, Result};
use clap::Parser;
use gpbackup_cluster::helper::{backup_table, Agent, TableArgs};
use gpbackup_core::options::{Compression, CompressionType};
use std::{io::Write, path::PathBuf};

/// Flags of the `gpbackup_helper` command run on every segment host.
#[derive(Parser, Debug)]
#[command(name = "gpbackup_helper")]
#[command(about = "Segment-side helper for single data file backups")]
#[command(version)]
pub struct HelperArgs {
    /// Hold the named pipe until terminated
    #[arg(long, requires = "pipe", conflicts_with = "oid")]
    pub agent: bool,

    #[arg(long)]
    pub pipe: Option<PathBuf>,

    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Frame the rows of this table from stdin to stdout
    #[arg(long, required_unless_present = "agent", requires_all = ["toc_file", "content"])]
    pub oid: Option<u32>,

    #[arg(long)]
    pub toc_file: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true)]
    pub content: Option<i32>,

    #[arg(long, value_parser = ["gzip", "zstd"], requires = "compression_level")]
    pub compression_type: Option<String>,

    #[arg(long, requires = "compression_type")]
    pub compression_level: Option<i32>,

    #[arg(long, short)]
    pub verbose: bool,
}

/// What one helper invocation does.
#[derive(Debug)]
pub enum Mode {
    Agent(Agent),
    Table(TableArgs),
}

impl HelperArgs {
    pub fn mode(self) -> Result<Mode> {
        if self.agent {
            let Some(pipe) = self.pipe else {
                bail!("--agent requires --pipe");
            };
            return Ok(Mode::Agent(Agent {
                pipe,
                pid_file: self.pid_file,
            }));
        }

        let (Some(oid), Some(toc_file), Some(content)) = (self.oid, self.toc_file, self.content) else {
            bail!("--oid, --toc-file and --content are required outside agent mode");
        };
        let compression = match (self.compression_type, self.compression_level) {
            (Some(ty), Some(level)) => Some(Compression::new(ty.parse::<CompressionType>()?, level)?),
            _ => None,
        };
        Ok(Mode::Table(TableArgs {
            oid,
            toc_file,
            content,
            compression,
        }))
    }
}

pub async fn run_helper(args: HelperArgs) -> Result<()> {
    match args.mode()? {
        Mode::Agent(agent) => agent.hold(shutdown_signal()).await?,
        Mode::Table(table) => {
            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut stdout = std::io::stdout().lock();
                let entry = backup_table(&table, std::io::stdin().lock(), &mut stdout)?;
                stdout.flush()?;
                tracing::debug!(oid = table.oid, end = entry.endbyte, "table recorded");
                Ok(())
            })
            .await??;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> clap::error::Result<HelperArgs> {
        HelperArgs::try_parse_from(std::iter::once("gpbackup_helper").chain(args.iter().copied()))
    }

    #[test]
    fn agent_mode() {
        let args = parse(&["--agent", "--pipe", "/tmp/pipe_1", "--pid-file", "/tmp/pid_1"]).unwrap();
        let Mode::Agent(agent) = args.mode().unwrap() else {
            panic!("expected agent mode");
        };
        assert_eq!(agent.pipe, PathBuf::from("/tmp/pipe_1"));
        assert_eq!(agent.pid_file, Some(PathBuf::from("/tmp/pid_1")));
    }

    #[test]
    fn table_mode_on_the_coordinator_content() {
        let args = parse(&[
            "--oid=16400",
            "--toc-file=/data/gpseg0/toc.yaml",
            "--content=-1",
            "--compression-type=zstd",
            "--compression-level=3",
        ])
        .unwrap();
        let Mode::Table(table) = args.mode().unwrap() else {
            panic!("expected table mode");
        };
        assert_eq!(table.oid, 16400);
        assert_eq!(table.content, -1);
        assert_eq!(
            table.compression,
            Some(Compression::new(CompressionType::Zstd, 3).unwrap())
        );
    }

    #[test]
    fn table_mode_needs_its_toc() {
        assert!(parse(&["--oid=16400", "--content=0"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
