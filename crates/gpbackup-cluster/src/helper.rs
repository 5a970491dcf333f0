//! The per-segment helper used by single-data-file backups.
//!
//! Every table of a segment is appended to one shared data file. Each COPY
//! pipes the table's rows through the helper, which prefixes them with a
//! [`FrameHeader`] and records the byte range in the segment TOC. A
//! long-lived agent holds the named pipe whose presence tells each COPY
//! that the backup is still alive.

use crate::{compress::Encoder, shell};
use gpbackup_core::{
    bail,
    options::Compression,
    toc::{SegmentDataEntry, SegmentToc},
    Error, Result,
};
use std::{
    future::Future,
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use tokio::process::Command;

/// Name of the helper executable on every host.
pub const HELPER_BINARY: &str = "gpbackup_helper";

/// Size of the header written in front of every table.
pub const HEADER_LEN: u64 = 16;

/// Frame header, little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub oid: u32,
    pub reserved: u32,
    /// Length of the CSV payload before compression.
    pub len: u64,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut bytes = [0u8; HEADER_LEN as usize];
        bytes[0..4].copy_from_slice(&self.oid.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.len.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; HEADER_LEN as usize]) -> FrameHeader {
        let mut oid = [0u8; 4];
        let mut reserved = [0u8; 4];
        let mut len = [0u8; 8];
        oid.copy_from_slice(&bytes[0..4]);
        reserved.copy_from_slice(&bytes[4..8]);
        len.copy_from_slice(&bytes[8..16]);
        FrameHeader {
            oid: u32::from_le_bytes(oid),
            reserved: u32::from_le_bytes(reserved),
            len: u64::from_le_bytes(len),
        }
    }
}

/// Byte counts of one framed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framed {
    /// Bytes read from the COPY.
    pub raw: u64,
    /// Bytes appended to the data file, header included.
    pub written: u64,
}

/// Writes one frame for `oid`: the header, then everything read from
/// `input` passed through `compression`.
///
/// The payload is spooled to an anonymous temporary file first because the
/// header carries its uncompressed length.
pub fn write_frame(
    oid: u32,
    mut input: impl Read,
    mut output: impl Write,
    compression: Option<Compression>,
) -> Result<Framed> {
    let mut spool = tempfile::tempfile()?;
    let mut encoder = Encoder::new(&mut spool, compression)?;
    let raw = io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    spool.seek(SeekFrom::Start(0))?;

    let header = FrameHeader {
        oid,
        reserved: 0,
        len: raw,
    };
    output.write_all(&header.encode())?;
    let payload = io::copy(&mut spool, &mut output)?;
    output.flush()?;

    Ok(Framed {
        raw,
        written: HEADER_LEN + payload,
    })
}

/// Splits the frame stored at `entry` out of a segment data file.
pub fn read_frame(file: &[u8], entry: SegmentDataEntry) -> Result<(FrameHeader, &[u8])> {
    let (start, end) = (entry.startbyte as usize, entry.endbyte as usize);
    if end > file.len() || end < start + HEADER_LEN as usize {
        bail!(
            "data entry {start}..{end} does not fit a {} byte data file",
            file.len()
        );
    }
    let mut header = [0u8; HEADER_LEN as usize];
    header.copy_from_slice(&file[start..start + HEADER_LEN as usize]);
    Ok((FrameHeader::decode(&header), &file[start + HEADER_LEN as usize..end]))
}

/// Arguments of one helper invocation for a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableArgs {
    pub oid: u32,
    pub toc_file: PathBuf,
    pub content: i32,
    pub compression: Option<Compression>,
}

/// Frames one table from `input` to `output` and appends its range to the
/// segment TOC.
pub fn backup_table(args: &TableArgs, input: impl Read, output: impl Write) -> Result<SegmentDataEntry> {
    let framed = write_frame(args.oid, input, output, args.compression)?;

    let mut toc = SegmentToc::read_or_default(&args.toc_file)?;
    let entry = toc.append(args.oid, framed.written);
    toc.write(&args.toc_file)?;

    tracing::debug!(
        content = args.content,
        oid = args.oid,
        raw = framed.raw,
        written = framed.written,
        "table framed"
    );
    Ok(entry)
}

/// Holds a segment's named pipe for the lifetime of a backup.
#[derive(Debug, Clone)]
pub struct Agent {
    pub pipe: PathBuf,
    pub pid_file: Option<PathBuf>,
}

impl Agent {
    /// Creates the pipe, waits for `shutdown`, then removes the pipe and the
    /// pid file.
    pub async fn hold(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        create_pipe(&self.pipe).await?;
        if let Some(pid_file) = &self.pid_file {
            tokio::fs::write(pid_file, std::process::id().to_string())
                .await
                .map_err(|err| Error::artifact_io(pid_file, err))?;
        }
        tracing::info!(pipe = %self.pipe.display(), "holding pipe");

        shutdown.await;

        self.release().await;
        Ok(())
    }

    async fn release(&self) {
        for path in std::iter::once(&self.pipe).chain(self.pid_file.as_ref()) {
            if let Err(err) = tokio::fs::remove_file(path).await {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %err, "could not remove helper file");
                }
            }
        }
    }
}

async fn create_pipe(path: &Path) -> Result<()> {
    let output = Command::new("mkfifo")
        .arg("-m")
        .arg("0600")
        .arg(path)
        .output()
        .await?;
    if !output.status.success() {
        bail!(
            "could not create pipe {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Resolves once the process receives SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn termination_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = term.recv() => tracing::debug!("received SIGTERM"),
        _ = int.recv() => tracing::debug!("received SIGINT"),
    }
    Ok(())
}

// ---- Coordinator side commands ----

/// Starts a detached agent holding `pipe`.
pub fn start_agent_command(pipe: &str, pid_file: &Path) -> String {
    format!(
        "nohup {HELPER_BINARY} --agent --pipe {} --pid-file {} > /dev/null 2>&1 &",
        shell::quote(pipe),
        shell::quote(&pid_file.to_string_lossy())
    )
}

/// Signals the agent recorded in `pid_file`; succeeds when no agent runs.
pub fn stop_agent_command(pid_file: &Path, signal: &str) -> String {
    let pid_file = shell::quote(&pid_file.to_string_lossy());
    format!("if [ -f {pid_file} ]; then kill -{signal} $(cat {pid_file}) 2>/dev/null || true; fi")
}

/// Succeeds once the agent has removed its pid file.
pub fn agent_exited_command(pid_file: &Path) -> String {
    format!("test ! -e {}", shell::quote(&pid_file.to_string_lossy()))
}

/// The program each segment runs for a single-file COPY.
///
/// All paths may be templates containing the segment placeholders, which
/// the database expands per segment.
pub fn copy_program(
    pipe: &str,
    oid: u32,
    toc_file: &str,
    data_file: &str,
    content: &str,
    compression: Option<Compression>,
) -> String {
    let mut helper = format!("{HELPER_BINARY} --oid={oid} --toc-file={toc_file} --content={content}");
    if let Some(compression) = compression {
        helper.push_str(&format!(
            " --compression-type={} --compression-level={}",
            compression.ty, compression.level
        ));
    }
    format!(
        "( [[ -p {pipe} ]] || (echo \"Pipe not found\" >&2 ; exit 1) ) && {helper} >> {data_file}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::options::CompressionType;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_layout_is_little_endian() {
        let header = FrameHeader {
            oid: 0x0102_0304,
            reserved: 0,
            len: 9,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(&bytes[8..16], &[9, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(FrameHeader::decode(&bytes), header);
    }

    #[test]
    fn empty_table_writes_only_header() {
        let mut out = vec![];
        let framed = write_frame(7, io::empty(), &mut out, None).unwrap();
        assert_eq!(framed, Framed { raw: 0, written: HEADER_LEN });
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn compressed_payload_keeps_raw_length() {
        let mut out = vec![];
        let rows = "1,a\n".repeat(100);
        let gzip = Compression::new(CompressionType::Gzip, 1).unwrap();
        let framed = write_frame(3, rows.as_bytes(), &mut out, Some(gzip)).unwrap();
        assert_eq!(framed.raw, 400);
        assert_eq!(framed.written, out.len() as u64);

        let (header, payload) = read_frame(
            &out,
            SegmentDataEntry {
                startbyte: 0,
                endbyte: out.len() as u64,
            },
        )
        .unwrap();
        assert_eq!(header.len, 400);
        let mut text = String::new();
        flate2::read::GzDecoder::new(payload).read_to_string(&mut text).unwrap();
        assert_eq!(text, rows);
    }

    #[test]
    fn copy_program_checks_pipe() {
        let program = copy_program(
            "<SEG_DATA_DIR>/gpbackup_<SEGID>_20240101010101_pipe_42",
            16384,
            "/bk/gpbackup_<SEGID>_20240101010101_toc.yaml",
            "/bk/gpbackup_<SEGID>_20240101010101.gz",
            "<SEGID>",
            Some(Compression::new(CompressionType::Gzip, 1).unwrap()),
        );
        assert_eq!(
            program,
            "( [[ -p <SEG_DATA_DIR>/gpbackup_<SEGID>_20240101010101_pipe_42 ]] || (echo \"Pipe not found\" >&2 ; exit 1) ) \
             && gpbackup_helper --oid=16384 --toc-file=/bk/gpbackup_<SEGID>_20240101010101_toc.yaml --content=<SEGID> \
             --compression-type=gzip --compression-level=1 >> /bk/gpbackup_<SEGID>_20240101010101.gz"
        );
    }

    #[test]
    fn stop_command_tolerates_missing_agent() {
        let cmd = stop_agent_command(Path::new("/data/gpseg0/gpbackup_0_ts_pid_1"), "TERM");
        assert_eq!(
            cmd,
            "if [ -f /data/gpseg0/gpbackup_0_ts_pid_1 ]; then kill -TERM $(cat /data/gpseg0/gpbackup_0_ts_pid_1) 2>/dev/null || true; fi"
        );
    }

    #[tokio::test]
    async fn agent_removes_pipe_on_shutdown() {
        use std::os::unix::fs::FileTypeExt;

        let dir = tempfile::tempdir().unwrap();
        let agent = Agent {
            pipe: dir.path().join("pipe"),
            pid_file: Some(dir.path().join("pid")),
        };
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let held = {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .hold(async {
                        let _ = rx.await;
                    })
                    .await
            })
        };

        for _ in 0..100 {
            if agent.pid_file.as_ref().unwrap().exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let meta = std::fs::metadata(&agent.pipe).unwrap();
        assert!(meta.file_type().is_fifo());

        tx.send(()).unwrap();
        held.await.unwrap().unwrap();
        assert!(!agent.pipe.exists());
        assert!(!dir.path().join("pid").exists());
    }
}
