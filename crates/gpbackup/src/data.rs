//! Copying table rows out of the cluster.
//!
//! Every COPY runs `ON SEGMENT`, so each segment writes its own slice and the
//! coordinator only waits. With more than one job the tables are shared
//! between several connections that all read the same snapshot.

mod agents;
pub(crate) use agents::Agents;

use gpbackup_cluster::{compress, helper, Plugin};
use gpbackup_core::{
    catalog::{escape_single_quotes, PartitionLevel, Table},
    filepath::{FilePathInfo, COORDINATOR, SEGID},
    options::Compression,
    version::DbVersion,
    Catalog, Error, Result,
};
use regex::Regex;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        LazyLock, Mutex,
    },
};

/// Tables named per `LOCK TABLE` statement.
pub const LOCK_BATCH_SIZE: usize = 100;

const SAVEPOINT: &str = "gpbackup_copy";

/// `LOCK TABLE` statements covering `tables`, in batches.
///
/// Only the coordinator's lock is taken; segments are protected by the
/// distributed snapshot.
pub fn lock_statements(tables: &[Table], version: &DbVersion) -> Vec<String> {
    let suffix = if version.at_least("7") {
        " COORDINATOR ONLY"
    } else if version.at_least("6.21.0") {
        " MASTER ONLY"
    } else {
        ""
    };
    tables
        .chunks(LOCK_BATCH_SIZE)
        .map(|batch| {
            let names: Vec<String> = batch.iter().map(Table::fqn).collect();
            format!(
                "LOCK TABLE {} IN ACCESS SHARE MODE{suffix}",
                names.join(", ")
            )
        })
        .collect()
}

/// The `COPY ... ON SEGMENT` statement sending `table` through `program`.
///
/// From 7 on a partitioned root can only be copied through a query, which
/// also gathers its leaves.
pub fn copy_statement(table: &Table, program: &str, version: &DbVersion) -> String {
    let gp7 = version.at_least("7");
    let source = if gp7 && table.partition_level == PartitionLevel::Root {
        format!("(SELECT * FROM {})", table.fqn())
    } else {
        table.fqn()
    };
    let ignore_external = if gp7 { "" } else { " IGNORE EXTERNAL PARTITIONS" };
    format!(
        "COPY {source} TO PROGRAM '{}' WITH CSV DELIMITER ',' ON SEGMENT{ignore_external};",
        escape_single_quotes(program)
    )
}

/// Program writing one table to its own file on every segment.
pub(crate) fn multi_file_program(
    paths: &FilePathInfo,
    oid: u32,
    compression: Option<Compression>,
    plugin: Option<&Plugin>,
) -> String {
    let compressor = compress::program(compression).unwrap_or_else(|| "cat -".to_string());
    let target = paths.table_backup_file_template(oid, compress::extension(compression), false);
    match plugin {
        Some(plugin) => format!("{compressor} | {}", plugin.backup_data_stage(&target)),
        None => format!("{compressor} > {target}"),
    }
}

/// Program framing one table into the shared file of every segment.
pub(crate) fn single_file_program(
    paths: &FilePathInfo,
    oid: u32,
    compression: Option<Compression>,
) -> String {
    let toc_file = format!(
        "{}/gpbackup_{SEGID}_{}_toc.yaml",
        segment_dir_template(paths),
        paths.timestamp
    );
    helper::copy_program(
        &paths.segment_pipe_template(),
        oid,
        &toc_file,
        &paths.table_backup_file_template(0, compress::extension(compression), true),
        SEGID,
        compression,
    )
}

fn segment_dir_template(paths: &FilePathInfo) -> String {
    let file = paths.table_backup_file_template(0, "", true);
    match file.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => file,
    }
}

/// Text every COPY of this backup carries in `pg_stat_activity`.
pub(crate) fn copy_sentinel(paths: &FilePathInfo) -> String {
    format!("gpbackup_{SEGID}_{}", paths.timestamp)
}

/// How the tables of one backup are copied.
#[derive(Debug)]
pub(crate) struct CopyPlan<'a> {
    pub paths: &'a FilePathInfo,
    pub version: &'a DbVersion,
    pub compression: Option<Compression>,
    pub plugin: Option<&'a Plugin>,
    pub single_data_file: bool,
}

impl CopyPlan<'_> {
    fn statement(&self, table: &Table) -> String {
        let oid = table.relation.oid;
        let program = if self.single_data_file {
            single_file_program(self.paths, oid, self.compression)
        } else {
            multi_file_program(self.paths, oid, self.compression, self.plugin)
        };
        copy_statement(table, &program, self.version)
    }
}

/// Outcome of one table's COPY.
#[derive(Debug)]
pub(crate) struct Copied {
    pub oid: u32,
    /// Rows copied, or the [`Error::copy_failed`] that stopped the table.
    pub result: Result<u64>,
}

/// Copies every table of `tables` using the given connections, one table
/// at a time per connection.
///
/// A failed COPY is rolled back to a savepoint and reported in its
/// [`Copied`]; the remaining tables are still attempted. Any other error,
/// including a failure in single-data-file mode, stops all workers: no
/// worker starts another table once one has failed that way.
pub(crate) async fn copy_tables(
    conns: &[&dyn Catalog],
    tables: &[Table],
    plan: &CopyPlan<'_>,
) -> Result<Vec<Copied>> {
    let queue = Queue {
        tables: Mutex::new(tables.iter().collect()),
        total: tables.len(),
        aborted: AtomicBool::new(false),
    };

    let workers = conns
        .iter()
        .enumerate()
        .map(|(job, conn)| drain(job, *conn, &queue, plan));
    let mut copied = vec![];
    for result in futures::future::join_all(workers).await {
        copied.extend(result?);
    }
    copied.sort_by_key(|copied| copied.oid);
    Ok(copied)
}

/// Tables not yet claimed by a worker.
struct Queue<'a> {
    tables: Mutex<VecDeque<&'a Table>>,
    total: usize,
    /// Set by the first worker that hits a fatal error.
    aborted: AtomicBool,
}

impl<'a> Queue<'a> {
    /// The next table and its 1-based position, or `None` once the queue is
    /// empty or aborted.
    fn next(&self) -> Option<(&'a Table, usize)> {
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tables
            .pop_front()
            .map(|table| (table, self.total - tables.len()))
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }
}

async fn drain(
    job: usize,
    conn: &dyn Catalog,
    queue: &Queue<'_>,
    plan: &CopyPlan<'_>,
) -> Result<Vec<Copied>> {
    let total = queue.total;
    let mut copied = vec![];
    while let Some((table, position)) = queue.next() {
        let fqn = table.fqn();
        tracing::info!(job, table = %fqn, "Writing data for table {fqn} ({position}/{total})");
        let result = copy_one(conn, table, plan).await;
        match &result {
            Ok(rows) => tracing::debug!(table = %fqn, rows, "table copied"),
            Err(err) if err.is_fatal() => {
                queue.abort();
                return Err(err.clone());
            }
            Err(err) => tracing::error!(table = %fqn, "{err}"),
        }
        copied.push(Copied {
            oid: table.relation.oid,
            result,
        });
    }
    Ok(copied)
}

async fn copy_one(conn: &dyn Catalog, table: &Table, plan: &CopyPlan<'_>) -> Result<u64> {
    let sql = plan.statement(table);
    conn.execute(&format!("SAVEPOINT {SAVEPOINT}")).await?;
    match conn.execute(&sql).await {
        Ok(rows) => {
            conn.execute(&format!("RELEASE SAVEPOINT {SAVEPOINT}")).await?;
            Ok(rows)
        }
        Err(err) if plan.single_data_file => {
            let message = err.to_string();
            Err(Error::helper_crashed(failing_segment(&message), message)
                .context(gpbackup_core::err!("copying {}", table.fqn())))
        }
        Err(err) => {
            conn.execute(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT}")).await?;
            Err(Error::copy_failed(table.fqn(), err.to_string()))
        }
    }
}

static SEGMENT_IN_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(seg(-?[0-9]+)[ )]").expect("valid regex"));

/// Content id named by a segment error such as `... (seg3 10.0.0.4:6001
/// pid=123)`, or the coordinator when none is named.
fn failing_segment(message: &str) -> i32 {
    SEGMENT_IN_ERROR
        .captures(message)
        .and_then(|captures| captures[1].parse().ok())
        .unwrap_or(COORDINATOR)
}

/// Joins extra connections to the snapshot of the main transaction.
pub(crate) async fn synchronize(conn: &dyn Catalog, snapshot: Option<&str>) -> Result<()> {
    conn.execute("BEGIN ISOLATION LEVEL SERIALIZABLE").await?;
    if let Some(snapshot) = snapshot {
        conn.execute(&format!(
            "SET TRANSACTION SNAPSHOT '{}'",
            escape_single_quotes(snapshot)
        ))
        .await?;
    }
    Ok(())
}
