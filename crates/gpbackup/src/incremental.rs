use gpbackup_core::{
    driver::Scope,
    filepath::FilePathInfo,
    history::History,
    incremental::{self, AoEntries},
    manifest::{BackupConfig, RestorePlanEntry},
    toc::Toc,
    Catalog, Result,
};
use std::collections::HashSet;

/// What an incremental (or full) backup copies and how it is restored.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    /// Change markers recorded in the TOC for later incrementals.
    pub ao: AoEntries,
    pub restore_plan: Vec<RestorePlanEntry>,
    /// Tables whose rows are copied; `None` copies every data table.
    pub changed: Option<HashSet<String>>,
}

/// Plans the data of this backup.
///
/// `all` holds the FQNs of every data table in scope. A full backup copies
/// all of them; an incremental one copies heap tables and the
/// append-optimized tables that changed since its predecessor.
pub(crate) async fn plan(
    conn: &dyn Catalog,
    scope: &Scope,
    config: &BackupConfig,
    paths: &FilePathInfo,
    from_timestamp: Option<&str>,
    all: &[String],
) -> Result<Plan> {
    if !config.incremental && !config.leafpartitiondata {
        return Ok(Plan {
            restore_plan: incremental::full_restore_plan(&config.timestamp, all),
            ..Plan::default()
        });
    }

    let mod_counts = conn.ao_mod_counts(scope).await?;
    let last_ddl = conn.ao_last_ddl(scope).await?;
    let ao = incremental::ao_entries(mod_counts, &last_ddl);

    if !config.incremental {
        return Ok(Plan {
            ao,
            restore_plan: incremental::full_restore_plan(&config.timestamp, all),
            changed: None,
        });
    }

    let history = History::load(&paths.history_file_path())?;
    let previous = incremental::find_predecessor(&history, config, from_timestamp)?;
    tracing::info!(
        base = %previous.timestamp,
        "Basing incremental backup off of backup with timestamp = {}",
        previous.timestamp
    );

    let previous_toc = Toc::read(&predecessor_paths(paths, previous).toc_file_path())?;
    let changed = incremental::changed_tables(all, &ao, &previous_toc.incrementalmetadata.ao);
    tracing::debug!(changed = changed.len(), total = all.len(), "incremental change set");

    let restore_plan = incremental::compose_restore_plan(
        &previous.restoreplan,
        &config.timestamp,
        &changed,
        all,
    );
    let changed = changed.into_iter().map(str::to_string).collect();
    Ok(Plan {
        ao,
        restore_plan,
        changed: Some(changed),
    })
}

/// Paths of an earlier backup taken to the same place as this one.
fn predecessor_paths(paths: &FilePathInfo, previous: &BackupConfig) -> FilePathInfo {
    let backup_dir = Some(previous.backupdir.clone()).filter(|dir| !dir.is_empty());
    FilePathInfo::new(paths.seg_dirs.clone(), backup_dir, &previous.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn predecessor_uses_its_own_backup_dir() {
        let paths = FilePathInfo::new(
            HashMap::from([(-1, "/data/gpseg-1".to_string())]),
            None,
            "20240102000000",
        );
        let previous = BackupConfig {
            timestamp: "20240101000000".into(),
            backupdir: "/backups".into(),
            ..BackupConfig::default()
        };
        assert_eq!(
            predecessor_paths(&paths, &previous).toc_file_path(),
            std::path::PathBuf::from(
                "/backups/backups/20240101/20240101000000/gpbackup_20240101000000_toc.yaml"
            )
        );
    }
}
