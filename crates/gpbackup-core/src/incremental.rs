//! Incremental backup planning for append-optimized tables.

use crate::{
    history::History,
    manifest::{BackupConfig, RestorePlanEntry},
    Error, Result,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Change markers of one append-optimized table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoEntry {
    pub modcount: i64,
    pub lastddltimestamp: String,
}

/// AO change markers keyed by table FQN.
pub type AoEntries = IndexMap<String, AoEntry>;

/// Pairs each AO table's modification count with its last DDL time.
pub fn ao_entries(mod_counts: IndexMap<String, i64>, last_ddl: &HashMap<String, String>) -> AoEntries {
    mod_counts
        .into_iter()
        .map(|(fqn, modcount)| {
            let lastddltimestamp = last_ddl.get(&fqn).cloned().unwrap_or_default();
            (
                fqn,
                AoEntry {
                    modcount,
                    lastddltimestamp,
                },
            )
        })
        .collect()
}

/// Tables that must be copied in this backup, in the order of `all`.
///
/// Tables absent from `current` are heap tables and always change. An AO
/// table changes when the previous backup has no entry for it or a
/// different one.
pub fn changed_tables<'a>(all: &'a [String], current: &AoEntries, previous: &AoEntries) -> Vec<&'a str> {
    all.iter()
        .filter(|fqn| match current.get(fqn.as_str()) {
            None => true,
            Some(cur) => previous.get(fqn.as_str()) != Some(cur),
        })
        .map(String::as_str)
        .collect()
}

/// Finds the backup an incremental backup builds on.
///
/// With `from_timestamp` the named backup is used, otherwise the newest
/// successful, non-deleted backup with data whose filters match `current`.
pub fn find_predecessor<'a>(
    history: &'a History,
    current: &BackupConfig,
    from_timestamp: Option<&str>,
) -> Result<&'a BackupConfig> {
    let usable = |config: &&BackupConfig| {
        config.is_succeeded()
            && config.datedeleted.is_empty()
            && !config.metadataonly
            && config.matches_filters(current)
    };

    match from_timestamp {
        Some(timestamp) => {
            let config = history.find_backup_config(timestamp).ok_or_else(|| {
                Error::incremental_no_match(format!("backup {timestamp} is not in the history"))
            })?;
            if !usable(&config) {
                return Err(Error::incremental_no_match(format!(
                    "backup {timestamp} was taken with different options or did not succeed"
                )));
            }
            Ok(config)
        }
        None => history
            .backupconfigs
            .iter()
            .find(usable)
            .ok_or_else(|| {
                Error::incremental_no_match(
                    "there was no matching previous backup found with the flags provided",
                )
            }),
    }
}

/// Builds the restore plan of an incremental backup taken at `timestamp`.
///
/// Each table of `all` ends up in exactly one entry: changed tables in the
/// new final entry, unchanged tables where the previous plan put them.
/// Tables that no longer exist are dropped from the plan.
pub fn compose_restore_plan(
    previous_plan: &[RestorePlanEntry],
    timestamp: &str,
    changed: &[&str],
    all: &[String],
) -> Vec<RestorePlanEntry> {
    let existing: HashSet<&str> = all.iter().map(String::as_str).collect();
    let changed_set: HashSet<&str> = changed.iter().copied().collect();

    let mut plan: Vec<RestorePlanEntry> = previous_plan
        .iter()
        .filter(|entry| entry.timestamp != timestamp)
        .map(|entry| RestorePlanEntry {
            timestamp: entry.timestamp.clone(),
            tablefqns: entry
                .tablefqns
                .iter()
                .filter(|fqn| existing.contains(fqn.as_str()) && !changed_set.contains(fqn.as_str()))
                .cloned()
                .collect(),
        })
        .collect();

    plan.push(RestorePlanEntry {
        timestamp: timestamp.to_string(),
        tablefqns: changed.iter().map(|fqn| fqn.to_string()).collect(),
    });
    plan
}

/// Restore plan of a full backup: one entry holding every table.
pub fn full_restore_plan(timestamp: &str, all: &[String]) -> Vec<RestorePlanEntry> {
    vec![RestorePlanEntry {
        timestamp: timestamp.to_string(),
        tablefqns: all.to_vec(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_tables_always_change() {
        let all = vec!["public.heap".to_string()];
        let changed = changed_tables(&all, &AoEntries::new(), &AoEntries::new());
        assert_eq!(changed, ["public.heap"]);
    }

    #[test]
    fn new_ao_table_changes() {
        let all = vec!["public.ao".to_string()];
        let mut current = AoEntries::new();
        current.insert("public.ao".into(), AoEntry::default());
        assert_eq!(changed_tables(&all, &current, &AoEntries::new()), ["public.ao"]);
    }

    #[test]
    fn dropped_tables_leave_the_plan() {
        let previous = vec![RestorePlanEntry {
            timestamp: "1".into(),
            tablefqns: vec!["public.a".into(), "public.gone".into()],
        }];
        let all = vec!["public.a".to_string()];
        let plan = compose_restore_plan(&previous, "2", &[], &all);
        assert_eq!(plan[0].tablefqns, ["public.a"]);
        assert!(plan[1].tablefqns.is_empty());
    }
}
