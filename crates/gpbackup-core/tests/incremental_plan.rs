use gpbackup_core::history::History;
use gpbackup_core::incremental::{
    changed_tables, compose_restore_plan, find_predecessor, full_restore_plan, AoEntries, AoEntry,
};
use gpbackup_core::manifest::{BackupConfig, BackupStatus, RestorePlanEntry};
use std::collections::HashSet;

fn ao(modcount: i64, ts: &str) -> AoEntry {
    AoEntry {
        modcount,
        lastddltimestamp: ts.to_string(),
    }
}

fn entries(list: &[(&str, AoEntry)]) -> AoEntries {
    list.iter()
        .map(|(fqn, entry)| (fqn.to_string(), entry.clone()))
        .collect()
}

fn make_config(timestamp: &str, status: BackupStatus) -> BackupConfig {
    BackupConfig {
        timestamp: timestamp.to_string(),
        databasename: "sales".to_string(),
        leafpartitiondata: true,
        status,
        ..BackupConfig::default()
    }
}

// ---- changed set

#[test]
fn unchanged_ao_table_keeps_its_entry() {
    let all = vec!["public.ao".to_string()];
    let previous = entries(&[("public.ao", ao(0, "00000"))]);
    let current = entries(&[("public.ao", ao(0, "00000"))]);

    let changed = changed_tables(&all, &current, &previous);
    assert!(changed.is_empty());

    let prior_plan = full_restore_plan("20240101000000", &all);
    let plan = compose_restore_plan(&prior_plan, "20240102000000", &changed, &all);
    assert_eq!(
        plan,
        [
            RestorePlanEntry {
                timestamp: "20240101000000".into(),
                tablefqns: vec!["public.ao".into()],
            },
            RestorePlanEntry {
                timestamp: "20240102000000".into(),
                tablefqns: vec![],
            },
        ]
    );
}

#[test]
fn changed_modcount_moves_table_to_new_entry() {
    let all = vec!["public.ao".to_string()];
    let previous = entries(&[("public.ao", ao(0, "00000"))]);
    let current = entries(&[("public.ao", ao(2, "00000"))]);

    let changed = changed_tables(&all, &current, &previous);
    assert_eq!(changed, ["public.ao"]);

    let prior_plan = full_restore_plan("20240101000000", &all);
    let plan = compose_restore_plan(&prior_plan, "20240102000000", &changed, &all);
    assert!(plan[0].tablefqns.is_empty());
    assert_eq!(plan[1].tablefqns, ["public.ao"]);
}

#[test]
fn ddl_change_counts_as_change() {
    let all = vec!["public.ao".to_string()];
    let previous = entries(&[("public.ao", ao(3, "20240101"))]);
    let current = entries(&[("public.ao", ao(3, "20240105"))]);
    assert_eq!(changed_tables(&all, &current, &previous), ["public.ao"]);
}

#[test]
fn every_table_lands_in_exactly_one_entry() {
    let all: Vec<String> = ["public.heap", "public.ao1", "public.ao2", "public.new_ao"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let previous = entries(&[("public.ao1", ao(1, "1")), ("public.ao2", ao(1, "1"))]);
    let current = entries(&[
        ("public.ao1", ao(1, "1")),
        ("public.ao2", ao(5, "1")),
        ("public.new_ao", ao(0, "1")),
    ]);

    let prior_plan = vec![
        RestorePlanEntry {
            timestamp: "1".into(),
            tablefqns: vec!["public.ao1".into(), "public.dropped".into()],
        },
        RestorePlanEntry {
            timestamp: "2".into(),
            tablefqns: vec!["public.heap".into(), "public.ao2".into()],
        },
    ];

    let changed = changed_tables(&all, &current, &previous);
    let plan = compose_restore_plan(&prior_plan, "3", &changed, &all);

    let mut seen = HashSet::new();
    for entry in &plan {
        for fqn in &entry.tablefqns {
            assert!(seen.insert(fqn.clone()), "{fqn} listed twice");
        }
    }
    let expected: HashSet<String> = all.iter().cloned().collect();
    assert_eq!(seen, expected);
    assert_eq!(plan[2].tablefqns, ["public.heap", "public.ao2", "public.new_ao"]);
}

// ---- predecessor

#[test]
fn predecessor_is_latest_matching_success() {
    let mut history = History::default();
    history.add(make_config("20240101000000", BackupStatus::Succeeded));
    history.add(make_config("20240102000000", BackupStatus::Failed));
    let mut other_db = make_config("20240103000000", BackupStatus::Succeeded);
    other_db.databasename = "other".into();
    history.add(other_db);

    let current = make_config("20240104000000", BackupStatus::InProgress);
    let found = find_predecessor(&history, &current, None).unwrap();
    assert_eq!(found.timestamp, "20240101000000");
}

#[test]
fn no_predecessor_is_an_error() {
    let history = History::default();
    let current = make_config("20240104000000", BackupStatus::InProgress);
    let err = find_predecessor(&history, &current, None).unwrap_err();
    assert!(err.is_incremental_no_match());

    let err = find_predecessor(&history, &current, Some("20240101000000")).unwrap_err();
    assert!(err.is_incremental_no_match());
}
