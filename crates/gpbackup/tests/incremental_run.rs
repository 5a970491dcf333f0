mod support;

use gpbackup::{BackupContext, BackupOptions, Outcome};
use gpbackup_core::{
    history::History,
    manifest::{BackupConfig, RestorePlanEntry},
    toc::Toc,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::*;

const FULL: &str = "20240101000000";
const INCREMENTAL: &str = "20240102000000";

async fn run_at(fixture: &Fixture, timestamp: &str, options: BackupOptions) -> Outcome {
    BackupContext::builder()
        .options(options)
        .executor(fixture.executor.clone())
        .timestamp(timestamp)
        .tmp_dir(fixture.tmp_dir())
        .build(Arc::new(fixture.driver.clone()))
        .unwrap()
        .run(std::future::pending())
        .await
}

fn options(fixture: &Fixture, incremental: bool) -> BackupOptions {
    BackupOptions {
        dbname: "sales".into(),
        backup_dir: Some(fixture.backup_dir()),
        leaf_partition_data: true,
        incremental,
        ..BackupOptions::default()
    }
}

fn fixture() -> Fixture {
    Fixture::new(State {
        tables: vec![make_table(16400, "orders"), make_table(16410, "events")],
        ao_mod_counts: IndexMap::from([("public.events".to_string(), 3)]),
        ..State::default()
    })
}

#[tokio::test]
async fn unchanged_ao_tables_are_not_copied_again() {
    let fixture = fixture();

    let outcome = run_at(&fixture, FULL, options(&fixture, false)).await;
    assert!(outcome.is_success(), "{outcome}");
    let full_toc = Toc::read(&fixture.artifact(FULL, "toc.yaml")).unwrap();
    assert_eq!(full_toc.incrementalmetadata.ao["public.events"].modcount, 3);
    let copies_before = fixture.state().copies().len();
    assert_eq!(copies_before, 2);

    let outcome = run_at(&fixture, INCREMENTAL, options(&fixture, true)).await;
    assert!(outcome.is_success(), "{outcome}");

    let copies = fixture.state().copies();
    let incremental_copies = &copies[copies_before..];
    assert_eq!(incremental_copies.len(), 1);
    assert!(incremental_copies[0].starts_with("COPY public.orders "));

    let config = BackupConfig::read(&fixture.artifact(INCREMENTAL, "config.yaml")).unwrap();
    assert_eq!(
        config.restoreplan,
        vec![
            RestorePlanEntry {
                timestamp: FULL.into(),
                tablefqns: vec!["public.events".into()],
            },
            RestorePlanEntry {
                timestamp: INCREMENTAL.into(),
                tablefqns: vec!["public.orders".into()],
            },
        ]
    );

    let toc = Toc::read(&fixture.artifact(INCREMENTAL, "toc.yaml")).unwrap();
    let oids: Vec<u32> = toc.dataentries.iter().map(|entry| entry.oid).collect();
    assert_eq!(oids, vec![16400]);

    let history = History::load(&fixture.history_file()).unwrap();
    let timestamps: Vec<&str> = history
        .backupconfigs
        .iter()
        .map(|config| config.timestamp.as_str())
        .collect();
    assert_eq!(timestamps, vec![INCREMENTAL, FULL]);
}

#[tokio::test]
async fn incremental_without_a_base_backup_fails() {
    let fixture = fixture();

    let outcome = run_at(&fixture, INCREMENTAL, options(&fixture, true)).await;
    assert_eq!(outcome.exit_code(), 2);
    let message = outcome.error().unwrap().to_string();
    assert!(message.contains("no matching previous backup"), "{message}");
    assert!(fixture.state().copies().is_empty());
}

#[tokio::test]
async fn from_timestamp_names_the_base_backup() {
    let fixture = fixture();
    run_at(&fixture, FULL, options(&fixture, false)).await;

    let outcome = run_at(
        &fixture,
        INCREMENTAL,
        BackupOptions {
            from_timestamp: Some("20231231000000".into()),
            ..options(&fixture, true)
        },
    )
    .await;
    let message = outcome.error().unwrap().to_string();
    assert!(message.contains("20231231000000"), "{message}");
}
