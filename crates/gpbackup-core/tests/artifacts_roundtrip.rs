use gpbackup_core::incremental::AoEntry;
use gpbackup_core::manifest::{BackupConfig, BackupStatus, RestorePlanEntry};
use gpbackup_core::toc::{DataEntry, MetadataEntry, Section, SegmentToc, Toc};
use pretty_assertions::assert_eq;

fn make_manifest() -> BackupConfig {
    BackupConfig {
        backupdir: "/backups".into(),
        backupversion: "1.30.0".into(),
        compressed: true,
        compressiontype: "zstd".into(),
        compressionlevel: 3,
        databasename: "sales".into(),
        databaseversion: "6.20.3".into(),
        includeschemas: vec!["public".into()],
        includeschemafiltered: true,
        incremental: true,
        leafpartitiondata: true,
        restoreplan: vec![RestorePlanEntry {
            timestamp: "20240101000000".into(),
            tablefqns: vec!["public.orders".into()],
        }],
        timestamp: "20240102000000".into(),
        endtime: "20240102000107".into(),
        status: BackupStatus::Succeeded,
        ..BackupConfig::default()
    }
}

#[test]
fn manifest_survives_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpbackup_20240102000000_config.yaml");
    let manifest = make_manifest();

    manifest.write(&path).unwrap();
    let loaded = BackupConfig::read(&path).unwrap();
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.to_yaml().unwrap(), manifest.to_yaml().unwrap());
    assert!(std::fs::metadata(&path).unwrap().permissions().readonly());
}

#[test]
fn toc_survives_disk() {
    let mut toc = Toc::default();
    toc.add_metadata_entry(
        Section::Global,
        MetadataEntry::new("", "", "SESSION GUCS"),
        0,
        160,
    );
    toc.add_metadata_entry(
        Section::Predata,
        MetadataEntry::new("public", "orders", "TABLE"),
        160,
        240,
    );
    toc.add_data_entry(DataEntry {
        schema: "public".into(),
        name: "orders".into(),
        oid: 16384,
        attributestring: "(id,total)".into(),
        rowscopied: 3,
        ..DataEntry::default()
    });
    toc.incrementalmetadata.ao.insert(
        "public.orders".into(),
        AoEntry {
            modcount: 4,
            lastddltimestamp: "2024-01-01 00:00:00".into(),
        },
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpbackup_20240102000000_toc.yaml");
    toc.write(&path).unwrap();
    assert_eq!(Toc::read(&path).unwrap(), toc);
}

#[test]
fn segment_toc_survives_disk() {
    let mut toc = SegmentToc::default();
    toc.append(10, 24);
    toc.append(20, 31);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpbackup_0_20240102000000_toc.yaml");
    toc.write(&path).unwrap();

    let loaded = SegmentToc::read_or_default(&path).unwrap();
    assert_eq!(loaded, toc);
    assert_eq!(loaded.dataentries[&10].endbyte, loaded.dataentries[&20].startbyte);
}
