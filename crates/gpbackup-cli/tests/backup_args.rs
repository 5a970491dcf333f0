use clap::Parser;
use gpbackup_cli::{BackupArgs, Config};
use gpbackup_core::options::{Compression, CompressionType};
use pretty_assertions::assert_eq;

fn parse(args: &[&str]) -> clap::error::Result<BackupArgs> {
    BackupArgs::try_parse_from(std::iter::once("gpbackup").chain(args.iter().copied()))
}

// ---- Flag groups ----

#[test]
fn section_flags_exclude_each_other() {
    for pair in [
        ["--metadata-only", "--data-only"],
        ["--metadata-only", "--incremental"],
        ["--data-only", "--incremental"],
    ] {
        assert!(parse(&pair).is_err(), "{pair:?} accepted");
    }
}

#[test]
fn conflicting_groups_are_rejected_by_the_parser() {
    assert!(parse(&["--include-schema", "a", "--exclude-schema", "b"]).is_err());
    assert!(parse(&["--jobs", "4", "--single-data-file"]).is_err());
    assert!(parse(&["--no-compression", "--compression-level", "3"]).is_err());
    assert!(parse(&["--backup-dir", "/backups", "--plugin-config", "/etc/plugin.yaml"]).is_err());
    assert!(parse(&["--from-timestamp", "20240101000000"]).is_err());
    assert!(parse(&["--compression-type", "lz4"]).is_err());
}

#[test]
fn cross_flag_rules_are_checked_after_parsing() {
    let err = parse(&["--incremental"])
        .unwrap()
        .into_options(&Config::default())
        .unwrap_err();
    assert!(err.to_string().contains("--leaf-partition-data"), "{err}");

    let err = parse(&["--backup-dir", "relative/dir"])
        .unwrap()
        .into_options(&Config::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "relative/dir is not an absolute path.");

    let err = parse(&["--compression-type", "gzip", "--compression-level", "12"])
        .unwrap()
        .into_options(&Config::default())
        .unwrap_err();
    assert!(err.to_string().contains("between 1 and 9"), "{err}");
}

// ---- Filter files ----

#[test]
fn filter_files_extend_the_flags() {
    let dir = tempfile::tempdir().unwrap();
    let tables = dir.path().join("tables.txt");
    std::fs::write(&tables, "public.orders\n\n\"Sales\".\"Q1\"\n").unwrap();

    let options = parse(&[
        "--include-table",
        "public.customers",
        "--include-table-file",
        tables.to_str().unwrap(),
    ])
    .unwrap()
    .into_options(&Config::default())
    .unwrap();

    assert_eq!(
        options.filters.include_relations,
        ["public.customers", "public.orders", "\"Sales\".\"Q1\""]
    );
}

#[test]
fn missing_filter_file_names_the_path() {
    let err = parse(&["--exclude-schema-file", "/nonexistent/schemas"])
        .unwrap()
        .into_options(&Config::default())
        .unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/schemas"), "{err:#}");
}

// ---- Config file ----

#[test]
fn config_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpbackup.toml");
    std::fs::write(
        &path,
        "backup_dir = \"/backups\"\njobs = 8\ncompression_type = \"zstd\"\ncompression_level = 5\n",
    )
    .unwrap();

    let args = parse(&["--dbname", "sales", "--config", path.to_str().unwrap()]).unwrap();
    let config = args.load_config().unwrap();
    let options = args.into_options(&config).unwrap();

    assert_eq!(options.backup_dir.as_deref(), Some("/backups"));
    assert_eq!(options.jobs, 8);
    assert_eq!(
        options.compression,
        Some(Compression::new(CompressionType::Zstd, 5).unwrap())
    );
}

#[test]
fn flags_win_over_config() {
    let config = Config::new()
        .backup_dir("/backups")
        .jobs(8)
        .compression("zstd", 5);

    let options = parse(&[
        "--jobs",
        "2",
        "--compression-level",
        "7",
        "--plugin-config",
        "/etc/gpbackup/s3.yaml",
    ])
    .unwrap()
    .into_options(&config)
    .unwrap();

    assert_eq!(options.jobs, 2);
    assert_eq!(options.backup_dir, None);
    assert_eq!(options.plugin_config.as_deref(), Some("/etc/gpbackup/s3.yaml"));
    assert_eq!(
        options.compression,
        Some(Compression::new(CompressionType::Zstd, 7).unwrap())
    );
}

#[test]
fn no_compression_ignores_configured_compression() {
    let config = Config::new().compression("zstd", 5);
    let options = parse(&["--no-compression"])
        .unwrap()
        .into_options(&config)
        .unwrap();
    assert_eq!(options.compression, None);
}
