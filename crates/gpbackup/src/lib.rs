pub mod context;
pub use context::BackupContext;

mod data;
pub use data::{copy_statement, lock_statements};

mod incremental;

mod metadata;

mod outcome;
pub use outcome::Outcome;

mod scope;

pub mod tables;

pub use gpbackup_cluster as cluster;
pub use gpbackup_core::{options::BackupOptions, Error, Result};
