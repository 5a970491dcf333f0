mod args;
mod config;
mod helper;
mod logging;

pub use args::BackupArgs;
pub use config::Config;
pub use helper::{run_helper, HelperArgs, Mode};
pub use logging::init_logging;

use anyhow::Result;
use gpbackup::{BackupContext, Outcome};
use gpbackup_cluster::helper::termination_signal;
use gpbackup_driver_postgresql::Connect;
use std::sync::Arc;

/// Validates the flags, connects and runs one backup to completion.
///
/// Errors are returned only for problems found before the backup starts;
/// everything after that is reported through the [`Outcome`].
pub async fn run_backup(args: BackupArgs) -> Result<Outcome> {
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let config = args.load_config()?;
    let mut options = args.into_options(&config)?;

    let driver = Connect::new(&options.dbname)?;
    options.dbname = driver.dbname().to_string();

    let context = BackupContext::builder()
        .options(options)
        .command_line(command_line)
        .build(Arc::new(driver))?;
    tracing::info!(timestamp = context.timestamp(), "backup key");

    Ok(context.run(shutdown_signal()).await)
}

/// Resolves on SIGTERM or SIGINT. If the handlers cannot be installed the
/// run is never interrupted.
pub(crate) async fn shutdown_signal() {
    if let Err(err) = termination_signal().await {
        tracing::warn!(%err, "could not listen for termination signals");
        std::future::pending::<()>().await;
    }
}
