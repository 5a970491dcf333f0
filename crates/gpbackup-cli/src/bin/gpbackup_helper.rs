use clap::Parser;
use gpbackup_cli::{init_logging, run_helper, HelperArgs};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = HelperArgs::parse();
    init_logging(args.verbose, !args.verbose);

    match run_helper(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gpbackup_helper: {err:#}");
            ExitCode::FAILURE
        }
    }
}
