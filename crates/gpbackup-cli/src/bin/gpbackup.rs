use clap::Parser;
use console::style;
use gpbackup_cli::{init_logging, run_backup, BackupArgs};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = BackupArgs::parse();
    init_logging(args.verbose, args.quiet);

    match run_backup(args).await {
        Ok(outcome) => {
            let code = outcome.exit_code();
            let mark = match code {
                0 => style("✔").green().bold(),
                1 => style("!").yellow().bold(),
                _ => style("✖").red().bold(),
            };
            eprintln!("{mark} {outcome}");
            ExitCode::from(code as u8)
        }
        Err(err) => {
            eprintln!("{} {err:#}", style("✖").red().bold());
            ExitCode::from(2)
        }
    }
}
