use std::process::ExitCode;

use clap::Parser;
use follow_approver::adapter::cli::{self, Cli};
use follow_approver::infrastructure::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup(cli.verbose, cli.log_file);

    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
