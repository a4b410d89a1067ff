use champsync_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    match CliCommand::run_from_args().await {
        Ok(true) => {}
        // Command ran but some assets failed or stale fingerprints were found.
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("champsync error: {:#}", err);
            std::process::exit(1);
        }
    }
}
