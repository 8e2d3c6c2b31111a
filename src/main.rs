// src/main.rs

use std::process::ExitCode;

use assetdag::{cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("assetdag: cannot set up logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match assetdag::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "assetdag failed");
            ExitCode::FAILURE
        }
    }
}
