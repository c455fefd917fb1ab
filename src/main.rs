use std::process::ExitCode;

mod config;
mod daemon;
mod engine;
mod error;
mod process;
mod service;
mod tuned;

use config::Config;

// Run with `RUST_LOG=tunedmode=debug tunedmode` for verbose output.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Cannot load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    match daemon::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("tunedmode failed: {err}");
            ExitCode::FAILURE
        }
    }
}
