mod actuator;
mod cli;
mod clock;
mod controller;
mod error;
mod fetch;
#[cfg(feature = "gpio")]
mod gpio;
mod host;
mod metrics;
mod resolver;
mod shutdown;

use std::process::ExitCode;

use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    match host::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "alarm clock failed");
            ExitCode::FAILURE
        }
    }
}
