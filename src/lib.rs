pub mod config;
pub mod mailer;
pub mod server;
pub mod widget;

use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run() -> Result<()> {
    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // A missing or malformed provider credential does not kill the process;
    // the endpoint answers every dispatch with its "not initialized"
    // failure until a restart fixes the configuration.
    let mailer: Option<Arc<dyn mailer::Mailer>> = match mailer::ResendMailer::new(&config) {
        Ok(mailer) => Some(Arc::new(mailer)),
        Err(e) => {
            warn!(
                "Email provider client failed to initialize, running degraded: {:#}",
                e
            );
            None
        }
    };

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(server::run_server(config, mailer, cancel.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping listener...");
            cancel.cancel();
            server.await??;
        }
        result = &mut server => {
            // The server only returns on its own for a bind/serve failure.
            result??;
        }
    }

    info!("Shutdown complete");

    Ok(())
}
