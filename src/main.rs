use log::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing output; RUST_LOG overrides the `info` default.
    // The default `tracing-log` feature also routes `log` records here.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Run the application
    if let Err(e) = contact_relay::run().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}
