use anyhow::Context;
use mining_node_server::shared::logging::{BroadcastLogLayer, LoggingUtils};
use mining_node_server::{AppConfig, HttpServer};
use tracing::{error, info};

fn main() {
    if let Err(e) = run() {
        // Logging may not be up yet.
        eprintln!("Fatal: {:#}", e);
        error!(error = %format!("{:#}", e), "Node web server failed");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    let (broadcast, log_entries) = if config.logging.broadcast {
        let (layer, entries) = BroadcastLogLayer::new();
        (Some(layer), Some(entries))
    } else {
        (None, None)
    };
    LoggingUtils::initialize(&config.logging, broadcast).context("Failed to initialize logging")?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if config.server.worker_threads > 0 {
        runtime.worker_threads(config.server.worker_threads);
    }
    let runtime = runtime.build().context("Failed to start async runtime")?;

    runtime.block_on(async move {
        info!(version = env!("CARGO_PKG_VERSION"), "Starting mining node web server");

        let server = HttpServer::new(config, log_entries)
            .await
            .context("Failed to initialize server")?;
        info!(address = %server.config().server_address(), "Server initialized");

        server.run().await.context("Server error")?;
        Ok(())
    })
}
