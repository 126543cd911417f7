//! secret-server: a password-gated secret service
//!
//! Clients connect over TCP, get a banner and a password prompt, and send
//! one line. The right password reveals the configured secret; anything
//! else gets a rejection. Either way the connection is closed afterwards.
//!
//! Features:
//! - One task per connection, so a silent client cannot starve others
//! - Bounded password line with truncate-and-drain overflow handling
//! - Per-connection read timeout and a cap on concurrent connections
//! - Configuration via CLI arguments

mod config;
mod line;
mod protocol;
mod server;

use config::{Config, ConfigError};
use server::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Args(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_line_length = config.max_line_length,
        read_timeout_secs = config.read_timeout.map(|t| t.as_secs()),
        max_connections = config.max_connections,
        workers = config.workers,
        "Starting secret-server"
    );

    if config.password_truncated {
        warn!(
            max_line_length = config.max_line_length,
            "Password longer than the maximum line length, truncated"
        );
    }
    if config.password_trailing_whitespace {
        warn!("Password ends in whitespace; only over-long client lines can match it");
    }
    if config.secret_truncated {
        warn!(
            max_secret_len = config::MAX_SECRET_LEN,
            "Secret too long, truncated"
        );
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    runtime.block_on(async move {
        let server = Server::bind(config)?;
        info!(address = %server.local_addr()?, "Server listening");
        server.run().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
