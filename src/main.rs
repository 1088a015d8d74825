//! gendata - terminal client for collecting chat training data
//!
//! The user types a query, curates the system prompts stored on the prompt
//! service, asks the service for candidate responses and picks the best one.
//! The service records every pick.

mod backend;
mod config;
mod runtime;
mod shell;
mod state_machine;

use backend::{HttpBackend, LoggingBackend};
use config::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging. stdout belongs to the shell.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gendata=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(
        backend_url = %config.backend_url,
        timeout_secs = config.http_timeout.map(|t| t.as_secs()),
        "Using prompt service"
    );

    let backend = LoggingBackend::new(HttpBackend::new(&config.backend_url, config.http_timeout)?);
    let handle = runtime::spawn(backend);

    shell::run(handle).await?;

    tracing::info!("Shell closed");
    Ok(())
}
