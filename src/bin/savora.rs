use anyhow::{Context, Result};
use rustls::crypto::ring;
use savora::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Both sqlx and the OTLP exporter link rustls; pick one crypto provider
    // for the whole process before any TLS handshake happens.
    ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))
        .context("TLS crypto provider initialization failed")?;

    let action = cli::start()?;

    action.execute().await?;

    cli::telemetry::shutdown_tracer();

    Ok(())
}
