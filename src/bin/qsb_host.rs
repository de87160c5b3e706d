//! Headless search box host for stdin/stdout JSON communication.
//!
//! Reads `HostCommand` messages as newline-delimited JSON from stdin and
//! writes `HostEvent` messages to stdout. Tracing goes to stderr so stdout
//! stays a clean protocol channel.

use qsb::QsbConfig;
use qsb::host::stdio::run_stdio_host;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("qsb-host starting");

    let config = QsbConfig::load_or_default().map_err(|e| {
        tracing::error!(error = %e, "failed to load config");
        anyhow::anyhow!("qsb-host config: {e}")
    })?;

    run_stdio_host(config).await.map_err(|e| {
        tracing::error!(error = %e, "qsb-host exited with error");
        anyhow::anyhow!("qsb-host failed: {e}")
    })?;

    tracing::info!("qsb-host shut down cleanly");
    Ok(())
}
