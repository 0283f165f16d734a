/*!
 * Mock services daemon
 *
 * Serves the proxy ABIS, manual verification and SBI capture mocks.
 */

use clap::Parser;
use mosip_mock_services::abis::HttpTemplateSource;
use mosip_mock_services::error::{ServiceError, ServiceResult};
use mosip_mock_services::{Server, ServiceConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mock-services")]
#[command(about = "Expectation-driven mock ABIS, MV and SBI services", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MOCK_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "MOCK_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "MOCK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "MOCK_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> ServiceResult<()> {
    let cli = Cli::parse();

    let mut config =
        ServiceConfig::load(cli.config.as_deref()).map_err(|e| ServiceError::Config(e.to_string()))?;

    let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| ServiceError::Config(format!("Invalid listen address: {}", e)))?;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting mock services");

    let templates = HttpTemplateSource::new(config.server.http_timeout())?;
    Server::new(config, Arc::new(templates))?.run().await
}
