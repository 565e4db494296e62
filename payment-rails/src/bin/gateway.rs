//! Rail gateway binary
//!
//! Loads configuration (TOML path as the first argument, otherwise environment variables),
//! initializes every rail and logs the provider catalogue.

use anyhow::Context;
use payment_rails::{
    GatewayConfig, InMemoryTenantStore, PaymentGateway, ProviderRegistry,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => GatewayConfig::from_env().context("loading config from environment")?,
    };

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        "Starting {} v{}",
        config.service_name,
        config.service_version
    );

    let registry = ProviderRegistry::bootstrap(&config)
        .await
        .context("initializing payment providers")?;

    let gateway = PaymentGateway::new(Arc::new(registry), Arc::new(InMemoryTenantStore::new()))
        .with_default_provider(config.default_provider.clone());

    for provider in gateway.registry().all() {
        let caps = provider.capabilities();
        tracing::info!(
            "{} ({}): currencies={:?} instant={} processing={}",
            provider.name(),
            provider.market(),
            caps.supported_currencies,
            caps.supports_instant_transfer,
            caps.average_processing_time
        );
    }

    tracing::info!("Default rail: {}", config.default_provider);

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down rail gateway");
    Ok(())
}
