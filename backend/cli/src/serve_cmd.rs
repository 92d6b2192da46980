//! `ocr-bridge serve`: load the tier's backend, then serve HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use ocr_bridge_config::{BridgeConfig, CacheLayout};
use ocr_bridge_core::{load_model, AppContext, ModelRuntime};
use ocr_bridge_gateway::{start_server, GatewayState};
use tracing::{error, info, warn};

use crate::settings::{adapter, build_runtime, load_options};

pub async fn run(config: BridgeConfig) -> Result<()> {
    info!(
        tier = %config.tier,
        model = %config.model_label(),
        addr = %config.server.address(),
        "Starting OCR bridge"
    );

    let cache = CacheLayout::new(&config.cache.dir);
    cache.ensure_dirs().await?;

    let runtime = build_runtime(&config, &cache)?;
    info!(
        kind = %config.runtime,
        runtime = runtime.name(),
        accelerator = runtime.accelerator_available(),
        "Model runtime ready"
    );

    let mut ctx = AppContext::new(config.tier, config.model_label(), adapter(&config));
    if let Some(permits) = config.server.max_concurrent_inferences {
        ctx = ctx.with_max_concurrent(permits);
    }

    let handle = match load_model(config.tier, runtime.as_ref(), &load_options(&config)).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(tier = %config.tier, error = %e, "Failed to load model");
            std::process::exit(1);
        }
    };
    ctx.install(handle)?;

    let addr = resolve_addr(&config.server.address()).await?;
    let state = GatewayState::new(Arc::new(ctx))
        .with_strict_client_errors(config.server.strict_client_errors);

    start_server(addr, state, config.server.max_body_bytes, shutdown_signal()).await
}

async fn resolve_addr(address: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(address)
        .await
        .with_context(|| format!("Invalid bind address: {address}"))?
        .next()
        .with_context(|| format!("Bind address resolved to nothing: {address}"))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
