// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use rfid_gateway::{
    cfg::{config::Config, logger::init_logger},
    driver::emulated,
    http::api::{self, AppState},
    session::ReaderRegistry,
    tags::passwords,
};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load_from_env().context("failed to load configuration")?;
    let _logger_guard = init_logger(cfg.logger.as_ref())?;

    passwords::install(cfg.tag_passwords.clone());

    // TODO: swap in the FEDM-based driver once the vendor bindings land;
    // until then every reader is backed by the in-memory emulation.
    let field = emulated::shared_state();
    let registry = Arc::new(ReaderRegistry::new(
        &cfg.readers,
        emulated::factory(field),
    ));
    info!(
        readers = registry.reader_count(),
        default_format = %cfg.default_tag_format,
        "reader registry ready"
    );

    let app = api::router(AppState {
        registry: Arc::clone(&registry),
        default_format: cfg.default_tag_format,
    })
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&cfg.http_listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_listen))?;
    info!(listen = %cfg.http_listen, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    info!("shutting down reader sessions");
    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
    }
}
