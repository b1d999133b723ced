// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plugin service: wires the Docker engine, agent pool, reaper and HTTP API.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use docker_elastic_agents_core::{
    application::{
        lifecycle::{ContainerLifecycle, LifecycleSettings},
        pool::{AgentPool, PoolPolicy},
        reaper::{Reaper, ReaperConfig},
    },
    domain::{plugin_config::PluginConfigManifest, registry::AgentRegistry},
    infrastructure::DockerEngine,
    presentation::api,
};

pub async fn run(config: PluginConfigManifest) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    let spec = &config.spec;
    info!(
        name = %config.metadata.name,
        image = %spec.agent.image,
        server_url = %spec.agent.server_url,
        "Configuration loaded"
    );

    if let Some(port) = spec.observability.metrics_port {
        start_metrics_endpoint(&spec.server.bind_address, port).await?;
    }

    let engine = Arc::new(
        DockerEngine::connect(&spec.docker).context("Failed to initialize Docker client")?,
    );
    let lifecycle = Arc::new(ContainerLifecycle::new(
        engine.clone(),
        LifecycleSettings::from_config(&spec.agent, &spec.pool),
    ));
    let registry = Arc::new(AgentRegistry::new());
    let pool = Arc::new(AgentPool::new(
        engine,
        lifecycle,
        registry,
        PoolPolicy::from(&spec.pool),
    ));

    // Agents from a previous run are still labeled on the engine
    match pool.recover().await {
        Ok(recovered) => info!(recovered, "Agent registry recovered"),
        Err(e) => warn!("Could not recover agents from the engine: {}", e),
    }

    let reaper = Arc::new(Reaper::new(
        pool.clone(),
        ReaperConfig {
            interval: spec.pool.reconcile_interval,
            enabled: spec.pool.reaper_enabled,
        },
    ));
    let reaper_shutdown = reaper.shutdown_token();
    let reaper_handle = reaper.start();

    let addr = format!("{}:{}", spec.server.bind_address, spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Plugin service listening on {}", addr);

    axum::serve(listener, api::app(pool))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    reaper_shutdown.cancel();
    if let Err(e) = reaper_handle.await {
        error!("Agent reaper task failed: {}", e);
    }

    info!("Plugin service shutting down");

    Ok(())
}

async fn start_metrics_endpoint(bind_address: &str, port: u16) -> Result<()> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint to {}", addr))?;

    let app = Router::new().route("/metrics", get(move || async move { handle.render() }));

    info!("Metrics endpoint listening on {}/metrics", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics endpoint failed: {}", e);
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
