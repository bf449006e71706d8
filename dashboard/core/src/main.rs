// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dashboard daemon entry point: wires repositories, bus, agent channel and
//! services, then serves the HTTP/SSE API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info};

use aegis_dashboard::application::{
    Reconciler, StandardAppCatalogService, StandardBucketService,
    StandardInstanceLifecycleService,
};
use aegis_dashboard::config::DashboardConfig;
use aegis_dashboard::infrastructure::agent_channel::AgentCommandSender;
use aegis_dashboard::infrastructure::appstore::HttpAppStoreClient;
use aegis_dashboard::infrastructure::event_bus::NotificationBus;
use aegis_dashboard::infrastructure::logs::ServiceLogClient;
use aegis_dashboard::infrastructure::repositories::{
    InMemoryAppRepository, InMemoryBucketRepository, InMemoryInstanceRepository,
};
use aegis_dashboard::presentation::api::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = DashboardConfig::from_env().context("Failed to load configuration")?;
    let addr = config.socket_addr()?;
    info!(listen = %addr, "AEGIS dashboard starting");

    let instances = Arc::new(InMemoryInstanceRepository::new());
    let buckets = Arc::new(InMemoryBucketRepository::new());
    let apps = Arc::new(InMemoryAppRepository::new());
    let bus = Arc::new(NotificationBus::new(config.bus_capacity));

    let (agent_channel, mut commands) = AgentCommandSender::channel();
    let agent_channel = Arc::new(agent_channel);

    // The swarm transport bridge owns the receiver half; until one is
    // attached, dispatched commands are drained and traced.
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            debug!(kind = command.kind(), "Agent command awaiting transport");
        }
    });

    let lifecycle = Arc::new(StandardInstanceLifecycleService::new(
        instances.clone(),
        apps.clone(),
        agent_channel.clone(),
        bus.clone(),
    ));
    let bucket_service = Arc::new(StandardBucketService::new(
        buckets.clone(),
        agent_channel.clone(),
        bus.clone(),
    ));
    let catalog = Arc::new(StandardAppCatalogService::new(
        apps.clone(),
        Arc::new(HttpAppStoreClient::new(config.appstore_url.clone())),
        bus.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(instances.clone(), bus.clone()));

    let state = Arc::new(AppState {
        lifecycle,
        buckets: bucket_service,
        catalog,
        reconciler,
        instances,
        bus,
        logs: Arc::new(ServiceLogClient::new()),
    });

    let router = api::app(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API listening");

    axum::serve(listener, router)
        .await
        .context("API server terminated")?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
