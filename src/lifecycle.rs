//! Process start-up and ordered teardown.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::server::Server;
use crate::shutdown::{ShutdownReason, ShutdownSignal};
use crate::telemetry::TelemetryGuard;
use crate::video::{PgVideoStorage, VideoService};
use crate::{api, db, shutdown, telemetry, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting_down",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A resource closed during teardown, after the http server has stopped.
#[async_trait]
pub trait Teardown: Send {
    fn name(&self) -> &'static str;

    async fn close(self: Box<Self>);
}

#[async_trait]
impl Teardown for PgPool {
    fn name(&self) -> &'static str {
        "database pool"
    }

    async fn close(self: Box<Self>) {
        PgPool::close(&self).await;
    }
}

#[async_trait]
impl Teardown for TelemetryGuard {
    fn name(&self) -> &'static str {
        "tracer"
    }

    async fn close(self: Box<Self>) {
        (*self).shutdown().await;
    }
}

/// Runs the service until a signal or a listener failure stops it.
///
/// Returns an error only when start-up fails. Teardown problems are logged
/// and every teardown step still runs.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let telemetry =
        telemetry::init(&config.telemetry).context("Can not initialize logger and tracer")?;
    tracing::info!(phase = %Phase::Initializing, "Starting video search service");

    let pool = match db::init_db(&config.database).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(error = %err, "Can not connect to database");
            telemetry.shutdown().await;
            return Err(anyhow::Error::new(err).context("Can not connect to database"));
        }
    };

    let storage = Arc::new(PgVideoStorage::new(pool.clone()));
    let state = AppState::new(VideoService::new(storage));
    let app = api::create_api_router(state, &config.server);

    let (trigger, signal) = shutdown::channel();
    let server = Server::start(&config.server, app, trigger.clone());
    tokio::spawn(shutdown::watch_os_signals(trigger));

    serve_until_shutdown(
        server,
        signal,
        config.server.shutdown_grace,
        vec![Box::new(pool), Box::new(telemetry)],
    )
    .await;

    Ok(())
}

/// Waits for the first shutdown reason, stops `server` within `grace`, then
/// closes `teardown` in order.
pub async fn serve_until_shutdown(
    server: Server,
    signal: ShutdownSignal,
    grace: Duration,
    teardown: Vec<Box<dyn Teardown>>,
) -> ShutdownReason {
    tracing::info!(phase = %Phase::Running, "Video search service is running");

    let reason = signal.wait().await;
    tracing::info!(phase = %Phase::ShuttingDown, %reason, "Shutting down");

    if let Err(err) = server.stop(grace).await {
        tracing::error!(error = %err, "Fail to stop http server");
    }

    for resource in teardown {
        let name = resource.name();
        resource.close().await;
        tracing::info!(resource = name, "Closed");
    }

    tracing::info!(phase = %Phase::Stopped, "Video search service stopped");
    reason
}
