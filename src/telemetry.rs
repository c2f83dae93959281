//! Logger and tracer construction.
//!
//! Logs go to stdout through `tracing-subscriber`. When export is enabled the
//! same spans are shipped to an OTLP collector through
//! `tracing-opentelemetry`, so one `#[tracing::instrument]` serves both.

use opentelemetry::global;
use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "video_search=debug,tower_http=debug,sqlx=info";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on every exported span.
    pub service_name: String,
    pub collector_endpoint: String,
    /// Disabled telemetry still logs, it only skips span export.
    pub enabled: bool,
    pub export_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "yt".to_string(),
            collector_endpoint: "http://jaeger:4317".to_string(),
            enabled: true,
            export_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("cannot init tracer: {0}")]
    Tracer(#[from] TraceError),

    #[error("cannot install log subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Installs the global subscriber and, if enabled, the OTLP tracer.
pub fn init(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        tracing::info!("Logging initialized, span export disabled");
        return Ok(TelemetryGuard { provider: None });
    }

    global::set_text_map_propagator(TraceContextPropagator::new());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&config.collector_endpoint)
                .with_timeout(config.export_timeout),
        )
        .with_trace_config(
            sdktrace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", config.service_name.clone()),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let provider = tracer.provider();
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        endpoint = %config.collector_endpoint,
        "Logging and tracing initialized"
    );

    Ok(TelemetryGuard { provider })
}

/// Owns the tracer for the lifetime of the process.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Flushes pending spans, closes the tracer and flushes stdout.
    ///
    /// Failures are logged; they never abort the rest of the shutdown.
    pub async fn shutdown(mut self) {
        if let Some(provider) = self.provider.take() {
            tracing::info!("Closing tracer");

            // Both calls block on the batch exporter.
            let closed = tokio::task::spawn_blocking(move || {
                for result in provider.force_flush() {
                    if let Err(err) = result {
                        tracing::error!(error = %err, "Fail to flush pending spans");
                    }
                }
                global::shutdown_tracer_provider();
            })
            .await;

            if let Err(err) = closed {
                tracing::error!(error = %err, "Fail to stop tracer");
            }
        }

        if let Err(err) = std::io::stdout().flush() {
            eprintln!("Fail to flush logs: {}", err);
        }
    }
}
