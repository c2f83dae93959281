//! HTTP surface of the service.

pub mod common;
pub mod videos;

use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::routing::get;
use axum::{BoxError, Router};
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::errors::AppError;
use crate::AppState;

/// Builds the router with request tracing, a body read deadline and a
/// per-request deadline.
///
/// When the request deadline fires the handler future is dropped, which
/// cancels any query it is still waiting on, and the client gets a 500.
#[tracing::instrument(name = "create_api_router", skip_all)]
pub fn create_api_router(state: AppState, config: &ServerConfig) -> Router {
    tracing::info!("Creating API router");

    Router::new()
        .route("/api/videos/search/", get(videos::find_videos_without_title))
        .route("/api/videos/search/:title", get(videos::find_videos))
        .layer(RequestBodyTimeoutLayer::new(config.read_timeout))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(common::tracing::make_request_span::<Body>)
                .on_request(common::tracing::on_request::<Body>)
                .on_response(common::tracing::on_response::<Body>)
                .on_failure(common::tracing::on_failure),
        )
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> AppError {
    match err.downcast::<Elapsed>() {
        Ok(elapsed) => AppError::Timeout(*elapsed),
        Err(err) => AppError::Unexpected(anyhow::anyhow!(err)),
    }
}
