//! Video search service: one read endpoint over PostgreSQL, with tracing
//! and graceful shutdown.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod video;

use std::sync::Arc;

use crate::video::VideoService;

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub video_service: Arc<VideoService>,
}

impl AppState {
    pub fn new(video_service: VideoService) -> Self {
        Self {
            video_service: Arc::new(video_service),
        }
    }
}
