#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tower::ServiceExt;

use video_search::api::create_api_router;
use video_search::config::ServerConfig;
use video_search::video::{StorageError, Video, VideoService, VideoStorage};
use video_search::AppState;

pub fn video(id: i64, title: &str) -> Video {
    Video {
        id,
        title: title.to_string(),
        description: format!("About {}", title),
        number_of_views: id * 100,
        number_of_likes: id * 10,
        created_at: Utc.with_ymd_and_hms(2021, 11, 1, 12, 0, 0).unwrap(),
    }
}

/// Case-insensitive substring matching over a fixed set of rows.
pub struct InMemoryVideoStorage {
    videos: Vec<Video>,
}

impl InMemoryVideoStorage {
    pub fn new(videos: Vec<Video>) -> Self {
        Self { videos }
    }
}

#[async_trait]
impl VideoStorage for InMemoryVideoStorage {
    async fn find_videos_by_title(&self, title: &str) -> Result<Vec<Video>, StorageError> {
        let needle = title.to_lowercase();
        Ok(self
            .videos
            .iter()
            .filter(|video| video.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

pub struct FailingVideoStorage;

#[async_trait]
impl VideoStorage for FailingVideoStorage {
    async fn find_videos_by_title(&self, _title: &str) -> Result<Vec<Video>, StorageError> {
        Err(StorageError::Query(sqlx::Error::PoolTimedOut))
    }
}

/// Holds every query for `delay`, announcing when one has started.
pub struct SlowVideoStorage {
    inner: InMemoryVideoStorage,
    delay: Duration,
    pub started: Arc<Notify>,
}

impl SlowVideoStorage {
    pub fn new(videos: Vec<Video>, delay: Duration) -> Self {
        Self {
            inner: InMemoryVideoStorage::new(videos),
            delay,
            started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl VideoStorage for SlowVideoStorage {
    async fn find_videos_by_title(&self, title: &str) -> Result<Vec<Video>, StorageError> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.find_videos_by_title(title).await
    }
}

pub fn router_with(storage: Arc<dyn VideoStorage>) -> Router {
    router_with_config(storage, &ServerConfig::default())
}

pub fn router_with_config(storage: Arc<dyn VideoStorage>, config: &ServerConfig) -> Router {
    let state = AppState::new(VideoService::new(storage));
    create_api_router(state, config)
}

/// Sends one search over a fresh connection and reads until the server
/// closes it. A reset connection yields whatever arrived before it.
pub async fn search_over_tcp(addr: SocketAddr, title: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /api/videos/search/{} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        title
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}

pub async fn get(router: Router, uri: &str) -> Response<Body> {
    router
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("GET")
                .body(Body::empty())
                .unwrap_or_else(|err| panic!("failed to build request: {err}")),
        )
        .await
        .unwrap_or_else(|err| panic!("router request failed: {err}"))
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap_or_else(|err| panic!("failed to read response body: {err}"))
        .to_vec()
}

pub async fn videos_from(response: Response<Body>) -> Vec<Video> {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|err| panic!("response body is not a video list: {err}"))
}
