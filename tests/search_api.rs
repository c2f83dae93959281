mod common;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{
    body_bytes, get, router_with, router_with_config, video, videos_from, FailingVideoStorage,
    InMemoryVideoStorage, SlowVideoStorage,
};
use video_search::config::ServerConfig;
use video_search::video::{StorageError, Video, VideoStorage};

#[derive(Default)]
struct CountingStorage {
    calls: AtomicUsize,
}

#[async_trait]
impl VideoStorage for CountingStorage {
    async fn find_videos_by_title(&self, _title: &str) -> Result<Vec<Video>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }
}

fn catalogue() -> Arc<InMemoryVideoStorage> {
    Arc::new(InMemoryVideoStorage::new(vec![
        video(1, "Golang awesome"),
        video(2, "Rust ownership explained"),
        video(3, "Cooking pasta"),
    ]))
}

#[tokio::test]
async fn search_matches_title_substring_ignoring_case() {
    let response = get(router_with(catalogue()), "/api/videos/search/go").await;

    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let videos = videos_from(response).await;
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].title, "Golang awesome");
    assert_eq!(videos[0], video(1, "Golang awesome"));
}

#[tokio::test]
async fn response_uses_documented_field_names() {
    let response = get(router_with(catalogue()), "/api/videos/search/PASTA").await;
    let bytes = body_bytes(response).await;

    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let object = value[0].as_object().unwrap();
    let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();

    assert_eq!(
        keys,
        vec![
            "created_at",
            "description",
            "id",
            "number_of_likes",
            "number_of_views",
            "title"
        ]
    );
}

#[tokio::test]
async fn no_match_returns_empty_array() {
    let response = get(router_with(catalogue()), "/api/videos/search/haskell").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"[]");
}

#[tokio::test]
async fn empty_title_segment_is_bad_request() {
    let response = get(router_with(catalogue()), "/api/videos/search/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn title_longer_than_255_characters_is_bad_request() {
    let uri = format!("/api/videos/search/{}", "a".repeat(256));

    let response = get(router_with(catalogue()), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn title_of_255_characters_is_searched() {
    let uri = format!("/api/videos/search/{}", "a".repeat(255));

    let response = get(router_with(catalogue()), &uri).await;

    assert!(videos_from(response).await.is_empty());
}

#[tokio::test]
async fn storage_failure_is_internal_error_without_details() {
    let response = get(
        router_with(Arc::new(FailingVideoStorage)),
        "/api/videos/search/go",
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn undecodable_title_is_bad_request_without_a_query() {
    let storage = Arc::new(CountingStorage::default());

    let response = get(router_with(storage.clone()), "/api/videos/search/%FF").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn request_deadline_is_internal_error_without_details() {
    let storage = Arc::new(SlowVideoStorage::new(
        vec![video(1, "Golang awesome")],
        Duration::from_secs(5),
    ));
    let config = ServerConfig {
        request_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    };

    let response = get(router_with_config(storage, &config), "/api/videos/search/go").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn percent_encoded_titles_are_decoded() {
    let response = get(router_with(catalogue()), "/api/videos/search/rust%20own").await;

    let videos = videos_from(response).await;
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].id, 2);
}

#[tokio::test]
async fn concurrent_searches_get_independent_results() {
    let router = router_with(catalogue());
    let terms = ["golang", "rust", "pasta", "nothing"];

    let responses = futures::future::join_all(terms.iter().map(|term| {
        let router = router.clone();
        let uri = format!("/api/videos/search/{}", term);
        tokio::spawn(async move { videos_from(get(router, &uri).await).await })
    }))
    .await;

    let ids: Vec<Vec<i64>> = responses
        .into_iter()
        .map(|joined| joined.unwrap().into_iter().map(|v| v.id).collect())
        .collect();
    assert_eq!(ids, vec![vec![1], vec![2], vec![3], vec![]]);
}
