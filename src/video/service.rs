//! Input validation in front of the storage accessor.

use std::fmt;
use std::sync::Arc;

use super::model::Video;
use super::storage::{StorageError, VideoStorage};

pub const MAX_TITLE_LENGTH: usize = 255;

/// Why a search term was refused before reaching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRejection {
    Empty,
    TooLong { length: usize },
}

impl fmt::Display for TitleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleRejection::Empty => write!(f, "title is empty"),
            TitleRejection::TooLong { length } => write!(
                f,
                "title is {} characters long, at most {} allowed",
                length, MAX_TITLE_LENGTH
            ),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("got an incorrect video title: {0}")]
    InvalidTitle(TitleRejection),

    #[error("a request to DB failed: {0}")]
    StorageFailure(#[source] StorageError),
}

impl ServiceError {
    /// Result sequence that accompanies the error, if any.
    ///
    /// A too-long title yields an empty sequence next to the error, while an
    /// empty title yields none at all.
    pub fn videos(&self) -> Option<&[Video]> {
        match self {
            ServiceError::InvalidTitle(TitleRejection::TooLong { .. }) => Some(&[]),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct VideoService {
    storage: Arc<dyn VideoStorage>,
}

impl VideoService {
    pub fn new(storage: Arc<dyn VideoStorage>) -> Self {
        Self { storage }
    }

    #[tracing::instrument(name = "VideoService.Service.FindVideos", skip(self))]
    pub async fn find_videos(&self, title: &str) -> Result<Vec<Video>, ServiceError> {
        validate_title(title).map_err(ServiceError::InvalidTitle)?;

        self.storage
            .find_videos_by_title(title)
            .await
            .map_err(ServiceError::StorageFailure)
    }
}

fn validate_title(title: &str) -> Result<(), TitleRejection> {
    if title.is_empty() {
        return Err(TitleRejection::Empty);
    }

    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(TitleRejection::TooLong { length });
    }

    Ok(())
}
