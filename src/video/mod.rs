pub mod model;
pub mod service;
pub mod storage;

pub use model::Video;
pub use service::{ServiceError, TitleRejection, VideoService, MAX_TITLE_LENGTH};
pub use storage::{PgVideoStorage, StorageError, VideoStorage};
