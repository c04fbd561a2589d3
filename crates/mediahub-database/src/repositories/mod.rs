//! sqlx-backed repositories.

pub mod storage;
pub mod video_file;

pub use storage::StorageRepository;
pub use video_file::VideoFileRepository;
