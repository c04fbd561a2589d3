//! Video rendition entities.

pub mod model;
pub mod store;

pub use model::VideoFile;
pub use store::VideoFileStore;
