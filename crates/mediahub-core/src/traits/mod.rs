//! Core traits defined in `mediahub-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
