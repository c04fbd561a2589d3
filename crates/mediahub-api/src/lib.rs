//! # mediahub-api
//!
//! Axum HTTP layer: the signed storage proxy and the health endpoint.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use router::build_router;
pub use state::AppState;
