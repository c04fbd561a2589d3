//! # mediahub-entity
//!
//! Domain entity models for MediaHub. Database entities (`Storage`,
//! `VideoFile`) derive `sqlx::FromRow`; the remaining types are value
//! objects, job messages, and the collaborator traits through which the
//! storage core reaches persistence and job dispatch.

pub mod job;
pub mod migration;
pub mod storage;
pub mod video_file;
