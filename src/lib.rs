//! image-annotator - REST backend for image upload and annotation
//!
//! This crate accepts image uploads, stores them in object storage,
//! triggers an external annotation function, and tracks each upload's
//! lifecycle in-process:
//! - Swappable object storage backends (local filesystem, S3)
//! - Fire-and-forget processing trigger (AWS Lambda) with a completion
//!   callback endpoint
//! - Validated status transitions (`uploading -> processing -> completed |
//!   error`) behind a mutex-guarded record index
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod invoker;
pub mod object_store;
pub mod tracker;

use config::Config;
use tracker::UploadTracker;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub tracker: UploadTracker,
}
