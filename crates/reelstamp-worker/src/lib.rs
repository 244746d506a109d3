//! Drive overlay pipeline.
//!
//! This crate provides:
//! - Environment-driven pipeline configuration
//! - Video/prompt matching within a folder
//! - Content fetching, including document export
//! - Overwrite-by-name publishing with an optional local mirror
//! - The pipeline driver and its per-pair logging

pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod publisher;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use fetcher::ContentFetcher;
pub use logging::PairLogger;
pub use matcher::{match_folder, FolderMatch};
pub use pipeline::{Pipeline, Transform};
pub use publisher::{Published, ResultPublisher};
