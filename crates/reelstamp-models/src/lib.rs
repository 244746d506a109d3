//! Shared data models for the reelstamp pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Remote folder-tree nodes and their closed classification
//! - Matched video/prompt pairs and overlay text
//! - Per-pair results and the end-of-run summary
//! - Encoding configuration
//! - Drive URL parsing and output naming

pub mod encoding;
pub mod node;
pub mod pair;
pub mod result;
pub mod utils;

// Re-export common types
pub use encoding::EncodingConfig;
pub use node::{NodeKind, RemoteNode, FOLDER_MIME, GOOGLE_DOC_MIME, MP4_MIME, PLAIN_TEXT_MIME};
pub use pair::{MatchedPair, OverlaySpec};
pub use result::{
    FailureStage, ListingFailure, PairOutcome, ProcessingResult, RunSummary, SkipReason,
    SkippedEntry,
};
pub use utils::{
    converted_copy_name, extract_folder_id, is_converted_copy_name, is_output_name,
    output_file_name, sanitize_file_name, FolderIdError, FolderIdResult,
};
