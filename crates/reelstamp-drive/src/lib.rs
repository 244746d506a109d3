//! Google Drive v3 REST client and remote-tree plumbing.
//!
//! This crate provides:
//! - Service account authentication via gcp_auth, with token caching
//! - The [`RemoteStore`] seam and its Drive implementation
//! - A generic retry wrapper with exponential backoff
//! - A lazy depth-first walker over a folder tree

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;
pub mod walker;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

#[cfg(test)]
mod client_tests;

pub use client::{DriveClient, DriveConfig};
pub use error::{DriveError, DriveResult};
pub use retry::{with_retry, BackoffPolicy, RetryError, Retryable};
pub use store::RemoteStore;
pub use token_cache::{TokenCache, TokenSource};
pub use walker::{TreeWalker, WalkEntry};
