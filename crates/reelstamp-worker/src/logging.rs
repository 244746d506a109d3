//! Structured pair logging utilities.
//!
//! Provides consistent, structured logging for pair processing with
//! tracing spans and contextual information.

use reelstamp_models::MatchedPair;
use tracing::{error, info, warn, Span};

/// Pair logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct PairLogger {
    pair: String,
    folder_id: String,
}

impl PairLogger {
    pub fn new(pair: &MatchedPair) -> Self {
        Self {
            pair: pair.label(),
            folder_id: pair.folder_id.clone(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            pair = %self.pair,
            folder_id = %self.folder_id,
            "Pair started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            pair = %self.pair,
            folder_id = %self.folder_id,
            "Pair progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            pair = %self.pair,
            folder_id = %self.folder_id,
            "Pair warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            pair = %self.pair,
            folder_id = %self.folder_id,
            "Pair error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            pair = %self.pair,
            folder_id = %self.folder_id,
            "Pair completed: {}", message
        );
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Span covering all work on this pair.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "pair",
            pair = %self.pair,
            folder_id = %self.folder_id
        )
    }
}
