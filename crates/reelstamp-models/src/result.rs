//! Per-pair outcomes and the end-of-run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::PathBuf;

use crate::node::RemoteNode;
use crate::pair::MatchedPair;

/// Pipeline stage at which a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    FetchVideo,
    FetchPrompt,
    Transform,
    Publish,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::FetchVideo => "fetch_video",
            FailureStage::FetchPrompt => "fetch_prompt",
            FailureStage::Transform => "transform",
            FailureStage::Publish => "publish",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Succeeded {
        /// Name of the published file
        output_name: String,
        /// Remote id of the published file
        remote_file_id: String,
        /// Local mirror copy, when configured
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_mirror: Option<PathBuf>,
    },
    Failed {
        stage: FailureStage,
        reason: String,
    },
}

/// Result of processing one matched pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub pair: MatchedPair,
    pub outcome: PairOutcome,
    pub elapsed_ms: u64,
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PairOutcome::Succeeded { .. })
    }
}

/// Why an entry was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Video without a prompt in its folder
    UnmatchedVideo,
    /// Prompt without a video in its folder
    UnmatchedPrompt,
    /// Video left over while several prompts could describe it
    AmbiguousPrompt,
    /// Neither video nor prompt
    UnsupportedType,
    /// A file this tool produced on an earlier run
    PreviousOutput,
    /// The pair's output already exists remotely
    AlreadyProcessed,
    /// Temporary conversion copy that an earlier run failed to delete
    LeftoverCopy,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnmatchedVideo => "no prompt for video",
            SkipReason::UnmatchedPrompt => "no video for prompt",
            SkipReason::AmbiguousPrompt => "several candidate prompts",
            SkipReason::UnsupportedType => "unsupported file type",
            SkipReason::PreviousOutput => "earlier output",
            SkipReason::AlreadyProcessed => "output already exists",
            SkipReason::LeftoverCopy => "leftover conversion copy",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry that was deliberately not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub folder_name: String,
    pub node: RemoteNode,
    pub reason: SkipReason,
}

/// A subtree whose listing failed; its contents were not visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFailure {
    pub folder_id: String,
    pub folder_name: String,
    pub error: String,
}

/// Everything one run did, reported at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub root_folder_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub succeeded: Vec<ProcessingResult>,
    pub failed: Vec<ProcessingResult>,
    pub skipped: Vec<SkippedEntry>,
    pub listing_failures: Vec<ListingFailure>,
}

impl RunSummary {
    pub fn new(root_folder_id: impl Into<String>) -> Self {
        Self {
            root_folder_id: root_folder_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            listing_failures: Vec::new(),
        }
    }

    /// File a pair result under succeeded or failed.
    pub fn record(&mut self, result: ProcessingResult) {
        if result.is_success() {
            self.succeeded.push(result);
        } else {
            self.failed.push(result);
        }
    }

    pub fn skip(&mut self, folder_name: impl Into<String>, node: RemoteNode, reason: SkipReason) {
        self.skipped.push(SkippedEntry {
            folder_name: folder_name.into(),
            node,
            reason,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when nothing failed, including subtree listings.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.listing_failures.is_empty()
    }

    /// Human-readable report printed at the end of a run.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run over {}: {} succeeded, {} failed, {} skipped, {} unreadable folders",
            self.root_folder_id,
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len(),
            self.listing_failures.len()
        );

        if !self.succeeded.is_empty() {
            let _ = writeln!(out, "\nSucceeded:");
            for result in &self.succeeded {
                if let PairOutcome::Succeeded {
                    output_name,
                    local_mirror,
                    ..
                } = &result.outcome
                {
                    let _ = write!(out, "  {} -> {}", result.pair.label(), output_name);
                    if let Some(path) = local_mirror {
                        let _ = write!(out, " (mirrored to {})", path.display());
                    }
                    out.push('\n');
                }
            }
        }

        if !self.failed.is_empty() {
            let _ = writeln!(out, "\nFailed:");
            for result in &self.failed {
                if let PairOutcome::Failed { stage, reason } = &result.outcome {
                    let _ = writeln!(out, "  {} [{}]: {}", result.pair.label(), stage, reason);
                }
            }
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "\nSkipped:");
            for entry in &self.skipped {
                let _ = writeln!(
                    out,
                    "  {}/{}: {}",
                    entry.folder_name, entry.node.name, entry.reason
                );
            }
        }

        if !self.listing_failures.is_empty() {
            let _ = writeln!(out, "\nUnreadable folders:");
            for failure in &self.listing_failures {
                let _ = writeln!(
                    out,
                    "  {} ({}): {}",
                    failure.folder_name, failure.folder_id, failure.error
                );
            }
        }

        out
    }
}
