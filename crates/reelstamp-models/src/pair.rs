//! Matched video/prompt pairs and the overlay text derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::RemoteNode;

/// A video and the prompt that describes it, found in the same folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// Folder holding both files; results are published here
    pub folder_id: String,
    /// Folder display name, used as the overlay's name line
    pub folder_name: String,
    pub video: RemoteNode,
    pub prompt: RemoteNode,
}

impl MatchedPair {
    /// Short label for logs and the run summary.
    pub fn label(&self) -> String {
        format!("{}/{}", self.folder_name, self.video.name)
    }

    /// Overlay text for this pair once the prompt content is known.
    pub fn overlay_spec(&self, prompt_text: impl Into<String>) -> OverlaySpec {
        OverlaySpec {
            name: self.folder_name.clone(),
            prompt: prompt_text.into(),
        }
    }
}

impl fmt::Display for MatchedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.video.name, self.prompt.name)
    }
}

/// The two strings burned onto a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub name: String,
    pub prompt: String,
}

impl OverlaySpec {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}
