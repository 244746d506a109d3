//! Remote file-tree nodes and their classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
/// MIME type of a Google-native document.
pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
/// Export target for prompt documents.
pub const PLAIN_TEXT_MIME: &str = "text/plain";
/// MIME type of the produced videos.
pub const MP4_MIME: &str = "video/mp4";

/// Extensions recognised as video files.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "avi", "flv", "wmv", "webm"];

/// Extensions recognised as plain-text prompts.
pub const TEXT_PROMPT_EXTENSIONS: &[&str] = &["txt", "text"];

/// Extensions of office word-processing prompts (converted server-side before export).
pub const OFFICE_PROMPT_EXTENSIONS: &[&str] = &["docx", "doc"];

const OFFICE_PROMPT_MIMES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "application/vnd.ms-word.document.macroEnabled.12",
];

/// Closed classification of a remote entry, computed once when the entry is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A folder; the walker descends into it.
    Folder,
    /// A video file.
    Video,
    /// A document that must go through the service's export to become text.
    PromptDocument,
    /// A plain-text prompt, downloaded as-is.
    PromptText,
    /// Anything else. Ignored and reported.
    Other,
}

impl NodeKind {
    /// Classify by MIME type first, then by file extension.
    pub fn classify(name: &str, mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        let ext = extension_of(name);
        let ext = ext.as_deref();

        if mime == FOLDER_MIME {
            return NodeKind::Folder;
        }
        if mime.starts_with("video/") || ext.is_some_and(|e| VIDEO_EXTENSIONS.contains(&e)) {
            return NodeKind::Video;
        }
        if mime == GOOGLE_DOC_MIME
            || OFFICE_PROMPT_MIMES.contains(&mime.as_str())
            || ext.is_some_and(|e| OFFICE_PROMPT_EXTENSIONS.contains(&e))
        {
            return NodeKind::PromptDocument;
        }
        if mime == PLAIN_TEXT_MIME || ext.is_some_and(|e| TEXT_PROMPT_EXTENSIONS.contains(&e)) {
            return NodeKind::PromptText;
        }
        NodeKind::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Video => "video",
            NodeKind::PromptDocument => "prompt_document",
            NodeKind::PromptText => "prompt_text",
            NodeKind::Other => "other",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry of the remote folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote file identifier
    pub id: String,
    /// Display name, including extension
    pub name: String,
    /// Classification computed from name and MIME type
    pub kind: NodeKind,
    /// MIME type as reported by the service
    pub mime_type: String,
    /// Identifier of the containing folder (None for the walk root)
    pub parent_id: Option<String>,
    /// Last modification time, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    /// Size in bytes, when reported (native documents have none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RemoteNode {
    /// Build a node, classifying it from its name and MIME type.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        let name = name.into();
        let mime_type = mime_type.into();
        Self {
            id: id.into(),
            kind: NodeKind::classify(&name, &mime_type),
            name,
            mime_type,
            parent_id,
            modified_time: None,
            size: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Lower-cased extension of the node's name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// Name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// True for Google-native documents, which can be exported directly.
    pub fn is_native_document(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(GOOGLE_DOC_MIME)
    }
}

impl fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

fn extension_of(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}
