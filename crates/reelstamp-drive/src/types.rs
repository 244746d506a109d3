//! Drive v3 REST API types.

use chrono::{DateTime, Utc};
use reelstamp_models::RemoteNode;
use serde::{Deserialize, Serialize};

/// Fields requested for every file resource.
pub const FILE_FIELDS: &str = "id,name,mimeType,parents,modifiedTime,size,trashed";

/// Drive file resource (the subset the pipeline reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    pub modified_time: Option<DateTime<Utc>>,
    /// Drive encodes int64 values as strings
    pub size: Option<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Convert to a classified node.
    ///
    /// `parent_hint` is the folder the file was listed from; Drive may report
    /// several parents and the listing folder is the one that matters.
    pub fn into_node(self, parent_hint: Option<&str>) -> RemoteNode {
        let parent_id = parent_hint
            .map(str::to_string)
            .or_else(|| self.parents.into_iter().next());
        let mut node = RemoteNode::new(self.id, self.name, self.mime_type, parent_id);
        node.modified_time = self.modified_time;
        node.size = self.size.and_then(|s| s.parse().ok());
        node
    }
}

/// Page of a `files.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

/// Metadata part of a multipart upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileMetadata<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    pub parents: Vec<&'a str>,
}

/// Body of a `files.copy` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest<'a> {
    pub name: String,
    pub mime_type: &'a str,
    pub parents: Vec<&'a str>,
}

/// Quote a value for use inside a Drive search query string literal.
pub fn query_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
