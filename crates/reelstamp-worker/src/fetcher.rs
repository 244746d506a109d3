//! Fetching pair content from the remote store.

use std::path::{Path, PathBuf};

use reelstamp_drive::{with_retry, BackoffPolicy, RemoteStore};
use reelstamp_models::node::VIDEO_EXTENSIONS;
use reelstamp_models::{NodeKind, RemoteNode, GOOGLE_DOC_MIME, PLAIN_TEXT_MIME};
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};

/// Container extension for a video MIME type, when its name has none.
fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "video/webm" => "webm",
        "video/x-msvideo" | "video/avi" => "avi",
        "video/x-flv" => "flv",
        "video/x-ms-wmv" => "wmv",
        "video/x-m4v" => "m4v",
        _ => "mp4",
    }
}

/// Prompt bytes as clean text: BOM stripped, CRLF folded, trimmed.
pub fn normalize_prompt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Downloads videos and turns prompt files into text.
pub struct ContentFetcher<'a> {
    store: &'a dyn RemoteStore,
    policy: &'a BackoffPolicy,
}

impl<'a> ContentFetcher<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: &'a BackoffPolicy) -> Self {
        Self { store, policy }
    }

    /// Download a video into `scratch_dir` as `source.<ext>`.
    pub async fn fetch_video(&self, node: &RemoteNode, scratch_dir: &Path) -> WorkerResult<PathBuf> {
        let ext = node
            .extension()
            .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or_else(|| extension_for_mime(&node.mime_type).to_string());
        let path = scratch_dir.join(format!("source.{}", ext));

        let store = self.store;
        let bytes = with_retry(self.policy, "download", || store.download(&node.id)).await?;

        tokio::fs::write(&path, &bytes).await?;
        debug!(
            file_id = %node.id,
            bytes = bytes.len(),
            path = %path.display(),
            "Downloaded video"
        );

        Ok(path)
    }

    /// Fetch a prompt's text, whatever form the prompt is stored in.
    pub async fn fetch_prompt(&self, node: &RemoteNode) -> WorkerResult<String> {
        let bytes = match node.kind {
            NodeKind::PromptDocument if node.is_native_document() => {
                self.export_text(&node.id).await?
            }
            NodeKind::PromptDocument => self.export_converted(node).await?,
            NodeKind::PromptText => {
                let store = self.store;
                with_retry(self.policy, "download", || store.download(&node.id)).await?
            }
            NodeKind::Video | NodeKind::Folder | NodeKind::Other => {
                return Err(WorkerError::config_error(format!(
                    "{} is a {}, not a prompt",
                    node.name, node.kind
                )));
            }
        };

        let text = normalize_prompt(&bytes);
        if text.is_empty() {
            return Err(WorkerError::empty_prompt(&node.name));
        }
        Ok(text)
    }

    async fn export_text(&self, file_id: &str) -> WorkerResult<Vec<u8>> {
        let store = self.store;
        Ok(with_retry(self.policy, "export", || store.export(file_id, PLAIN_TEXT_MIME)).await?)
    }

    /// Office documents cannot be exported directly; export a converted copy.
    async fn export_converted(&self, node: &RemoteNode) -> WorkerResult<Vec<u8>> {
        let store = self.store;
        let folder_id = node.parent_id.as_deref().unwrap_or("root");

        let copy = with_retry(self.policy, "convert_copy", || {
            store.convert_copy(&node.id, GOOGLE_DOC_MIME, folder_id)
        })
        .await?;
        debug!(file_id = %node.id, copy_id = %copy.id, "Converted office document");

        let exported = self.export_text(&copy.id).await;

        if let Err(e) = with_retry(self.policy, "delete", || store.delete(&copy.id)).await {
            warn!(copy_id = %copy.id, "Could not delete converted copy: {}", e);
        }

        exported
    }
}
