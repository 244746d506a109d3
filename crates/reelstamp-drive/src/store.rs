//! The remote file store seam.
//!
//! The walker, fetcher and publisher only talk to this trait, so the whole
//! pipeline runs against [`crate::DriveClient`] in production and against an
//! in-memory store in tests. Each method is a single attempt; callers wrap
//! them in [`crate::retry::with_retry`].

use async_trait::async_trait;
use bytes::Bytes;
use reelstamp_models::RemoteNode;

use crate::error::DriveResult;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Metadata of a single file or folder.
    async fn get_node(&self, id: &str) -> DriveResult<RemoteNode>;

    /// All non-trashed children of a folder, across every result page.
    async fn list_children(&self, folder_id: &str) -> DriveResult<Vec<RemoteNode>>;

    /// Raw content of a binary file.
    async fn download(&self, file_id: &str) -> DriveResult<Vec<u8>>;

    /// Content of a native document rendered as `mime_type`.
    async fn export(&self, file_id: &str, mime_type: &str) -> DriveResult<Vec<u8>>;

    /// The non-trashed child of `folder_id` called `name`, if any.
    async fn find_child(&self, folder_id: &str, name: &str) -> DriveResult<Option<RemoteNode>>;

    /// Upload a new file into a folder.
    ///
    /// `content` is reference counted, so retries can clone it freely.
    async fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode>;

    /// Replace the content of an existing file, keeping its id.
    async fn update_file(
        &self,
        file_id: &str,
        mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode>;

    /// Server-side copy converted to `target_mime`, placed in `folder_id`.
    async fn convert_copy(
        &self,
        file_id: &str,
        target_mime: &str,
        folder_id: &str,
    ) -> DriveResult<RemoteNode>;

    /// Permanently delete a file.
    async fn delete(&self, file_id: &str) -> DriveResult<()>;
}
