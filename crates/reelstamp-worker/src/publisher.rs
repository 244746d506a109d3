//! Publishing rendered videos back to the pair's folder.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reelstamp_drive::{with_retry, BackoffPolicy, RemoteStore};
use reelstamp_media::move_file;
use reelstamp_models::{sanitize_file_name, MP4_MIME};
use tracing::{info, warn};

use crate::error::WorkerResult;

/// Where a published video ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub file_id: String,
    /// True when an existing file of the same name was replaced
    pub replaced: bool,
    pub local_mirror: Option<PathBuf>,
}

/// Local mirror location of an output: one subdirectory per remote folder,
/// so equal output names from different folders never overwrite each other.
pub fn mirror_path(
    mirror_dir: &Path,
    folder_id: &str,
    folder_name: &str,
    output_name: &str,
) -> PathBuf {
    let folder_dir = sanitize_file_name(&format!("{}_{}", folder_name, folder_id));
    mirror_dir.join(folder_dir).join(output_name)
}

/// Uploads outputs, replacing any earlier output of the same name.
pub struct ResultPublisher<'a> {
    store: &'a dyn RemoteStore,
    policy: &'a BackoffPolicy,
    mirror_dir: Option<&'a Path>,
}

impl<'a> ResultPublisher<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        policy: &'a BackoffPolicy,
        mirror_dir: Option<&'a Path>,
    ) -> Self {
        Self {
            store,
            policy,
            mirror_dir,
        }
    }

    /// Whether `folder_id` already holds a file called `name`.
    pub async fn exists(&self, folder_id: &str, name: &str) -> WorkerResult<bool> {
        let store = self.store;
        let found = with_retry(self.policy, "find_child", || store.find_child(folder_id, name)).await?;
        Ok(found.is_some())
    }

    /// Upload `local_path` as `output_name` into `folder_id`, then move it
    /// to the mirror directory when one is configured.
    pub async fn publish(
        &self,
        folder_id: &str,
        folder_name: &str,
        output_name: &str,
        local_path: &Path,
    ) -> WorkerResult<Published> {
        let store = self.store;
        let content = Bytes::from(tokio::fs::read(local_path).await?);
        let size = content.len();

        let existing =
            with_retry(self.policy, "find_child", || store.find_child(folder_id, output_name))
                .await?;

        let (node, replaced) = match existing {
            Some(existing) => {
                let node = with_retry(self.policy, "update_file", || {
                    store.update_file(&existing.id, MP4_MIME, content.clone())
                })
                .await?;
                (node, true)
            }
            None => {
                let node = with_retry(self.policy, "create_file", || {
                    store.create_file(folder_id, output_name, MP4_MIME, content.clone())
                })
                .await?;
                (node, false)
            }
        };

        info!(
            folder_id,
            file_id = %node.id,
            name = output_name,
            bytes = size,
            replaced,
            "Published output"
        );

        let local_mirror = match self.mirror_dir {
            Some(dir) => {
                let target = mirror_path(dir, folder_id, folder_name, output_name);
                self.mirror(local_path, &target).await
            }
            None => None,
        };

        Ok(Published {
            file_id: node.id,
            replaced,
            local_mirror,
        })
    }

    /// The upload already succeeded, so a mirror failure only warns.
    async fn mirror(&self, local_path: &Path, target: &Path) -> Option<PathBuf> {
        match move_file(local_path, target).await {
            Ok(()) => Some(target.to_path_buf()),
            Err(e) => {
                warn!(
                    target = %target.display(),
                    "Could not mirror output locally: {}",
                    e
                );
                None
            }
        }
    }
}
