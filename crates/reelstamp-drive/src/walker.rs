//! Lazy depth-first walk over a remote folder tree.

use std::collections::{HashSet, VecDeque};

use reelstamp_models::RemoteNode;
use tracing::{debug, warn};

use crate::error::DriveError;
use crate::retry::{with_retry, BackoffPolicy, RetryError};
use crate::store::RemoteStore;

/// One step of a tree walk.
#[derive(Debug)]
pub enum WalkEntry {
    /// A folder whose children have just been listed.
    Folder(RemoteNode),
    /// A non-folder child of the most recently entered folder.
    Leaf(RemoteNode),
    /// A folder that could not be listed; its subtree is skipped.
    ListingFailed {
        folder: RemoteNode,
        error: RetryError<DriveError>,
    },
}

/// Walks a folder tree one entry at a time.
///
/// Folders are listed only when the walk reaches them. Children are ordered
/// by `(name, id)`; a folder's leaves come before its subfolders, and each
/// folder id is listed at most once per walk, so shortcut cycles terminate.
pub struct TreeWalker<'a> {
    store: &'a dyn RemoteStore,
    policy: BackoffPolicy,
    root: RemoteNode,
    stack: Vec<RemoteNode>,
    pending: VecDeque<WalkEntry>,
    visited: HashSet<String>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(store: &'a dyn RemoteStore, root: RemoteNode, policy: BackoffPolicy) -> Self {
        Self {
            store,
            policy,
            stack: vec![root.clone()],
            root,
            pending: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    pub fn root(&self) -> &RemoteNode {
        &self.root
    }

    /// Reset the walk to the root; nothing is listed until `next` is called.
    pub fn restart(&mut self) {
        self.stack = vec![self.root.clone()];
        self.pending.clear();
        self.visited.clear();
    }

    /// The next entry, or `None` once the tree is exhausted.
    pub async fn next(&mut self) -> Option<WalkEntry> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(entry);
            }

            let folder = self.stack.pop()?;
            if !self.visited.insert(folder.id.clone()) {
                debug!(folder_id = %folder.id, "Folder already visited, skipping");
                continue;
            }

            self.enter(folder).await;
        }
    }

    async fn enter(&mut self, folder: RemoteNode) {
        let store = self.store;
        let listing = with_retry(&self.policy, "list_children", || {
            store.list_children(&folder.id)
        })
        .await;

        let mut children = match listing {
            Ok(children) => children,
            Err(error) => {
                warn!(
                    folder_id = %folder.id,
                    folder = %folder.name,
                    "Could not list folder: {}",
                    error
                );
                self.pending
                    .push_back(WalkEntry::ListingFailed { folder, error });
                return;
            }
        };

        children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        debug!(
            folder_id = %folder.id,
            children = children.len(),
            "Listed folder"
        );

        self.pending.push_back(WalkEntry::Folder(folder));

        let (subfolders, leaves): (Vec<_>, Vec<_>) =
            children.into_iter().partition(RemoteNode::is_folder);
        self.pending.extend(leaves.into_iter().map(WalkEntry::Leaf));

        // Reverse so the first subfolder by name is popped first
        self.stack.extend(subfolders.into_iter().rev());
    }
}
