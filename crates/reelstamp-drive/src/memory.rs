//! In-memory [`RemoteStore`] with failure injection, for tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use reelstamp_models::{converted_copy_name, RemoteNode, FOLDER_MIME, GOOGLE_DOC_MIME};

use crate::error::{DriveError, DriveResult};
use crate::store::RemoteStore;

/// Class of an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Surfaces as a 503.
    Transient,
    /// Surfaces as a 403 permission error.
    Permanent,
}

impl FailureKind {
    fn to_error(self, operation: &str, target: &str) -> DriveError {
        match self {
            FailureKind::Transient => DriveError::ServerError(
                503,
                format!("injected failure: {} {}", operation, target),
            ),
            FailureKind::Permanent => DriveError::PermissionDenied(format!(
                "injected failure: {} {}",
                operation, target
            )),
        }
    }
}

struct InjectedFailure {
    operation: String,
    /// `None` matches every target of the operation
    target: Option<String>,
    kind: FailureKind,
    remaining: u32,
}

struct StoredFile {
    id: String,
    name: String,
    mime_type: String,
    parents: Vec<String>,
    content: Vec<u8>,
}

impl StoredFile {
    fn node(&self, parent_hint: Option<&str>) -> RemoteNode {
        let parent = parent_hint
            .map(str::to_string)
            .or_else(|| self.parents.first().cloned());
        let mut node = RemoteNode::new(&self.id, &self.name, &self.mime_type, parent);
        if self.mime_type != FOLDER_MIME {
            node.size = Some(self.content.len() as u64);
        }
        node
    }
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    next_id: u64,
    failures: Vec<InjectedFailure>,
    calls: Vec<(String, String)>,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem-{:04}", self.next_id)
    }

    /// Record the call and fire a pending injected failure, if any.
    fn enter(&mut self, operation: &str, target: &str) -> DriveResult<()> {
        self.calls.push((operation.to_string(), target.to_string()));

        let pending = self
            .failures
            .iter_mut()
            .find(|f| {
                f.operation == operation
                    && f.target.as_deref().map_or(true, |t| t == target)
                    && f.remaining > 0
            });

        match pending {
            Some(failure) => {
                failure.remaining -= 1;
                Err(failure.kind.to_error(operation, target))
            }
            None => Ok(()),
        }
    }

    fn file(&self, id: &str) -> DriveResult<&StoredFile> {
        self.files
            .get(id)
            .ok_or_else(|| DriveError::not_found(format!("File not found: {}", id)))
    }
}

/// A remote store held entirely in memory.
pub struct MemoryStore {
    root_id: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create a store containing only a root folder.
    pub fn new(root_name: &str) -> Self {
        let mut state = State::default();
        let root_id = state.allocate_id();
        state.files.insert(
            root_id.clone(),
            StoredFile {
                id: root_id.clone(),
                name: root_name.to_string(),
                mime_type: FOLDER_MIME.to_string(),
                parents: Vec::new(),
                content: Vec::new(),
            },
        );

        Self {
            root_id,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn add_folder(&self, parent_id: &str, name: &str) -> String {
        self.add_file(parent_id, name, FOLDER_MIME, Vec::new())
    }

    pub fn add_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        content: impl Into<Vec<u8>>,
    ) -> String {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.files.insert(
            id.clone(),
            StoredFile {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                parents: vec![parent_id.to_string()],
                content: content.into(),
            },
        );
        id
    }

    /// Make an existing entry also appear under another folder.
    pub fn link(&self, id: &str, extra_parent_id: &str) {
        let mut state = self.lock();
        if let Some(file) = state.files.get_mut(id) {
            file.parents.push(extra_parent_id.to_string());
        }
    }

    /// Fail the next `times` calls of `operation` on `target`.
    pub fn fail(&self, operation: &str, target: &str, kind: FailureKind, times: u32) {
        self.inject(operation, Some(target.to_string()), kind, times);
    }

    /// Fail the next `times` calls of `operation`, whatever their target.
    pub fn fail_all(&self, operation: &str, kind: FailureKind, times: u32) {
        self.inject(operation, None, kind, times);
    }

    fn inject(&self, operation: &str, target: Option<String>, kind: FailureKind, times: u32) {
        self.lock().failures.push(InjectedFailure {
            operation: operation.to_string(),
            target,
            kind,
            remaining: times,
        });
    }

    /// Children of `folder_id` called `name`.
    pub fn files_named(&self, folder_id: &str, name: &str) -> Vec<RemoteNode> {
        let state = self.lock();
        state
            .files
            .values()
            .filter(|f| f.name == name && f.parents.iter().any(|p| p == folder_id))
            .map(|f| f.node(Some(folder_id)))
            .collect()
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.lock().files.get(id).map(|f| f.content.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().files.contains_key(id)
    }

    /// Number of calls made for `operation`, failed ones included.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(op, _)| op == operation)
            .count()
    }

    /// Targets of every `operation` call, in order.
    pub fn calls_for(&self, operation: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, target)| target.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_node(&self, id: &str) -> DriveResult<RemoteNode> {
        let mut state = self.lock();
        state.enter("get_node", id)?;
        Ok(state.file(id)?.node(None))
    }

    async fn list_children(&self, folder_id: &str) -> DriveResult<Vec<RemoteNode>> {
        let mut state = self.lock();
        state.enter("list_children", folder_id)?;
        state.file(folder_id)?;

        Ok(state
            .files
            .values()
            .filter(|f| f.parents.iter().any(|p| p == folder_id))
            .map(|f| f.node(Some(folder_id)))
            .collect())
    }

    async fn download(&self, file_id: &str) -> DriveResult<Vec<u8>> {
        let mut state = self.lock();
        state.enter("download", file_id)?;
        let file = state.file(file_id)?;
        if file.mime_type.starts_with("application/vnd.google-apps.") {
            return Err(DriveError::BadRequest(
                "Only files with binary content can be downloaded".to_string(),
            ));
        }
        Ok(file.content.clone())
    }

    async fn export(&self, file_id: &str, _mime_type: &str) -> DriveResult<Vec<u8>> {
        let mut state = self.lock();
        state.enter("export", file_id)?;
        let file = state.file(file_id)?;
        if file.mime_type != GOOGLE_DOC_MIME {
            return Err(DriveError::BadRequest(
                "Export only supports Docs Editors files".to_string(),
            ));
        }
        Ok(file.content.clone())
    }

    async fn find_child(&self, folder_id: &str, name: &str) -> DriveResult<Option<RemoteNode>> {
        let mut state = self.lock();
        state.enter("find_child", folder_id)?;
        Ok(state
            .files
            .values()
            .find(|f| f.name == name && f.parents.iter().any(|p| p == folder_id))
            .map(|f| f.node(Some(folder_id))))
    }

    async fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode> {
        let mut state = self.lock();
        state.enter("create_file", folder_id)?;
        state.file(folder_id)?;

        let id = state.allocate_id();
        let file = StoredFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: vec![folder_id.to_string()],
            content: content.to_vec(),
        };
        let node = file.node(Some(folder_id));
        state.files.insert(id, file);
        Ok(node)
    }

    async fn update_file(
        &self,
        file_id: &str,
        _mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode> {
        let mut state = self.lock();
        state.enter("update_file", file_id)?;
        let file = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| DriveError::not_found(format!("File not found: {}", file_id)))?;
        file.content = content.to_vec();
        Ok(file.node(None))
    }

    async fn convert_copy(
        &self,
        file_id: &str,
        target_mime: &str,
        folder_id: &str,
    ) -> DriveResult<RemoteNode> {
        let mut state = self.lock();
        state.enter("convert_copy", file_id)?;
        let source_content = state.file(file_id)?.content.clone();

        let id = state.allocate_id();
        let copy = StoredFile {
            id: id.clone(),
            name: converted_copy_name(file_id),
            mime_type: target_mime.to_string(),
            parents: vec![folder_id.to_string()],
            content: source_content,
        };
        let node = copy.node(Some(folder_id));
        state.files.insert(id, copy);
        Ok(node)
    }

    async fn delete(&self, file_id: &str) -> DriveResult<()> {
        let mut state = self.lock();
        state.enter("delete", file_id)?;
        state
            .files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| DriveError::not_found(format!("File not found: {}", file_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;
    use reelstamp_models::NodeKind;

    #[tokio::test]
    async fn test_listing_and_lookup() {
        let store = MemoryStore::new("root");
        let root = store.root_id().to_string();
        store.add_file(&root, "a.mp4", "video/mp4", b"v".to_vec());
        store.add_folder(&root, "sub");

        let children = store.list_children(&root).await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().any(|n| n.kind == NodeKind::Folder));

        let found = store.find_child(&root, "a.mp4").await.unwrap();
        assert_eq!(found.unwrap().size, Some(1));
        assert!(store.find_child(&root, "b.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let store = MemoryStore::new("root");
        let root = store.root_id().to_string();
        store.fail("list_children", &root, FailureKind::Transient, 2);

        assert!(store.list_children(&root).await.unwrap_err().is_transient());
        assert!(store.list_children(&root).await.is_err());
        assert!(store.list_children(&root).await.is_ok());
        assert_eq!(store.call_count("list_children"), 3);
    }

    #[tokio::test]
    async fn test_operation_wide_failure_hits_any_target() {
        let store = MemoryStore::new("root");
        let root = store.root_id().to_string();
        let a = store.add_file(&root, "a.mp4", "video/mp4", b"a".to_vec());
        let b = store.add_file(&root, "b.mp4", "video/mp4", b"b".to_vec());
        store.fail_all("delete", FailureKind::Permanent, 1);

        assert!(!store.delete(&b).await.unwrap_err().is_transient());
        assert!(store.contains(&b));
        store.delete(&a).await.unwrap();
        assert_eq!(store.calls_for("delete"), vec![b, a]);
    }

    #[tokio::test]
    async fn test_convert_copy_then_export() {
        let store = MemoryStore::new("root");
        let root = store.root_id().to_string();
        let docx = store.add_file(
            &root,
            "prompt.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            b"hello".to_vec(),
        );

        assert!(store.export(&docx, "text/plain").await.is_err());

        let copy = store.convert_copy(&docx, GOOGLE_DOC_MIME, &root).await.unwrap();
        assert_eq!(store.export(&copy.id, "text/plain").await.unwrap(), b"hello");

        store.delete(&copy.id).await.unwrap();
        assert!(!store.contains(&copy.id));
    }
}
