use dashmap::DashMap;
use docsync_core::{Result, SyncError, Workspace, WorkspaceId};
use std::sync::Arc;

/// Registry of live workspaces, keyed by workspace identifier.
///
/// Plain lookup table, reachable only through [`crate::WorkspaceLifecycle`].
/// A resolved workspace may not have finished its initial provider
/// synchronization yet; only the readiness paths resolve through it.
pub(crate) struct WorkspaceRegistry {
    workspaces: DashMap<WorkspaceId, Arc<Workspace>>,
}

impl WorkspaceRegistry {
    /// Create a new empty registry
    pub(crate) fn new() -> Self {
        Self {
            workspaces: DashMap::new(),
        }
    }

    /// Register a workspace under `id`
    ///
    /// An existing mapping for the same id is replaced (last write wins).
    pub(crate) fn register(&self, id: impl Into<WorkspaceId>, workspace: Arc<Workspace>) {
        let id = id.into();
        if let Some(previous) = self.workspaces.insert(id.clone(), workspace) {
            tracing::debug!(
                "replaced workspace {} (previous instance {:p})",
                id,
                Arc::as_ptr(&previous)
            );
        } else {
            tracing::debug!("registered workspace {}", id);
        }
    }

    /// Get the workspace registered under `id`
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no workspace is registered with this id.
    pub(crate) fn resolve(&self, id: &str) -> Result<Arc<Workspace>> {
        self.workspaces
            .get(id)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| SyncError::NotFound(WorkspaceId::from(id)))
    }

    /// Remove the mapping for `id`, returning the workspace if it was registered
    pub(crate) fn unregister(&self, id: &str) -> Option<Arc<Workspace>> {
        let removed = self.workspaces.remove(id).map(|(_, workspace)| workspace);
        if removed.is_some() {
            tracing::debug!("unregistered workspace {}", id);
        }
        removed
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.workspaces.contains_key(id)
    }

    /// Get all registered workspace ids
    pub(crate) fn workspace_ids(&self) -> Vec<WorkspaceId> {
        self.workspaces.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.workspaces.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
