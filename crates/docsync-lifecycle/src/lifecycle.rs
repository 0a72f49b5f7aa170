use crate::activation::ActivationTable;
use crate::config::LifecycleConfig;
use crate::passive::{self, PassiveEffectGuard};
use crate::readiness::{self, ReadinessHandle};
use crate::registry::WorkspaceRegistry;
use docsync_core::{Result, Workspace, WorkspaceId};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::task::{Context, Poll};

static GLOBAL: Lazy<WorkspaceLifecycle> = Lazy::new(WorkspaceLifecycle::default);

/// Coordinates provider activation for every registered workspace.
///
/// Holds the workspace registry, the per-workspace activation state and the
/// lifecycle configuration. Most applications use the process-wide
/// instance returned by [`WorkspaceLifecycle::global`]; tests and embedders
/// that need isolation create their own.
///
/// # Examples
///
/// ```
/// use docsync_core::{Doc, Workspace};
/// use docsync_lifecycle::WorkspaceLifecycle;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> docsync_core::Result<()> {
/// let lifecycle = WorkspaceLifecycle::default();
/// let workspace = Arc::new(Workspace::new("w1", Doc::new("root")));
/// lifecycle.register("w1", Arc::clone(&workspace));
///
/// let ready = lifecycle.get_readiness_handle("w1")?.await?;
/// assert!(lifecycle.is_active(&ready));
///
/// let guard = lifecycle.engage_passive(&ready).await?;
/// assert!(lifecycle.is_passive_engaged(&ready));
/// guard.release().await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkspaceLifecycle {
    registry: WorkspaceRegistry,
    activations: ActivationTable,
    config: LifecycleConfig,
}

impl WorkspaceLifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            registry: WorkspaceRegistry::new(),
            activations: ActivationTable::new(config.activation.prune_threshold),
            config,
        }
    }

    /// Returns the process-wide lifecycle coordinator.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Registers `workspace` under `id`, replacing any previous mapping.
    ///
    /// The replaced instance keeps its own activation state; the new one
    /// starts inactive.
    pub fn register(&self, id: impl Into<WorkspaceId>, workspace: Arc<Workspace>) {
        self.registry.register(id, workspace);
    }

    /// Removes the mapping for `id`, returning the workspace if it was registered.
    pub fn unregister(&self, id: &str) -> Option<Arc<Workspace>> {
        self.registry.unregister(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Get all registered workspace ids
    pub fn workspace_ids(&self) -> Vec<WorkspaceId> {
        self.registry.workspace_ids()
    }

    pub fn workspace_count(&self) -> usize {
        self.registry.len()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Syncs and awaits the active providers of `workspace`, once.
    ///
    /// See [`readiness::ensure_ready`] for ordering and retry semantics.
    pub async fn ensure_ready(&self, workspace: &Arc<Workspace>) -> Result<()> {
        let state = self.activations.state_for(workspace);
        readiness::ensure_ready(workspace, &state, &self.config.readiness).await
    }

    /// Returns the shared readiness handle for the workspace registered as `id`.
    ///
    /// # Errors
    ///
    /// Returns [`docsync_core::SyncError::NotFound`] immediately if `id` is
    /// not registered. Provider failures surface when the handle is awaited.
    pub fn get_readiness_handle(&self, id: &str) -> Result<ReadinessHandle> {
        let workspace = self.registry.resolve(id)?;
        Ok(self.readiness_handle_for(workspace))
    }

    /// Returns the shared readiness handle for an already resolved workspace.
    pub fn readiness_handle_for(&self, workspace: Arc<Workspace>) -> ReadinessHandle {
        let state = self.activations.state_for(&workspace);
        readiness::readiness_handle(workspace, &state, &self.config.readiness)
    }

    /// Suspense-style accessor for render loops.
    ///
    /// Returns `Ready` once the workspace registered as `id` is ready (or
    /// failed). While it is still pending, `cx`'s waker is woken when the
    /// readiness computation settles, so the caller can simply poll again
    /// on wake-up. Repeated polls share one driver: a single task on the
    /// current tokio runtime, or the polls themselves outside a runtime.
    pub fn poll_static_workspace(
        &self,
        id: &str,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Arc<Workspace>>> {
        let workspace = match self.registry.resolve(id) {
            Ok(workspace) => workspace,
            Err(e) => return Poll::Ready(Err(e)),
        };
        let state = self.activations.state_for(&workspace);
        let handle = readiness::readiness_handle(workspace, &state, &self.config.readiness);
        readiness::poll_detached(handle, &state, cx)
    }

    /// Engages the passive effect for `workspace`.
    ///
    /// Hold the returned guard for as long as the UI surface is mounted
    /// and release it on unmount. See [`PassiveEffectGuard`].
    pub async fn engage_passive(&self, workspace: &Arc<Workspace>) -> Result<PassiveEffectGuard> {
        let state = self.activations.state_for(workspace);
        passive::engage(workspace, state).await
    }

    /// Returns true once `workspace` has completed its readiness wait.
    pub fn is_active(&self, workspace: &Arc<Workspace>) -> bool {
        self.activations
            .get(workspace)
            .is_some_and(|state| state.is_active())
    }

    /// Returns true while a passive engagement is live for `workspace`.
    pub fn is_passive_engaged(&self, workspace: &Arc<Workspace>) -> bool {
        self.activations
            .get(workspace)
            .is_some_and(|state| state.is_passive_engaged())
    }

    /// Reclaims activation state of dropped workspaces.
    pub fn prune(&self) -> usize {
        self.activations.prune()
    }
}

impl Default for WorkspaceLifecycle {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}
