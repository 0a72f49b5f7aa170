//! Readiness coordination for active providers.
//!
//! A workspace is ready once every provider with the active capability has
//! been told to sync and has reported ready, one after another in
//! declaration order. Later providers may rely on state delivered by
//! earlier ones, so the waits are never run concurrently.

use crate::activation::{ActivationState, SharedReadiness};
use crate::config::ReadinessConfig;
use docsync_core::{ActiveProvider, Result, SyncError, Workspace, WorkspaceId};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

/// Brings `workspace` to the active state.
///
/// Returns immediately if the workspace is already active. Otherwise calls
/// `sync` on each active provider and awaits its readiness before moving on
/// to the next one. Concurrent callers for the same state are serialized,
/// so providers are synced at most once per successful activation.
///
/// On failure the workspace stays inactive and the next call retries the
/// whole sequence from the first active provider.
pub async fn ensure_ready(
    workspace: &Workspace,
    state: &ActivationState,
    config: &ReadinessConfig,
) -> Result<()> {
    if state.is_active() {
        tracing::debug!("workspace {} already active", workspace.id());
        return Ok(());
    }

    let _activation = state.lock_activation().await;
    if state.is_active() {
        tracing::debug!(
            "workspace {} activated by a concurrent caller",
            workspace.id()
        );
        return Ok(());
    }

    let providers: Vec<_> = workspace
        .providers()
        .into_iter()
        .filter(|p| p.active().is_some())
        .collect();

    tracing::info!(
        "activating workspace {} ({} active providers)",
        workspace.id(),
        providers.len()
    );

    for provider in &providers {
        let Some(active) = provider.active() else {
            continue;
        };
        active.sync();
        if let Err(e) = wait_ready(provider.name(), active, config.ready_timeout()).await {
            tracing::warn!("workspace {} activation failed: {}", workspace.id(), e);
            return Err(e);
        }
        tracing::debug!("provider {} ready", provider.name());
    }

    state.mark_active();
    tracing::info!("workspace {} is active", workspace.id());
    Ok(())
}

async fn wait_ready(
    name: &str,
    provider: &dyn ActiveProvider,
    timeout: Option<Duration>,
) -> Result<()> {
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.when_ready())
            .await
            .map_err(|_| SyncError::ReadyTimeout {
                provider: name.to_string(),
                timeout: limit,
            })?,
        None => provider.when_ready().await,
    };

    outcome.map_err(|source| SyncError::ProviderSync {
        provider: name.to_string(),
        source,
    })
}

/// Returns the memoized readiness handle for `workspace`.
///
/// The first call creates the readiness computation; every later call
/// returns a handle to the same computation until it is evicted. A failed
/// computation is only evicted when `config.evict_failed` is set.
pub(crate) fn readiness_handle(
    workspace: Arc<Workspace>,
    state: &Arc<ActivationState>,
    config: &ReadinessConfig,
) -> ReadinessHandle {
    let mut slot = state.readiness_slot();
    if let Some(shared) = slot.as_ref() {
        tracing::debug!("readiness cache hit for workspace {}", workspace.id());
        return ReadinessHandle {
            workspace,
            inner: shared.clone(),
        };
    }

    tracing::debug!("readiness cache miss for workspace {}", workspace.id());
    let shared = readiness_future(
        workspace.id().clone(),
        Arc::downgrade(&workspace),
        Arc::downgrade(state),
        config.clone(),
    )
    .boxed()
    .shared();
    *slot = Some(shared.clone());

    ReadinessHandle {
        workspace,
        inner: shared,
    }
}

// Holds only weak references: the future is stored inside the activation
// state and must not keep either the state or the workspace alive. Every
// handle owns the workspace, so `WorkspaceDropped` only surfaces when the
// computation is polled with no handle left.
async fn readiness_future(
    id: WorkspaceId,
    workspace: Weak<Workspace>,
    state: Weak<ActivationState>,
    config: ReadinessConfig,
) -> Result<()> {
    let (Some(workspace), Some(state)) = (workspace.upgrade(), state.upgrade()) else {
        return Err(SyncError::WorkspaceDropped(id));
    };

    let result = ensure_ready(&workspace, &state, &config).await;
    if result.is_err() && config.evict_failed {
        tracing::debug!(
            "evicting failed readiness future for workspace {}",
            workspace.id()
        );
        *state.readiness_slot() = None;
    }
    result
}

/// Polls `handle` on behalf of a caller that does not keep it between polls.
///
/// The caller's waker joins the workspace's readiness waiters and is woken
/// once the computation settles. On a tokio runtime one task per
/// computation drives it, however often the caller polls. Without a
/// runtime the computation is polled inline through a clone parked in the
/// activation state, so provider progress still wakes the caller.
pub(crate) fn poll_detached(
    handle: ReadinessHandle,
    state: &Arc<ActivationState>,
    cx: &mut Context<'_>,
) -> Poll<Result<Arc<Workspace>>> {
    if let Some(outcome) = handle.peek() {
        return Poll::Ready(outcome);
    }

    state.waiters().register(cx.waker());

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            if state.try_claim_driver() {
                tracing::debug!(
                    "driving readiness of workspace {} in background",
                    handle.workspace().id()
                );
                let state = Arc::clone(state);
                let driven = handle.clone();
                runtime.spawn(async move {
                    // Outcome is read back through the cache.
                    let _ = driven.await;
                    // Release before waking so a woken caller can claim the
                    // driver for a replacement computation.
                    state.release_driver();
                    state.waiters().wake_all();
                });
            }
            match handle.peek() {
                Some(outcome) => Poll::Ready(outcome),
                None => Poll::Pending,
            }
        }
        Err(_) => {
            let waker = futures::task::waker(Arc::clone(state.waiters()));
            let mut parked = state.parked_readiness();
            if !parked
                .as_ref()
                .is_some_and(|shared| shared.ptr_eq(&handle.inner))
            {
                *parked = Some(handle.inner.clone());
            }
            let polled = match parked.as_mut() {
                Some(shared) => Pin::new(shared).poll(&mut Context::from_waker(&waker)),
                None => Poll::Pending,
            };
            if polled.is_ready() {
                *parked = None;
            }
            polled.map(|outcome| outcome.map(|()| Arc::clone(handle.workspace())))
        }
    }
}

/// Shared handle to a workspace's readiness computation.
///
/// All handles for the same workspace drive one underlying computation.
/// Awaiting a handle yields the workspace once its active providers are
/// ready, or the failure every other awaiter observes too.
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
/// lifecycle.register("w1", Arc::new(Workspace::new("w1", Doc::new("root"))));
///
/// let first = lifecycle.get_readiness_handle("w1")?;
/// let second = lifecycle.get_readiness_handle("w1")?;
/// assert!(first.ptr_eq(&second));
///
/// let workspace = first.await?;
/// assert_eq!(workspace.id().as_str(), "w1");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReadinessHandle {
    workspace: Arc<Workspace>,
    inner: SharedReadiness,
}

impl ReadinessHandle {
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Returns true if both handles share the same readiness computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Returns the outcome if the computation has already settled.
    pub fn peek(&self) -> Option<Result<Arc<Workspace>>> {
        self.inner
            .peek()
            .map(|outcome| outcome.clone().map(|()| Arc::clone(&self.workspace)))
    }
}

impl Future for ReadinessHandle {
    type Output = Result<Arc<Workspace>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll(cx)
            .map(|outcome| outcome.map(|()| Arc::clone(&this.workspace)))
    }
}

impl std::fmt::Debug for ReadinessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessHandle")
            .field("workspace", self.workspace.id())
            .field("settled", &self.inner.peek().is_some())
            .finish()
    }
}
