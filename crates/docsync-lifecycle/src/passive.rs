//! Passive-effect engagement tied to a UI surface's mount lifecycle.
//!
//! Engaging connects every passive provider and every lazy provider (with
//! the workspace's root document id). The returned [`PassiveEffectGuard`]
//! owns the matching teardown; it disconnects exactly the providers
//! captured at engagement time, whether it is released explicitly or
//! dropped.

use crate::activation::ActivationState;
use docsync_core::{DocId, Provider, Result, SyncError, Workspace, WorkspaceId};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;

struct Engagement {
    workspace: WorkspaceId,
    doc: DocId,
    passive: Vec<Arc<dyn Provider>>,
    lazy: Vec<Arc<dyn Provider>>,
    state: Arc<ActivationState>,
}

impl Engagement {
    /// Connects every captured provider.
    ///
    /// On failure the engagement keeps only the providers whose connect
    /// succeeded, so a rollback leaves the failed ones alone.
    async fn connect_all(&mut self) -> Result<()> {
        let results = {
            let mut pending: Vec<BoxFuture<'_, Result<()>>> = Vec::new();

            for provider in &self.passive {
                let name = provider.name();
                pending.push(
                    async move {
                        match provider.passive() {
                            Some(passive) => passive
                                .connect()
                                .await
                                .map_err(|source| connect_error(name, source)),
                            None => Ok(()),
                        }
                    }
                    .boxed(),
                );
            }
            for provider in &self.lazy {
                let name = provider.name();
                let doc = &self.doc;
                pending.push(
                    async move {
                        match provider.lazy() {
                            Some(lazy) => lazy
                                .connect(doc)
                                .await
                                .map_err(|source| connect_error(name, source)),
                            None => Ok(()),
                        }
                    }
                    .boxed(),
                );
            }

            join_all(pending).await
        };

        // join_all keeps input order: passive outcomes first, then lazy.
        let mut connected = results.iter().map(Result::is_ok);
        self.passive.retain(|_| connected.next().unwrap_or(false));
        self.lazy.retain(|_| connected.next().unwrap_or(false));

        first_error(results)
    }

    /// Disconnects every captured provider, even if some of them fail.
    async fn disconnect_all(&self) -> Result<()> {
        let mut pending: Vec<BoxFuture<'_, Result<()>>> = Vec::new();

        for provider in &self.passive {
            if let Some(passive) = provider.passive() {
                let name = provider.name();
                pending.push(
                    async move {
                        passive
                            .disconnect()
                            .await
                            .map_err(|source| disconnect_error(name, source))
                    }
                    .boxed(),
                );
            }
        }
        for provider in &self.lazy {
            if let Some(lazy) = provider.lazy() {
                let name = provider.name();
                let doc = &self.doc;
                pending.push(
                    async move {
                        lazy.disconnect(doc)
                            .await
                            .map_err(|source| disconnect_error(name, source))
                    }
                    .boxed(),
                );
            }
        }

        first_error(join_all(pending).await)
    }

    async fn teardown(self) -> Result<()> {
        let result = self.disconnect_all().await;
        self.state.release_passive();
        match &result {
            Ok(()) => tracing::info!("passive effect released for workspace {}", self.workspace),
            Err(e) => tracing::warn!(
                "passive effect released for workspace {} with error: {}",
                self.workspace,
                e
            ),
        }
        result
    }
}

fn connect_error(provider: &str, source: docsync_core::ProviderError) -> SyncError {
    SyncError::ProviderConnect {
        provider: provider.to_string(),
        source,
    }
}

fn disconnect_error(provider: &str, source: docsync_core::ProviderError) -> SyncError {
    SyncError::ProviderDisconnect {
        provider: provider.to_string(),
        source,
    }
}

fn first_error(results: Vec<Result<()>>) -> Result<()> {
    results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

/// Engages the passive effect for `workspace`.
///
/// If an engagement is already live for this workspace the call does
/// nothing and returns an inert guard. Otherwise the providers to connect
/// are captured and the engagement is recorded before any connect call is
/// awaited, so a guard dropped mid-connect still disconnects them.
///
/// If any connect fails, the providers that did connect are disconnected
/// again, the engagement is cleared and the first connect error is
/// returned. Providers whose connect failed are not disconnected. A guard
/// dropped before the connects settle disconnects every captured provider.
pub(crate) async fn engage(
    workspace: &Workspace,
    state: Arc<ActivationState>,
) -> Result<PassiveEffectGuard> {
    if !state.try_engage_passive() {
        tracing::debug!(
            "passive effect already engaged for workspace {}",
            workspace.id()
        );
        return Ok(PassiveEffectGuard { engagement: None });
    }

    let providers = workspace.providers();
    let passive: Vec<_> = providers
        .iter()
        .filter(|p| p.passive().is_some())
        .cloned()
        .collect();
    let lazy: Vec<_> = providers
        .iter()
        .filter(|p| p.lazy().is_some())
        .cloned()
        .collect();

    tracing::info!(
        "engaging passive effect for workspace {} ({} passive, {} lazy)",
        workspace.id(),
        passive.len(),
        lazy.len()
    );

    let mut guard = PassiveEffectGuard {
        engagement: Some(Engagement {
            workspace: workspace.id().clone(),
            doc: workspace.doc().id.clone(),
            passive,
            lazy,
            state,
        }),
    };

    let connected = match guard.engagement.as_mut() {
        Some(engagement) => engagement.connect_all().await,
        None => Ok(()),
    };

    if let Err(e) = connected {
        tracing::warn!(
            "passive effect for workspace {} failed to connect: {}",
            workspace.id(),
            e
        );
        if let Some(engagement) = guard.engagement.take()
            && let Err(teardown) = engagement.teardown().await
        {
            tracing::warn!("rollback after failed connect also failed: {}", teardown);
        }
        return Err(e);
    }

    Ok(guard)
}

/// Scoped passive-effect engagement.
///
/// Call [`PassiveEffectGuard::release`] when the UI surface unmounts to
/// disconnect and observe disconnect errors. Dropping the guard without
/// releasing it schedules the same teardown on the current tokio runtime,
/// or runs it to completion on the dropping thread when there is none.
#[must_use = "dropping the guard immediately tears the passive effect down"]
pub struct PassiveEffectGuard {
    engagement: Option<Engagement>,
}

impl PassiveEffectGuard {
    /// Returns true if this guard owns a live engagement.
    ///
    /// Guards returned for a duplicate engagement are inert.
    pub fn is_engaged(&self) -> bool {
        self.engagement.is_some()
    }

    /// Disconnects the captured providers and clears the engagement.
    ///
    /// All disconnects are attempted; the first failure is returned. The
    /// engagement is cleared in every case.
    pub async fn release(mut self) -> Result<()> {
        match self.engagement.take() {
            Some(engagement) => engagement.teardown().await,
            None => Ok(()),
        }
    }
}

impl Drop for PassiveEffectGuard {
    fn drop(&mut self) {
        let Some(engagement) = self.engagement.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(
                    "passive effect guard for workspace {} dropped, tearing down in background",
                    engagement.workspace
                );
                runtime.spawn(async move {
                    // Errors are logged by teardown.
                    let _ = engagement.teardown().await;
                });
            }
            Err(_) => {
                tracing::debug!(
                    "passive effect guard for workspace {} dropped outside a runtime, tearing down inline",
                    engagement.workspace
                );
                // Errors are logged by teardown.
                let _ = futures::executor::block_on(engagement.teardown());
            }
        }
    }
}

impl std::fmt::Debug for PassiveEffectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("PassiveEffectGuard");
        if let Some(engagement) = &self.engagement {
            debug
                .field("workspace", &engagement.workspace)
                .field("passive", &engagement.passive.len())
                .field("lazy", &engagement.lazy.len());
        }
        debug.field("engaged", &self.is_engaged()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CallLog, Gate, MockProvider, shared};
    use docsync_core::Doc;

    fn scenario(log: &Arc<CallLog>) -> Arc<Workspace> {
        Arc::new(Workspace::with_providers(
            "W1",
            Doc::new("doc-1"),
            vec![
                MockProvider::new("A", log).with_active().into_dyn(),
                MockProvider::new("B", log)
                    .with_active()
                    .with_passive()
                    .into_dyn(),
                MockProvider::new("C", log).with_passive().into_dyn(),
                MockProvider::new("D", log).with_lazy().into_dyn(),
            ],
        ))
    }

    fn sorted(mut calls: Vec<String>) -> Vec<String> {
        calls.sort();
        calls
    }

    #[tokio::test]
    async fn test_engage_connects_passive_and_lazy() {
        let log = CallLog::new();
        let ws = scenario(&log);
        let state = Arc::new(ActivationState::default());

        let guard = engage(&ws, Arc::clone(&state)).await.unwrap();

        assert!(guard.is_engaged());
        assert!(state.is_passive_engaged());
        assert_eq!(
            sorted(log.calls()),
            ["B.connect", "C.connect", "D.connect(doc-1)"]
        );

        log.clear();
        guard.release().await.unwrap();

        assert!(!state.is_passive_engaged());
        assert_eq!(
            sorted(log.calls()),
            ["B.disconnect", "C.disconnect", "D.disconnect(doc-1)"]
        );
    }

    #[tokio::test]
    async fn test_second_engagement_is_inert() {
        let log = CallLog::new();
        let ws = scenario(&log);
        let state = Arc::new(ActivationState::default());

        let first = engage(&ws, Arc::clone(&state)).await.unwrap();
        let second = engage(&ws, Arc::clone(&state)).await.unwrap();

        assert!(!second.is_engaged());
        assert_eq!(log.count("C.connect"), 1);

        second.release().await.unwrap();
        assert!(state.is_passive_engaged());
        assert_eq!(log.count("C.disconnect"), 0);

        first.release().await.unwrap();
        assert!(!state.is_passive_engaged());
    }

    #[tokio::test]
    async fn test_release_uses_snapshot_from_engagement() {
        let log = CallLog::new();
        let ws = scenario(&log);
        let state = Arc::new(ActivationState::default());

        let guard = engage(&ws, Arc::clone(&state)).await.unwrap();
        ws.remove_provider("C");
        ws.add_provider(MockProvider::new("E", &log).with_passive().into_dyn());
        log.clear();

        guard.release().await.unwrap();

        assert_eq!(
            sorted(log.calls()),
            ["B.disconnect", "C.disconnect", "D.disconnect(doc-1)"]
        );
    }

    #[tokio::test]
    async fn test_disconnect_error_still_clears_engagement() {
        let log = CallLog::new();
        let failing = MockProvider::new("C", &log).with_passive().into_arc();
        failing.set_fail_disconnect(true);
        let ws = Arc::new(Workspace::with_providers(
            "W1",
            Doc::new("doc-1"),
            vec![
                shared(&failing),
                MockProvider::new("D", &log).with_lazy().into_dyn(),
            ],
        ));
        let state = Arc::new(ActivationState::default());

        let guard = engage(&ws, Arc::clone(&state)).await.unwrap();
        let err = guard.release().await.unwrap_err();

        assert!(matches!(err, SyncError::ProviderDisconnect { ref provider, .. } if provider == "C"));
        assert!(!state.is_passive_engaged());
        assert_eq!(log.count("D.disconnect(doc-1)"), 1);
    }

    #[tokio::test]
    async fn test_connect_error_rolls_back() {
        let log = CallLog::new();
        let failing = MockProvider::new("C", &log).with_passive().into_arc();
        failing.set_fail_connect(true);
        let ws = Arc::new(Workspace::with_providers(
            "W1",
            Doc::new("doc-1"),
            vec![
                MockProvider::new("B", &log).with_passive().into_dyn(),
                shared(&failing),
            ],
        ));
        let state = Arc::new(ActivationState::default());

        let err = engage(&ws, Arc::clone(&state)).await.unwrap_err();

        assert!(matches!(err, SyncError::ProviderConnect { ref provider, .. } if provider == "C"));
        assert!(!state.is_passive_engaged());
        assert_eq!(log.count("B.disconnect"), 1);
        assert_eq!(log.count("C.disconnect"), 0);
    }

    #[tokio::test]
    async fn test_connect_error_skips_failed_lazy_provider() {
        let log = CallLog::new();
        let failing = MockProvider::new("D", &log).with_lazy().into_arc();
        failing.set_fail_connect(true);
        let ws = Arc::new(Workspace::with_providers(
            "W1",
            Doc::new("doc-1"),
            vec![
                MockProvider::new("B", &log).with_passive().into_dyn(),
                shared(&failing),
                MockProvider::new("E", &log).with_lazy().into_dyn(),
            ],
        ));
        let state = Arc::new(ActivationState::default());

        let err = engage(&ws, Arc::clone(&state)).await.unwrap_err();

        assert!(matches!(err, SyncError::ProviderConnect { ref provider, .. } if provider == "D"));
        assert_eq!(log.count("B.disconnect"), 1);
        assert_eq!(log.count("E.disconnect(doc-1)"), 1);
        assert_eq!(log.count("D.disconnect(doc-1)"), 0);
        assert!(!state.is_passive_engaged());
    }

    #[tokio::test]
    async fn test_dropped_guard_tears_down_in_background() {
        let log = CallLog::new();
        let ws = scenario(&log);
        let state = Arc::new(ActivationState::default());

        let guard = engage(&ws, Arc::clone(&state)).await.unwrap();
        drop(guard);

        for _ in 0..10 {
            if !state.is_passive_engaged() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(!state.is_passive_engaged());
        assert_eq!(log.count("B.disconnect"), 1);
        assert_eq!(log.count("C.disconnect"), 1);
        assert_eq!(log.count("D.disconnect(doc-1)"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_engagement_still_disconnects() {
        let log = CallLog::new();
        let gate = Gate::closed();
        let ws = Arc::new(Workspace::with_providers(
            "W1",
            Doc::new("doc-1"),
            vec![
                MockProvider::new("B", &log).with_passive().into_dyn(),
                MockProvider::new("slow", &log)
                    .with_passive()
                    .with_gate(&gate)
                    .into_dyn(),
            ],
        ));
        let state = Arc::new(ActivationState::default());

        {
            let mut engaging = tokio_test::task::spawn(engage(&ws, Arc::clone(&state)));
            tokio_test::assert_pending!(engaging.poll());
            assert!(state.is_passive_engaged());
        }
        gate.open();

        for _ in 0..10 {
            if !state.is_passive_engaged() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(!state.is_passive_engaged());
        assert_eq!(log.count("B.disconnect"), 1);
        assert_eq!(log.count("slow.disconnect"), 1);
    }

    #[test]
    fn test_guard_dropped_outside_runtime_disconnects_inline() {
        let log = CallLog::new();
        let ws = scenario(&log);
        let state = Arc::new(ActivationState::default());

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let guard = rt.block_on(engage(&ws, Arc::clone(&state))).unwrap();
        drop(rt);
        log.clear();

        drop(guard);

        assert!(!state.is_passive_engaged());
        assert_eq!(
            sorted(log.calls()),
            ["B.disconnect", "C.disconnect", "D.disconnect(doc-1)"]
        );
    }

    #[test]
    fn test_inert_guard_debug() {
        let guard = PassiveEffectGuard { engagement: None };
        assert!(format!("{guard:?}").contains("engaged: false"));
    }
}
