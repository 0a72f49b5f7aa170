//! Per-workspace activation state.
//!
//! Activation state is kept in a side table keyed by workspace identity
//! (the `Arc` allocation), never by workspace id, so a workspace replaced
//! in the registry under the same id starts from a clean state.

use dashmap::DashMap;
use docsync_core::{Result, Workspace};
use futures::future::{BoxFuture, Shared};
use futures::task::ArcWake;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::Waker;

pub(crate) type SharedReadiness = Shared<BoxFuture<'static, Result<()>>>;

/// Callers polling for readiness without awaiting a handle of their own.
///
/// Each distinct waker is stored once; waking the set drains it.
#[derive(Default)]
pub(crate) struct ReadinessWaiters {
    wakers: Mutex<Vec<Waker>>,
}

impl ReadinessWaiters {
    pub(crate) fn register(&self, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn wake_all(&self) {
        let wakers =
            std::mem::take(&mut *self.wakers.lock().unwrap_or_else(PoisonError::into_inner));
        for waker in wakers {
            waker.wake();
        }
    }
}

impl ArcWake for ReadinessWaiters {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.wake_all();
    }
}

/// Mutable lifecycle state of a single workspace.
#[derive(Default)]
pub struct ActivationState {
    /// Set once every active provider reported ready
    active: AtomicBool,
    /// Serializes readiness attempts so active providers sync at most once
    activation_lock: tokio::sync::Mutex<()>,
    /// Memoized readiness computation shared by all requesters
    readiness: Mutex<Option<SharedReadiness>>,
    /// Set while a runtime task drives the readiness computation
    driving: AtomicBool,
    /// Readiness clone polled inline when no runtime is available
    parked: Mutex<Option<SharedReadiness>>,
    waiters: Arc<ReadinessWaiters>,
    passive_engaged: AtomicBool,
}

impl ActivationState {
    /// Returns true once the readiness wait has completed at least once.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true while a passive-effect engagement is live.
    pub fn is_passive_engaged(&self) -> bool {
        self.passive_engaged.load(Ordering::Acquire)
    }

    pub(crate) fn mark_active(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub(crate) async fn lock_activation(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.activation_lock.lock().await
    }

    pub(crate) fn readiness_slot(&self) -> MutexGuard<'_, Option<SharedReadiness>> {
        self.readiness.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn parked_readiness(&self) -> MutexGuard<'_, Option<SharedReadiness>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn waiters(&self) -> &Arc<ReadinessWaiters> {
        &self.waiters
    }

    /// Claims the readiness driver. Returns false if one is already running.
    pub(crate) fn try_claim_driver(&self) -> bool {
        self.driving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release_driver(&self) {
        self.driving.store(false, Ordering::SeqCst);
    }

    /// Claims the passive engagement. Returns false if one is already live.
    pub(crate) fn try_engage_passive(&self) -> bool {
        self.passive_engaged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_passive(&self) {
        self.passive_engaged.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationState")
            .field("active", &self.is_active())
            .field("readiness_cached", &self.readiness_slot().is_some())
            .field("passive_engaged", &self.is_passive_engaged())
            .finish()
    }
}

struct ActivationEntry {
    // Pins the allocation, so the address key cannot be reused while the
    // entry exists.
    workspace: Weak<Workspace>,
    state: Arc<ActivationState>,
}

impl ActivationEntry {
    fn is_dead(&self) -> bool {
        self.workspace.strong_count() == 0
    }
}

/// Side table mapping live workspaces to their [`ActivationState`].
///
/// Entries hold only a weak reference to their workspace. Once the
/// workspace is dropped the entry is dead and is reclaimed by
/// [`ActivationTable::prune`]. Pruning also runs automatically once the
/// table reaches a watermark that starts at the prune threshold and is
/// raised to twice the surviving entry count after every prune.
///
/// # Examples
///
/// ```
/// use docsync_core::{Doc, Workspace};
/// use docsync_lifecycle::activation::ActivationTable;
/// use std::sync::Arc;
///
/// let table = ActivationTable::new(256);
/// let workspace = Arc::new(Workspace::new("w1", Doc::new("root")));
///
/// let state = table.state_for(&workspace);
/// assert!(Arc::ptr_eq(&state, &table.state_for(&workspace)));
///
/// drop(workspace);
/// assert_eq!(table.prune(), 1);
/// assert!(table.is_empty());
/// ```
pub struct ActivationTable {
    entries: DashMap<usize, ActivationEntry>,
    prune_threshold: usize,
    next_prune: AtomicUsize,
}

impl ActivationTable {
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            entries: DashMap::new(),
            prune_threshold,
            next_prune: AtomicUsize::new(prune_threshold),
        }
    }

    /// Returns the state for `workspace`, creating it on first access.
    pub fn state_for(&self, workspace: &Arc<Workspace>) -> Arc<ActivationState> {
        if self.entries.len() >= self.next_prune.load(Ordering::Relaxed) {
            self.prune();
        }

        let entry = self
            .entries
            .entry(identity(workspace))
            .or_insert_with(|| {
                tracing::debug!("creating activation state for workspace {}", workspace.id());
                ActivationEntry {
                    workspace: Arc::downgrade(workspace),
                    state: Arc::new(ActivationState::default()),
                }
            });
        Arc::clone(&entry.state)
    }

    /// Returns the state for `workspace` without creating one.
    pub fn get(&self, workspace: &Arc<Workspace>) -> Option<Arc<ActivationState>> {
        self.entries
            .get(&identity(workspace))
            .map(|entry| Arc::clone(&entry.state))
    }

    /// Removes entries whose workspace has been dropped.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_dead());
        let live = self.entries.len();
        let removed = before.saturating_sub(live);
        self.next_prune.store(
            self.prune_threshold.max(live.saturating_mul(2)),
            Ordering::Relaxed,
        );
        if removed > 0 {
            tracing::debug!("pruned {} activation entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn identity(workspace: &Arc<Workspace>) -> usize {
    Arc::as_ptr(workspace).addr()
}
