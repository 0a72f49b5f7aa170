use async_trait::async_trait;

use crate::error::ProviderError;
use crate::workspace::DocId;

/// A unit of synchronization capability attached to a workspace.
///
/// Providers advertise what they can do through three independent
/// capability accessors. Returning `Some` means the capability is present
/// and enabled; any combination is allowed, including none at all.
///
/// # Examples
///
/// ```
/// use docsync_core::{ActiveProvider, Provider, ProviderError};
/// use async_trait::async_trait;
///
/// struct LocalStore;
///
/// #[async_trait]
/// impl ActiveProvider for LocalStore {
///     fn sync(&self) {}
///
///     async fn when_ready(&self) -> Result<(), ProviderError> {
///         Ok(())
///     }
/// }
///
/// impl Provider for LocalStore {
///     fn name(&self) -> &str {
///         "local-store"
///     }
///
///     fn active(&self) -> Option<&dyn ActiveProvider> {
///         Some(self)
///     }
/// }
///
/// let provider = LocalStore;
/// assert!(provider.active().is_some());
/// assert!(provider.passive().is_none());
/// ```
pub trait Provider: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &str;

    /// Readiness-gating capability
    fn active(&self) -> Option<&dyn ActiveProvider> {
        None
    }

    /// Background connection tied to a mounted UI surface
    fn passive(&self) -> Option<&dyn PassiveProvider> {
        None
    }

    /// Connection parameterized by the workspace's root document
    fn lazy(&self) -> Option<&dyn LazyProvider> {
        None
    }
}

/// Provider that must deliver initial state before a workspace is ready.
#[async_trait]
pub trait ActiveProvider: Send + Sync {
    /// Starts synchronization. Must not block; progress is observed
    /// through [`ActiveProvider::when_ready`].
    fn sync(&self);

    /// Resolves once the initial synchronization has completed.
    async fn when_ready(&self) -> Result<(), ProviderError>;
}

/// Provider connected for as long as a UI surface displays the workspace.
#[async_trait]
pub trait PassiveProvider: Send + Sync {
    async fn connect(&self) -> Result<(), ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;
}

/// Provider connected on demand for a specific document.
#[async_trait]
pub trait LazyProvider: Send + Sync {
    async fn connect(&self, doc: &DocId) -> Result<(), ProviderError>;

    async fn disconnect(&self, doc: &DocId) -> Result<(), ProviderError>;
}
