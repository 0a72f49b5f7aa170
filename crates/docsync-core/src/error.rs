use crate::workspace::WorkspaceId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error reported by a provider implementation.
///
/// Provider failures are shared between every caller awaiting the same
/// readiness computation, so the error is reference counted instead of boxed.
pub type ProviderError = Arc<dyn std::error::Error + Send + Sync>;

/// Wraps any error type into a [`ProviderError`].
///
/// # Examples
///
/// ```
/// use docsync_core::error::provider_error;
///
/// let err = provider_error(std::io::Error::other("socket closed"));
/// assert_eq!(err.to_string(), "socket closed");
/// ```
pub fn provider_error<E>(error: E) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Core error types for docsync.
///
/// Errors are `Clone` because a single readiness failure is observed by
/// every awaiter of the shared readiness future.
///
/// # Examples
///
/// ```
/// use docsync_core::error::{SyncError, Result};
/// use docsync_core::WorkspaceId;
///
/// fn lookup(id: &str) -> Result<()> {
///     Err(SyncError::NotFound(WorkspaceId::from(id)))
/// }
///
/// let err = lookup("w1").unwrap_err();
/// assert_eq!(err.to_string(), "workspace not found: w1");
/// ```
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("workspace not found: {0}")]
    NotFound(WorkspaceId),

    #[error("provider {provider} failed to become ready: {source}")]
    ProviderSync {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("provider {provider} was not ready after {timeout:?}")]
    ReadyTimeout { provider: String, timeout: Duration },

    #[error("provider {provider} failed to connect: {source}")]
    ProviderConnect {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("provider {provider} failed to disconnect: {source}")]
    ProviderDisconnect {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// A cached readiness computation outlived every handle to its workspace.
    ///
    /// Handles keep their workspace alive, so awaiting a handle never
    /// yields this.
    #[error("workspace {0} was dropped before it became ready")]
    WorkspaceDropped(WorkspaceId),
}

impl SyncError {
    /// Returns true if the error came from an active provider's readiness wait.
    pub fn is_readiness_failure(&self) -> bool {
        matches!(self, Self::ProviderSync { .. } | Self::ReadyTimeout { .. })
    }
}

/// Convenience type alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
