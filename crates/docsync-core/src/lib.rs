//! Core abstractions for docsync.
//!
//! This crate defines the contracts shared by the lifecycle coordinator and
//! by provider implementations (network sync, persistent storage,
//! peer-to-peer transport, ...).
//!
//! # Architecture
//!
//! docsync-core defines:
//! - **Workspace**: identifier, root document, ordered provider list
//! - **Provider traits**: `Provider` plus the `ActiveProvider`,
//!   `PassiveProvider` and `LazyProvider` capabilities
//! - **Error Types**: `SyncError`, shared by every lifecycle operation
//!
//! # Examples
//!
//! Declaring a storage provider that gates readiness:
//!
//! ```
//! use docsync_core::{ActiveProvider, Doc, Provider, ProviderError, Workspace};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Storage;
//!
//! #[async_trait]
//! impl ActiveProvider for Storage {
//!     fn sync(&self) {}
//!
//!     async fn when_ready(&self) -> Result<(), ProviderError> {
//!         Ok(())
//!     }
//! }
//!
//! impl Provider for Storage {
//!     fn name(&self) -> &str {
//!         "storage"
//!     }
//!
//!     fn active(&self) -> Option<&dyn ActiveProvider> {
//!         Some(self)
//!     }
//! }
//!
//! let workspace = Arc::new(Workspace::with_providers(
//!     "w1",
//!     Doc::new("root"),
//!     vec![Arc::new(Storage) as Arc<dyn Provider>],
//! ));
//! assert_eq!(workspace.providers().len(), 1);
//! ```

pub mod error;
pub mod provider;
pub mod workspace;

// Re-export commonly used types
pub use error::{ProviderError, Result, SyncError, provider_error};
pub use provider::{ActiveProvider, LazyProvider, PassiveProvider, Provider};
pub use workspace::{Doc, DocId, Workspace, WorkspaceId};
