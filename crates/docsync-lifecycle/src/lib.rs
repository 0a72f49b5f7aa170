//! Provider lifecycle coordination for replicated workspaces.
//!
//! Workspaces are synchronized through pluggable providers. This crate
//! decides when those providers run:
//!
//! - **Readiness**: active providers are synced and awaited once, in
//!   declaration order, before a workspace is handed out. Concurrent
//!   requests share a single [`ReadinessHandle`].
//! - **Passive effects**: while a UI surface shows a workspace, its passive
//!   and lazy providers are connected; the [`PassiveEffectGuard`]
//!   disconnects them again when the surface goes away.
//!
//! Per-workspace state is keyed by workspace identity and never keeps a
//! workspace alive.

pub mod activation;
pub mod config;
pub mod lifecycle;
pub mod passive;
pub mod readiness;
mod registry;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use activation::{ActivationState, ActivationTable};
pub use config::{ActivationConfig, ConfigError, LifecycleConfig, ReadinessConfig};
pub use lifecycle::WorkspaceLifecycle;
pub use passive::PassiveEffectGuard;
pub use readiness::{ReadinessHandle, ensure_ready};
