//! Common test utilities for integration tests.
//!
//! Reuses the crate's recording mock providers and wires up log output
//! (`RUST_LOG=docsync_lifecycle=debug cargo test` to see it).

#![allow(dead_code)] // Not every test binary uses every helper

#[path = "../../src/test_utils.rs"]
mod test_utils;

pub(crate) use test_utils::{CallLog, Gate, MockProvider, shared};

use docsync_core::{Doc, Workspace};
use docsync_lifecycle::WorkspaceLifecycle;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once per test binary.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Builds and registers a workspace whose root document is `{id}-doc`.
pub(crate) fn register(
    lifecycle: &WorkspaceLifecycle,
    id: &str,
    providers: Vec<Arc<dyn docsync_core::Provider>>,
) -> Arc<Workspace> {
    let workspace = Arc::new(Workspace::with_providers(
        id,
        Doc::new(format!("{id}-doc")),
        providers,
    ));
    lifecycle.register(id, Arc::clone(&workspace));
    workspace
}

pub(crate) fn sorted(mut calls: Vec<String>) -> Vec<String> {
    calls.sort();
    calls
}
