use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::provider::Provider;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identifier of a workspace.
    WorkspaceId
);

string_id!(
    /// Identifier of a replicated document.
    DocId
);

/// Root document of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doc {
    pub id: DocId,
}

impl Doc {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self { id: id.into() }
    }
}

/// A replicated workspace and its ordered set of providers.
///
/// Workspaces are shared as `Arc<Workspace>`. Two handles refer to the same
/// workspace only if they point to the same allocation; equal identifiers
/// are not enough.
///
/// # Examples
///
/// ```
/// use docsync_core::{Doc, Workspace};
/// use std::sync::Arc;
///
/// let workspace = Arc::new(Workspace::new("w1", Doc::new("root-doc")));
/// assert_eq!(workspace.id().as_str(), "w1");
/// assert_eq!(workspace.doc().id.as_str(), "root-doc");
/// assert!(workspace.providers().is_empty());
/// ```
pub struct Workspace {
    id: WorkspaceId,
    doc: Doc,
    providers: RwLock<Vec<Arc<dyn Provider>>>,
}

impl Workspace {
    /// Creates a workspace without providers.
    pub fn new(id: impl Into<WorkspaceId>, doc: Doc) -> Self {
        Self::with_providers(id, doc, Vec::new())
    }

    /// Creates a workspace with providers in declaration order.
    pub fn with_providers(
        id: impl Into<WorkspaceId>,
        doc: Doc,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Self {
        Self {
            id: id.into(),
            doc,
            providers: RwLock::new(providers),
        }
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Returns a snapshot of the providers in declaration order.
    ///
    /// Later changes to the provider list do not affect the returned vector.
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends a provider to the end of the list.
    pub fn add_provider(&self, provider: Arc<dyn Provider>) {
        tracing::debug!(
            "adding provider {} to workspace {}",
            provider.name(),
            self.id
        );
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    /// Removes every provider with the given name.
    ///
    /// Returns the number of providers removed.
    pub fn remove_provider(&self, name: &str) -> usize {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = providers.len();
        providers.retain(|p| p.name() != name);
        before - providers.len()
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        f.debug_struct("Workspace")
            .field("id", &self.id)
            .field("doc", &self.doc)
            .field("providers", &names)
            .finish()
    }
}
