//! Handler manifest definition
//!
//! A manifest declares handlers as data:
//!
//! ```json
//! {
//!   "manifest_version": "1.0",
//!   "manifest_id": "core.files",
//!   "resources": [
//!     { "key": "file", "implementation": "File" }
//!   ],
//!   "providers": [
//!     { "key": "file", "implementation": "PosixFile",
//!       "filters": { "os": "!windows", "action": ["create", "delete"] } }
//!   ],
//!   "priorities": [
//!     { "kind": "provider", "key": "service",
//!       "implementations": ["Systemd", "Sysvinit"],
//!       "filters": { "os": "linux" } }
//!   ]
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result};
use crate::filter::FilterOptions;
use crate::handler::{
    DeclaredImplementation, Handler, HandlerKind, Implementation, ProviderHandler, ResourceHandler,
};

/// Current manifest format version
pub const MANIFEST_VERSION: &str = "1.0";

/// One handler declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerEntry {
    /// Registry key, e.g. `file`
    pub key: String,

    /// Implementation name
    pub implementation: String,

    /// Fixed answer of the implementation's applicability hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides_check: Option<bool>,

    /// Fixed answer of the implementation's capability hook (providers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_check: Option<bool>,

    /// Conditions under which the handler applies
    #[serde(default)]
    pub filters: FilterOptions,
}

impl HandlerEntry {
    fn produced_type(&self) -> Arc<dyn Implementation> {
        Arc::new(
            DeclaredImplementation::new(&self.implementation)
                .with_provides(self.provides_check)
                .with_supports(self.supports_check),
        )
    }
}

/// Bulk registration of several implementations, most preferred first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityEntry {
    /// Which registry the entries go to
    pub kind: HandlerKind,

    /// Registry key shared by every entry
    pub key: String,

    /// Implementation names, most preferred first
    pub implementations: Vec<String>,

    /// Conditions shared by every entry
    #[serde(default)]
    pub filters: FilterOptions,
}

impl PriorityEntry {
    fn produced_types(&self) -> impl Iterator<Item = Arc<dyn Implementation>> + '_ {
        self.implementations
            .iter()
            .map(|name| Arc::new(DeclaredImplementation::new(name)) as Arc<dyn Implementation>)
    }
}

/// A complete handler manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerManifest {
    /// Must equal [`MANIFEST_VERSION`]
    pub manifest_version: String,

    /// Unique identifier across loaded manifests
    pub manifest_id: String,

    #[serde(default)]
    pub description: String,

    /// Resource handler declarations
    #[serde(default)]
    pub resources: Vec<HandlerEntry>,

    /// Provider handler declarations
    #[serde(default)]
    pub providers: Vec<HandlerEntry>,

    /// Priority lists, applied after the single declarations
    #[serde(default)]
    pub priorities: Vec<PriorityEntry>,
}

/// Handlers built from a manifest, ready to be registered
#[derive(Debug)]
pub(crate) struct BuiltHandlers {
    resources: Vec<(String, ResourceHandler)>,
    providers: Vec<(String, ProviderHandler)>,
    resource_priorities: Vec<(String, Vec<ResourceHandler>)>,
    provider_priorities: Vec<(String, Vec<ProviderHandler>)>,
}

impl HandlerManifest {
    /// Validate the manifest structure and every filter it declares
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = vec![];

        if self.manifest_version != MANIFEST_VERSION {
            errors.push(format!(
                "Unsupported manifest version: expected {}, got {}",
                MANIFEST_VERSION, self.manifest_version
            ));
        }

        if self.manifest_id.is_empty() {
            errors.push("manifest_id cannot be empty".to_string());
        }

        for (section, entries) in [("resources", &self.resources), ("providers", &self.providers)] {
            for (i, entry) in entries.iter().enumerate() {
                if entry.key.is_empty() {
                    errors.push(format!("{section}[{i}]: key cannot be empty"));
                }
                if entry.implementation.is_empty() {
                    errors.push(format!("{section}[{i}]: implementation cannot be empty"));
                }
            }
        }

        for (i, entry) in self.resources.iter().enumerate() {
            if entry.supports_check.is_some() {
                errors.push(format!(
                    "resources[{i}]: supports_check only applies to providers"
                ));
            }
        }

        for (i, entry) in self.priorities.iter().enumerate() {
            if entry.key.is_empty() {
                errors.push(format!("priorities[{i}]: key cannot be empty"));
            }
            if entry.implementations.is_empty() {
                errors.push(format!("priorities[{i}]: implementations cannot be empty"));
            }
            if entry.implementations.iter().any(String::is_empty) {
                errors.push(format!("priorities[{i}]: implementation names cannot be empty"));
            }
        }

        // Filters are only checked once the structure is sound
        if errors.is_empty() {
            if let Err(e) = self.build() {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build every declared handler without registering any
    pub(crate) fn build(&self) -> Result<BuiltHandlers> {
        let resources = self
            .resources
            .iter()
            .map(|entry| {
                ResourceHandler::from_options(&entry.key, entry.produced_type(), &entry.filters)
                    .map(|handler| (entry.key.clone(), handler))
            })
            .collect::<Result<Vec<_>>>()?;

        let providers = self
            .providers
            .iter()
            .map(|entry| {
                ProviderHandler::from_options(&entry.key, entry.produced_type(), &entry.filters)
                    .map(|handler| (entry.key.clone(), handler))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut resource_priorities = Vec::new();
        let mut provider_priorities = Vec::new();
        for entry in &self.priorities {
            match entry.kind {
                HandlerKind::Resource => {
                    let handlers = build_all::<ResourceHandler>(entry)?;
                    resource_priorities.push((entry.key.clone(), handlers));
                }
                HandlerKind::Provider => {
                    let handlers = build_all::<ProviderHandler>(entry)?;
                    provider_priorities.push((entry.key.clone(), handlers));
                }
            }
        }

        Ok(BuiltHandlers {
            resources,
            providers,
            resource_priorities,
            provider_priorities,
        })
    }

    /// Register every declared handler into `dispatcher`.
    ///
    /// All handlers are built first; a bad filter aborts before anything is
    /// registered. Returns the number of handlers registered.
    pub fn apply(&self, dispatcher: &Dispatcher) -> Result<usize> {
        let count = self.build()?.register(dispatcher)?;
        debug!(manifest_id = %self.manifest_id, handlers = count, "Applied manifest");
        Ok(count)
    }
}

impl BuiltHandlers {
    /// Number of handlers this will register
    pub(crate) fn len(&self) -> usize {
        self.resources.len()
            + self.providers.len()
            + self.resource_priorities.iter().map(|(_, h)| h.len()).sum::<usize>()
            + self.provider_priorities.iter().map(|(_, h)| h.len()).sum::<usize>()
    }

    /// First key that would be refused by a locked registry
    fn locked_key(&self, dispatcher: &Dispatcher) -> Option<&str> {
        if dispatcher.resources().is_locked() {
            let mut keys = self.resources.iter().map(|(key, _)| key);
            let mut priority_keys = self.resource_priorities.iter().map(|(key, _)| key);
            if let Some(key) = keys.next().or_else(|| priority_keys.next()) {
                return Some(key.as_str());
            }
        }

        if dispatcher.providers().is_locked() {
            let mut keys = self.providers.iter().map(|(key, _)| key);
            let mut priority_keys = self.provider_priorities.iter().map(|(key, _)| key);
            if let Some(key) = keys.next().or_else(|| priority_keys.next()) {
                return Some(key.as_str());
            }
        }

        None
    }

    /// Register into `dispatcher`; returns the number of handlers registered
    pub(crate) fn register(self, dispatcher: &Dispatcher) -> Result<usize> {
        if let Some(key) = self.locked_key(dispatcher) {
            return Err(DispatchError::RegistryLocked {
                key: key.to_string(),
            });
        }

        let count = self.len();

        for (key, handler) in self.resources {
            dispatcher.resources().register(key, handler)?;
        }
        for (key, handler) in self.providers {
            dispatcher.providers().register(key, handler)?;
        }
        for (key, handlers) in self.resource_priorities {
            dispatcher.resource_priority().apply(&key, handlers)?;
        }
        for (key, handlers) in self.provider_priorities {
            dispatcher.provider_priority().apply(&key, handlers)?;
        }

        Ok(count)
    }
}

fn build_all<H: Handler>(entry: &PriorityEntry) -> Result<Vec<H>> {
    entry
        .produced_types()
        .map(|produced_type| H::from_options(&entry.key, produced_type, &entry.filters))
        .collect()
}
