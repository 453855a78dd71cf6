//! Dispatcher - the registries a host process owns
//!
//! One resource registry and one provider registry, created at startup,
//! populated while configuration loads, then locked.

use std::sync::Arc;

use tracing::info;

use crate::context::{Attributes, Subject};
use crate::error::Result;
use crate::handler::{ProviderHandler, ProviderQuery, ResourceHandler};
use crate::registry::{PriorityMap, Registry};

/// Resource and provider registries for one process
#[derive(Debug, Default)]
pub struct Dispatcher {
    resources: Registry<ResourceHandler>,
    providers: Registry<ProviderHandler>,
}

impl Dispatcher {
    /// Create a dispatcher with two empty, unlocked registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource handler registry
    pub fn resources(&self) -> &Registry<ResourceHandler> {
        &self.resources
    }

    /// Provider handler registry
    pub fn providers(&self) -> &Registry<ProviderHandler> {
        &self.providers
    }

    /// Bulk registration front-end for resources
    pub fn resource_priority(&self) -> PriorityMap<'_, ResourceHandler> {
        PriorityMap::new(&self.resources)
    }

    /// Bulk registration front-end for providers
    pub fn provider_priority(&self) -> PriorityMap<'_, ProviderHandler> {
        PriorityMap::new(&self.providers)
    }

    /// Which implementation backs resource `name` on this node
    pub fn resolve_resource(
        &self,
        name: &str,
        context: &dyn Attributes,
    ) -> Result<Option<Arc<ResourceHandler>>> {
        self.resources.resolve(name, context)
    }

    /// Which provider performs `action` on `subject` on this node
    pub fn resolve_provider(
        &self,
        key: &str,
        context: &dyn Attributes,
        subject: &dyn Subject,
        action: &str,
    ) -> Result<Option<Arc<ProviderHandler>>> {
        self.providers
            .resolve(key, ProviderQuery::new(context, subject, action))
    }

    /// Lock both registries; resolution keeps working
    pub fn lock(&self) {
        self.resources.lock();
        self.providers.lock();
        info!(
            resources = self.resources.len(),
            providers = self.providers.len(),
            "Dispatcher ready"
        );
    }

    /// True once both registries are locked
    pub fn is_locked(&self) -> bool {
        self.resources.is_locked() && self.providers.is_locked()
    }

    /// Clear and unlock both registries
    pub fn clear(&self) {
        self.resources.clear();
        self.providers.clear();
    }
}
