//! Priority arrays - bulk registration in caller preference order

use std::sync::Arc;

use crate::error::Result;
use crate::filter::FilterOptions;
use crate::handler::{Handler, Implementation};

use super::Registry;

/// Registers an ordered list of handlers so that, among equally specific
/// entries, the first element of the list ends up preferred.
///
/// The registry breaks ties in favour of the most recent registration, so the
/// list is registered back to front.
#[derive(Debug)]
pub struct PriorityMap<'r, H: Handler> {
    registry: &'r Registry<H>,
}

impl<'r, H: Handler> PriorityMap<'r, H> {
    /// Wrap `registry`
    pub fn new(registry: &'r Registry<H>) -> Self {
        Self { registry }
    }

    /// The wrapped registry
    pub fn registry(&self) -> &'r Registry<H> {
        self.registry
    }

    /// Register `handlers` (most preferred first) under `key`
    pub fn apply<I>(&self, key: &str, handlers: I) -> Result<()>
    where
        I: IntoIterator<Item = H>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.registry.register_all(key, handlers.into_iter().rev())
    }

    /// Build one handler per implementation with shared options, then apply.
    ///
    /// Every handler is built before any is registered, so a bad filter
    /// leaves the registry untouched.
    pub fn apply_implementations(
        &self,
        key: &str,
        implementations: impl IntoIterator<Item = Arc<dyn Implementation>>,
        options: &FilterOptions,
    ) -> Result<()> {
        let handlers = implementations
            .into_iter()
            .map(|implementation| H::from_options(key, implementation, options))
            .collect::<Result<Vec<_>>>()?;

        self.apply(key, handlers)
    }

    /// Names of the implementations that would apply to `query`, in order
    pub fn priority_array(&self, key: &str, query: H::Query<'_>) -> Result<Vec<String>> {
        Ok(self
            .registry
            .candidates(key, query)?
            .iter()
            .map(|handler| handler.implementation_name().to_string())
            .collect())
    }
}

impl<H: Handler> Clone for PriorityMap<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: Handler> Copy for PriorityMap<'_, H> {}
