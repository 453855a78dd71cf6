//! Handler registry implementation

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{DispatchError, Result};
use crate::filter::FilterOptions;
use crate::handler::{Handler, Implementation};

/// Summary counts for introspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Number of keys with at least one handler
    pub keys: usize,
    /// Handlers across all keys
    pub handlers: usize,
    /// Size of the fullest bucket
    pub largest_bucket: usize,
}

#[derive(Debug)]
struct Inner<H> {
    buckets: BTreeMap<String, Vec<Arc<H>>>,
    locked: bool,
}

impl<H> Default for Inner<H> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            locked: false,
        }
    }
}

/// Ordered map from key to handlers, most specific first.
///
/// Every insertion happens under the write lock, so a concurrent reader sees
/// a bucket either before or after a registration, never in between. Hooks
/// run on a snapshot of the bucket, outside the lock.
#[derive(Debug)]
pub struct Registry<H: Handler> {
    inner: RwLock<Inner<H>>,
}

impl<H: Handler> Default for Registry<H> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl<H: Handler> Registry<H> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handler` into the bucket for `key`.
    ///
    /// The handler lands just ahead of the first entry it ties with or is
    /// more specific than, and at the end if it is less specific than all of
    /// them. Among equals, the latest registration comes first.
    pub fn register(&self, key: impl Into<String>, handler: H) -> Result<Arc<H>> {
        let key = key.into();
        let mut inner = self.inner.write();
        if inner.locked {
            return Err(DispatchError::RegistryLocked { key });
        }

        let handler = Arc::new(handler);
        let bucket = inner.buckets.entry(key.clone()).or_default();
        insert_ordered(&key, bucket, Arc::clone(&handler));
        Ok(handler)
    }

    /// Build a handler from filter options, then register it.
    ///
    /// A malformed filter fails before anything is inserted.
    pub fn register_with(
        &self,
        key: impl Into<String>,
        produced_type: Arc<dyn Implementation>,
        options: &FilterOptions,
    ) -> Result<Arc<H>> {
        let key = key.into();
        let handler = H::from_options(&key, produced_type, options)?;
        self.register(key, handler)
    }

    /// Register several handlers under one write lock, in iteration order
    pub fn register_all<I>(&self, key: impl Into<String>, handlers: I) -> Result<()>
    where
        I: IntoIterator<Item = H>,
    {
        let key = key.into();
        let mut handlers = handlers.into_iter().peekable();
        let mut inner = self.inner.write();
        if inner.locked {
            return Err(DispatchError::RegistryLocked { key });
        }

        // Empty input must not leave an empty bucket behind
        if handlers.peek().is_none() {
            return Ok(());
        }

        let bucket = inner.buckets.entry(key.clone()).or_default();
        for handler in handlers {
            insert_ordered(&key, bucket, Arc::new(handler));
        }
        Ok(())
    }

    /// First handler for `key` that applies to `query`
    pub fn resolve(&self, key: &str, query: H::Query<'_>) -> Result<Option<Arc<H>>> {
        for handler in self.each(key) {
            if handler.applies(query)? {
                trace!(
                    key = key,
                    kind = %H::KIND,
                    implementation = handler.implementation_name(),
                    "Resolved handler"
                );
                return Ok(Some(handler));
            }
        }

        trace!(key = key, kind = %H::KIND, "No handler applies");
        Ok(None)
    }

    /// Every handler for `key` that applies to `query`, in preference order
    pub fn candidates(&self, key: &str, query: H::Query<'_>) -> Result<Vec<Arc<H>>> {
        let mut matched = Vec::new();
        for handler in self.each(key) {
            if handler.applies(query)? {
                matched.push(handler);
            }
        }

        trace!(key = key, kind = %H::KIND, count = matched.len(), "Collected candidates");
        Ok(matched)
    }

    /// Snapshot of every handler for `key`, unfiltered
    pub fn each(&self, key: &str) -> Vec<Arc<H>> {
        self.inner
            .read()
            .buckets
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every bucket, keys in sorted order
    pub fn list(&self) -> Vec<(String, Vec<Arc<H>>)> {
        self.inner
            .read()
            .buckets
            .iter()
            .map(|(key, bucket)| (key.clone(), bucket.clone()))
            .collect()
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().buckets.keys().cloned().collect()
    }

    /// Whether any handler is registered under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().buckets.contains_key(key)
    }

    /// Total number of registered handlers
    pub fn len(&self) -> usize {
        self.inner.read().buckets.values().map(Vec::len).sum()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().buckets.is_empty()
    }

    /// Key and handler counts
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        RegistryStats {
            keys: inner.buckets.len(),
            handlers: inner.buckets.values().map(Vec::len).sum(),
            largest_bucket: inner.buckets.values().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Refuse further registrations
    pub fn lock(&self) {
        let mut inner = self.inner.write();
        if !inner.locked {
            inner.locked = true;
            info!(
                kind = %H::KIND,
                keys = inner.buckets.len(),
                "Registry locked"
            );
        }
    }

    /// Whether [`lock`](Self::lock) has been called
    pub fn is_locked(&self) -> bool {
        self.inner.read().locked
    }

    /// Drop every entry and unlock; meant for test isolation
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.buckets.clear();
        inner.locked = false;
    }
}

fn insert_ordered<H: Handler>(key: &str, bucket: &mut Vec<Arc<H>>, handler: Arc<H>) {
    let position = bucket
        .iter()
        .position(|existing| handler.compare_specificity(existing) != Ordering::Less)
        .unwrap_or(bucket.len());

    debug!(
        key = key,
        kind = %H::KIND,
        implementation = handler.implementation_name(),
        specificity = %handler.specificity(),
        position = position,
        "Registering handler"
    );

    bucket.insert(position, handler);
}
