//! Handlers - registered candidates plus the rules that select them
//!
//! ## Specificity
//!
//! Handlers in a registry bucket are ordered by how narrowly they constrain
//! applicability. Each handler kind lists boolean criteria from most to least
//! significant; two handlers are compared criterion by criterion and the first
//! difference wins ("has" beats "has not"). If nothing differs they are equally
//! specific and registration order decides.
//!
//! ```text
//! provider:  action ▸ subject_type ▸ supports ▸ platform_version ▸ platform
//!            ▸ platform_family ▸ os ▸ predicate ▸ provides
//! resource:  platform_version ▸ platform ▸ platform_family ▸ os ▸ predicate
//!            ▸ provides
//! ```

mod criteria;
mod implementation;
mod provider;
mod resource;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::FilterOptions;

pub use criteria::MatchCriteria;
pub use implementation::{
    DeclaredImplementation, Implementation, NamedImplementation, ProvidesCheck, SupportsCheck,
};
pub use provider::{ProviderHandler, ProviderQuery};
pub use resource::ResourceHandler;

/// Which handler variant a registry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Answers "which implementation backs this resource name"
    Resource,
    /// Answers "which implementation performs this action on this subject"
    Provider,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Resource => f.write_str("resource"),
            HandlerKind::Provider => f.write_str("provider"),
        }
    }
}

/// Ordered presence flags used to rank handlers.
///
/// Comparison walks both lists in step; the first position where they differ
/// decides. A criterion only one side has (lists of different length) is
/// indeterminate and skipped, so the order is always definite.
#[derive(Debug, Clone)]
pub struct Specificity(Vec<bool>);

impl Specificity {
    /// Build from flags, most significant first
    pub fn new(criteria: impl IntoIterator<Item = bool>) -> Self {
        Specificity(criteria.into_iter().collect())
    }

    pub fn criteria(&self) -> &[bool] {
        &self.0
    }
}

impl PartialEq for Specificity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Specificity {}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.cmp(b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for has in &self.0 {
            f.write_str(if *has { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// A candidate that can be registered and resolved
pub trait Handler: Send + Sync + fmt::Debug + Sized + 'static {
    /// What a caller supplies to ask "does this handler apply?"
    type Query<'a>: Copy;

    const KIND: HandlerKind;

    /// Build a handler from declarative filter options
    fn from_options(
        key: &str,
        produced_type: Arc<dyn Implementation>,
        options: &FilterOptions,
    ) -> Result<Self>;

    /// The implementation this handler yields when it applies
    fn produced_type(&self) -> &Arc<dyn Implementation>;

    /// Node-attribute conditions
    fn criteria(&self) -> &MatchCriteria;

    /// Cached ranking key, computed at construction
    fn specificity(&self) -> &Specificity;

    /// Hook failures surface as [`DispatchError::HookFailed`](crate::DispatchError::HookFailed)
    fn applies(&self, query: Self::Query<'_>) -> Result<bool>;

    fn implementation_name(&self) -> &str {
        self.produced_type().name()
    }

    /// `Greater` means `self` is more specific than `other`
    fn compare_specificity(&self, other: &Self) -> Ordering {
        self.specificity().cmp(other.specificity())
    }
}
