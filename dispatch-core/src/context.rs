//! Runtime context handlers are matched against
//!
//! The attribute store itself belongs to the host application. The core only
//! needs a read-only lookup, expressed by [`Attributes`]. [`NodeContext`] is a
//! plain map-backed implementation used by the manifest loader, the CLI and
//! tests.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Well-known attribute names consulted by the specificity comparator
pub mod attr {
    pub const PLATFORM: &str = "platform";
    pub const PLATFORM_VERSION: &str = "platform_version";
    pub const PLATFORM_FAMILY: &str = "platform_family";
    pub const OS: &str = "os";
}

/// Read-only attribute lookup
pub trait Attributes {
    /// Value of the named attribute, if the node has one
    fn attribute(&self, name: &str) -> Option<&str>;
}

impl Attributes for HashMap<String, String> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Attributes for BTreeMap<String, String> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<T: Attributes + ?Sized> Attributes for &T {
    fn attribute(&self, name: &str) -> Option<&str> {
        (**self).attribute(name)
    }
}

/// Map-backed attribute bag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeContext {
    attributes: BTreeMap<String, String>,
}

impl NodeContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set or replace one attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Attributes for NodeContext {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NodeContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The concrete unit of work a provider is being chosen for
pub trait Subject {
    /// Type identity checked against a provider's subject-type filter
    fn type_name(&self) -> &str;
}

impl Subject for str {
    fn type_name(&self) -> &str {
        self
    }
}

impl Subject for String {
    fn type_name(&self) -> &str {
        self.as_str()
    }
}
