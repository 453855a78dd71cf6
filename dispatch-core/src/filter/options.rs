//! Declarative filter options accepted at registration time

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Attributes;
use crate::error::HookResult;

/// A single value or a list of values, as written in a manifest.
///
/// Entries prefixed with `!` are exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// A single value
    One(String),
    /// A list of values
    Many(Vec<String>),
}

impl FilterSpec {
    /// The raw values, in declaration order
    pub fn values(&self) -> &[String] {
        match self {
            FilterSpec::One(value) => std::slice::from_ref(value),
            FilterSpec::Many(values) => values,
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(value: &str) -> Self {
        FilterSpec::One(value.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(value: String) -> Self {
        FilterSpec::One(value)
    }
}

impl From<Vec<&str>> for FilterSpec {
    fn from(values: Vec<&str>) -> Self {
        FilterSpec::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FilterSpec {
    fn from(values: Vec<String>) -> Self {
        FilterSpec::Many(values)
    }
}

impl<const N: usize> From<[&str; N]> for FilterSpec {
    fn from(values: [&str; N]) -> Self {
        FilterSpec::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

type PredicateFn = dyn Fn(&dyn Attributes) -> HookResult + Send + Sync;

/// Caller-supplied predicate over the whole context
#[derive(Clone)]
pub struct CustomPredicate(Arc<PredicateFn>);

impl CustomPredicate {
    /// Wrap a fallible predicate; its errors reach the caller of `resolve`
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Attributes) -> HookResult + Send + Sync + 'static,
    {
        CustomPredicate(Arc::new(predicate))
    }

    /// Wrap a predicate that cannot fail
    pub fn infallible<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Attributes) -> bool + Send + Sync + 'static,
    {
        CustomPredicate::new(move |ctx| Ok(predicate(ctx)))
    }

    /// Run the predicate against a context
    pub fn evaluate(&self, context: &dyn Attributes) -> HookResult {
        (self.0)(context)
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

/// Filter options for one registration.
///
/// `platform`, `platform_version`, `platform_family` and `os` feed the
/// specificity ranking. `attributes` holds filters on any other node
/// attribute; those constrain matching only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterOptions {
    /// Platform names, e.g. `ubuntu`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<FilterSpec>,

    /// Platform version constraints, e.g. `>= 14.04`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<FilterSpec>,

    /// Platform family names, e.g. `debian`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_family: Option<FilterSpec>,

    /// Operating system names, e.g. `linux`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<FilterSpec>,

    /// Provider only: subject type identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<FilterSpec>,

    /// Provider only: action identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FilterSpec>,

    /// Filters on any other node attribute
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, FilterSpec>,

    /// Code predicate; not serializable
    #[serde(skip)]
    pub custom_predicate: Option<CustomPredicate>,
}

impl FilterOptions {
    /// Options with no filters
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on `platform`
    pub fn platform(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.platform = Some(spec.into());
        self
    }

    /// Filter on `platform_version` constraints
    pub fn platform_version(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.platform_version = Some(spec.into());
        self
    }

    /// Filter on `platform_family`
    pub fn platform_family(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.platform_family = Some(spec.into());
        self
    }

    /// Filter on `os`
    pub fn os(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.os = Some(spec.into());
        self
    }

    /// Filter on the subject's type (providers only)
    pub fn subject_type(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.subject_type = Some(spec.into());
        self
    }

    /// Filter on the requested action (providers only)
    pub fn action(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.action = Some(spec.into());
        self
    }

    /// Filter on an attribute outside the ranked set
    pub fn attribute(mut self, name: impl Into<String>, spec: impl Into<FilterSpec>) -> Self {
        self.attributes.insert(name.into(), spec.into());
        self
    }

    /// Attach a predicate that cannot fail
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Attributes) -> bool + Send + Sync + 'static,
    {
        self.custom_predicate = Some(CustomPredicate::infallible(predicate));
        self
    }

    /// Attach a predicate whose errors abort resolution
    pub fn try_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Attributes) -> HookResult + Send + Sync + 'static,
    {
        self.custom_predicate = Some(CustomPredicate::new(predicate));
        self
    }
}
