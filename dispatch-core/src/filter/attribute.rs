//! Black/white list matcher for a single attribute

use std::fmt;

use crate::error::{DispatchError, Result};

use super::version::VersionConstraint;

/// Whitelist wildcard that accepts every value
pub const ALL: &str = "all";

/// Prefix that routes a raw value into the blacklist
pub const EXCLUSION_MARKER: char = '!';

/// How raw filter values are turned into comparable entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalizer {
    /// Compare by string equality
    #[default]
    Exact,
    /// Parse each value as a [`VersionConstraint`]
    Version,
}

/// A normalized filter entry
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `all`: accepts any value, present or not
    All,
    /// A literal value
    Exact(String),
    /// A version constraint, e.g. `~> 14.04`
    Version(VersionConstraint),
}

impl FilterValue {
    /// Whether a candidate value satisfies this entry
    fn accepts(&self, candidate: Option<&str>) -> bool {
        match (self, candidate) {
            (FilterValue::All, _) => true,
            (FilterValue::Exact(expected), Some(value)) => expected == value,
            (FilterValue::Version(constraint), Some(value)) => constraint.includes_str(value),
            (_, None) => false,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::All => f.write_str(ALL),
            FilterValue::Exact(value) => f.write_str(value),
            FilterValue::Version(constraint) => write!(f, "{constraint}"),
        }
    }
}

/// Accept/reject rule over one attribute's values.
///
/// Only present filters exist as values: building from an empty source yields
/// `None` rather than an always-matching filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFilter {
    whitelist: Vec<FilterValue>,
    blacklist: Vec<FilterValue>,
}

impl AttributeFilter {
    /// Build a filter from raw values such as `["ubuntu", "!debian"]`.
    ///
    /// Returns `Ok(None)` when `raw` is empty.
    pub fn parse<I, S>(attribute: &str, raw: I, normalizer: Normalizer) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Vec::new();
        let mut blacklist = Vec::new();

        for value in raw {
            let value = value.as_ref().trim();
            if value.is_empty() {
                return Err(DispatchError::invalid_filter(attribute, "empty value"));
            }

            match value.strip_prefix(EXCLUSION_MARKER) {
                Some(excluded) => {
                    let excluded = excluded.trim();
                    if excluded.is_empty() {
                        return Err(DispatchError::invalid_filter(
                            attribute,
                            "bare exclusion marker",
                        ));
                    }
                    if excluded == ALL {
                        return Err(DispatchError::invalid_filter(
                            attribute,
                            "'!all' excludes every value",
                        ));
                    }
                    push_unique(&mut blacklist, normalize(excluded, normalizer)?);
                }
                None => push_unique(&mut whitelist, normalize(value, normalizer)?),
            }
        }

        if whitelist.is_empty() && blacklist.is_empty() {
            return Ok(None);
        }

        Ok(Some(AttributeFilter {
            whitelist,
            blacklist,
        }))
    }

    /// Blacklist first, then whitelist. A missing value can only pass a filter
    /// with an empty whitelist or an `all` entry.
    pub fn matches(&self, value: Option<&str>) -> bool {
        if value.is_some() && self.blacklist.iter().any(|v| v.accepts(value)) {
            return false;
        }

        self.whitelist.is_empty() || self.whitelist.iter().any(|v| v.accepts(value))
    }

    /// Accepted values; empty accepts anything not blacklisted
    pub fn whitelist(&self) -> &[FilterValue] {
        &self.whitelist
    }

    /// Rejected values, checked first
    pub fn blacklist(&self) -> &[FilterValue] {
        &self.blacklist
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .whitelist
            .iter()
            .map(ToString::to_string)
            .chain(self.blacklist.iter().map(|v| format!("{EXCLUSION_MARKER}{v}")))
            .collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

fn normalize(value: &str, normalizer: Normalizer) -> Result<FilterValue> {
    if value == ALL {
        return Ok(FilterValue::All);
    }
    match normalizer {
        Normalizer::Exact => Ok(FilterValue::Exact(value.to_string())),
        Normalizer::Version => value.parse().map(FilterValue::Version),
    }
}

fn push_unique(list: &mut Vec<FilterValue>, value: FilterValue) {
    if !list.contains(&value) {
        list.push(value);
    }
}
