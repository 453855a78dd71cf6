//! Match criteria - decides whether a whole context is matched

use std::collections::BTreeMap;

use crate::context::{attr, Attributes};
use crate::error::{HookResult, Result};
use crate::filter::{AttributeFilter, CustomPredicate, FilterOptions, FilterSpec, Normalizer};

/// Attribute filters plus an optional custom predicate.
///
/// Absent filters are never stored, so every entry in `filters` constrains
/// matching. Criteria with no filters and no predicate match every context.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    filters: BTreeMap<String, AttributeFilter>,
    custom_predicate: Option<CustomPredicate>,
}

impl MatchCriteria {
    /// Criteria that match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Build criteria from the node-attribute part of `options`.
    ///
    /// `subject_type` and `action` are provider concerns and are ignored here.
    pub fn from_options(options: &FilterOptions) -> Result<Self> {
        let ranked = [
            (attr::PLATFORM, &options.platform, Normalizer::Exact),
            (attr::PLATFORM_VERSION, &options.platform_version, Normalizer::Version),
            (attr::PLATFORM_FAMILY, &options.platform_family, Normalizer::Exact),
            (attr::OS, &options.os, Normalizer::Exact),
        ];

        let mut criteria = MatchCriteria::new();
        for (attribute, spec, normalizer) in ranked {
            let filter = parse_spec(attribute, spec.as_ref(), normalizer)?;
            criteria = criteria.with_filter(attribute, filter);
        }
        for (attribute, spec) in &options.attributes {
            criteria = criteria.with_filter(
                attribute,
                parse_spec(attribute, Some(spec), Normalizer::Exact)?,
            );
        }

        if let Some(predicate) = &options.custom_predicate {
            criteria = criteria.with_predicate(predicate.clone());
        }

        Ok(criteria)
    }

    /// Add a filter; `None` (an absent filter) leaves the criteria unchanged
    pub fn with_filter(
        mut self,
        attribute: impl Into<String>,
        filter: Option<AttributeFilter>,
    ) -> Self {
        if let Some(filter) = filter {
            self.filters.insert(attribute.into(), filter);
        }
        self
    }

    /// Attach a custom predicate, replacing any previous one
    pub fn with_predicate(mut self, predicate: CustomPredicate) -> Self {
        self.custom_predicate = Some(predicate);
        self
    }

    /// The filter on `attribute`, if present
    pub fn filter(&self, attribute: &str) -> Option<&AttributeFilter> {
        self.filters.get(attribute)
    }

    /// Whether `attribute` is filtered
    pub fn has_filter(&self, attribute: &str) -> bool {
        self.filters.contains_key(attribute)
    }

    /// Whether a custom predicate is attached
    pub fn has_custom_predicate(&self) -> bool {
        self.custom_predicate.is_some()
    }

    /// Every filter, in attribute-name order
    pub fn filters(&self) -> impl Iterator<Item = (&str, &AttributeFilter)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every present filter must accept the context's value, then the custom
    /// predicate (if any) must return true. Predicate errors pass through.
    pub fn matches(&self, context: &dyn Attributes) -> HookResult {
        let filters_pass = self
            .filters
            .iter()
            .all(|(attribute, filter)| filter.matches(context.attribute(attribute)));

        if !filters_pass {
            return Ok(false);
        }

        match &self.custom_predicate {
            Some(predicate) => predicate.evaluate(context),
            None => Ok(true),
        }
    }

    /// Presence of the ranked attributes, most significant first:
    /// platform_version, platform, platform_family, os, custom predicate.
    pub(crate) fn base_specificity(&self) -> [bool; 5] {
        [
            self.has_filter(attr::PLATFORM_VERSION),
            self.has_filter(attr::PLATFORM),
            self.has_filter(attr::PLATFORM_FAMILY),
            self.has_filter(attr::OS),
            self.has_custom_predicate(),
        ]
    }
}

pub(crate) fn parse_spec(
    attribute: &str,
    spec: Option<&FilterSpec>,
    normalizer: Normalizer,
) -> Result<Option<AttributeFilter>> {
    match spec {
        Some(spec) => AttributeFilter::parse(attribute, spec.values(), normalizer),
        None => Ok(None),
    }
}
