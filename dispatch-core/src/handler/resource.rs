//! Resource handlers - map a resource name to the type that implements it

use std::sync::Arc;

use crate::context::Attributes;
use crate::error::{DispatchError, Result};
use crate::filter::FilterOptions;

use super::{Handler, HandlerKind, Implementation, MatchCriteria, Specificity};

/// A resource implementation plus the node conditions under which it applies
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    name: String,
    produced_type: Arc<dyn Implementation>,
    criteria: MatchCriteria,
    overrides_provides_check: bool,
    specificity: Specificity,
}

impl ResourceHandler {
    /// Create a handler, deriving its specificity from the criteria and hook
    pub fn new(
        name: impl Into<String>,
        produced_type: Arc<dyn Implementation>,
        criteria: MatchCriteria,
    ) -> Self {
        let overrides_provides_check = produced_type.as_provides_check().is_some();
        let specificity = Specificity::new(
            criteria
                .base_specificity()
                .into_iter()
                .chain([overrides_provides_check]),
        );

        Self {
            name: name.into(),
            produced_type,
            criteria,
            overrides_provides_check,
            specificity,
        }
    }

    /// The resource name this handler answers for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the implementation has an applicability hook
    pub fn overrides_provides_check(&self) -> bool {
        self.overrides_provides_check
    }
}

impl Handler for ResourceHandler {
    type Query<'a> = &'a dyn Attributes;

    const KIND: HandlerKind = HandlerKind::Resource;

    fn from_options(
        key: &str,
        produced_type: Arc<dyn Implementation>,
        options: &FilterOptions,
    ) -> Result<Self> {
        let provider_only = [
            ("subject_type", &options.subject_type),
            ("action", &options.action),
        ];
        for (attribute, spec) in provider_only {
            if spec.is_some() {
                return Err(DispatchError::UnsupportedFilter {
                    attribute: attribute.to_string(),
                    handler_kind: Self::KIND.to_string(),
                });
            }
        }

        let criteria = MatchCriteria::from_options(options)?;
        Ok(ResourceHandler::new(key, produced_type, criteria))
    }

    fn produced_type(&self) -> &Arc<dyn Implementation> {
        &self.produced_type
    }

    fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    fn specificity(&self) -> &Specificity {
        &self.specificity
    }

    fn applies(&self, context: Self::Query<'_>) -> Result<bool> {
        let matched = self
            .criteria
            .matches(context)
            .map_err(|source| DispatchError::HookFailed {
                hook: "custom_predicate",
                implementation: self.implementation_name().to_string(),
                source,
            })?;

        if !matched || !self.overrides_provides_check {
            return Ok(matched);
        }

        match self.produced_type.as_provides_check() {
            Some(check) => check
                .provides(context, &self.name)
                .map_err(|source| DispatchError::HookFailed {
                    hook: "provides",
                    implementation: self.implementation_name().to_string(),
                    source,
                }),
            None => Ok(true),
        }
    }
}
