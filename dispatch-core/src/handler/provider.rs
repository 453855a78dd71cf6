//! Provider handlers - choose the implementation that performs an action on
//! a subject

use std::sync::Arc;

use crate::context::{Attributes, Subject};
use crate::error::{DispatchError, HookError, Result};
use crate::filter::{AttributeFilter, FilterOptions, Normalizer};

use super::criteria::parse_spec;
use super::{Handler, HandlerKind, Implementation, MatchCriteria, Specificity};

/// Everything a provider handler is evaluated against
#[derive(Clone, Copy)]
pub struct ProviderQuery<'a> {
    /// Node attributes
    pub context: &'a dyn Attributes,
    /// The subject being acted on
    pub subject: &'a dyn Subject,
    /// Requested action, e.g. `create`
    pub action: &'a str,
}

impl<'a> ProviderQuery<'a> {
    /// Bundle the three query parts
    pub fn new(context: &'a dyn Attributes, subject: &'a dyn Subject, action: &'a str) -> Self {
        Self {
            context,
            subject,
            action,
        }
    }
}

/// A provider implementation plus the conditions under which it applies
#[derive(Debug, Clone)]
pub struct ProviderHandler {
    produced_type: Arc<dyn Implementation>,
    criteria: MatchCriteria,
    subject_type_filter: Option<AttributeFilter>,
    action_filter: Option<AttributeFilter>,
    overrides_provides_check: bool,
    overrides_supports_check: bool,
    specificity: Specificity,
}

impl ProviderHandler {
    /// Create a handler, deriving its specificity from the criteria and hooks
    pub fn new(
        produced_type: Arc<dyn Implementation>,
        criteria: MatchCriteria,
        subject_type_filter: Option<AttributeFilter>,
        action_filter: Option<AttributeFilter>,
    ) -> Self {
        let overrides_provides_check = produced_type.as_provides_check().is_some();
        let overrides_supports_check = produced_type.as_supports_check().is_some();

        let specificity = Specificity::new(
            [
                action_filter.is_some(),
                subject_type_filter.is_some(),
                overrides_supports_check,
            ]
            .into_iter()
            .chain(criteria.base_specificity())
            .chain([overrides_provides_check]),
        );

        Self {
            produced_type,
            criteria,
            subject_type_filter,
            action_filter,
            overrides_provides_check,
            overrides_supports_check,
            specificity,
        }
    }

    /// Subject type filter, if any
    pub fn subject_type_filter(&self) -> Option<&AttributeFilter> {
        self.subject_type_filter.as_ref()
    }

    /// Action filter, if any
    pub fn action_filter(&self) -> Option<&AttributeFilter> {
        self.action_filter.as_ref()
    }

    /// Whether the implementation has an applicability hook
    pub fn overrides_provides_check(&self) -> bool {
        self.overrides_provides_check
    }

    /// Whether the implementation has a capability hook
    pub fn overrides_supports_check(&self) -> bool {
        self.overrides_supports_check
    }

    fn hook_failed(&self, hook: &'static str) -> impl FnOnce(HookError) -> DispatchError + '_ {
        move |source| DispatchError::HookFailed {
            hook,
            implementation: self.implementation_name().to_string(),
            source,
        }
    }
}

impl Handler for ProviderHandler {
    type Query<'a> = ProviderQuery<'a>;

    const KIND: HandlerKind = HandlerKind::Provider;

    fn from_options(
        _key: &str,
        produced_type: Arc<dyn Implementation>,
        options: &FilterOptions,
    ) -> Result<Self> {
        let criteria = MatchCriteria::from_options(options)?;

        let subject_type_filter =
            parse_spec("subject_type", options.subject_type.as_ref(), Normalizer::Exact)?;
        let action_filter = parse_spec("action", options.action.as_ref(), Normalizer::Exact)?;

        Ok(ProviderHandler::new(
            produced_type,
            criteria,
            subject_type_filter,
            action_filter,
        ))
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

    fn applies(&self, query: Self::Query<'_>) -> Result<bool> {
        if let Some(filter) = &self.subject_type_filter {
            if !filter.matches(Some(query.subject.type_name())) {
                return Ok(false);
            }
        }

        if let Some(filter) = &self.action_filter {
            if !filter.matches(Some(query.action)) {
                return Ok(false);
            }
        }

        if !self
            .criteria
            .matches(query.context)
            .map_err(self.hook_failed("custom_predicate"))?
        {
            return Ok(false);
        }

        if self.overrides_supports_check {
            if let Some(check) = self.produced_type.as_supports_check() {
                if !check
                    .supports(query.subject, query.action)
                    .map_err(self.hook_failed("supports"))?
                {
                    return Ok(false);
                }
            }
        }

        if self.overrides_provides_check {
            if let Some(check) = self.produced_type.as_provides_check() {
                return check
                    .provides(query.context, query.subject)
                    .map_err(self.hook_failed("provides"));
            }
        }

        Ok(true)
    }
}
