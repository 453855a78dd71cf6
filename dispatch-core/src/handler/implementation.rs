//! Produced types and their optional capability hooks

use std::fmt;

use crate::context::{Attributes, Subject};
use crate::error::HookResult;

/// Applicability hook: "can this implementation serve this node and subject?"
pub trait ProvidesCheck: Send + Sync {
    fn provides(&self, context: &dyn Attributes, subject: &dyn Subject) -> HookResult;
}

/// Capability hook: "can this implementation perform this action?"
pub trait SupportsCheck: Send + Sync {
    fn supports(&self, subject: &dyn Subject, action: &str) -> HookResult;
}

/// The concrete implementation a handler produces when selected.
///
/// Capabilities are opt-in. Handlers look them up once, when they are built,
/// and only consult a hook whose presence they recorded.
pub trait Implementation: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn as_provides_check(&self) -> Option<&dyn ProvidesCheck> {
        None
    }

    fn as_supports_check(&self) -> Option<&dyn SupportsCheck> {
        None
    }
}

/// An implementation known only by name, with no hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImplementation {
    name: String,
}

impl NamedImplementation {
    /// Create an implementation named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Implementation for NamedImplementation {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An implementation whose hooks give fixed answers.
///
/// Used for manifest-declared handlers, where hooks cannot be code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredImplementation {
    name: String,
    provides: Option<bool>,
    supports: Option<bool>,
}

impl DeclaredImplementation {
    /// Create an implementation with no hook answers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provides: None,
            supports: None,
        }
    }

    /// Fix the applicability hook's answer; `None` means no hook
    pub fn with_provides(mut self, answer: Option<bool>) -> Self {
        self.provides = answer;
        self
    }

    /// Fix the capability hook's answer; `None` means no hook
    pub fn with_supports(mut self, answer: Option<bool>) -> Self {
        self.supports = answer;
        self
    }
}

impl ProvidesCheck for DeclaredImplementation {
    fn provides(&self, _context: &dyn Attributes, _subject: &dyn Subject) -> HookResult {
        Ok(self.provides.unwrap_or(true))
    }
}

impl SupportsCheck for DeclaredImplementation {
    fn supports(&self, _subject: &dyn Subject, _action: &str) -> HookResult {
        Ok(self.supports.unwrap_or(true))
    }
}

impl Implementation for DeclaredImplementation {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_provides_check(&self) -> Option<&dyn ProvidesCheck> {
        self.provides.map(|_| self as &dyn ProvidesCheck)
    }

    fn as_supports_check(&self) -> Option<&dyn SupportsCheck> {
        self.supports.map(|_| self as &dyn SupportsCheck)
    }
}
