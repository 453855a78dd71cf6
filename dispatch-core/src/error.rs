//! Error types for dispatch operations
//!
//! The taxonomy is narrow:
//! - Construction failures (malformed filters, bad manifests) are reported when a
//!   handler is built or registered, and nothing is partially applied.
//! - Hook failures raised by caller-supplied predicates are propagated as-is,
//!   wrapped so the original error stays reachable through `source()`.
//! - "No such key" and "nothing matched" are not errors at all; lookups return
//!   `None` or an empty list for those.
//!
//! # Example
//!
//! ```rust
//! use dispatch_core::error::{DispatchError, ErrorCategory};
//!
//! fn report(err: &DispatchError) {
//!     match err.category() {
//!         ErrorCategory::Validation => println!("fix the filter: {err}"),
//!         ErrorCategory::Hook => println!("a hook misbehaved: {err}"),
//!         _ => println!("{}: {err}", err.error_code()),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Error type returned by caller-supplied predicates and hooks
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a caller-supplied predicate or hook
pub type HookResult = std::result::Result<bool, HookError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Filter or manifest failed validation
    Validation,
    /// Operation conflicts with registry state
    Conflict,
    /// A caller-supplied hook failed
    Hook,
    /// File system or serialization failure
    External,
}

/// Errors that can occur while building, registering or resolving handlers
#[derive(Error, Debug)]
pub enum DispatchError {
    // ═══════════════════════════════════════════════════════════════════════
    // Filter construction errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A filter value list is malformed
    #[error("Invalid filter for '{attribute}': {reason}")]
    InvalidFilter { attribute: String, reason: String },

    /// A platform_version entry is not a valid version constraint
    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidVersionConstraint { constraint: String, reason: String },

    /// A filter was given to a handler kind that cannot use it
    #[error("Filter '{attribute}' is not supported on {handler_kind} handlers")]
    UnsupportedFilter {
        attribute: String,
        handler_kind: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Registry state errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Registration attempted after the registry was locked
    #[error("Registry is locked; register '{key}' handlers before calling lock()")]
    RegistryLocked { key: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Hook errors (caller-supplied code)
    // ═══════════════════════════════════════════════════════════════════════

    /// A custom predicate or capability hook returned an error
    #[error("{hook} hook failed for '{implementation}': {source}")]
    HookFailed {
        hook: &'static str,
        implementation: String,
        #[source]
        source: HookError,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Manifest errors (configuration loading)
    // ═══════════════════════════════════════════════════════════════════════

    /// Handler manifest is malformed or missing required fields
    #[error("Invalid handler manifest: {reason}")]
    InvalidManifest { reason: String },

    /// A manifest with the same ID was already loaded
    #[error("Manifest already loaded: '{manifest_id}'")]
    ManifestAlreadyLoaded { manifest_id: String },

    /// Manifest version doesn't match the supported version
    #[error("Manifest version mismatch: expected '{expected}', got '{actual}'")]
    ManifestVersionMismatch { expected: String, actual: String },

    /// Failed to read a manifest from disk
    #[error("Failed to load manifest from '{path}': {reason}")]
    ManifestLoadError { path: String, reason: String },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DispatchError {
    /// Shorthand for [`DispatchError::InvalidFilter`]
    pub(crate) fn invalid_filter(attribute: &str, reason: impl Into<String>) -> Self {
        DispatchError::InvalidFilter {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error was raised by caller-supplied code
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, DispatchError::HookFailed { .. })
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            DispatchError::InvalidFilter { .. }
            | DispatchError::InvalidVersionConstraint { .. }
            | DispatchError::UnsupportedFilter { .. }
            | DispatchError::InvalidManifest { .. }
            | DispatchError::ManifestVersionMismatch { .. } => ErrorCategory::Validation,

            DispatchError::RegistryLocked { .. } | DispatchError::ManifestAlreadyLoaded { .. } => {
                ErrorCategory::Conflict
            }

            DispatchError::HookFailed { .. } => ErrorCategory::Hook,

            DispatchError::ManifestLoadError { .. } | DispatchError::JsonError(_) => {
                ErrorCategory::External
            }
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DispatchError::InvalidFilter { .. } => "INVALID_FILTER",
            DispatchError::InvalidVersionConstraint { .. } => "INVALID_VERSION_CONSTRAINT",
            DispatchError::UnsupportedFilter { .. } => "UNSUPPORTED_FILTER",
            DispatchError::RegistryLocked { .. } => "REGISTRY_LOCKED",
            DispatchError::HookFailed { .. } => "HOOK_FAILED",
            DispatchError::InvalidManifest { .. } => "INVALID_MANIFEST",
            DispatchError::ManifestAlreadyLoaded { .. } => "MANIFEST_ALREADY_LOADED",
            DispatchError::ManifestVersionMismatch { .. } => "MANIFEST_VERSION_MISMATCH",
            DispatchError::ManifestLoadError { .. } => "MANIFEST_LOAD_ERROR",
            DispatchError::JsonError(_) => "JSON_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable response object
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
            },
        }
    }
}

/// JSON-serializable error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error body
    pub error: ErrorDetail,
}

/// Error detail for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "INVALID_FILTER")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Broad error class
    pub category: ErrorCategory,
}
