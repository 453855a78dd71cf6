//! # Dispatch Core - specificity-ranked handler dispatch
//!
//! A host registers several candidate implementations under one key, each
//! guarded by filters over node attributes (platform, version, family, OS)
//! and, for providers, over the subject type and action. At lookup time the
//! registry walks the candidates from most to least specific and returns the
//! first one that applies.
//!
//! - **Filters**: white/black lists with a `!` exclusion marker and an `all`
//!   wildcard; `platform_version` entries are version constraints
//! - **Handlers**: resource handlers (which implementation backs a resource
//!   name) and provider handlers (which implementation performs an action)
//! - **Registry**: concurrent, insertion-ordered by specificity, lockable
//! - **Manifests**: the same registrations declared as JSON
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dispatch_core::{Dispatcher, FilterOptions, Handler, NamedImplementation, NodeContext};
//!
//! let dispatcher = Dispatcher::new();
//!
//! dispatcher
//!     .providers()
//!     .register_with(
//!         "service",
//!         Arc::new(NamedImplementation::new("Systemd")),
//!         &FilterOptions::new().platform_family("debian").platform_version(">= 8"),
//!     )
//!     .unwrap();
//! dispatcher
//!     .providers()
//!     .register_with(
//!         "service",
//!         Arc::new(NamedImplementation::new("Sysvinit")),
//!         &FilterOptions::new(),
//!     )
//!     .unwrap();
//! dispatcher.lock();
//!
//! let node = NodeContext::new()
//!     .with("platform_family", "debian")
//!     .with("platform_version", "10.4");
//! let subject = "service".to_string();
//!
//! let chosen = dispatcher
//!     .resolve_provider("service", &node, &subject, "start")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(chosen.implementation_name(), "Systemd");
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handler;
pub mod manifest;
pub mod registry;

// Re-export main types
pub use context::{Attributes, NodeContext, Subject};
pub use dispatcher::Dispatcher;
pub use error::{
    DispatchError, ErrorCategory, ErrorDetail, ErrorResponse, HookError, HookResult, Result,
};
pub use filter::{
    AttributeFilter, CustomPredicate, FilterOptions, FilterSpec, Normalizer, PlatformVersion,
    VersionConstraint,
};
pub use handler::{
    DeclaredImplementation, Handler, HandlerKind, Implementation, MatchCriteria,
    NamedImplementation, ProviderHandler, ProviderQuery, ProvidesCheck, ResourceHandler,
    Specificity, SupportsCheck,
};
pub use manifest::{HandlerManifest, ManifestLoader, MANIFEST_VERSION};
pub use registry::{PriorityMap, Registry, RegistryStats};
