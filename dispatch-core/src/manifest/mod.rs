//! Handler manifests - declaring handlers as JSON configuration
//!
//! Manifests let a host describe its handler set as data instead of code.
//! Hooks can't be code here; a manifest entry can only pin the answer an
//! implementation's applicability or capability hook gives.

mod definition;
mod loader;

pub use definition::{HandlerEntry, HandlerManifest, PriorityEntry, MANIFEST_VERSION};
pub use loader::{LoadedManifest, ManifestLoader};
