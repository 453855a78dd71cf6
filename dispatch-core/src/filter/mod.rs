//! Attribute filters
//!
//! A filter is a black/white list over one attribute's values. Raw values come
//! from registration options (or a manifest); entries prefixed with `!` are
//! exclusions, and `all` accepts everything.
//!
//! ```text
//! ["ubuntu", "!debian"]  ──parse──▶  whitelist: [ubuntu]
//!                                     blacklist: [debian]
//! []                     ──parse──▶  None (no constraint)
//! ```

mod attribute;
mod options;
mod version;

pub use attribute::{AttributeFilter, FilterValue, Normalizer, ALL, EXCLUSION_MARKER};
pub use options::{CustomPredicate, FilterOptions, FilterSpec};
pub use version::{PlatformVersion, VersionConstraint, VersionOp};
