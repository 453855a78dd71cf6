//! Platform version constraints
//!
//! Supports:
//! - Exact match: "7.9" or "= 7.9"
//! - Comparisons: "> 10", ">= 10.04", "< 8", "<= 2012"
//! - Pessimistic: "~> 6.0" (>= 6.0, < 7), "~> 6.1.2" (>= 6.1.2, < 6.2)
//!
//! Versions carry one to three numeric components; missing components compare
//! as zero, so "7" and "7.0.0" are the same version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DispatchError;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("version pattern is valid")
    })
}

fn constraint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(~>|>=|<=|=|>|<)?\s*(\S+)$").expect("constraint pattern is valid")
    })
}

/// A numeric platform version such as "10.04" or "7.9.2009"
#[derive(Debug, Clone, Copy)]
pub struct PlatformVersion {
    parts: [u64; 3],
    /// Number of components actually written
    precision: usize,
}

impl PlatformVersion {
    /// Exclusive upper bound for a pessimistic (`~>`) constraint.
    ///
    /// `None` when the bumped component would overflow; the range is then
    /// open-ended.
    fn pessimistic_ceiling(&self) -> Option<PlatformVersion> {
        let parts = match self.precision {
            3 => [self.parts[0], self.parts[1].checked_add(1)?, 0],
            _ => [self.parts[0].checked_add(1)?, 0, 0],
        };
        Some(PlatformVersion {
            parts,
            precision: self.precision,
        })
    }
}

impl FromStr for PlatformVersion {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DispatchError::InvalidVersionConstraint {
            constraint: s.to_string(),
            reason: reason.to_string(),
        };

        let caps = version_pattern()
            .captures(s.trim())
            .ok_or_else(|| invalid("expected one to three numeric components"))?;

        let mut parts = [0u64; 3];
        let mut precision = 0;
        for (i, part) in parts.iter_mut().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                *part = m
                    .as_str()
                    .parse()
                    .map_err(|_| invalid("version component out of range"))?;
                precision += 1;
            }
        }

        Ok(PlatformVersion { parts, precision })
    }
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for PlatformVersion {}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.parts[..self.precision.max(1)];
        let rendered: Vec<String> = shown.iter().map(u64::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

/// Comparison operator of a [`VersionConstraint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    /// `~>`: at least the operand, below its next significant release
    Pessimistic,
}

impl VersionOp {
    fn as_str(&self) -> &'static str {
        match self {
            VersionOp::Eq => "=",
            VersionOp::Gt => ">",
            VersionOp::Ge => ">=",
            VersionOp::Lt => "<",
            VersionOp::Le => "<=",
            VersionOp::Pessimistic => "~>",
        }
    }
}

/// An operator applied to a platform version, e.g. `>= 10.04`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionConstraint {
    op: VersionOp,
    version: PlatformVersion,
}

impl VersionConstraint {
    /// The comparison operator
    pub fn op(&self) -> VersionOp {
        self.op
    }

    /// The version operand
    pub fn version(&self) -> PlatformVersion {
        self.version
    }

    /// Check whether a concrete version satisfies this constraint
    pub fn includes(&self, candidate: &PlatformVersion) -> bool {
        match self.op {
            VersionOp::Eq => candidate == &self.version,
            VersionOp::Gt => candidate > &self.version,
            VersionOp::Ge => candidate >= &self.version,
            VersionOp::Lt => candidate < &self.version,
            VersionOp::Le => candidate <= &self.version,
            VersionOp::Pessimistic => {
                candidate >= &self.version
                    && self
                        .version
                        .pessimistic_ceiling()
                        .map_or(true, |ceiling| candidate < &ceiling)
            }
        }
    }

    /// Like [`includes`](Self::includes) but for a raw attribute value.
    /// Unparseable values satisfy nothing.
    pub fn includes_str(&self, candidate: &str) -> bool {
        candidate
            .parse::<PlatformVersion>()
            .map(|v| self.includes(&v))
            .unwrap_or(false)
    }
}

impl FromStr for VersionConstraint {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = constraint_pattern().captures(s.trim()).ok_or_else(|| {
            DispatchError::InvalidVersionConstraint {
                constraint: s.to_string(),
                reason: "expected an optional operator followed by a version".to_string(),
            }
        })?;

        let op = match caps.get(1).map(|m| m.as_str()) {
            None | Some("=") => VersionOp::Eq,
            Some(">") => VersionOp::Gt,
            Some(">=") => VersionOp::Ge,
            Some("<") => VersionOp::Lt,
            Some("<=") => VersionOp::Le,
            Some("~>") => VersionOp::Pessimistic,
            Some(other) => {
                return Err(DispatchError::InvalidVersionConstraint {
                    constraint: s.to_string(),
                    reason: format!("unknown operator '{other}'"),
                })
            }
        };

        let version = caps[2]
            .parse::<PlatformVersion>()
            .map_err(|_| DispatchError::InvalidVersionConstraint {
                constraint: s.to_string(),
                reason: format!("'{}' is not a numeric version", &caps[2]),
            })?;

        Ok(VersionConstraint { op, version })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}
