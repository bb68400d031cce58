// crates/plan-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Plan Gate Identifiers
// Description: Opaque identifiers for rules and planned resources.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings on the wire. Rule identifiers must be unique
//! within a policy set; resource addresses must be unique within a change
//! document. Uniqueness is enforced by the owning collection, not the type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Rule identifier within a policy set.
///
/// # Invariants
/// - Opaque UTF-8 string; non-emptiness is checked when a policy set is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Creates a new rule identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RuleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Resource address within a change document (for example `aws_s3_bucket.logs`).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceAddress(String);

impl ResourceAddress {
    /// Creates a new resource address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the trailing resource name segment (`logs` in `aws_s3_bucket.logs`).
    #[must_use]
    pub fn resource_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Returns the module prefix (`module.net` in `module.net.aws_s3_bucket.logs`).
    ///
    /// Root-module resources return an empty string.
    #[must_use]
    pub fn module_path(&self) -> &str {
        let Some((head, _)) = self.0.rsplit_once('.') else {
            return "";
        };
        head.rsplit_once('.').map_or("", |(module, _)| module)
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceAddress {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
