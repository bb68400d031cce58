// crates/plan-gate-core/src/rules/mod.rs
// ============================================================================
// Module: Plan Gate Rule Checks
// Description: Pure, total predicates over change documents.
// Purpose: Turn declarative check specs into rule matches.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Every check is a pure function from a read-only [`ChangeDocument`] to a
//! list of [`CheckMatch`]es. Checks never fail: values of the wrong shape,
//! missing attributes, and undecodable nested documents all read as "does
//! not match" so one odd resource cannot abort evaluation of the rest.
//! The engine stamps rule id, severity, and remediation onto each match.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod attribute;
pub mod iam_wildcard;
pub mod open_ingress;
pub mod public_access_block;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::ChangeDocument;
use crate::core::CheckSpec;
use crate::core::ResourceAddress;

// ============================================================================
// SECTION: Check Contract
// ============================================================================

/// One raw match produced by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMatch {
    /// Offending resource, if any.
    pub resource_address: Option<ResourceAddress>,
    /// Human-readable message.
    pub message: String,
}

impl CheckMatch {
    /// Creates a match tied to a resource.
    #[must_use]
    pub fn at(address: &ResourceAddress, message: impl Into<String>) -> Self {
        Self {
            resource_address: Some(address.clone()),
            message: message.into(),
        }
    }
}

/// Pure predicate over a change document.
pub trait Check {
    /// Evaluates the check. Must be total and deterministic.
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch>;
}

impl Check for CheckSpec {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        match self {
            Self::PublicAccessBlock(check) => check.evaluate(document),
            Self::MissingPublicAccessBlock(check) => check.evaluate(document),
            Self::OpenIngress(check) => check.evaluate(document),
            Self::IamWildcard(check) => check.evaluate(document),
            Self::Attribute(check) => check.evaluate(document),
        }
    }
}

// ============================================================================
// SECTION: Value Helpers
// ============================================================================

/// Reads a port number from an integer or numeric string.
pub(crate) fn value_as_port(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a string or array of strings; other shapes yield nothing.
pub(crate) fn value_as_strings(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(text)) => vec![text.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Returns true when `value` is `wildcard` or an array containing it.
pub(crate) fn is_or_contains(value: Option<&Value>, wildcard: &str) -> bool {
    value_as_strings(value).contains(&wildcard)
}
