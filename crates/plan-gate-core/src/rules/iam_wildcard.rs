// crates/plan-gate-core/src/rules/iam_wildcard.rs
// ============================================================================
// Module: IAM Wildcard Check
// Description: Wildcard actions and resources in embedded policy documents.
// Purpose: Deny statements granting `*` actions or `Allow` on `*` resources.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Policy documents arrive either as a JSON string (the usual plan shape) or
//! as an inline object. A string that fails to decode is treated as
//! non-matching. `Resource = "*"` only counts under `Effect = "Allow"`; a
//! wildcard under `Deny` narrows access and is left alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;

use serde_json::Map;
use serde_json::Value;

use crate::core::ChangeDocument;
use crate::core::IamWildcardCheck;
use crate::core::ResourceChange;
use crate::rules::Check;
use crate::rules::CheckMatch;
use crate::rules::is_or_contains;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wildcard literal.
const WILDCARD: &str = "*";

// ============================================================================
// SECTION: Check
// ============================================================================

impl Check for IamWildcardCheck {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        let mut out = Vec::new();
        for change in document.resources_of_type(&self.resource_types) {
            if change.is_delete_only() {
                continue;
            }
            let Some(policy) = self.policy_document(change) else {
                continue;
            };
            for (index, statement) in statements(&policy).into_iter().enumerate() {
                let label = statement
                    .get("Sid")
                    .and_then(Value::as_str)
                    .filter(|sid| !sid.is_empty())
                    .map_or_else(|| index.to_string(), str::to_string);
                if is_or_contains(statement.get("Action"), WILDCARD) {
                    out.push(CheckMatch::at(
                        &change.address,
                        format!(
                            "IAM policy {} statement {label} grants all actions (Action = \"*\")",
                            change.address
                        ),
                    ));
                }
                let allows = statement.get("Effect").and_then(Value::as_str) == Some("Allow");
                if allows && is_or_contains(statement.get("Resource"), WILDCARD) {
                    out.push(CheckMatch::at(
                        &change.address,
                        format!(
                            "IAM policy {} statement {label} allows access to all resources \
                             (Resource = \"*\")",
                            change.address
                        ),
                    ));
                }
            }
        }
        out
    }
}

impl IamWildcardCheck {
    /// Returns the decoded policy document, if one is present and decodable.
    fn policy_document<'a>(&self, change: &'a ResourceChange) -> Option<Cow<'a, Value>> {
        let raw = self
            .document_attributes
            .iter()
            .find_map(|name| change.after_attr(name).filter(|value| !value.is_null()))?;
        match raw {
            Value::String(text) => serde_json::from_str(text).ok().map(Cow::Owned),
            Value::Object(_) => Some(Cow::Borrowed(raw)),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns statement objects; a single statement object is accepted.
fn statements(policy: &Value) -> Vec<&Map<String, Value>> {
    match policy.get("Statement") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(statement)) => vec![statement],
        _ => Vec::new(),
    }
}
