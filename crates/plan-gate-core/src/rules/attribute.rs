// crates/plan-gate-core/src/rules/attribute.rs
// ============================================================================
// Module: Attribute Check
// Description: Generic declarative comparison against post-change attributes.
// Purpose: Let rule files express simple policies without new code.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! The attribute check walks a dotted path into each matching resource's
//! `after` snapshot and reports when the comparator holds. A path that does
//! not resolve reads as "absent", which only `not_exists` treats as a match.
//! Delete-only changes are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::AttributeCheck;
use crate::core::AttributeComparator;
use crate::core::Attributes;
use crate::core::ChangeDocument;
use crate::core::ResourceChange;
use crate::rules::Check;
use crate::rules::CheckMatch;

// ============================================================================
// SECTION: Check
// ============================================================================

impl Check for AttributeCheck {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        document
            .resources_of_type(&self.resource_types)
            .filter(|change| !change.is_delete_only())
            .filter_map(|change| {
                let after = change.after()?;
                let actual = lookup_path(after, &self.path);
                compare(self.comparator, actual, self.value.as_ref())
                    .then(|| CheckMatch::at(&change.address, self.render(change, actual)))
            })
            .collect()
    }
}

impl AttributeCheck {
    /// Renders the match message.
    fn render(&self, change: &ResourceChange, actual: Option<&Value>) -> String {
        let shown = actual.map_or_else(|| "absent".to_string(), Value::to_string);
        self.message.as_ref().map_or_else(
            || format!("{} attribute {} = {shown}", change.address, self.path),
            |template| {
                template
                    .replace("{address}", change.address.as_str())
                    .replace("{path}", &self.path)
                    .replace("{value}", &shown)
            },
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves a dotted path; numeric segments index arrays.
fn lookup_path<'a>(attributes: &'a Attributes, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = attributes.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Applies a comparator; `null` counts as absent.
fn compare(
    comparator: AttributeComparator,
    actual: Option<&Value>,
    expected: Option<&Value>,
) -> bool {
    let actual = actual.filter(|value| !value.is_null());
    match comparator {
        AttributeComparator::Exists => actual.is_some(),
        AttributeComparator::NotExists => actual.is_none(),
        AttributeComparator::Equals => matches!((actual, expected), (Some(a), Some(e)) if a == e),
        AttributeComparator::NotEquals => {
            matches!((actual, expected), (Some(a), Some(e)) if a != e)
        }
        AttributeComparator::InSet => match (actual, expected) {
            (Some(a), Some(Value::Array(set))) => set.contains(a),
            _ => false,
        },
        AttributeComparator::Contains => match (actual, expected) {
            (Some(Value::String(text)), Some(Value::String(needle))) => {
                text.contains(needle.as_str())
            }
            (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
            _ => false,
        },
    }
}
