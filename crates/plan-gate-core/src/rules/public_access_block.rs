// crates/plan-gate-core/src/rules/public_access_block.rs
// ============================================================================
// Module: Public Access Block Checks
// Description: Storage bucket public access block flags.
// Purpose: Deny explicit `false` flags and flag buckets with no block at all.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! A flag that is absent is not a denial; only an explicit `false` is. The
//! separate missing-block check reports buckets that have no block resource
//! associated with them in the same plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::ChangeDocument;
use crate::core::MissingPublicAccessBlockCheck;
use crate::core::PublicAccessBlockCheck;
use crate::core::ResourceChange;
use crate::rules::Check;
use crate::rules::CheckMatch;

// ============================================================================
// SECTION: Explicit False Flags
// ============================================================================

impl Check for PublicAccessBlockCheck {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        let mut out = Vec::new();
        for change in document.resources_of_type(&self.resource_types) {
            let Some(after) = change.after() else {
                continue;
            };
            let bucket = after
                .get("bucket")
                .and_then(Value::as_str)
                .unwrap_or_else(|| change.address.resource_name());
            for attribute in &self.attributes {
                if after.get(attribute) == Some(&Value::Bool(false)) {
                    out.push(CheckMatch::at(
                        &change.address,
                        format!(
                            "public access block {} for bucket {bucket} sets {attribute} = false",
                            change.address
                        ),
                    ));
                }
            }
        }
        out
    }
}

// ============================================================================
// SECTION: Missing Block Signal
// ============================================================================

impl Check for MissingPublicAccessBlockCheck {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        let blocks: Vec<&ResourceChange> = document
            .resources_of_type(&self.block_types)
            .filter(|block| !block.is_delete_only())
            .collect();
        document
            .resources_of_type(&self.bucket_types)
            .filter(|bucket| !bucket.is_delete_only())
            .filter(|bucket| !blocks.iter().any(|block| block_covers(block, bucket)))
            .map(|bucket| {
                CheckMatch::at(
                    &bucket.address,
                    format!("bucket {} has no public access block", bucket.address),
                )
            })
            .collect()
    }
}

/// Returns true when a block resource targets the bucket.
///
/// A known `bucket` attribute on the block is authoritative. When it is
/// unknown at plan time, a block in the same module sharing the bucket's
/// resource name counts instead.
fn block_covers(block: &ResourceChange, bucket: &ResourceChange) -> bool {
    match block.after_attr("bucket").and_then(Value::as_str) {
        Some(target) => ["bucket", "id"]
            .iter()
            .filter_map(|name| bucket.after_attr(name).and_then(Value::as_str))
            .any(|name| name == target),
        None => {
            block.address.module_path() == bucket.address.module_path()
                && block.address.resource_name() == bucket.address.resource_name()
        }
    }
}
