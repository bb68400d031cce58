// crates/plan-gate-core/tests/rules_storage.rs
// ============================================================================
// Module: Public Access Block Rule Tests
// Description: Explicit-false flags and missing public access blocks.
// Purpose: Pin the bucket exposure checks to their reference behavior.
// ============================================================================

//! ## Overview
//! The deny check only fires on flags explicitly set to `false`; the warn
//! signal fires for buckets that no public access block covers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use plan_gate_core::ChangeDocument;
use plan_gate_core::Check;
use plan_gate_core::MissingPublicAccessBlockCheck;
use plan_gate_core::PublicAccessBlockCheck;
use serde_json::Value;
use serde_json::json;

fn document(changes: Value) -> ChangeDocument {
    ChangeDocument::from_value(json!({ "resource_changes": changes })).unwrap()
}

fn block(name: &str, after: Value) -> Value {
    json!({
        "address": format!("aws_s3_bucket_public_access_block.{name}"),
        "type": "aws_s3_bucket_public_access_block",
        "change": {"actions": ["create"], "after": after}
    })
}

fn bucket(name: &str, actions: &[&str]) -> Value {
    json!({
        "address": format!("aws_s3_bucket.{name}"),
        "type": "aws_s3_bucket",
        "change": {"actions": actions, "after": {"bucket": format!("{name}-bucket")}}
    })
}

// ============================================================================
// SECTION: Explicit False Flags
// ============================================================================

#[test]
fn flags_only_explicit_false_values() {
    let doc = document(json!([block(
        "assets",
        json!({
            "bucket": "assets-bucket",
            "block_public_acls": true,
            "block_public_policy": false,
            "restrict_public_buckets": false
        })
    )]));

    let matches = PublicAccessBlockCheck::default().evaluate(&doc);

    assert_eq!(matches.len(), 2);
    assert!(matches[0].message.contains("block_public_policy = false"));
    assert!(matches[0].message.contains("assets-bucket"));
    assert!(matches[1].message.contains("restrict_public_buckets = false"));
    assert_eq!(
        matches[0].resource_address.as_ref().map(|address| address.as_str()),
        Some("aws_s3_bucket_public_access_block.assets")
    );
}

#[test]
fn compliant_block_has_no_matches() {
    let doc = document(json!([block(
        "assets",
        json!({
            "block_public_acls": true,
            "block_public_policy": true,
            "ignore_public_acls": true,
            "restrict_public_buckets": true
        })
    )]));
    assert!(PublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn unknown_or_string_flags_are_not_false() {
    let doc = document(json!([block(
        "assets",
        json!({"block_public_acls": "false", "block_public_policy": null})
    )]));
    assert!(PublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn bucket_label_falls_back_to_resource_name() {
    let doc = document(json!([block("uploads", json!({"ignore_public_acls": false}))]));
    let matches = PublicAccessBlockCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("for bucket uploads sets"));
}

// ============================================================================
// SECTION: Missing Block Signal
// ============================================================================

#[test]
fn bucket_without_block_is_reported() {
    let doc = document(json!([bucket("logs", &["create"])]));
    let matches = MissingPublicAccessBlockCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].message, "bucket aws_s3_bucket.logs has no public access block");
}

#[test]
fn block_with_same_resource_name_covers_bucket() {
    let doc = document(json!([bucket("logs", &["create"]), block("logs", json!({}))]));
    assert!(MissingPublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn block_naming_bucket_covers_it() {
    let doc = document(json!([
        bucket("logs", &["create"]),
        block("logs_pab", json!({"bucket": "logs-bucket"}))
    ]));
    assert!(MissingPublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn deleted_buckets_are_ignored() {
    let doc = document(json!([{
        "address": "aws_s3_bucket.old",
        "type": "aws_s3_bucket",
        "change": {"actions": ["delete"], "before": {"bucket": "old"}, "after": null}
    }]));
    assert!(MissingPublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn known_block_target_overrides_matching_resource_name() {
    let doc = document(json!([
        bucket("logs", &["create"]),
        block("logs", json!({"bucket": "audit-bucket"}))
    ]));
    let matches = MissingPublicAccessBlockCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert_eq!(
        matches[0].resource_address.as_ref().map(|address| address.as_str()),
        Some("aws_s3_bucket.logs")
    );
}

#[test]
fn resource_name_match_requires_same_module() {
    let doc = document(json!([
        {
            "address": "module.archive.aws_s3_bucket.logs",
            "type": "aws_s3_bucket",
            "change": {"actions": ["create"], "after": {}}
        },
        block("logs", json!({}))
    ]));
    let matches = MissingPublicAccessBlockCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("module.archive.aws_s3_bucket.logs"));
}

#[test]
fn resource_name_match_inside_one_module_covers_bucket() {
    let doc = document(json!([
        {
            "address": "module.archive.aws_s3_bucket.logs",
            "type": "aws_s3_bucket",
            "change": {"actions": ["create"], "after": {}}
        },
        {
            "address": "module.archive.aws_s3_bucket_public_access_block.logs",
            "type": "aws_s3_bucket_public_access_block",
            "change": {"actions": ["create"], "after": {}}
        }
    ]));
    assert!(MissingPublicAccessBlockCheck::default().evaluate(&doc).is_empty());
}
