// crates/plan-gate-core/tests/rules_iam_wildcard.rs
// ============================================================================
// Module: IAM Wildcard Rule Tests
// Description: Wildcard actions and resources in IAM policy documents.
// Purpose: Verify statement parsing and the Allow-only resource rule.
// ============================================================================

//! ## Overview
//! Policy documents are tested in both string-encoded and inline form.

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
use plan_gate_core::IamWildcardCheck;
use serde_json::Value;
use serde_json::json;

fn policy_document(policy: Value) -> ChangeDocument {
    ChangeDocument::from_value(json!({
        "resource_changes": [{
            "address": "aws_iam_policy.admin",
            "type": "aws_iam_policy",
            "change": {"actions": ["create"], "after": {"name": "admin", "policy": policy}}
        }]
    }))
    .unwrap()
}

fn encoded(statement: Value) -> Value {
    Value::String(json!({"Version": "2012-10-17", "Statement": statement}).to_string())
}

// ============================================================================
// SECTION: Matches
// ============================================================================

#[test]
fn wildcard_action_is_flagged() {
    let doc = policy_document(encoded(json!([
        {"Effect": "Allow", "Action": "*", "Resource": "arn:aws:s3:::bucket/*"}
    ])));
    let matches = IamWildcardCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("Action = \"*\""));
}

#[test]
fn allow_on_all_resources_is_flagged() {
    let doc = policy_document(encoded(json!([
        {"Sid": "ReadAll", "Effect": "Allow", "Action": ["s3:GetObject"], "Resource": "*"}
    ])));
    let matches = IamWildcardCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("statement ReadAll"));
    assert!(matches[0].message.contains("Resource = \"*\""));
}

#[test]
fn deny_on_all_resources_is_not_flagged() {
    let doc = policy_document(encoded(json!([
        {"Effect": "Deny", "Action": ["s3:DeleteBucket"], "Resource": "*"}
    ])));
    assert!(IamWildcardCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn both_wildcards_produce_two_matches() {
    let doc = policy_document(encoded(json!({"Effect": "Allow", "Action": "*", "Resource": "*"})));
    assert_eq!(IamWildcardCheck::default().evaluate(&doc).len(), 2);
}

#[test]
fn wildcard_inside_action_list_is_flagged() {
    let doc = policy_document(json!({
        "Statement": [{
            "Effect": "Allow",
            "Action": ["s3:GetObject", "*"],
            "Resource": "arn:aws:s3:::b"
        }]
    }));
    let matches = IamWildcardCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("statement 0"));
}

#[test]
fn scoped_policy_has_no_matches() {
    let doc = policy_document(encoded(json!([
        {"Effect": "Allow", "Action": ["s3:GetObject"], "Resource": ["arn:aws:s3:::bucket/*"]}
    ])));
    assert!(IamWildcardCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn service_prefixed_wildcard_is_not_a_full_wildcard() {
    let doc = policy_document(encoded(json!([
        {"Effect": "Allow", "Action": "s3:*", "Resource": "arn:aws:s3:::bucket"}
    ])));
    assert!(IamWildcardCheck::default().evaluate(&doc).is_empty());
}

// ============================================================================
// SECTION: Tolerance
// ============================================================================

#[test]
fn undecodable_policy_string_is_non_matching() {
    let doc = policy_document(Value::String("{ not json".to_string()));
    assert!(IamWildcardCheck::default().evaluate(&doc).is_empty());
}

#[test]
fn policy_document_data_source_reads_json_attribute() {
    let doc = ChangeDocument::from_value(json!({
        "resource_changes": [{
            "address": "data.aws_iam_policy_document.ci",
            "type": "aws_iam_policy_document",
            "change": {"actions": ["read"], "after": {
                "json": encoded(json!([{"Effect": "Allow", "Action": "*", "Resource": "*"}]))
            }}
        }]
    }))
    .unwrap();
    assert_eq!(IamWildcardCheck::default().evaluate(&doc).len(), 2);
}

#[test]
fn null_policy_attribute_falls_through_to_json() {
    let doc = ChangeDocument::from_value(json!({
        "resource_changes": [{
            "address": "data.aws_iam_policy_document.ci",
            "type": "aws_iam_policy_document",
            "change": {"actions": ["read"], "after": {
                "policy": null,
                "json": encoded(json!([{"Effect": "Allow", "Action": "*", "Resource": "arn:x"}]))
            }}
        }]
    }))
    .unwrap();
    let matches = IamWildcardCheck::default().evaluate(&doc);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].message.contains("Action = \"*\""));
}

#[test]
fn other_resource_types_are_ignored() {
    let doc = ChangeDocument::from_value(json!({
        "resource_changes": [{
            "address": "aws_s3_bucket_policy.p",
            "type": "aws_s3_bucket_policy",
            "change": {"actions": ["create"], "after": {
                "policy": encoded(json!([{"Effect": "Allow", "Action": "*", "Resource": "*"}]))
            }}
        }]
    }))
    .unwrap();
    assert!(IamWildcardCheck::default().evaluate(&doc).is_empty());
}
