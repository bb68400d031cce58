// crates/plan-gate-core/src/lib.rs
// ============================================================================
// Module: Plan Gate Core
// Description: Policy evaluation and artifact custody for infrastructure plans.
// Purpose: Gate plan changes on declarative rules and verify signed plans before apply.
// Dependencies: serde, serde_json, serde_jcs, sha2, ed25519-dalek, base64, thiserror
// ============================================================================

//! ## Overview
//! Plan Gate reads a normalized change document, applies every rule of a
//! policy set, and folds the findings into a pass/fail verdict. A separate
//! custody path hashes the plan artifact, signs the digest under a short-lived
//! identity certificate, and refuses apply unless the artifact verifies
//! against that signature and the pinned signer identity.
//! Invariants:
//! - Evaluation is deterministic: the same policy set and document always
//!   produce the same ordered findings, whatever the worker count.
//! - Any deny finding fails the gate; warnings never do.
//! - A verification failure is terminal for that artifact.
//!
//! Security posture: plan documents and bundles are untrusted input and are
//! size-limited and validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod rules;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditLevel;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use crate::core::*;
pub use interfaces::ArtifactSigner;
pub use interfaces::SignerOutput;
pub use rules::Check;
pub use rules::CheckMatch;
pub use runtime::ApplyGate;
pub use runtime::ArtifactIntegrityTracker;
pub use runtime::ArtifactVerifier;
pub use runtime::DEFAULT_CERTIFICATE_VALIDITY_MS;
pub use runtime::EngineConfig;
pub use runtime::EvaluationError;
pub use runtime::ExitStatus;
pub use runtime::GateEvaluator;
pub use runtime::GateReport;
pub use runtime::GateStatus;
pub use runtime::IntegrityError;
pub use runtime::IntegrityState;
pub use runtime::LocalAuthoritySigner;
pub use runtime::RuleEngine;
pub use runtime::TrustRoot;
pub use runtime::VerificationFailure;
pub use runtime::compute_hash;
pub use runtime::sign_artifact;
pub use runtime::sign_digest;
