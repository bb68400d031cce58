// crates/plan-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Plan Gate Runtime
// Description: Rule evaluation, gate decisions, and artifact custody.
// Purpose: Drive the pipeline from change document to apply authorization.
// Dependencies: crate::{audit, core, interfaces, rules}
// ============================================================================

//! ## Overview
//! The runtime is deliberately clock-free: timestamps come from the host, so
//! every operation here is deterministic given its inputs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod gate;
pub mod integrity;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::EngineConfig;
pub use engine::EvaluationError;
pub use engine::RuleEngine;
pub use gate::ExitStatus;
pub use gate::GateEvaluator;
pub use gate::GateReport;
pub use gate::GateStatus;
pub use integrity::ApplyGate;
pub use integrity::ArtifactIntegrityTracker;
pub use integrity::ArtifactVerifier;
pub use integrity::DEFAULT_CERTIFICATE_VALIDITY_MS;
pub use integrity::IntegrityError;
pub use integrity::IntegrityState;
pub use integrity::LocalAuthoritySigner;
pub use integrity::TrustRoot;
pub use integrity::VerificationFailure;
pub use integrity::compute_hash;
pub use integrity::sign_artifact;
pub use integrity::sign_digest;
