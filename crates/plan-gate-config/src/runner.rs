// crates/plan-gate-config/src/runner.rs
// ============================================================================
// Module: Gate Runner
// Description: Wires config, policy loading, evaluation, and custody.
// Purpose: Run one gate pass or one verification and map it to an exit status.
// Dependencies: plan-gate-core, time
// ============================================================================

//! ## Overview
//! The runner is the host around the clock-free core. It owns the audit sink,
//! supplies wall-clock timestamps, and turns every failure into a
//! [`RunError`] whose [`RunError::exit_status`] follows the contract:
//! `0` pass, `1` policy or verification rejection, `2` anything that kept
//! the pass from completing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use plan_gate_core::ArtifactIntegrityTracker;
use plan_gate_core::ArtifactSigner;
use plan_gate_core::ArtifactVerifier;
use plan_gate_core::AuditEvent;
use plan_gate_core::AuditLevel;
use plan_gate_core::AuditSink;
use plan_gate_core::ChangeDocument;
use plan_gate_core::EvaluationError;
use plan_gate_core::ExitStatus;
use plan_gate_core::GateEvaluator;
use plan_gate_core::GateReport;
use plan_gate_core::IdentityContext;
use plan_gate_core::IntegrityError;
use plan_gate_core::MalformedInput;
use plan_gate_core::PolicySet;
use plan_gate_core::RuleEngine;
use plan_gate_core::SignedArtifact;
use plan_gate_core::SigningError;
use plan_gate_core::Timestamp;
use plan_gate_core::VerificationFailure;
use plan_gate_core::VerificationResult;
use plan_gate_core::audit::EVENT_ARTIFACT_VERIFIED;
use plan_gate_core::audit::EVENT_GATE_EVALUATED;
use plan_gate_core::audit::EVENT_POLICY_SET_LOADED;
use plan_gate_core::compute_hash;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::ConfigError;
use crate::config::PlanGateConfig;
use crate::loader::PolicyLoadError;
use crate::loader::PolicySetLoader;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// One configured gate host.
pub struct GateRunner {
    /// Loaded policy set.
    policy: PolicySet,
    /// Rule engine.
    engine: RuleEngine,
    /// Artifact verifier.
    verifier: ArtifactVerifier,
    /// Identity pin, if configured.
    expected: Option<IdentityContext>,
    /// Audit sink.
    audit: Box<dyn AuditSink>,
}

impl GateRunner {
    /// Builds a runner from configuration, opening the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the sink, trust root, or policy set cannot
    /// be prepared.
    pub fn from_config(config: &PlanGateConfig) -> Result<Self, RunError> {
        let audit = config.audit.build_sink()?;
        Self::with_audit(config, audit)
    }

    /// Builds a runner from configuration with a caller-supplied sink.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the trust root or policy set cannot be
    /// prepared.
    pub fn with_audit(
        config: &PlanGateConfig,
        audit: Box<dyn AuditSink>,
    ) -> Result<Self, RunError> {
        let verifier = ArtifactVerifier::new(config.trust.trust_root()?);
        let (policy, source) = match &config.policy.dir {
            Some(dir) => {
                let loaded = PolicySetLoader::new().load_dir(dir)?;
                (loaded.policy, format!("{} ({} files)", dir.display(), loaded.files.len()))
            }
            None => (PolicySet::reference(), "builtin reference".to_string()),
        };
        audit.record(
            &AuditEvent::new(EVENT_POLICY_SET_LOADED, AuditLevel::Info)
                .at(now())
                .with("source", source)
                .with("rules", policy.len()),
        );
        Ok(Self {
            policy,
            engine: RuleEngine::new(config.engine.engine_config()),
            verifier,
            expected: config.identity.expected(),
            audit,
        })
    }

    /// Returns the loaded policy set.
    #[must_use]
    pub const fn policy(&self) -> &PolicySet {
        &self.policy
    }

    /// Evaluates plan JSON and returns the gate report.
    ///
    /// A failing verdict is a successful run; inspect
    /// [`GateReport::exit_status`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the plan is malformed or evaluation breaks.
    pub fn evaluate_plan(&self, plan: &[u8]) -> Result<GateReport, RunError> {
        let document = ChangeDocument::from_json_slice(plan)?;
        let findings = self.engine.evaluate(&self.policy, &document)?;
        let report = GateEvaluator::new().report(findings);
        self.audit.record(
            &AuditEvent::new(EVENT_GATE_EVALUATED, AuditLevel::Info)
                .at(now())
                .with("plan_digest", compute_hash(plan).to_string())
                .with("resources", document.len())
                .with("status", if report.verdict.pass { "pass" } else { "fail" })
                .with("deny_count", report.deny_count)
                .with("warn_count", report.warn_count),
        );
        Ok(report)
    }

    /// Signs plan bytes and returns the bundle JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when signing fails or the bundle cannot be
    /// encoded.
    pub fn sign_plan<S: ArtifactSigner + ?Sized>(
        &self,
        plan: &[u8],
        signer: &S,
        identity: Option<&IdentityContext>,
    ) -> Result<Vec<u8>, RunError> {
        let mut tracker = ArtifactIntegrityTracker::new(plan, self.audit.as_ref());
        let signed = tracker.sign(signer, identity, now())?;
        Ok(signed.to_bundle_json()?)
    }

    /// Verifies plan bytes against bundle JSON using the configured pin and
    /// trust root, and authorizes apply.
    ///
    /// A bundle that does not parse as a complete signed artifact is rejected
    /// the same way as one that fails verification.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Verification`] for a rejected artifact or bundle.
    pub fn verify_plan(&self, plan: &[u8], bundle: &[u8]) -> Result<VerificationResult, RunError> {
        let signed = match SignedArtifact::from_bundle_json(bundle) {
            Ok(signed) => signed,
            Err(err) => {
                let result = VerificationResult::rejected(err.to_string());
                self.audit.record(
                    &AuditEvent::new(EVENT_ARTIFACT_VERIFIED, AuditLevel::Error)
                        .at(now())
                        .with("plan_digest", compute_hash(plan).to_string())
                        .with("valid", false)
                        .with("reason", err.to_string()),
                );
                return Err(RunError::Verification(VerificationFailure {
                    result,
                }));
            }
        };
        let mut tracker = ArtifactIntegrityTracker::from_signed(signed, self.audit.as_ref());
        let result = tracker.verify(plan, &self.verifier, self.expected.as_ref())?;
        tracker.authorize_apply()?;
        Ok(result)
    }
}

/// Runs one gate pass from a config file path and maps it to an exit status.
#[must_use]
pub fn run_gate(config_path: Option<&Path>, plan: &[u8]) -> ExitStatus {
    let outcome = PlanGateConfig::load(config_path)
        .map_err(RunError::from)
        .and_then(|config| GateRunner::from_config(&config))
        .and_then(|runner| runner.evaluate_plan(plan));
    match outcome {
        Ok(report) => report.exit_status(),
        Err(err) => err.exit_status(),
    }
}

/// Returns the current wall-clock time in unix milliseconds.
fn now() -> Timestamp {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Aggregate runner failure.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration failed to load.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Policy directory failed to load.
    #[error(transparent)]
    PolicyLoad(#[from] PolicyLoadError),
    /// Plan document is malformed.
    #[error(transparent)]
    Malformed(#[from] MalformedInput),
    /// Rule evaluation could not complete.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// Signing or bundle handling failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// Tracker rejected the operation.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// Artifact failed verification.
    #[error(transparent)]
    Verification(#[from] VerificationFailure),
}

impl RunError {
    /// Maps the failure to the exit-status contract.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Verification(_) => ExitStatus::GateFailure,
            Self::Config(_)
            | Self::PolicyLoad(_)
            | Self::Malformed(_)
            | Self::Evaluation(_)
            | Self::Signing(_)
            | Self::Integrity(_) => ExitStatus::InternalError,
        }
    }
}
