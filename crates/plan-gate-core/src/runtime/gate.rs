// crates/plan-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Plan Gate Gate Evaluation
// Description: Verdict aggregation and exit-status mapping.
// Purpose: Decide pass/fail from findings and report it to automation.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The gate is one fold over the finding sequence: any deny fails it, warns
//! never do. Findings keep their evaluation order in the report. Exit codes
//! separate "the policy rejected the change" from "the tool itself broke".

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::Finding;
use crate::core::Verdict;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;

// ============================================================================
// SECTION: Status Types
// ============================================================================

/// Gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// No deny findings.
    Pass,
    /// At least one deny finding.
    Fail,
}

impl GateStatus {
    /// Maps the outcome to an exit status.
    #[must_use]
    pub const fn exit_status(self) -> ExitStatus {
        match self {
            Self::Pass => ExitStatus::Success,
            Self::Fail => ExitStatus::GateFailure,
        }
    }
}

/// Process exit status contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Gate passed.
    Success,
    /// Gate or verification rejected the artifact.
    GateFailure,
    /// Loading or evaluation could not complete.
    InternalError,
}

impl ExitStatus {
    /// Returns the numeric process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::GateFailure => 1,
            Self::InternalError => 2,
        }
    }
}

// ============================================================================
// SECTION: Gate Evaluator
// ============================================================================

/// Folds findings into a verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateEvaluator;

impl GateEvaluator {
    /// Creates a gate evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Produces a verdict, keeping findings in evaluation order.
    #[must_use]
    pub fn evaluate(&self, findings: Vec<Finding>) -> Verdict {
        Verdict::from_findings(findings)
    }

    /// Produces a full report for consumers.
    #[must_use]
    pub fn report(&self, findings: Vec<Finding>) -> GateReport {
        GateReport::from_verdict(self.evaluate(findings))
    }
}

impl Verdict {
    /// Returns the gate status.
    #[must_use]
    pub const fn status(&self) -> GateStatus {
        if self.pass { GateStatus::Pass } else { GateStatus::Fail }
    }
}

// ============================================================================
// SECTION: Gate Report
// ============================================================================

/// Consumer-facing verdict report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Gate status.
    pub status: GateStatus,
    /// Count of deny findings.
    pub deny_count: usize,
    /// Count of warn findings.
    pub warn_count: usize,
    /// Verdict with ordered findings.
    pub verdict: Verdict,
}

impl GateReport {
    /// Builds a report from a verdict.
    #[must_use]
    pub fn from_verdict(verdict: Verdict) -> Self {
        Self {
            status: verdict.status(),
            deny_count: verdict.denials().count(),
            warn_count: verdict.warnings().count(),
            verdict,
        }
    }

    /// Returns the exit status for the report.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        self.status.exit_status()
    }

    /// Returns the report as canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(self)
    }
}
