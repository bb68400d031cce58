// crates/plan-gate-core/src/core/finding.rs
// ============================================================================
// Module: Plan Gate Findings
// Description: Rule violation records and gate verdicts.
// Purpose: Carry deny/warn outcomes from rule evaluation to the gate decision.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Deny and warn outcomes share one [`Finding`] type tagged with a
//! [`Severity`], so the gate decision is a single fold over one ordered
//! sequence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ResourceAddress;
use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the gate.
    Deny,
    /// Reported but never blocks the gate.
    Warn,
}

impl Severity {
    /// Returns the stable label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Finding
// ============================================================================

/// One rule violation instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule that produced the finding.
    pub rule_id: RuleId,
    /// Severity inherited from the rule.
    pub severity: Severity,
    /// Offending resource, when the finding is tied to one.
    pub resource_address: Option<ResourceAddress>,
    /// Human-readable message embedding the offending address or value.
    pub message: String,
    /// Remediation hint copied from the rule definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    /// Returns true for deny findings.
    #[must_use]
    pub const fn is_deny(&self) -> bool {
        matches!(self.severity, Severity::Deny)
    }
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Aggregated gate outcome.
///
/// # Invariants
/// - `pass` is true iff no finding has severity [`Severity::Deny`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the change may proceed.
    pub pass: bool,
    /// Findings in evaluation order.
    pub findings: Vec<Finding>,
}

impl Verdict {
    /// Builds a verdict from findings, deriving `pass`.
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let pass = !findings.iter().any(Finding::is_deny);
        Self {
            pass,
            findings,
        }
    }

    /// Iterates over deny findings.
    pub fn denials(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|finding| finding.severity == Severity::Deny)
    }

    /// Iterates over warn findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|finding| finding.severity == Severity::Warn)
    }
}
