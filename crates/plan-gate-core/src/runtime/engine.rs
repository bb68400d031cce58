// crates/plan-gate-core/src/runtime/engine.rs
// ============================================================================
// Module: Plan Gate Rule Engine
// Description: Applies every rule in a policy set to one change document.
// Purpose: Produce an ordered, reproducible finding sequence.
// Dependencies: crate::{core, rules}
// ============================================================================

//! ## Overview
//! Rules share no mutable state, so the engine may spread them across scoped
//! worker threads. Results are reassembled in rule insertion order and, inside
//! a rule, in resource order, so the report is identical for any worker count
//! or scheduling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;

use thiserror::Error;

use crate::core::ChangeDocument;
use crate::core::Finding;
use crate::core::PolicySet;
use crate::core::RuleId;
use crate::core::RuleSpec;
use crate::rules::Check;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Rule engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads used for evaluation; `0` and `1` run sequentially.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Evaluates policy sets against change documents.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    /// Engine configuration.
    config: EngineConfig,
}

impl RuleEngine {
    /// Creates an engine with the provided configuration.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> EngineConfig {
        self.config
    }

    /// Evaluates every rule and returns findings in deterministic order.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when a worker panics or a rule breaks the
    /// check contract.
    pub fn evaluate(
        &self,
        policy: &PolicySet,
        document: &ChangeDocument,
    ) -> Result<Vec<Finding>, EvaluationError> {
        let rules = policy.rules();
        let workers = self.config.workers.min(rules.len());
        let per_rule = if workers <= 1 {
            rules.iter().map(|rule| evaluate_rule(rule, document)).collect::<Result<Vec<_>, _>>()?
        } else {
            evaluate_parallel(rules, document, workers)?
        };
        Ok(per_rule.into_iter().flatten().collect())
    }
}

/// Splits rules into contiguous chunks, one per worker.
fn evaluate_parallel(
    rules: &[RuleSpec],
    document: &ChangeDocument,
    workers: usize,
) -> Result<Vec<Vec<Finding>>, EvaluationError> {
    let chunk_size = rules.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = rules
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk.iter().map(|rule| evaluate_rule(rule, document)).collect::<Vec<_>>()
                })
            })
            .collect();
        // Join every worker before inspecting results so no panic escapes the scope.
        let joined: Vec<_> = handles.into_iter().map(thread::ScopedJoinHandle::join).collect();
        let mut out = Vec::with_capacity(rules.len());
        for results in joined {
            let results = results.map_err(|_| EvaluationError::WorkerPanicked)?;
            for result in results {
                out.push(result?);
            }
        }
        Ok(out)
    })
}

/// Runs one rule and stamps its identity onto the matches.
fn evaluate_rule(
    rule: &RuleSpec,
    document: &ChangeDocument,
) -> Result<Vec<Finding>, EvaluationError> {
    let mut positioned = Vec::new();
    for matched in rule.check.evaluate(document) {
        let position = match &matched.resource_address {
            Some(address) => {
                document.position_of(address).ok_or_else(|| EvaluationError::ContractViolation {
                    rule_id: rule.id.clone(),
                    message: format!("finding references unknown address {address}"),
                })?
            }
            None => usize::MAX,
        };
        positioned.push((
            position,
            Finding {
                rule_id: rule.id.clone(),
                severity: rule.severity,
                resource_address: matched.resource_address,
                message: matched.message,
                remediation: rule.remediation.clone(),
            },
        ));
    }
    positioned.sort_by_key(|(position, _)| *position);
    Ok(positioned.into_iter().map(|(_, finding)| finding).collect())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine-internal evaluation faults, distinct from a rule not matching.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A worker thread panicked.
    #[error("policy evaluation error: worker panicked")]
    WorkerPanicked,
    /// A rule broke the check contract.
    #[error("policy evaluation error: rule {rule_id}: {message}")]
    ContractViolation {
        /// Offending rule.
        rule_id: RuleId,
        /// Violation detail.
        message: String,
    },
}
