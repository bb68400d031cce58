// crates/plan-gate-config/src/lib.rs
// ============================================================================
// Module: Plan Gate Config Library
// Description: Config model, policy directory loader, and gate runner.
// Purpose: Single source of truth for plan-gate.toml and rule file semantics.
// Dependencies: plan-gate-core, serde, toml, ron, time
// ============================================================================

//! ## Overview
//! `plan-gate-config` turns files on disk into the inputs the core engine
//! needs: a validated [`PlanGateConfig`], a [`plan_gate_core::PolicySet`]
//! loaded from a directory of rule files, and a [`GateRunner`] that wires
//! both to the engine, the gate, and the artifact tracker. Every failure maps
//! onto the exit-status contract through [`RunError::exit_status`].
//!
//! Security posture: config, rule files, plans, and bundles are untrusted and
//! are size-limited before parsing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod loader;
pub mod runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use loader::*;
pub use runner::*;
