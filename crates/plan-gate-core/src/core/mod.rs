// crates/plan-gate-core/src/core/mod.rs
// ============================================================================
// Module: Plan Gate Core Types
// Description: Canonical change documents, policies, findings, and integrity records.
// Purpose: Provide stable, serializable types shared by the engine and its hosts.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types are the source of truth for every derived surface: rule files,
//! verdict reports, and signed artifact bundles all serialize from here.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod finding;
pub mod hashing;
pub mod identifiers;
pub mod integrity;
pub mod plan;
pub mod policy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use finding::Finding;
pub use finding::Severity;
pub use finding::Verdict;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::ResourceAddress;
pub use identifiers::RuleId;
pub use integrity::ExpectedIdentity;
pub use integrity::IdentityContext;
pub use integrity::NO_IDENTITY_PINNED;
pub use integrity::SignedArtifact;
pub use integrity::SigningCertificate;
pub use integrity::SigningError;
pub use integrity::VerificationResult;
pub use integrity::signature_payload;
pub use plan::Action;
pub use plan::Attributes;
pub use plan::ChangeDetail;
pub use plan::ChangeDocument;
pub use plan::MalformedInput;
pub use plan::ResourceChange;
pub use policy::AttributeCheck;
pub use policy::AttributeComparator;
pub use policy::CheckSpec;
pub use policy::IamWildcardCheck;
pub use policy::MissingPublicAccessBlockCheck;
pub use policy::OpenIngressCheck;
pub use policy::PolicySet;
pub use policy::PolicySetError;
pub use policy::PublicAccessBlockCheck;
pub use policy::RuleSpec;
pub use time::Timestamp;
