// crates/plan-gate-core/src/core/integrity.rs
// ============================================================================
// Module: Plan Gate Integrity Records
// Description: Signed artifact bundles, certificates, and verification results.
// Purpose: Model the chain of custody from plan digest to verified signer.
// Dependencies: base64, serde, serde_jcs
// ============================================================================

//! ## Overview
//! A [`SignedArtifact`] captures the pre-sign digest, the signature, and the
//! certificate chain together. Construction rejects bundles missing any of
//! the three, so an incomplete bundle can never be persisted or re-parsed.
//! Bundles serialize to JSON with base64 byte fields, a form an external
//! verifier can read without this crate.
//!
//! The artifact signature covers [`signature_payload`]: the digest and the
//! signing time together, so neither can be rewritten in a stored bundle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reason attached to results verified without an identity pin.
pub const NO_IDENTITY_PINNED: &str = "no identity pinned";

/// Length of an ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Identity claims presented to the signer (subject and OIDC issuer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Signer identity (for example a workflow URI or e-mail address).
    pub identity: String,
    /// Identity provider issuer URL.
    pub issuer: String,
}

impl IdentityContext {
    /// Creates an identity context.
    #[must_use]
    pub fn new(identity: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            issuer: issuer.into(),
        }
    }

    /// Returns true when both claims are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.identity.trim().is_empty() && !self.issuer.trim().is_empty()
    }
}

/// Identity a verifier pins the signing certificate to. Matching is exact.
pub type ExpectedIdentity = IdentityContext;

// ============================================================================
// SECTION: Certificates
// ============================================================================

/// Short-lived signing certificate binding identity claims to a public key.
///
/// # Invariants
/// - `authority_signature` is an ed25519 signature over
///   [`SigningCertificate::to_be_signed_bytes`] by the next key in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCertificate {
    /// Identity claim of the key holder.
    pub subject: String,
    /// OIDC issuer claim of the key holder.
    pub issuer: String,
    /// Name of the issuing authority.
    pub authority: String,
    /// Ed25519 public key of the key holder.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Start of the validity window.
    pub not_before: Timestamp,
    /// End of the validity window (inclusive).
    pub not_after: Timestamp,
    /// Signature by the issuing authority.
    #[serde(with = "base64_bytes")]
    pub authority_signature: Vec<u8>,
}

/// Signed portion of a certificate.
#[derive(Serialize)]
struct CertificateBody<'a> {
    /// Identity claim.
    subject: &'a str,
    /// Issuer claim.
    issuer: &'a str,
    /// Issuing authority name.
    authority: &'a str,
    /// Base64 public key.
    public_key: String,
    /// Validity start.
    not_before: Timestamp,
    /// Validity end.
    not_after: Timestamp,
}

impl SigningCertificate {
    /// Returns the canonical bytes covered by `authority_signature`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn to_be_signed_bytes(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(&CertificateBody {
            subject: &self.subject,
            issuer: &self.issuer,
            authority: &self.authority,
            public_key: base64_bytes::encode(&self.public_key),
            not_before: self.not_before,
            not_after: self.not_after,
        })
    }

    /// Returns true when `at` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

// ============================================================================
// SECTION: Signature Payload
// ============================================================================

/// Message covered by the artifact signature.
#[derive(Serialize)]
struct SignaturePayload<'a> {
    /// Pre-sign artifact digest.
    artifact_hash: &'a HashDigest,
    /// Signing time.
    signed_at: Timestamp,
}

/// Returns the canonical bytes an artifact signature covers.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn signature_payload(
    artifact_hash: &HashDigest,
    signed_at: Timestamp,
) -> Result<Vec<u8>, HashError> {
    canonical_json_bytes(&SignaturePayload {
        artifact_hash,
        signed_at,
    })
}

// ============================================================================
// SECTION: Signed Artifact
// ============================================================================

/// Digest, signature, and certificate chain for one plan artifact.
///
/// # Invariants
/// - All three parts are present; see [`SignedArtifact::new`].
/// - Never mutated after creation; re-signing produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedArtifactWire")]
pub struct SignedArtifact {
    /// Digest of the artifact taken before signing.
    artifact_hash: HashDigest,
    /// Signature over the digest and signing time.
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    /// Certificate chain ordered leaf first.
    certificate_chain: Vec<SigningCertificate>,
    /// Signing time supplied by the host; covered by the signature.
    signed_at: Timestamp,
}

/// Unvalidated wire form of a signed artifact.
#[derive(Deserialize)]
struct SignedArtifactWire {
    /// Digest of the artifact.
    artifact_hash: HashDigest,
    /// Signature bytes.
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    /// Certificate chain.
    certificate_chain: Vec<SigningCertificate>,
    /// Signing time.
    signed_at: Timestamp,
}

impl TryFrom<SignedArtifactWire> for SignedArtifact {
    type Error = SigningError;

    fn try_from(wire: SignedArtifactWire) -> Result<Self, Self::Error> {
        Self::new(wire.artifact_hash, wire.signature, wire.certificate_chain, wire.signed_at)
    }
}

impl SignedArtifact {
    /// Assembles a signed artifact.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::IncompleteBundle`] when the digest is malformed,
    /// the signature is empty, or the chain is empty.
    pub fn new(
        artifact_hash: HashDigest,
        signature: Vec<u8>,
        certificate_chain: Vec<SigningCertificate>,
        signed_at: Timestamp,
    ) -> Result<Self, SigningError> {
        let missing = if !artifact_hash.is_well_formed() {
            Some("artifact digest is malformed")
        } else if signature.is_empty() {
            Some("signature is empty")
        } else if certificate_chain.is_empty() {
            Some("certificate chain is empty")
        } else {
            None
        };
        if let Some(message) = missing {
            return Err(SigningError::IncompleteBundle(message.to_string()));
        }
        Ok(Self {
            artifact_hash,
            signature,
            certificate_chain,
            signed_at,
        })
    }

    /// Returns the pre-sign digest.
    #[must_use]
    pub const fn artifact_hash(&self) -> &HashDigest {
        &self.artifact_hash
    }

    /// Returns the signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns the certificate chain, leaf first.
    #[must_use]
    pub fn certificate_chain(&self) -> &[SigningCertificate] {
        &self.certificate_chain
    }

    /// Returns the leaf (signing) certificate.
    #[must_use]
    pub fn leaf(&self) -> Option<&SigningCertificate> {
        self.certificate_chain.first()
    }

    /// Returns the signing time.
    #[must_use]
    pub const fn signed_at(&self) -> Timestamp {
        self.signed_at
    }

    /// Returns the bytes the signature must verify against.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn signed_payload(&self) -> Result<Vec<u8>, HashError> {
        signature_payload(&self.artifact_hash, self.signed_at)
    }

    /// Serializes the bundle as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Bundle`] when serialization fails.
    pub fn to_bundle_json(&self) -> Result<Vec<u8>, SigningError> {
        serde_json::to_vec_pretty(self).map_err(|err| SigningError::Bundle(err.to_string()))
    }

    /// Parses and validates a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Bundle`] when the bytes are not a complete bundle.
    pub fn from_bundle_json(bytes: &[u8]) -> Result<Self, SigningError> {
        serde_json::from_slice(bytes).map_err(|err| SigningError::Bundle(err.to_string()))
    }
}

// ============================================================================
// SECTION: Verification Result
// ============================================================================

/// Itemized verification outcome.
///
/// # Invariants
/// - `valid` is the conjunction of the three sub-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Overall validity.
    pub valid: bool,
    /// Recomputed digest equals the signed digest.
    pub hash_matches: bool,
    /// Signature and certificate chain verify.
    pub signature_valid: bool,
    /// Leaf identity claims match the pin (true when nothing is pinned).
    pub identity_matches: bool,
    /// Failure detail or degraded-trust marker.
    pub reason: Option<String>,
}

impl VerificationResult {
    /// Builds a result for a bundle that could not be checked at all.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            hash_matches: false,
            signature_valid: false,
            identity_matches: false,
            reason: Some(reason.into()),
        }
    }

    /// Returns true when the artifact verified without an identity pin.
    #[must_use]
    pub fn is_degraded_trust(&self) -> bool {
        self.reason.as_deref() == Some(NO_IDENTITY_PINNED)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Signing failures. No partial bundle is produced.
#[derive(Debug, Error)]
pub enum SigningError {
    /// No identity context was supplied or it was incomplete.
    #[error("signing error: no identity context available")]
    MissingIdentity,
    /// The external signer failed.
    #[error("signing error: signer failed: {0}")]
    Signer(String),
    /// The resulting bundle is missing required parts.
    #[error("signing error: incomplete bundle: {0}")]
    IncompleteBundle(String),
    /// Bundle encoding or decoding failed.
    #[error("signing error: bundle encoding: {0}")]
    Bundle(String),
    /// Digest canonicalization failed.
    #[error("signing error: {0}")]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Base64 Serde
// ============================================================================

/// Serde helpers encoding byte vectors as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    /// Encodes bytes as base64.
    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    /// Serializes bytes as a base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    /// Deserializes a base64 string into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.trim()).map_err(serde::de::Error::custom)
    }
}
