// crates/plan-gate-core/src/runtime/integrity.rs
// ============================================================================
// Module: Plan Gate Artifact Integrity Tracker
// Description: Hash, sign, and verify one plan artifact before apply.
// Purpose: Enforce hash -> signature -> verified identity -> apply custody.
// Dependencies: crate::{audit, core, interfaces}, ed25519-dalek, sha2
// ============================================================================

//! ## Overview
//! The tracker walks one artifact through `Unsigned -> Signed -> Verified`
//! or `Unsigned -> Signed -> VerificationFailed`. Both end states are
//! terminal: a mismatch is never retried, and the only remedy is a fresh plan
//! and a fresh signature.
//!
//! Verification recomputes the artifact digest, checks the ed25519 signature
//! over the canonical digest and signing time with the leaf key, walks the certificate chain up
//! to a trusted root key, and compares the leaf identity claims to the pin by
//! exact equality. Apply is authorized only for a `valid` result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ed25519_dalek::Signature;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use serde_json::Value;
use sha2::Digest as _;
use sha2::Sha256;
use thiserror::Error;

use crate::audit::AuditEvent;
use crate::audit::AuditLevel;
use crate::audit::AuditSink;
use crate::audit::EVENT_ARTIFACT_HASHED;
use crate::audit::EVENT_ARTIFACT_SIGNED;
use crate::audit::EVENT_ARTIFACT_VERIFIED;
use crate::audit::EVENT_IDENTITY_NOT_PINNED;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ExpectedIdentity;
use crate::core::HashDigest;
use crate::core::IdentityContext;
use crate::core::NO_IDENTITY_PINNED;
use crate::core::SignedArtifact;
use crate::core::SigningCertificate;
use crate::core::SigningError;
use crate::core::Timestamp;
use crate::core::VerificationResult;
use crate::core::hashing::hash_bytes;
use crate::core::integrity::PUBLIC_KEY_LEN;
use crate::core::signature_payload;
use crate::interfaces::ArtifactSigner;
use crate::interfaces::SignerOutput;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default leaf certificate lifetime (ten minutes).
pub const DEFAULT_CERTIFICATE_VALIDITY_MS: i64 = 10 * 60 * 1000;

/// Domain separator for per-request leaf key derivation.
const LEAF_KEY_CONTEXT: &[u8] = b"plan-gate/leaf-key/v1";

// ============================================================================
// SECTION: Hashing and Signing
// ============================================================================

/// Computes the content digest of an artifact.
#[must_use]
pub fn compute_hash(artifact: &[u8]) -> HashDigest {
    hash_bytes(DEFAULT_HASH_ALGORITHM, artifact)
}

/// Signs an artifact digest and assembles the bundle atomically.
///
/// # Errors
///
/// Returns [`SigningError::MissingIdentity`] when no complete identity is
/// available, or any signer failure. No partial bundle is returned.
pub fn sign_digest<S: ArtifactSigner + ?Sized>(
    signer: &S,
    digest: &HashDigest,
    identity: Option<&IdentityContext>,
    signed_at: Timestamp,
) -> Result<SignedArtifact, SigningError> {
    let identity = identity
        .filter(|identity| identity.is_complete())
        .ok_or(SigningError::MissingIdentity)?;
    let SignerOutput {
        signature,
        certificate_chain,
    } = signer.sign(digest, identity, signed_at)?;
    SignedArtifact::new(digest.clone(), signature, certificate_chain, signed_at)
}

/// Hashes and signs artifact bytes.
///
/// # Errors
///
/// Returns [`SigningError`] as for [`sign_digest`].
pub fn sign_artifact<S: ArtifactSigner + ?Sized>(
    signer: &S,
    artifact: &[u8],
    identity: Option<&IdentityContext>,
    signed_at: Timestamp,
) -> Result<SignedArtifact, SigningError> {
    sign_digest(signer, &compute_hash(artifact), identity, signed_at)
}

// ============================================================================
// SECTION: Local Authority Signer
// ============================================================================

/// In-process signer that acts as its own certificate authority.
///
/// Each request gets its own leaf key, derived from the leaf seed, the
/// identity claims, the digest, and the signing time. The authority issues a
/// short-lived certificate for that key, and the leaf key signs the
/// [`signature_payload`]. A leaf key is never reused across requests.
pub struct LocalAuthoritySigner {
    /// Authority name recorded in issued certificates.
    authority: String,
    /// Authority signing key.
    authority_key: SigningKey,
    /// Secret seed for leaf key derivation.
    leaf_seed: [u8; 32],
    /// Leaf certificate lifetime.
    validity_ms: i64,
}

impl LocalAuthoritySigner {
    /// Creates a signer from a raw ed25519 authority secret and a leaf seed.
    #[must_use]
    pub fn from_secret_keys(
        authority: impl Into<String>,
        authority_secret: &[u8; 32],
        leaf_seed: &[u8; 32],
    ) -> Self {
        Self {
            authority: authority.into(),
            authority_key: SigningKey::from_bytes(authority_secret),
            leaf_seed: *leaf_seed,
            validity_ms: DEFAULT_CERTIFICATE_VALIDITY_MS,
        }
    }

    /// Overrides the leaf certificate lifetime.
    #[must_use]
    pub const fn with_validity_ms(mut self, validity_ms: i64) -> Self {
        self.validity_ms = validity_ms;
        self
    }

    /// Returns the authority public key, suitable for a [`TrustRoot`].
    #[must_use]
    pub fn authority_public_key(&self) -> [u8; 32] {
        self.authority_key.verifying_key().to_bytes()
    }

    /// Derives the leaf key for one signing request.
    fn leaf_key(&self, identity: &IdentityContext, payload: &[u8]) -> SigningKey {
        let secret: [u8; 32] = Sha256::new()
            .chain_update(LEAF_KEY_CONTEXT)
            .chain_update(self.leaf_seed)
            .chain_update(identity.identity.as_bytes())
            .chain_update([0u8])
            .chain_update(identity.issuer.as_bytes())
            .chain_update([0u8])
            .chain_update(payload)
            .finalize()
            .into();
        SigningKey::from_bytes(&secret)
    }
}

impl ArtifactSigner for LocalAuthoritySigner {
    fn sign(
        &self,
        digest: &HashDigest,
        identity: &IdentityContext,
        signed_at: Timestamp,
    ) -> Result<SignerOutput, SigningError> {
        if !identity.is_complete() {
            return Err(SigningError::MissingIdentity);
        }
        let payload = signature_payload(digest, signed_at)?;
        let leaf_key = self.leaf_key(identity, &payload);
        let mut certificate = SigningCertificate {
            subject: identity.identity.clone(),
            issuer: identity.issuer.clone(),
            authority: self.authority.clone(),
            public_key: leaf_key.verifying_key().to_bytes().to_vec(),
            not_before: signed_at,
            not_after: signed_at.saturating_add_millis(self.validity_ms),
            authority_signature: Vec::new(),
        };
        let body = certificate.to_be_signed_bytes()?;
        certificate.authority_signature = self.authority_key.sign(&body).to_bytes().to_vec();
        Ok(SignerOutput {
            signature: leaf_key.sign(&payload).to_bytes().to_vec(),
            certificate_chain: vec![certificate],
        })
    }
}

// ============================================================================
// SECTION: Trust Root
// ============================================================================

/// Public keys allowed to terminate a certificate chain.
#[derive(Debug, Clone, Default)]
pub struct TrustRoot {
    /// Trusted authority keys.
    keys: Vec<VerifyingKey>,
}

impl TrustRoot {
    /// Builds a trust root from raw ed25519 public keys.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidTrustRoot`] when a key is malformed.
    pub fn from_public_keys<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self, IntegrityError> {
        let keys = keys
            .iter()
            .map(|key| parse_public_key(key.as_ref()).map_err(IntegrityError::InvalidTrustRoot))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            keys,
        })
    }

    /// Returns true when no keys are trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Verifies `message` against any trusted key.
    fn verifies(&self, message: &[u8], signature: &Signature) -> bool {
        self.keys.iter().any(|key| key.verify_strict(message, signature).is_ok())
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Stateless verifier for signed artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactVerifier {
    /// Keys allowed to anchor certificate chains.
    trust_root: TrustRoot,
}

impl ArtifactVerifier {
    /// Creates a verifier anchored at `trust_root`.
    #[must_use]
    pub const fn new(trust_root: TrustRoot) -> Self {
        Self {
            trust_root,
        }
    }

    /// Verifies artifact bytes against a signed bundle and optional pin.
    #[must_use]
    pub fn verify(
        &self,
        artifact: &[u8],
        signed: &SignedArtifact,
        expected: Option<&ExpectedIdentity>,
    ) -> VerificationResult {
        let mut failures = Vec::new();

        let actual = compute_hash(artifact);
        let hash_matches = &actual == signed.artifact_hash();
        if !hash_matches {
            failures.push(format!(
                "artifact digest {actual} does not match signed digest {}",
                signed.artifact_hash()
            ));
        }

        let signature_valid = match self.check_signature(signed) {
            Ok(()) => true,
            Err(message) => {
                failures.push(message);
                false
            }
        };

        let identity_matches = match (expected, signed.leaf()) {
            (None, _) => true,
            (Some(pin), Some(leaf))
                if leaf.subject == pin.identity && leaf.issuer == pin.issuer =>
            {
                true
            }
            (Some(pin), Some(leaf)) => {
                failures.push(format!(
                    "certificate identity {} (issuer {}) does not match expected {} (issuer {})",
                    leaf.subject, leaf.issuer, pin.identity, pin.issuer
                ));
                false
            }
            (Some(_), None) => {
                failures.push("certificate chain is empty".to_string());
                false
            }
        };

        let reason = if !failures.is_empty() {
            Some(failures.join("; "))
        } else if expected.is_none() {
            Some(NO_IDENTITY_PINNED.to_string())
        } else {
            None
        };
        VerificationResult {
            valid: hash_matches && signature_valid && identity_matches,
            hash_matches,
            signature_valid,
            identity_matches,
            reason,
        }
    }

    /// Checks the leaf signature over digest and signing time, validity
    /// windows, and the chain to a trusted root.
    fn check_signature(&self, signed: &SignedArtifact) -> Result<(), String> {
        let chain = signed.certificate_chain();
        let leaf = chain.first().ok_or_else(|| "certificate chain is empty".to_string())?;
        let leaf_key = parse_public_key(&leaf.public_key)?;
        let signature = parse_signature(signed.signature())?;
        let message = signed
            .signed_payload()
            .map_err(|err| format!("signature payload canonicalization failed: {err}"))?;
        leaf_key
            .verify_strict(&message, &signature)
            .map_err(|_| "artifact signature does not verify against the leaf key".to_string())?;

        for certificate in chain {
            if !certificate.is_valid_at(signed.signed_at()) {
                return Err(format!(
                    "certificate for {} is not valid at signing time {}",
                    certificate.subject,
                    signed.signed_at()
                ));
            }
        }

        for pair in chain.windows(2) {
            let parent_key = parse_public_key(&pair[1].public_key)?;
            let (body, signature) = certificate_signature(&pair[0])?;
            parent_key.verify_strict(&body, &signature).map_err(|_| {
                format!("certificate for {} is not signed by {}", pair[0].subject, pair[1].subject)
            })?;
        }

        if self.trust_root.is_empty() {
            return Err("no trusted root keys configured".to_string());
        }
        let anchor = chain.last().ok_or_else(|| "certificate chain is empty".to_string())?;
        let (body, signature) = certificate_signature(anchor)?;
        if !self.trust_root.verifies(&body, &signature) {
            return Err(format!(
                "certificate chain for {} is not anchored in a trusted root",
                anchor.subject
            ));
        }
        Ok(())
    }
}

/// Returns a certificate's signed body and authority signature.
fn certificate_signature(
    certificate: &SigningCertificate,
) -> Result<(Vec<u8>, Signature), String> {
    let body = certificate
        .to_be_signed_bytes()
        .map_err(|err| format!("certificate canonicalization failed: {err}"))?;
    let signature = parse_signature(&certificate.authority_signature)?;
    Ok((body, signature))
}

/// Parses an ed25519 public key.
fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey, String> {
    let key_bytes: [u8; PUBLIC_KEY_LEN] =
        bytes.try_into().map_err(|_| "invalid ed25519 public key length".to_string())?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|_| "invalid ed25519 public key".to_string())
}

/// Parses an ed25519 signature.
fn parse_signature(bytes: &[u8]) -> Result<Signature, String> {
    Signature::try_from(bytes).map_err(|_| "invalid signature bytes".to_string())
}

// ============================================================================
// SECTION: Apply Gate
// ============================================================================

/// Refuses apply unless verification succeeded. There is no override.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyGate;

impl ApplyGate {
    /// Authorizes apply for a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailure`] for any non-valid result.
    pub fn authorize(result: &VerificationResult) -> Result<(), VerificationFailure> {
        if result.valid {
            Ok(())
        } else {
            Err(VerificationFailure {
                result: result.clone(),
            })
        }
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Lifecycle state of a tracked artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityState {
    /// Digest known, not yet signed.
    Unsigned,
    /// Signed bundle captured.
    Signed(SignedArtifact),
    /// Verification succeeded.
    Verified {
        /// Verified bundle.
        signed: SignedArtifact,
        /// Verification result.
        result: VerificationResult,
    },
    /// Verification failed; terminal.
    VerificationFailed {
        /// Rejected bundle.
        signed: SignedArtifact,
        /// Verification result.
        result: VerificationResult,
    },
}

impl IntegrityState {
    /// Returns the stable state label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Signed(_) => "signed",
            Self::Verified {
                ..
            } => "verified",
            Self::VerificationFailed {
                ..
            } => "verification_failed",
        }
    }
}

/// Tracks one artifact from hashing through verification.
pub struct ArtifactIntegrityTracker<'a> {
    /// Digest of the tracked artifact.
    digest: HashDigest,
    /// Current lifecycle state.
    state: IntegrityState,
    /// Audit sink for custody events.
    audit: &'a dyn AuditSink,
}

impl<'a> ArtifactIntegrityTracker<'a> {
    /// Starts tracking unsigned artifact bytes and logs the pre-sign digest.
    #[must_use]
    pub fn new(artifact: &[u8], audit: &'a dyn AuditSink) -> Self {
        let digest = compute_hash(artifact);
        audit.record(
            &AuditEvent::new(EVENT_ARTIFACT_HASHED, AuditLevel::Info)
                .with("digest", digest.to_string())
                .with("stage", "pre_sign")
                .with("bytes", artifact.len()),
        );
        Self {
            digest,
            state: IntegrityState::Unsigned,
            audit,
        }
    }

    /// Resumes tracking from a persisted bundle (the apply side).
    #[must_use]
    pub fn from_signed(signed: SignedArtifact, audit: &'a dyn AuditSink) -> Self {
        Self {
            digest: signed.artifact_hash().clone(),
            state: IntegrityState::Signed(signed),
            audit,
        }
    }

    /// Returns the tracked digest.
    #[must_use]
    pub const fn digest(&self) -> &HashDigest {
        &self.digest
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &IntegrityState {
        &self.state
    }

    /// Signs the tracked digest: `Unsigned -> Signed`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidTransition`] outside `Unsigned`, or
    /// [`IntegrityError::Signing`] when the signer fails; the state is left
    /// `Unsigned` on failure.
    pub fn sign<S: ArtifactSigner + ?Sized>(
        &mut self,
        signer: &S,
        identity: Option<&IdentityContext>,
        signed_at: Timestamp,
    ) -> Result<SignedArtifact, IntegrityError> {
        if self.state != IntegrityState::Unsigned {
            return Err(IntegrityError::InvalidTransition {
                from: self.state.as_str(),
                action: "sign",
            });
        }
        let signed = match sign_digest(signer, &self.digest, identity, signed_at) {
            Ok(signed) => signed,
            Err(err) => {
                self.audit.record(
                    &AuditEvent::new(EVENT_ARTIFACT_SIGNED, AuditLevel::Error)
                        .at(signed_at)
                        .with("digest", self.digest.to_string())
                        .with("error", err.to_string()),
                );
                return Err(IntegrityError::Signing(err));
            }
        };
        self.audit.record(&signed_event(&signed));
        self.state = IntegrityState::Signed(signed.clone());
        Ok(signed)
    }

    /// Verifies the bundle: `Signed -> Verified | VerificationFailed`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidTransition`] outside `Signed`; a
    /// verified or failed artifact is never re-verified.
    pub fn verify(
        &mut self,
        artifact: &[u8],
        verifier: &ArtifactVerifier,
        expected: Option<&ExpectedIdentity>,
    ) -> Result<VerificationResult, IntegrityError> {
        let IntegrityState::Signed(signed) = &self.state else {
            return Err(IntegrityError::InvalidTransition {
                from: self.state.as_str(),
                action: "verify",
            });
        };
        let signed = signed.clone();
        if expected.is_none() {
            self.audit.record(
                &AuditEvent::new(EVENT_IDENTITY_NOT_PINNED, AuditLevel::Warn)
                    .with("digest", self.digest.to_string())
                    .with("message", "verifying without an expected signer identity"),
            );
        }
        let result = verifier.verify(artifact, &signed, expected);
        let level = if result.valid { AuditLevel::Info } else { AuditLevel::Error };
        self.audit.record(
            &AuditEvent::new(EVENT_ARTIFACT_VERIFIED, level)
                .with("digest", self.digest.to_string())
                .with("valid", result.valid)
                .with("hash_matches", result.hash_matches)
                .with("signature_valid", result.signature_valid)
                .with("identity_matches", result.identity_matches)
                .with("reason", result.reason.clone().map_or(Value::Null, Value::String)),
        );
        self.state = if result.valid {
            IntegrityState::Verified {
                signed,
                result: result.clone(),
            }
        } else {
            IntegrityState::VerificationFailed {
                signed,
                result: result.clone(),
            }
        };
        Ok(result)
    }

    /// Authorizes apply; only the `Verified` state passes.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailure`] in every other state.
    pub fn authorize_apply(&self) -> Result<(), VerificationFailure> {
        match &self.state {
            IntegrityState::Verified {
                result, ..
            }
            | IntegrityState::VerificationFailed {
                result, ..
            } => ApplyGate::authorize(result),
            IntegrityState::Unsigned | IntegrityState::Signed(_) => Err(VerificationFailure {
                result: VerificationResult::rejected(format!(
                    "artifact is {}, not verified",
                    self.state.as_str()
                )),
            }),
        }
    }
}

/// Builds the post-sign audit event.
fn signed_event(signed: &SignedArtifact) -> AuditEvent {
    let mut event = AuditEvent::new(EVENT_ARTIFACT_SIGNED, AuditLevel::Info)
        .at(signed.signed_at())
        .with("digest", signed.artifact_hash().to_string())
        .with("chain_length", signed.certificate_chain().len());
    if let Some(leaf) = signed.leaf() {
        event = event.with("subject", leaf.subject.clone()).with("issuer", leaf.issuer.clone());
    }
    event
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tracker errors.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Operation not permitted in the current state.
    #[error("integrity error: cannot {action} an artifact that is {from}")]
    InvalidTransition {
        /// Current state label.
        from: &'static str,
        /// Attempted operation.
        action: &'static str,
    },
    /// Signing failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// Trust root key material is unusable.
    #[error("integrity error: invalid trust root: {0}")]
    InvalidTrustRoot(String),
}

/// Terminal verification failure that blocks apply.
#[derive(Debug, Error)]
#[error(
    "verification failure: {}",
    .result.reason.as_deref().unwrap_or("artifact did not verify")
)]
pub struct VerificationFailure {
    /// Itemized result behind the failure.
    pub result: VerificationResult,
}
