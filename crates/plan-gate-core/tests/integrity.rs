// crates/plan-gate-core/tests/integrity.rs
// ============================================================================
// Module: Artifact Integrity Tests
// Description: Hashing, signing, verification, identity pinning, and custody.
// Purpose: Ensure only the exact signed artifact from the pinned signer applies.
// ============================================================================

//! ## Overview
//! Uses the in-process authority signer with fixed keys and host-supplied
//! timestamps so every assertion is deterministic.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use plan_gate_core::ApplyGate;
use plan_gate_core::ArtifactIntegrityTracker;
use plan_gate_core::ArtifactSigner;
use plan_gate_core::ArtifactVerifier;
use plan_gate_core::AuditLevel;
use plan_gate_core::HashDigest;
use plan_gate_core::IdentityContext;
use plan_gate_core::IntegrityError;
use plan_gate_core::IntegrityState;
use plan_gate_core::LocalAuthoritySigner;
use plan_gate_core::MemoryAuditSink;
use plan_gate_core::SignedArtifact;
use plan_gate_core::SignerOutput;
use plan_gate_core::SigningCertificate;
use plan_gate_core::SigningError;
use plan_gate_core::Timestamp;
use plan_gate_core::TrustRoot;
use plan_gate_core::audit::EVENT_ARTIFACT_HASHED;
use plan_gate_core::audit::EVENT_ARTIFACT_SIGNED;
use plan_gate_core::audit::EVENT_ARTIFACT_VERIFIED;
use plan_gate_core::audit::EVENT_IDENTITY_NOT_PINNED;
use plan_gate_core::compute_hash;
use plan_gate_core::sign_artifact;
use plan_gate_core::signature_payload;
use proptest::prelude::*;

const PLAN: &[u8] = b"{\"resource_changes\":[]}";
const SIGNED_AT: i64 = 1_760_000_000_000;

fn signer() -> LocalAuthoritySigner {
    LocalAuthoritySigner::from_secret_keys("local-ca", &[7u8; 32], &[9u8; 32])
}

fn verifier() -> ArtifactVerifier {
    ArtifactVerifier::new(TrustRoot::from_public_keys(&[signer().authority_public_key()]).unwrap())
}

fn ci_identity() -> IdentityContext {
    IdentityContext::new(
        "https://github.com/acme/infra/.github/workflows/plan.yml@refs/heads/main",
        "https://token.actions.githubusercontent.com",
    )
}

fn at(offset_ms: i64) -> Timestamp {
    Timestamp::from_unix_millis(SIGNED_AT + offset_ms)
}

fn signed_plan() -> SignedArtifact {
    sign_artifact(&signer(), PLAN, Some(&ci_identity()), at(0)).unwrap()
}

fn with_signed_at(signed: &SignedArtifact, signed_at: Timestamp) -> SignedArtifact {
    SignedArtifact::new(
        signed.artifact_hash().clone(),
        signed.signature().to_vec(),
        signed.certificate_chain().to_vec(),
        signed_at,
    )
    .unwrap()
}

/// Issues a certificate for `holder` signed by `issuer_key`, valid around `SIGNED_AT`.
fn certificate(subject: &str, holder: &SigningKey, issuer_key: &SigningKey) -> SigningCertificate {
    let mut certificate = SigningCertificate {
        subject: subject.to_string(),
        issuer: ci_identity().issuer,
        authority: "acme-ca".to_string(),
        public_key: holder.verifying_key().to_bytes().to_vec(),
        not_before: at(-60_000),
        not_after: at(60_000),
        authority_signature: Vec::new(),
    };
    let body = certificate.to_be_signed_bytes().unwrap();
    certificate.authority_signature = issuer_key.sign(&body).to_bytes().to_vec();
    certificate
}

/// Signs `PLAN` with `leaf` and attaches `chain`.
fn chained_plan(leaf: &SigningKey, chain: Vec<SigningCertificate>) -> SignedArtifact {
    let payload = signature_payload(&compute_hash(PLAN), at(0)).unwrap();
    SignedArtifact::new(compute_hash(PLAN), leaf.sign(&payload).to_bytes().to_vec(), chain, at(0))
        .unwrap()
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

#[test]
fn hash_is_deterministic_and_well_formed() {
    let first = compute_hash(PLAN);
    let second = compute_hash(PLAN);
    assert_eq!(first, second);
    assert!(first.is_well_formed());
    assert!(first.to_string().starts_with("sha256:"));
    assert_eq!(first.to_string().len(), "sha256:".len() + 64);
}

proptest! {
    #[test]
    fn any_bit_flip_changes_the_hash(
        bytes in prop::collection::vec(any::<u8>(), 1 .. 256),
        position in any::<prop::sample::Index>(),
        bit in 0u8 .. 8,
    ) {
        let mut flipped = bytes.clone();
        let index = position.index(flipped.len());
        flipped[index] ^= 1 << bit;
        prop_assert_ne!(compute_hash(&bytes), compute_hash(&flipped));
    }
}

// ============================================================================
// SECTION: Signing
// ============================================================================

#[test]
fn signing_without_identity_fails() {
    let err = sign_artifact(&signer(), PLAN, None, at(0)).unwrap_err();
    assert!(matches!(err, SigningError::MissingIdentity));
    let blank = IdentityContext::new("ci", " ");
    assert!(matches!(
        sign_artifact(&signer(), PLAN, Some(&blank), at(0)).unwrap_err(),
        SigningError::MissingIdentity
    ));
}

#[test]
fn bundle_binds_digest_identity_and_time() {
    let signed = signed_plan();
    assert_eq!(signed.artifact_hash(), &compute_hash(PLAN));
    assert_eq!(signed.signed_at(), at(0));
    let leaf = signed.leaf().unwrap();
    assert_eq!(leaf.subject, ci_identity().identity);
    assert_eq!(leaf.issuer, ci_identity().issuer);
    assert!(leaf.is_valid_at(signed.signed_at()));
}

#[test]
fn each_request_gets_its_own_leaf_key() {
    let first = signed_plan();
    let second = sign_artifact(&signer(), b"other plan", Some(&ci_identity()), at(0)).unwrap();
    let later = sign_artifact(&signer(), PLAN, Some(&ci_identity()), at(1)).unwrap();
    let key = |signed: &SignedArtifact| signed.leaf().unwrap().public_key.clone();
    assert_ne!(key(&first), key(&second));
    assert_ne!(key(&first), key(&later));
    assert_eq!(key(&first), key(&signed_plan()));
}

#[test]
fn validity_override_sets_leaf_window() {
    let signer = signer().with_validity_ms(60_000);
    let signed = sign_artifact(&signer, PLAN, Some(&ci_identity()), at(0)).unwrap();
    let leaf = signed.leaf().unwrap();
    assert_eq!(leaf.not_before, at(0));
    assert_eq!(leaf.not_after, at(60_000));
}

#[test]
fn bundle_json_round_trips() {
    let signed = signed_plan();
    let bytes = signed.to_bundle_json().unwrap();
    let parsed = SignedArtifact::from_bundle_json(&bytes).unwrap();
    assert_eq!(parsed, signed);
    assert!(verifier().verify(PLAN, &parsed, Some(&ci_identity())).valid);
}

#[test]
fn incomplete_bundles_are_rejected() {
    let signed = signed_plan();
    let mut value: serde_json::Value =
        serde_json::from_slice(&signed.to_bundle_json().unwrap()).unwrap();
    value["certificate_chain"] = serde_json::json!([]);
    let bytes = serde_json::to_vec(&value).unwrap();
    assert!(matches!(SignedArtifact::from_bundle_json(&bytes), Err(SigningError::Bundle(_))));

    let err = SignedArtifact::new(
        compute_hash(PLAN),
        Vec::new(),
        signed.certificate_chain().to_vec(),
        signed.signed_at(),
    )
    .unwrap_err();
    assert!(matches!(err, SigningError::IncompleteBundle(_)));
}

struct FailingSigner;

impl ArtifactSigner for FailingSigner {
    fn sign(
        &self,
        _: &HashDigest,
        _: &IdentityContext,
        _: Timestamp,
    ) -> Result<SignerOutput, SigningError> {
        Err(SigningError::Signer("identity provider unavailable".to_string()))
    }
}

#[test]
fn signer_failure_produces_no_bundle() {
    let audit = MemoryAuditSink::new();
    let mut tracker = ArtifactIntegrityTracker::new(PLAN, &audit);
    let err = tracker.sign(&FailingSigner, Some(&ci_identity()), at(0)).unwrap_err();
    assert!(matches!(err, IntegrityError::Signing(SigningError::Signer(_))));
    assert_eq!(tracker.state(), &IntegrityState::Unsigned);
    assert_eq!(audit.events_named(EVENT_ARTIFACT_SIGNED)[0].level, AuditLevel::Error);
}

// ============================================================================
// SECTION: Verification
// ============================================================================

#[test]
fn untampered_artifact_with_pinned_identity_verifies() {
    let result = verifier().verify(PLAN, &signed_plan(), Some(&ci_identity()));
    assert!(result.valid);
    assert!(result.hash_matches && result.signature_valid && result.identity_matches);
    assert_eq!(result.reason, None);
    assert!(ApplyGate::authorize(&result).is_ok());
}

#[test]
fn tampered_artifact_fails_hash_check() {
    let tampered = b"{\"resource_changes\":[{}]}";
    let result = verifier().verify(tampered, &signed_plan(), Some(&ci_identity()));
    assert!(!result.valid);
    assert!(!result.hash_matches);
    assert!(result.signature_valid);
    assert!(ApplyGate::authorize(&result).is_err());
}

#[test]
fn wrong_identity_fails_identity_check() {
    let expected = IdentityContext::new("attacker@example.com", ci_identity().issuer);
    let result = verifier().verify(PLAN, &signed_plan(), Some(&expected));
    assert!(!result.valid);
    assert!(result.hash_matches);
    assert!(result.signature_valid);
    assert!(!result.identity_matches);
    assert!(result.reason.unwrap().contains("attacker@example.com"));
}

#[test]
fn issuer_mismatch_fails_identity_check() {
    let mut expected = ci_identity();
    expected.issuer = "https://accounts.google.com".to_string();
    assert!(!verifier().verify(PLAN, &signed_plan(), Some(&expected)).identity_matches);
}

#[test]
fn unpinned_verification_is_degraded_trust() {
    let result = verifier().verify(PLAN, &signed_plan(), None);
    assert!(result.valid);
    assert!(result.is_degraded_trust());
    assert_eq!(result.reason.as_deref(), Some("no identity pinned"));
}

#[test]
fn untrusted_authority_fails_signature_check() {
    let stranger = LocalAuthoritySigner::from_secret_keys("other-ca", &[1u8; 32], &[2u8; 32]);
    let trust = TrustRoot::from_public_keys(&[stranger.authority_public_key()]).unwrap();
    let verifier = ArtifactVerifier::new(trust);
    let result = verifier.verify(PLAN, &signed_plan(), Some(&ci_identity()));
    assert!(!result.valid);
    assert!(result.hash_matches);
    assert!(!result.signature_valid);
}

#[test]
fn signing_outside_certificate_window_fails() {
    let expired = signer().with_validity_ms(-1);
    let signed = sign_artifact(&expired, PLAN, Some(&ci_identity()), at(0)).unwrap();
    let result = verifier().verify(PLAN, &signed, Some(&ci_identity()));
    assert!(!result.signature_valid);
    assert!(result.reason.unwrap().contains("not valid at signing time"));
}

#[test]
fn rewritten_signing_time_inside_window_fails() {
    let moved = with_signed_at(&signed_plan(), at(5 * 60 * 1000));
    assert!(moved.leaf().unwrap().is_valid_at(moved.signed_at()));
    let result = verifier().verify(PLAN, &moved, Some(&ci_identity()));
    assert!(result.hash_matches);
    assert!(!result.signature_valid);
    assert!(!result.valid);
}

#[test]
fn substituted_leaf_subject_breaks_chain() {
    let signed = signed_plan();
    let mut chain = signed.certificate_chain().to_vec();
    chain[0].subject = "attacker@example.com".to_string();
    let forged = SignedArtifact::new(
        signed.artifact_hash().clone(),
        signed.signature().to_vec(),
        chain,
        signed.signed_at(),
    )
    .unwrap();
    let expected = IdentityContext::new("attacker@example.com", ci_identity().issuer);
    let result = verifier().verify(PLAN, &forged, Some(&expected));
    assert!(result.identity_matches);
    assert!(!result.signature_valid);
    assert!(!result.valid);
}

#[test]
fn intermediate_chain_to_trusted_root_verifies() {
    let root = SigningKey::from_bytes(&[21u8; 32]);
    let intermediate = SigningKey::from_bytes(&[22u8; 32]);
    let leaf = SigningKey::from_bytes(&[23u8; 32]);
    let chain = vec![
        certificate(&ci_identity().identity, &leaf, &intermediate),
        certificate("acme-intermediate", &intermediate, &root),
    ];
    let trust = TrustRoot::from_public_keys(&[root.verifying_key().to_bytes()]).unwrap();
    let result = ArtifactVerifier::new(trust).verify(
        PLAN,
        &chained_plan(&leaf, chain),
        Some(&ci_identity()),
    );
    assert!(result.valid);
    assert!(result.signature_valid);
}

#[test]
fn leaf_not_issued_by_intermediate_fails() {
    let root = SigningKey::from_bytes(&[21u8; 32]);
    let intermediate = SigningKey::from_bytes(&[22u8; 32]);
    let rogue = SigningKey::from_bytes(&[24u8; 32]);
    let leaf = SigningKey::from_bytes(&[23u8; 32]);
    let chain = vec![
        certificate(&ci_identity().identity, &leaf, &rogue),
        certificate("acme-intermediate", &intermediate, &root),
    ];
    let trust = TrustRoot::from_public_keys(&[root.verifying_key().to_bytes()]).unwrap();
    let result = ArtifactVerifier::new(trust).verify(
        PLAN,
        &chained_plan(&leaf, chain),
        Some(&ci_identity()),
    );
    assert!(!result.signature_valid);
    assert!(result.reason.unwrap().contains("is not signed by acme-intermediate"));
}

#[test]
fn chain_out_of_order_fails() {
    let root = SigningKey::from_bytes(&[21u8; 32]);
    let intermediate = SigningKey::from_bytes(&[22u8; 32]);
    let leaf = SigningKey::from_bytes(&[23u8; 32]);
    let chain = vec![
        certificate("acme-intermediate", &intermediate, &root),
        certificate(&ci_identity().identity, &leaf, &intermediate),
    ];
    let trust = TrustRoot::from_public_keys(&[root.verifying_key().to_bytes()]).unwrap();
    let result =
        ArtifactVerifier::new(trust).verify(PLAN, &chained_plan(&leaf, chain), None);
    assert!(!result.signature_valid);
    assert!(!result.valid);
}

#[test]
fn malformed_trust_root_key_is_rejected() {
    assert!(matches!(
        TrustRoot::from_public_keys(&[vec![0u8; 31]]),
        Err(IntegrityError::InvalidTrustRoot(_))
    ));
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

#[test]
fn tracker_walks_sign_verify_apply_and_audits() {
    let audit = MemoryAuditSink::new();
    let mut tracker = ArtifactIntegrityTracker::new(PLAN, &audit);
    assert!(tracker.authorize_apply().is_err());

    tracker.sign(&signer(), Some(&ci_identity()), at(0)).unwrap();
    assert_eq!(tracker.state().as_str(), "signed");

    let result = tracker.verify(PLAN, &verifier(), Some(&ci_identity())).unwrap();
    assert!(result.valid);
    assert_eq!(tracker.state().as_str(), "verified");
    assert!(tracker.authorize_apply().is_ok());

    let hashed = audit.events_named(EVENT_ARTIFACT_HASHED);
    assert_eq!(hashed.len(), 1);
    let digest = serde_json::Value::String(compute_hash(PLAN).to_string());
    assert_eq!(hashed[0].field("digest"), Some(&digest));
    assert_eq!(audit.events_named(EVENT_ARTIFACT_SIGNED)[0].field("digest"), Some(&digest));
    assert_eq!(audit.events_named(EVENT_ARTIFACT_VERIFIED).len(), 1);
    assert!(audit.events_named(EVENT_IDENTITY_NOT_PINNED).is_empty());
}

#[test]
fn verification_failure_is_terminal() {
    let audit = MemoryAuditSink::new();
    let mut tracker = ArtifactIntegrityTracker::from_signed(signed_plan(), &audit);
    let result = tracker.verify(b"tampered", &verifier(), Some(&ci_identity())).unwrap();
    assert!(!result.valid);
    assert_eq!(tracker.state().as_str(), "verification_failed");

    let retry = tracker.verify(PLAN, &verifier(), Some(&ci_identity()));
    assert!(matches!(retry, Err(IntegrityError::InvalidTransition { action: "verify", .. })));
    let failure = tracker.authorize_apply().unwrap_err();
    assert!(!failure.result.hash_matches);
}

#[test]
fn signed_artifact_cannot_be_signed_again() {
    let audit = MemoryAuditSink::new();
    let mut tracker = ArtifactIntegrityTracker::from_signed(signed_plan(), &audit);
    let err = tracker
        .sign(&signer(), Some(&ci_identity()), at(0))
        .unwrap_err();
    assert!(matches!(err, IntegrityError::InvalidTransition { from: "signed", action: "sign" }));
}

#[test]
fn unpinned_tracker_verification_emits_warning() {
    let audit = MemoryAuditSink::new();
    let mut tracker = ArtifactIntegrityTracker::from_signed(signed_plan(), &audit);
    let result = tracker.verify(PLAN, &verifier(), None).unwrap();
    assert!(result.is_degraded_trust());
    let warnings = audit.events_named(EVENT_IDENTITY_NOT_PINNED);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, AuditLevel::Warn);
}
