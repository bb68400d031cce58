// crates/plan-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Plan Gate Interfaces
// Description: Contract surfaces for external collaborators.
// Purpose: Keep keyless signing behind a trait so the core never embeds a client.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The signing identity provider and transparency log live outside this
//! crate. The tracker only needs something that turns a digest plus identity
//! claims into a signature and a certificate chain; [`ArtifactSigner`] is
//! that seam. Implementations must not retry on failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::HashDigest;
use crate::core::IdentityContext;
use crate::core::SigningCertificate;
use crate::core::SigningError;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Artifact Signer
// ============================================================================

/// Raw output of an external signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerOutput {
    /// Signature over the canonical digest bytes.
    pub signature: Vec<u8>,
    /// Certificate chain ordered leaf first.
    pub certificate_chain: Vec<SigningCertificate>,
}

/// External signer producing keyless-style signatures.
pub trait ArtifactSigner {
    /// Signs the canonical JSON bytes of `digest` on behalf of `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when no signature can be produced.
    fn sign(
        &self,
        digest: &HashDigest,
        identity: &IdentityContext,
        signed_at: Timestamp,
    ) -> Result<SignerOutput, SigningError>;
}
