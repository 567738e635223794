//! Translation proofs: content-addressed binding of a surface fragment to its
//! deep-layer counterpart.
//!
//! ```text
//! surface_fragment_hash = sha256(canonical(surface))
//! deep_fragment_hash    = sha256(canonical(deep))
//! combined_hash         = sha256(raw(surface_fragment_hash) ‖ raw(deep_fragment_hash))
//! ```
//!
//! All three are 64 lowercase hex characters. A proof attests structural
//! identity under canonicalization and nothing stronger; see
//! [`crate::canonical`].

use crate::canonical::{Canonicalizer, SerializationError};
use chrono::{DateTime, Utc};
use clarity_dsl::{DeepNode, SurfaceNode};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt::Write as _;

/// Identifier of the digest algorithm recorded in every proof.
pub const ALGORITHM_ID: &str = "sha256";

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationProof {
    pub surface_fragment_hash: String,
    pub deep_fragment_hash: String,
    pub combined_hash: String,
    pub algorithm_id: String,
    pub created_at: DateTime<Utc>,
}

/// Result of checking a proof against fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofCheck {
    pub surface_matches: bool,
    pub deep_matches: bool,
    pub combined_consistent: bool,
}

impl ProofCheck {
    pub fn is_valid(&self) -> bool {
        self.surface_matches && self.deep_matches && self.combined_consistent
    }
}

impl TranslationProof {
    /// Check that `combined_hash` really binds the two fragment hashes,
    /// without access to the fragments themselves.
    pub fn is_self_consistent(&self) -> bool {
        if self.algorithm_id != ALGORITHM_ID {
            return false;
        }
        match (
            decode_hex32(&self.surface_fragment_hash),
            decode_hex32(&self.deep_fragment_hash),
        ) {
            (Some(s), Some(d)) => combine(&s, &d) == self.combined_hash,
            _ => false,
        }
    }

    /// Recompute both fragment digests and compare them with this proof.
    pub fn verify(
        &self,
        surface: &SurfaceNode,
        deep: &DeepNode,
    ) -> Result<ProofCheck, SerializationError> {
        let generator = ProofGenerator::default();
        Ok(ProofCheck {
            surface_matches: generator.digest_surface(surface)? == self.surface_fragment_hash,
            deep_matches: generator.digest_deep(deep)? == self.deep_fragment_hash,
            combined_consistent: self.is_self_consistent(),
        })
    }
}

/// Serializes fragments canonically and hashes them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofGenerator {
    canonicalizer: Canonicalizer,
}

impl ProofGenerator {
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self { canonicalizer }
    }

    /// Inputs are assumed structurally valid; this only serializes and hashes.
    pub fn generate(
        &self,
        surface: &SurfaceNode,
        deep: &DeepNode,
    ) -> Result<TranslationProof, SerializationError> {
        let surface_raw = sha256(self.canonicalizer.surface(surface)?.as_bytes());
        let deep_raw = sha256(self.canonicalizer.deep(deep)?.as_bytes());

        Ok(TranslationProof {
            surface_fragment_hash: to_hex(&surface_raw),
            deep_fragment_hash: to_hex(&deep_raw),
            combined_hash: combine(&surface_raw, &deep_raw),
            algorithm_id: ALGORITHM_ID.to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn digest_surface(&self, surface: &SurfaceNode) -> Result<String, SerializationError> {
        Ok(to_hex(&sha256(self.canonicalizer.surface(surface)?.as_bytes())))
    }

    pub fn digest_deep(&self, deep: &DeepNode) -> Result<String, SerializationError> {
        Ok(to_hex(&sha256(self.canonicalizer.deep(deep)?.as_bytes())))
    }
}

/// [`ProofGenerator::generate`] with the default canonicalizer.
pub fn generate_proof(
    surface: &SurfaceNode,
    deep: &DeepNode,
) -> Result<TranslationProof, SerializationError> {
    ProofGenerator::default().generate(surface, deep)
}

// ============================================================================
// Digest helpers
// ============================================================================

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn combine(surface: &[u8; 32], deep: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(surface);
    hasher.update(deep);
    let out: [u8; 32] = hasher.finalize().into();
    to_hex(&out)
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn decode_hex32(s: &str) -> Option<[u8; 32]> {
    if s.len() != DIGEST_HEX_LEN {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out[i] = (hi * 16 + lo) as u8;
    }
    Some(out)
}
