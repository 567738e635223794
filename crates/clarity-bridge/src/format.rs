//! Persisted forms of a [`ProvenanceBundle`].
//!
//! - JSON ([`to_json`] / [`from_json`]): the document form, with hex digests
//!   and RFC 3339 timestamps.
//! - Verified CBOR envelope ([`encode_verified`] / [`decode_verified`]): a
//!   CBOR header carrying magic bytes, a format version, the bundle's proof
//!   digest and SHA-256 checksums of itself and of the content, followed by
//!   the CBOR-encoded bundle. Any flipped byte in either part is detected on
//!   decode. [`read_header`] identifies a bundle without decoding it.

use crate::proof::{sha256, TranslationProof};
use crate::translator::ProvenanceBundle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

// ============================================================================
// Envelope header
// ============================================================================

/// "CLPB": Clarity provenance bundle.
pub const MAGIC: [u8; 4] = *b"CLPB";

/// Packed `major.minor.patch` (one byte each, high byte unused).
pub const VERSION: u32 = 0x00_01_00_00;

/// Envelope header. Besides integrity data it names the proof the bundle
/// carries, so a reader can index or deduplicate bundles from the header
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// `proof.algorithm_id` of the enclosed bundle.
    pub algorithm_id: String,
    /// `proof.combined_hash` of the enclosed bundle.
    pub combined_hash: String,
    pub content_length: u64,
    pub content_checksum: [u8; 32],
    /// SHA-256 over every field above.
    pub header_checksum: [u8; 32],
}

impl VerifiedHeader {
    pub fn new(proof: &TranslationProof, content: &[u8]) -> Self {
        let mut header = Self {
            magic: MAGIC,
            version: VERSION,
            algorithm_id: proof.algorithm_id.clone(),
            combined_hash: proof.combined_hash.clone(),
            content_length: content.len() as u64,
            content_checksum: sha256(content),
            header_checksum: [0u8; 32],
        };
        header.header_checksum = header.compute_header_checksum();
        header
    }

    fn compute_header_checksum(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.magic);
        hasher.update(self.version.to_le_bytes());
        for text in [&self.algorithm_id, &self.combined_hash] {
            hasher.update((text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        hasher.update(self.content_length.to_le_bytes());
        hasher.update(self.content_checksum);
        hasher.finalize().into()
    }

    pub fn verify(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        if !is_version_compatible(self.version, VERSION) {
            return Err(FormatError::IncompatibleVersion {
                file_version: self.version,
                reader_version: VERSION,
            });
        }
        if self.header_checksum != self.compute_header_checksum() {
            return Err(FormatError::HeaderChecksumMismatch);
        }
        Ok(())
    }

    pub fn verify_content(&self, content: &[u8]) -> Result<(), FormatError> {
        if content.len() as u64 != self.content_length {
            return Err(FormatError::ContentLengthMismatch {
                expected: self.content_length,
                actual: content.len() as u64,
            });
        }
        if sha256(content) != self.content_checksum {
            return Err(FormatError::ContentChecksumMismatch);
        }
        Ok(())
    }

    /// The decoded bundle must carry the proof the header announced.
    pub fn verify_proof(&self, proof: &TranslationProof) -> Result<(), FormatError> {
        if proof.algorithm_id != self.algorithm_id || proof.combined_hash != self.combined_hash {
            return Err(FormatError::ProofMismatch {
                header: self.combined_hash.clone(),
                content: proof.combined_hash.clone(),
            });
        }
        Ok(())
    }
}

/// Same major version, and the reader knows at least the file's minor version.
pub fn is_version_compatible(file_version: u32, reader_version: u32) -> bool {
    let major = |v: u32| (v >> 16) & 0xFF;
    let minor = |v: u32| (v >> 8) & 0xFF;
    major(file_version) == major(reader_version) && minor(reader_version) >= minor(file_version)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("not a provenance bundle (bad magic bytes)")]
    InvalidMagic,

    #[error("incompatible envelope version: file {file_version:#08x}, reader {reader_version:#08x}")]
    IncompatibleVersion {
        file_version: u32,
        reader_version: u32,
    },

    #[error("envelope header checksum mismatch")]
    HeaderChecksumMismatch,

    #[error("content length mismatch: expected {expected}, got {actual}")]
    ContentLengthMismatch { expected: u64, actual: u64 },

    #[error("content checksum mismatch")]
    ContentChecksumMismatch,

    #[error("header announces proof {header} but the bundle carries {content}")]
    ProofMismatch { header: String, content: String },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_verified(bundle: &ProvenanceBundle) -> Result<Vec<u8>, FormatError> {
    let mut content = Vec::new();
    ciborium::into_writer(bundle, &mut content).map_err(|e| FormatError::Encode(e.to_string()))?;

    let header = VerifiedHeader::new(&bundle.proof, &content);
    let mut out = Vec::new();
    ciborium::into_writer(&header, &mut out).map_err(|e| FormatError::Encode(e.to_string()))?;
    out.extend_from_slice(&content);
    Ok(out)
}

/// Decode and verify only the header; the content is not read.
pub fn read_header(data: &[u8]) -> Result<VerifiedHeader, FormatError> {
    split_header(data).map(|(header, _)| header)
}

fn split_header(data: &[u8]) -> Result<(VerifiedHeader, &[u8]), FormatError> {
    let mut cursor = std::io::Cursor::new(data);
    let header: VerifiedHeader =
        ciborium::from_reader(&mut cursor).map_err(|e| FormatError::Decode(e.to_string()))?;
    header.verify()?;

    let content = data
        .get(cursor.position() as usize..)
        .ok_or(FormatError::ContentLengthMismatch {
            expected: header.content_length,
            actual: 0,
        })?;
    Ok((header, content))
}

pub fn decode_verified(data: &[u8]) -> Result<(ProvenanceBundle, VerifiedHeader), FormatError> {
    let (header, content) = split_header(data)?;
    header.verify_content(content)?;

    let bundle: ProvenanceBundle =
        ciborium::from_reader(content).map_err(|e| FormatError::Decode(e.to_string()))?;
    header.verify_proof(&bundle.proof)?;
    Ok((bundle, header))
}

pub fn to_json(bundle: &ProvenanceBundle) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

pub fn from_json(json: &str) -> Result<ProvenanceBundle, FormatError> {
    Ok(serde_json::from_str(json)?)
}

/// Write the verified envelope to `path`.
pub fn save(bundle: &ProvenanceBundle, path: impl AsRef<Path>) -> Result<(), FormatError> {
    let bytes = encode_verified(bundle)?;
    std::fs::write(path.as_ref(), bytes)?;
    tracing::debug!(path = %path.as_ref().display(), "saved provenance bundle");
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<ProvenanceBundle, FormatError> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_verified(&bytes).map(|(bundle, _)| bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Translator;
    use clarity_dsl::builder::*;
    use clarity_dsl::BinaryOperator;

    fn bundle() -> ProvenanceBundle {
        let ast = program(vec![func(
            "double",
            vec![param("n", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Mul, ident("n"), int(2))))]),
        )]);
        Translator::default()
            .translate_with_provenance(&ast, "", "1.0", "0.1")
            .unwrap()
    }

    #[test]
    fn envelope_round_trips() {
        let b = bundle();
        let bytes = encode_verified(&b).unwrap();
        let (back, header) = decode_verified(&bytes).unwrap();
        assert_eq!(back, b);
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.version, VERSION);
    }

    #[test]
    fn flipped_content_byte_is_detected() {
        let mut bytes = encode_verified(&bundle()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode_verified(&bytes),
            Err(FormatError::ContentChecksumMismatch)
        ));
    }

    #[test]
    fn header_names_the_enclosed_proof() {
        let b = bundle();
        let bytes = encode_verified(&b).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.combined_hash, b.proof.combined_hash);
        assert_eq!(header.algorithm_id, "sha256");
    }

    #[test]
    fn header_for_another_bundle_is_rejected() {
        let b = bundle();
        let mut content = Vec::new();
        ciborium::into_writer(&b, &mut content).unwrap();

        let mut other = b.proof.clone();
        other.combined_hash = "0".repeat(64);
        let header = VerifiedHeader::new(&other, &content);
        let mut bytes = Vec::new();
        ciborium::into_writer(&header, &mut bytes).unwrap();
        bytes.extend_from_slice(&content);

        assert!(matches!(
            decode_verified(&bytes),
            Err(FormatError::ProofMismatch { .. })
        ));
    }

    #[test]
    fn truncated_content_is_detected() {
        let mut bytes = encode_verified(&bundle()).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode_verified(&bytes),
            Err(FormatError::ContentLengthMismatch { .. })
        ));
    }

    #[test]
    fn version_compatibility_follows_major_and_minor() {
        assert!(is_version_compatible(0x00_01_00_00, 0x00_01_02_00));
        assert!(!is_version_compatible(0x00_01_03_00, 0x00_01_02_00));
        assert!(!is_version_compatible(0x00_02_00_00, 0x00_01_00_00));
    }

    #[test]
    fn json_form_uses_hex_digests_and_field_names() {
        let b = bundle();
        let json = to_json(&b).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["trust_boundary_validation"]["method"],
            "proof-carrying-round-trip"
        );
        assert_eq!(value["proof"]["algorithm_id"], "sha256");
        assert_eq!(value["versioning_info"][0]["rules_applied"][0], "clarity1-deep0.1");
        assert_eq!(from_json(&json).unwrap(), b);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.clpb");
        let b = bundle();
        save(&b, &path).unwrap();
        assert_eq!(load(&path).unwrap(), b);
    }
}
