//! Clarity Bridge: Bidirectional Surface ↔ Deep-Layer Translation
//!
//! This crate translates Clarity programs between the human-oriented surface
//! tree and the agent-oriented deep layer, and returns, with every
//! translation, the artifacts a downstream consumer needs to check it:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                    TRANSLATION WITH PROVENANCE                        │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  ┌──────────┐  ForwardTranslate   ┌──────────┐                       │
//! │  │ Surface  │────────────────────►│  Deep    │                       │
//! │  │   AST    │◄────────────────────│  tree    │                       │
//! │  └────┬─────┘  ReverseTranslate   └────┬─────┘                       │
//! │       │                                │                             │
//! │       ├──────── correspondences ───────┤                             │
//! │       ▼                                ▼                             │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │ Source   │   │  Proof   │   │Compatibility │   │    Trust     │  │
//! │  │   Map    │   │(sha256 of│   │   Tracker    │   │  Validator   │  │
//! │  │          │   │canonical)│   │ (rule table) │   │ (round trip) │  │
//! │  └────┬─────┘   └────┬─────┘   └──────┬───────┘   └──────┬───────┘  │
//! │       └──────────────┴────────┬───────┴──────────────────┘          │
//! │                               ▼                                      │
//! │                      ProvenanceBundle                                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What the "proof" is
//!
//! A [`proof::TranslationProof`] is a structural-equivalence digest: SHA-256
//! over a canonical serialization of each tree, bound together by a combined
//! digest. Trust validation ([`trust`]) checks that a surface → deep →
//! surface round trip reproduces the same canonical digest. Nothing here is a
//! formal derivation of semantic equivalence; the guarantee is exactly
//! "structurally equal under canonicalization".
//!
//! ## Entry point
//!
//! [`translator::Translator::translate_with_provenance`] runs the whole
//! pipeline and returns a [`translator::ProvenanceBundle`], or a
//! [`translator::TranslationError`] naming the failed stage.

pub mod analysis;
pub mod canonical;
pub mod compat;
pub mod config;
pub mod format;
pub mod lowering;
pub mod proof;
pub mod raising;
pub mod source_map;
pub mod translator;
pub mod trust;

use clarity_dsl::{DeepNode, NodePath, SurfaceNode};
use serde::{Deserialize, Serialize};

pub use lowering::{Lowering, LoweringConfig, LoweringError};
pub use raising::{Raising, RaisingError};

// ============================================================================
// Correspondences
// ============================================================================

/// How a surface node relates to the deep node it was translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// One-to-one syntactic counterpart.
    Direct,
    /// Counterpart restructured by the translation (e.g. a loop lowered to
    /// an annotated iteration).
    Rewritten,
    /// Several surface nodes merged into one deep node (constant folding).
    Folded,
}

/// A (surface node, deep node) pair established during translation,
/// addressed by path in the respective trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    pub surface_path: NodePath,
    pub deep_path: NodePath,
    pub kind: MappingKind,
}

impl Correspondence {
    pub fn new(surface_path: NodePath, deep_path: NodePath, kind: MappingKind) -> Self {
        Self {
            surface_path,
            deep_path,
            kind,
        }
    }
}

/// Output of a forward pass: the deep tree plus the correspondences it
/// established.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub deep: DeepNode,
    pub correspondences: Vec<Correspondence>,
}

// ============================================================================
// Traits for Extensibility
// ============================================================================

/// Surface → deep translation capability.
///
/// The orchestrator is agnostic to how this step is implemented; [`Lowering`]
/// is the built-in pass. Implementations should be deterministic if callers
/// rely on repeated translations producing the same proof.
pub trait ForwardTranslate: Send + Sync {
    fn lower(&self, surface: &SurfaceNode) -> Result<Lowered, LoweringError>;
}

/// Deep → surface translation capability.
pub trait ReverseTranslate: Send + Sync {
    fn raise(&self, deep: &DeepNode) -> Result<SurfaceNode, RaisingError>;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use canonical::{Canonicalizer, SerializationError};
pub use compat::{
    CompatibilityMatrix, CompatibilityRecord, CompatibilityRule, CompatibilityTracker, RuleTable,
    VersionToken,
};
pub use config::BridgeConfig;
pub use proof::{generate_proof, TranslationProof};
pub use source_map::{SourceMap, SourceMapBuilder, SourceMapEntry};
pub use translator::{ProvenanceBundle, Stage, TranslationError, Translator};
pub use trust::{Discrepancy, TrustBoundaryValidation, TrustValidator};
