//! Clarity program models (surface + deep layer)
//!
//! This crate defines the two in-memory representations the translation
//! engine reconciles:
//!
//! - [`surface`]: the human-oriented Clarity syntax tree, as produced by an
//!   external parser (or by [`builder`] in code and tests).
//! - [`deep`]: the agent-oriented deep layer, mirroring the surface constructs
//!   and adding confidence, source attribution and agent-only constructs
//!   (beliefs, confidence annotations, intents, reasoning contexts).
//!
//! Both trees use the same addressing scheme ([`path::NodePath`]): a sequence
//! of child indices from the root. Paths are always recomputed by traversal,
//! never stored on nodes.
//!
//! [`render`] turns a surface tree back into Clarity text.

pub mod builder;
pub mod deep;
pub mod path;
pub mod render;
pub mod surface;

pub use deep::{Attribution, Confidence, ConfidenceError, DeepKind, DeepNode, Origin};
pub use path::{NodePath, Position, Span};
pub use surface::{BinaryOperator, Literal, SurfaceKind, SurfaceNode, UnaryOperator};
