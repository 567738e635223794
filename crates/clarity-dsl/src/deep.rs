//! Deep-layer (agent-oriented) program tree.
//!
//! The deep layer mirrors the surface constructs and adds what agents need to
//! reason about a program: a [`Confidence`] on every node, an optional
//! [`Attribution`] saying where the node came from, and four agent-only
//! constructs that have no surface syntax:
//!
//! - `BeliefAssertion`: a fact the translation believes about the program,
//! - `ConfidenceAnnotation`: a scored remark about a construct,
//! - `IntentDeclaration`: what executing a construct is meant to achieve,
//! - `ReasoningContext`: assumptions and pre/postconditions for a construct.
//!
//! ## Addressing
//!
//! A node's children are its *structural* children (same order and indices
//! as the surface counterpart) followed by its `annotations`. A mirrored node
//! therefore lives at the same [`NodePath`] as the surface node it came from.

use crate::path::{NodePath, Span};
use crate::surface::{BinaryOperator, Literal, UnaryOperator};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Confidence
// ============================================================================

/// Fixed-point denominator used when a confidence must be encoded exactly
/// (canonical serialization, digests).
pub const CONFIDENCE_DENOMINATOR: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfidenceError {
    #[error("confidence {value} is outside [0, 1]")]
    OutOfRange { value: f64 },

    #[error("confidence is NaN")]
    NotANumber,
}

/// A confidence value in `[0.0, 1.0]`.
///
/// Out-of-range values are rejected at construction (and on deserialization),
/// never clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);
    pub const NONE: Confidence = Confidence(0.0);

    pub fn new(value: f64) -> Result<Self, ConfidenceError> {
        if value.is_nan() {
            return Err(ConfidenceError::NotANumber);
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfidenceError::OutOfRange { value });
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `round(value * CONFIDENCE_DENOMINATOR)`.
    pub fn fixed_point(self) -> u32 {
        (self.0 * CONFIDENCE_DENOMINATOR as f64).round() as u32
    }

    /// A confidence fixed at compile time. Out-of-range values fail const
    /// evaluation, so this never needs a fallback.
    pub const fn known(value: f64) -> Self {
        assert!(value >= 0.0 && value <= 1.0, "confidence outside [0, 1]");
        Self(value)
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::CERTAIN
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl Serialize for Confidence {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Confidence::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Attribution
// ============================================================================

/// Where a deep node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Direct counterpart of human-written surface syntax.
    HumanWritten,
    /// Counterpart of surface syntax, but restructured by the translation.
    Rewritten,
    /// Produced by the translation with no surface counterpart.
    Synthesized,
    /// Contributed by an agent working on the deep layer directly.
    AgentContributed,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::HumanWritten => "human_written",
            Origin::Rewritten => "rewritten",
            Origin::Synthesized => "synthesized",
            Origin::AgentContributed => "agent_contributed",
        }
    }
}

/// Source-attribution tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub origin: Origin,
    /// Surface span this node was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Attribution {
    pub fn surface(origin: Origin, span: Span) -> Self {
        Self {
            origin,
            span: Some(span),
        }
    }

    pub fn synthesized() -> Self {
        Self {
            origin: Origin::Synthesized,
            span: None,
        }
    }
}

// ============================================================================
// Agent-only payload types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// How a belief's confidence is expected to evolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefDecay {
    #[default]
    None,
    OverTime,
}

impl BeliefDecay {
    pub fn as_str(self) -> &'static str {
        match self {
            BeliefDecay::None => "none",
            BeliefDecay::OverTime => "over_time",
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepNode {
    #[serde(flatten)]
    pub kind: DeepKind,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
    /// Agent-only nodes attached to this node; addressed after the
    /// structural children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<DeepNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum DeepKind {
    Program {
        items: Vec<DeepNode>,
    },
    Block {
        statements: Vec<DeepNode>,
    },
    FunctionDecl {
        name: String,
        params: Vec<DeepNode>,
        return_type: Option<String>,
        body: Box<DeepNode>,
    },
    Param {
        name: String,
        ty: String,
        #[serde(default)]
        constraints: Vec<String>,
    },
    VarDecl {
        name: String,
        mutable: bool,
        ty: Option<String>,
        value: Box<DeepNode>,
    },
    Assign {
        target: String,
        value: Box<DeepNode>,
    },
    Return {
        value: Option<Box<DeepNode>>,
    },
    Conditional {
        condition: Box<DeepNode>,
        then_branch: Box<DeepNode>,
        else_branch: Option<Box<DeepNode>>,
    },
    Iteration {
        condition: Box<DeepNode>,
        body: Box<DeepNode>,
    },
    Call {
        callee: String,
        args: Vec<DeepNode>,
    },
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<DeepNode>,
        rhs: Box<DeepNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<DeepNode>,
    },
    Identifier {
        name: String,
    },
    Literal {
        value: Literal,
    },

    // Agent-only constructs
    BeliefAssertion {
        fact: String,
        value: Option<Literal>,
        decay: BeliefDecay,
    },
    ConfidenceAnnotation {
        subject: String,
        note: String,
    },
    IntentDeclaration {
        action: String,
        priority: Priority,
        side_effects: Vec<String>,
    },
    ReasoningContext {
        assumptions: Vec<String>,
        preconditions: Vec<String>,
        postconditions: Vec<String>,
        invariants: Vec<String>,
        confidence_threshold: Confidence,
    },
}

impl DeepKind {
    pub fn variant_name(&self) -> &'static str {
        match self {
            DeepKind::Program { .. } => "Program",
            DeepKind::Block { .. } => "Block",
            DeepKind::FunctionDecl { .. } => "FunctionDecl",
            DeepKind::Param { .. } => "Param",
            DeepKind::VarDecl { .. } => "VarDecl",
            DeepKind::Assign { .. } => "Assign",
            DeepKind::Return { .. } => "Return",
            DeepKind::Conditional { .. } => "Conditional",
            DeepKind::Iteration { .. } => "Iteration",
            DeepKind::Call { .. } => "Call",
            DeepKind::BinaryOp { .. } => "BinaryOp",
            DeepKind::UnaryOp { .. } => "UnaryOp",
            DeepKind::Identifier { .. } => "Identifier",
            DeepKind::Literal { .. } => "Literal",
            DeepKind::BeliefAssertion { .. } => "BeliefAssertion",
            DeepKind::ConfidenceAnnotation { .. } => "ConfidenceAnnotation",
            DeepKind::IntentDeclaration { .. } => "IntentDeclaration",
            DeepKind::ReasoningContext { .. } => "ReasoningContext",
        }
    }

    /// True for constructs that exist only in the deep layer.
    pub fn is_agent_only(&self) -> bool {
        matches!(
            self,
            DeepKind::BeliefAssertion { .. }
                | DeepKind::ConfidenceAnnotation { .. }
                | DeepKind::IntentDeclaration { .. }
                | DeepKind::ReasoningContext { .. }
        )
    }

    /// Name of the surface variant this deep variant mirrors.
    pub fn surface_counterpart(&self) -> Option<&'static str> {
        match self {
            DeepKind::Conditional { .. } => Some("If"),
            DeepKind::Iteration { .. } => Some("While"),
            k if k.is_agent_only() => None,
            k => Some(k.variant_name()),
        }
    }
}

impl DeepNode {
    pub fn new(kind: DeepKind, confidence: Confidence) -> Self {
        Self {
            kind,
            confidence,
            attribution: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn with_annotation(mut self, annotation: DeepNode) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn variant_name(&self) -> &'static str {
        self.kind.variant_name()
    }

    pub fn is_agent_only(&self) -> bool {
        self.kind.is_agent_only()
    }

    /// Structural children, in the same order as the surface counterpart.
    pub fn structural_children(&self) -> Vec<&DeepNode> {
        match &self.kind {
            DeepKind::Program { items } => items.iter().collect(),
            DeepKind::Block { statements } => statements.iter().collect(),
            DeepKind::FunctionDecl { params, body, .. } => {
                params.iter().chain(std::iter::once(body.as_ref())).collect()
            }
            DeepKind::VarDecl { value, .. } | DeepKind::Assign { value, .. } => vec![value.as_ref()],
            DeepKind::Return { value } => value.as_deref().into_iter().collect(),
            DeepKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![condition.as_ref(), then_branch.as_ref()];
                out.extend(else_branch.as_deref());
                out
            }
            DeepKind::Iteration { condition, body } => vec![condition.as_ref(), body.as_ref()],
            DeepKind::Call { args, .. } => args.iter().collect(),
            DeepKind::BinaryOp { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            DeepKind::UnaryOp { operand, .. } => vec![operand.as_ref()],
            DeepKind::Param { .. }
            | DeepKind::Identifier { .. }
            | DeepKind::Literal { .. }
            | DeepKind::BeliefAssertion { .. }
            | DeepKind::ConfidenceAnnotation { .. }
            | DeepKind::IntentDeclaration { .. }
            | DeepKind::ReasoningContext { .. } => Vec::new(),
        }
    }

    /// Structural children followed by annotations.
    pub fn children(&self) -> Vec<&DeepNode> {
        let mut out = self.structural_children();
        out.extend(self.annotations.iter());
        out
    }

    pub fn child(&self, index: usize) -> Option<&DeepNode> {
        self.children().get(index).copied()
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&DeepNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &idx| node.child(idx as usize))
    }

    /// Pre-order traversal yielding every node with its path.
    pub fn walk(&self) -> Vec<(NodePath, &DeepNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(NodePath::root(), self)];
        while let Some((path, node)) = stack.pop() {
            for (idx, child) in node.children().into_iter().enumerate().rev() {
                stack.push((path.child(idx as u32), child));
            }
            out.push((path, node));
        }
        out
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children());
        }
        count
    }

    /// Depth of the deepest node, in edges from this one (a leaf has depth 0).
    /// Computed without recursion, so it is safe to call on any tree.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children().into_iter().map(|c| (c, depth + 1)));
        }
        deepest
    }
}
