//! Canonical serialization of surface and deep trees.
//!
//! The canonical form is the hashing input for proofs and the basis of the
//! round-trip comparison, so it must be identical for any two structurally
//! identical trees, however they were built:
//!
//! - depth-first, children in declaration order;
//! - every node opens with its variant name, then its attributes in a fixed
//!   order (`key=value`), then its children, all space-separated;
//! - spans are never encoded (whitespace and comments do not matter);
//! - deep confidences are encoded as fixed-point numerators over
//!   [`CONFIDENCE_DENOMINATOR`](clarity_dsl::deep::CONFIDENCE_DENOMINATOR);
//! - deep annotations follow the structural children after a `|` marker;
//!   attribution keeps only its origin.
//!
//! Example: `(Return (BinaryOp op=+ (Identifier name="x") (Literal value=int:1)))`
//!
//! The matches below are exhaustive, so adding a variant without a canonical
//! form is a compile error. The remaining runtime failures are values with no
//! stable encoding (non-finite floats) and trees deeper than the limit.

use clarity_dsl::deep::{DeepKind, DeepNode};
use clarity_dsl::surface::{Literal, SurfaceKind, SurfaceNode};
use clarity_dsl::NodePath;
use std::fmt::Write as _;
use thiserror::Error;

/// Default depth limit shared by every recursive pass over a tree.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    #[error("literal at {path} has no canonical form: non-finite float {value}")]
    NonFiniteLiteral { path: NodePath, value: f64 },

    #[error("tree exceeds the canonical depth limit of {limit} at {path}")]
    DepthExceeded { path: NodePath, limit: usize },
}

/// Produces canonical text for surface and deep trees.
#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    max_depth: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Canonicalizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn surface(&self, node: &SurfaceNode) -> Result<String, SerializationError> {
        let mut out = String::new();
        self.write_surface(&mut out, node, &NodePath::root())?;
        Ok(out)
    }

    pub fn deep(&self, node: &DeepNode) -> Result<String, SerializationError> {
        let mut out = String::new();
        self.write_deep(&mut out, node, &NodePath::root())?;
        Ok(out)
    }

    fn check_depth(&self, path: &NodePath) -> Result<(), SerializationError> {
        if path.depth() > self.max_depth {
            return Err(SerializationError::DepthExceeded {
                path: path.clone(),
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn write_surface(
        &self,
        out: &mut String,
        node: &SurfaceNode,
        path: &NodePath,
    ) -> Result<(), SerializationError> {
        self.check_depth(path)?;
        out.push('(');
        write_surface_head(out, node, path)?;
        for (idx, child) in node.children().into_iter().enumerate() {
            out.push(' ');
            self.write_surface(out, child, &path.child(idx as u32))?;
        }
        out.push(')');
        Ok(())
    }

    fn write_deep(
        &self,
        out: &mut String,
        node: &DeepNode,
        path: &NodePath,
    ) -> Result<(), SerializationError> {
        self.check_depth(path)?;
        out.push('(');
        write_deep_head(out, node, path)?;

        let structural = node.structural_children();
        let offset = structural.len();
        for (idx, child) in structural.into_iter().enumerate() {
            out.push(' ');
            self.write_deep(out, child, &path.child(idx as u32))?;
        }
        if !node.annotations.is_empty() {
            out.push_str(" |");
            for (idx, annotation) in node.annotations.iter().enumerate() {
                out.push(' ');
                self.write_deep(out, annotation, &path.child((offset + idx) as u32))?;
            }
        }
        out.push(')');
        Ok(())
    }
}

/// Canonical form with the default depth limit.
pub fn canonical_surface(node: &SurfaceNode) -> Result<String, SerializationError> {
    Canonicalizer::default().surface(node)
}

/// Canonical form with the default depth limit.
pub fn canonical_deep(node: &DeepNode) -> Result<String, SerializationError> {
    Canonicalizer::default().deep(node)
}

/// Variant name and attributes of a single surface node, without children.
///
/// Used by the structural diff to describe a node.
pub fn surface_head(node: &SurfaceNode, path: &NodePath) -> Result<String, SerializationError> {
    let mut out = String::new();
    write_surface_head(&mut out, node, path)?;
    Ok(out)
}

// ============================================================================
// Heads
// ============================================================================

fn write_surface_head(
    out: &mut String,
    node: &SurfaceNode,
    path: &NodePath,
) -> Result<(), SerializationError> {
    out.push_str(node.variant_name());
    match &node.kind {
        SurfaceKind::Program { .. } | SurfaceKind::Block { .. } => {}
        SurfaceKind::FunctionDecl {
            name,
            params,
            return_type,
            ..
        } => {
            attr_str(out, "name", name);
            attr_opt_str(out, "return_type", return_type.as_deref());
            attr(out, "arity", params.len());
        }
        SurfaceKind::Param { name, ty } => {
            attr_str(out, "name", name);
            attr_str(out, "ty", ty);
        }
        SurfaceKind::VarDecl {
            name, mutable, ty, ..
        } => {
            attr_str(out, "name", name);
            attr(out, "mutable", mutable);
            attr_opt_str(out, "ty", ty.as_deref());
        }
        SurfaceKind::Assign { target, .. } => attr_str(out, "target", target),
        SurfaceKind::Return { .. } | SurfaceKind::If { .. } | SurfaceKind::While { .. } => {}
        SurfaceKind::Call { callee, .. } => attr_str(out, "callee", callee),
        SurfaceKind::BinaryOp { op, .. } => attr(out, "op", op.symbol()),
        SurfaceKind::UnaryOp { op, .. } => attr(out, "op", op.symbol()),
        SurfaceKind::Identifier { name } => attr_str(out, "name", name),
        SurfaceKind::Literal { value } => write_literal(out, "value", value, path)?,
    }
    Ok(())
}

fn write_deep_head(
    out: &mut String,
    node: &DeepNode,
    path: &NodePath,
) -> Result<(), SerializationError> {
    out.push_str(node.variant_name());
    attr(out, "conf", node.confidence.fixed_point());
    match &node.attribution {
        Some(a) => attr(out, "origin", a.origin.as_str()),
        None => attr(out, "origin", "~"),
    }

    match &node.kind {
        DeepKind::Program { .. } | DeepKind::Block { .. } => {}
        DeepKind::FunctionDecl {
            name,
            params,
            return_type,
            ..
        } => {
            attr_str(out, "name", name);
            attr_opt_str(out, "return_type", return_type.as_deref());
            attr(out, "arity", params.len());
        }
        DeepKind::Param {
            name,
            ty,
            constraints,
        } => {
            attr_str(out, "name", name);
            attr_str(out, "ty", ty);
            attr_list(out, "constraints", constraints);
        }
        DeepKind::VarDecl {
            name, mutable, ty, ..
        } => {
            attr_str(out, "name", name);
            attr(out, "mutable", mutable);
            attr_opt_str(out, "ty", ty.as_deref());
        }
        DeepKind::Assign { target, .. } => attr_str(out, "target", target),
        DeepKind::Return { .. } | DeepKind::Conditional { .. } | DeepKind::Iteration { .. } => {}
        DeepKind::Call { callee, .. } => attr_str(out, "callee", callee),
        DeepKind::BinaryOp { op, .. } => attr(out, "op", op.symbol()),
        DeepKind::UnaryOp { op, .. } => attr(out, "op", op.symbol()),
        DeepKind::Identifier { name } => attr_str(out, "name", name),
        DeepKind::Literal { value } => write_literal(out, "value", value, path)?,
        DeepKind::BeliefAssertion { fact, value, decay } => {
            attr_str(out, "fact", fact);
            match value {
                Some(v) => write_literal(out, "value", v, path)?,
                None => attr(out, "value", "~"),
            }
            attr(out, "decay", decay.as_str());
        }
        DeepKind::ConfidenceAnnotation { subject, note } => {
            attr_str(out, "subject", subject);
            attr_str(out, "note", note);
        }
        DeepKind::IntentDeclaration {
            action,
            priority,
            side_effects,
        } => {
            attr_str(out, "action", action);
            attr(out, "priority", priority.as_str());
            attr_list(out, "side_effects", side_effects);
        }
        DeepKind::ReasoningContext {
            assumptions,
            preconditions,
            postconditions,
            invariants,
            confidence_threshold,
        } => {
            attr_list(out, "assumptions", assumptions);
            attr_list(out, "preconditions", preconditions);
            attr_list(out, "postconditions", postconditions);
            attr_list(out, "invariants", invariants);
            attr(out, "threshold", confidence_threshold.fixed_point());
        }
    }
    Ok(())
}

// ============================================================================
// Attribute encoding
// ============================================================================

fn attr(out: &mut String, key: &str, value: impl std::fmt::Display) {
    let _ = write!(out, " {key}={value}");
}

fn attr_str(out: &mut String, key: &str, value: &str) {
    let _ = write!(out, " {key}=");
    quote(out, value);
}

fn attr_opt_str(out: &mut String, key: &str, value: Option<&str>) {
    match value {
        Some(v) => attr_str(out, key, v),
        None => attr(out, key, "~"),
    }
}

fn attr_list(out: &mut String, key: &str, values: &[String]) {
    let _ = write!(out, " {key}=[");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        quote(out, v);
    }
    out.push(']');
}

fn write_literal(
    out: &mut String,
    key: &str,
    value: &Literal,
    path: &NodePath,
) -> Result<(), SerializationError> {
    let _ = write!(out, " {key}=");
    match value {
        Literal::Int(v) => {
            let _ = write!(out, "int:{v}");
        }
        Literal::Float(v) => {
            if !v.is_finite() {
                return Err(SerializationError::NonFiniteLiteral {
                    path: path.clone(),
                    value: *v,
                });
            }
            // `{:?}` is the shortest round-tripping decimal form.
            let _ = write!(out, "float:{v:?}");
        }
        Literal::Str(s) => {
            out.push_str("str:");
            quote(out, s);
        }
        Literal::Bool(b) => {
            let _ = write!(out, "bool:{b}");
        }
        Literal::Unit => out.push_str("unit"),
    }
    Ok(())
}

fn quote(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
