//! Trust-boundary validation by round trip.
//!
//! 1. lower the surface tree to deep tree A;
//! 2. raise A back to surface tree B;
//! 3. compare the canonical digests of the original surface and B.
//!
//! Equal digests validate the translation. Otherwise the two surface trees
//! are diffed node by node (same path addressing) and every divergent node is
//! reported. If the provisional deep tree handed in differs from A, it is
//! raised and diffed against the original as well; both checks must pass.
//!
//! The guarantee is structural equality under canonicalization and nothing
//! stronger.

use crate::canonical::{surface_head, Canonicalizer, SerializationError};
use crate::proof::ProofGenerator;
use crate::{ForwardTranslate, LoweringError, RaisingError, ReverseTranslate};
use chrono::{DateTime, Utc};
use clarity_dsl::{DeepNode, NodePath, SurfaceNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value of [`TrustBoundaryValidation::method`].
pub const METHOD: &str = "proof-carrying-round-trip";

/// Variant name reported for a node missing on one side.
pub const ABSENT: &str = "<absent>";

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("forward translation failed: {0}")]
    Lowering(#[from] LoweringError),

    #[error("reverse translation failed: {0}")]
    Raising(#[from] RaisingError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// One divergent node between the original surface tree and a round-tripped one.
///
/// `expected_variant` and `actual_variant` are always bare variant names (or
/// `"<absent>"`). When the variants agree but attributes differ, the canonical
/// heads of both nodes go in the `*_detail` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub path: NodePath,
    pub expected_variant: String,
    pub actual_variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_detail: Option<String>,
}

impl Discrepancy {
    pub fn new(
        path: NodePath,
        expected_variant: impl Into<String>,
        actual_variant: impl Into<String>,
    ) -> Self {
        Self {
            path,
            expected_variant: expected_variant.into(),
            actual_variant: actual_variant.into(),
            expected_detail: None,
            actual_detail: None,
        }
    }

    pub fn with_detail(mut self, expected: String, actual: String) -> Self {
        self.expected_detail = Some(expected);
        self.actual_detail = Some(actual);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBoundaryValidation {
    pub validated: bool,
    pub method: String,
    pub verified_at: DateTime<Utc>,
    pub discrepancies: Vec<Discrepancy>,
}

pub struct TrustValidator<'a> {
    forward: &'a dyn ForwardTranslate,
    reverse: &'a dyn ReverseTranslate,
    canonicalizer: Canonicalizer,
}

impl<'a> TrustValidator<'a> {
    pub fn new(forward: &'a dyn ForwardTranslate, reverse: &'a dyn ReverseTranslate) -> Self {
        Self {
            forward,
            reverse,
            canonicalizer: Canonicalizer::default(),
        }
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Neither input is modified.
    pub fn validate(
        &self,
        surface: &SurfaceNode,
        provisional: &DeepNode,
    ) -> Result<TrustBoundaryValidation, TrustError> {
        let digests = ProofGenerator::new(self.canonicalizer);
        let expected = digests.digest_surface(surface)?;

        let deep_a = self.forward.lower(surface)?.deep;
        let surface_b = self.reverse.raise(&deep_a)?;

        let mut validated = true;
        let mut discrepancies = Vec::new();
        if digests.digest_surface(&surface_b)? != expected {
            validated = false;
            discrepancies.extend(structural_diff(surface, &surface_b)?);
        }

        if digests.digest_deep(provisional)? != digests.digest_deep(&deep_a)? {
            let surface_c = self.reverse.raise(provisional)?;
            if digests.digest_surface(&surface_c)? != expected {
                validated = false;
                for d in structural_diff(surface, &surface_c)? {
                    if !discrepancies.contains(&d) {
                        discrepancies.push(d);
                    }
                }
            }
        }

        tracing::debug!(validated, discrepancies = discrepancies.len(), "round trip checked");
        Ok(TrustBoundaryValidation {
            validated,
            method: METHOD.to_string(),
            verified_at: Utc::now(),
            discrepancies,
        })
    }
}

/// Node-by-node comparison of two surface trees, in pre-order.
///
/// A node whose variant differs is reported once and not descended into.
pub fn structural_diff(
    expected: &SurfaceNode,
    actual: &SurfaceNode,
) -> Result<Vec<Discrepancy>, SerializationError> {
    let mut out = Vec::new();
    diff_into(Some(expected), Some(actual), NodePath::root(), &mut out)?;
    Ok(out)
}

fn diff_into(
    expected: Option<&SurfaceNode>,
    actual: Option<&SurfaceNode>,
    path: NodePath,
    out: &mut Vec<Discrepancy>,
) -> Result<(), SerializationError> {
    let (e, a) = match (expected, actual) {
        (None, None) => return Ok(()),
        (Some(e), None) => {
            out.push(Discrepancy::new(path, e.variant_name(), ABSENT));
            return Ok(());
        }
        (None, Some(a)) => {
            out.push(Discrepancy::new(path, ABSENT, a.variant_name()));
            return Ok(());
        }
        (Some(e), Some(a)) => (e, a),
    };

    if e.variant_name() != a.variant_name() {
        out.push(Discrepancy::new(path, e.variant_name(), a.variant_name()));
        return Ok(());
    }

    let (head_e, head_a) = (surface_head(e, &path)?, surface_head(a, &path)?);
    if head_e != head_a {
        out.push(
            Discrepancy::new(path.clone(), e.variant_name(), a.variant_name())
                .with_detail(head_e, head_a),
        );
    }

    let (ce, ca) = (e.children(), a.children());
    for idx in 0..ce.len().max(ca.len()) {
        diff_into(
            ce.get(idx).copied(),
            ca.get(idx).copied(),
            path.child(idx as u32),
            out,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowering::LoweringConfig;
    use crate::{Lowering, Raising};
    use clarity_dsl::builder::*;
    use clarity_dsl::BinaryOperator;

    fn sample() -> SurfaceNode {
        program(vec![func(
            "f",
            vec![param("x", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Add, ident("x"), int(1))))]),
        )])
    }

    #[test]
    fn faithful_translation_validates() {
        let ast = sample();
        let lowering = Lowering::default();
        let deep = lowering.lower(&ast).unwrap().deep;
        let v = TrustValidator::new(&lowering, &Raising::default())
            .validate(&ast, &deep)
            .unwrap();
        assert!(v.validated);
        assert_eq!(v.method, "proof-carrying-round-trip");
        assert!(v.discrepancies.is_empty());
    }

    #[test]
    fn folding_is_localized() {
        let ast = block(vec![ret(Some(binary(BinaryOperator::Add, int(2), int(3))))]);
        let lowering = Lowering::new(LoweringConfig {
            fold_constants: true,
            ..LoweringConfig::default()
        });
        let deep = lowering.lower(&ast).unwrap().deep;
        let v = TrustValidator::new(&lowering, &Raising::default())
            .validate(&ast, &deep)
            .unwrap();
        assert!(!v.validated);
        assert_eq!(
            v.discrepancies,
            vec![Discrepancy::new(
                NodePath::from_indices([0, 0]),
                "BinaryOp",
                "Literal"
            )]
        );
    }

    #[test]
    fn tampered_provisional_tree_is_caught() {
        let ast = sample();
        let lowering = Lowering::default();
        let other = program(vec![func(
            "f",
            vec![param("x", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Sub, ident("x"), int(1))))]),
        )]);
        let provisional = lowering.lower(&other).unwrap().deep;

        let v = TrustValidator::new(&lowering, &Raising::default())
            .validate(&ast, &provisional)
            .unwrap();
        assert!(!v.validated);
        assert_eq!(v.discrepancies.len(), 1);
        assert_eq!(v.discrepancies[0].path.to_string(), "/0/1/0/0");
        let d = &v.discrepancies[0];
        assert_eq!(d.expected_variant, "BinaryOp");
        assert_eq!(d.actual_variant, "BinaryOp");
        assert_eq!(d.expected_detail.as_deref(), Some("BinaryOp op=+"));
        assert_eq!(d.actual_detail.as_deref(), Some("BinaryOp op=-"));
    }

    #[test]
    fn missing_children_are_reported_absent() {
        let a = block(vec![ret(None), ret(None)]);
        let b = block(vec![ret(None)]);
        assert_eq!(
            structural_diff(&a, &b).unwrap(),
            vec![Discrepancy::new(NodePath::from_indices([1]), "Return", ABSENT)]
        );
        assert!(structural_diff(&a, &a).unwrap().is_empty());
    }

    #[test]
    fn attribute_changes_keep_variant_names_in_the_variant_fields() {
        let a = block(vec![ret(Some(binary(BinaryOperator::Add, int(1), int(2))))]);
        let b = block(vec![ret(Some(binary(BinaryOperator::Add, int(1), int(3))))]);
        let diff = structural_diff(&a, &b).unwrap();
        assert_eq!(
            diff,
            vec![Discrepancy::new(NodePath::from_indices([0, 0, 1]), "Literal", "Literal")
                .with_detail("Literal value=int:2".into(), "Literal value=int:3".into())]
        );

        let json = serde_json::to_value(&diff[0]).unwrap();
        assert_eq!(json["expected_variant"], "Literal");
        assert_eq!(json["expected_detail"], "Literal value=int:2");

        // Details are omitted when the variants themselves differ.
        let folded = serde_json::to_value(Discrepancy::new(NodePath::root(), "BinaryOp", "Literal")).unwrap();
        assert!(folded.get("expected_detail").is_none());
    }
}
