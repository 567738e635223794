//! Deep → surface raising.
//!
//! Mirrored nodes map back to their surface variant; annotations are dropped.
//! Agent-only nodes standing in a statement list are skipped; anywhere else
//! they have no surface meaning and raising fails.

use crate::canonical::DEFAULT_MAX_DEPTH;
use crate::ReverseTranslate;
use clarity_dsl::deep::{DeepKind, DeepNode};
use clarity_dsl::surface::{SurfaceKind, SurfaceNode};
use clarity_dsl::{NodePath, Span};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaisingError {
    #[error("agent-only {variant} at {path} has no surface form in this position")]
    AgentOnly { path: NodePath, variant: &'static str },

    #[error("expected {expected} at {path}, found {actual}")]
    UnexpectedNode {
        path: NodePath,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("tree depth {depth} exceeds the limit of {limit}")]
    TooDeep { depth: usize, limit: usize },
}

/// The built-in reverse pass.
#[derive(Debug, Clone, Copy)]
pub struct Raising {
    max_depth: usize,
}

impl Default for Raising {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Raising {
    /// Deep trees deeper than `max_depth` are refused before any recursion.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn raise_node(&self, node: &DeepNode, path: &NodePath) -> Result<SurfaceNode, RaisingError> {
        let span = origin_span(node).unwrap_or_default();

        let kind = match &node.kind {
            DeepKind::Program { items } => SurfaceKind::Program {
                items: self.raise_statements(items, path)?,
            },
            DeepKind::Block { statements } => SurfaceKind::Block {
                statements: self.raise_statements(statements, path)?,
            },
            DeepKind::FunctionDecl {
                name,
                params,
                return_type,
                body,
            } => {
                let params = params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let child = path.child(i as u32);
                        match &p.kind {
                            DeepKind::Param { .. } => self.raise_node(p, &child),
                            _ => Err(RaisingError::UnexpectedNode {
                                path: child,
                                expected: "Param",
                                actual: p.variant_name(),
                            }),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                SurfaceKind::FunctionDecl {
                    name: name.clone(),
                    return_type: return_type.clone(),
                    body: self.boxed(body, &path.child(params.len() as u32))?,
                    params,
                }
            }
            DeepKind::Param { name, ty, .. } => SurfaceKind::Param {
                name: name.clone(),
                ty: ty.clone(),
            },
            DeepKind::VarDecl {
                name,
                mutable,
                ty,
                value,
            } => SurfaceKind::VarDecl {
                name: name.clone(),
                mutable: *mutable,
                ty: ty.clone(),
                value: self.boxed(value, &path.child(0))?,
            },
            DeepKind::Assign { target, value } => SurfaceKind::Assign {
                target: target.clone(),
                value: self.boxed(value, &path.child(0))?,
            },
            DeepKind::Return { value } => SurfaceKind::Return {
                value: value
                    .as_ref()
                    .map(|v| self.boxed(v, &path.child(0)))
                    .transpose()?,
            },
            DeepKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => SurfaceKind::If {
                condition: self.boxed(condition, &path.child(0))?,
                then_branch: self.boxed(then_branch, &path.child(1))?,
                else_branch: else_branch
                    .as_ref()
                    .map(|e| self.boxed(e, &path.child(2)))
                    .transpose()?,
            },
            DeepKind::Iteration { condition, body } => SurfaceKind::While {
                condition: self.boxed(condition, &path.child(0))?,
                body: self.boxed(body, &path.child(1))?,
            },
            DeepKind::Call { callee, args } => SurfaceKind::Call {
                callee: callee.clone(),
                args: args
                    .iter()
                    .enumerate()
                    .map(|(i, a)| self.raise_node(a, &path.child(i as u32)))
                    .collect::<Result<_, _>>()?,
            },
            DeepKind::BinaryOp { op, lhs, rhs } => SurfaceKind::BinaryOp {
                op: *op,
                lhs: self.boxed(lhs, &path.child(0))?,
                rhs: self.boxed(rhs, &path.child(1))?,
            },
            DeepKind::UnaryOp { op, operand } => SurfaceKind::UnaryOp {
                op: *op,
                operand: self.boxed(operand, &path.child(0))?,
            },
            DeepKind::Identifier { name } => SurfaceKind::Identifier { name: name.clone() },
            DeepKind::Literal { value } => SurfaceKind::Literal {
                value: value.clone(),
            },
            DeepKind::BeliefAssertion { .. }
            | DeepKind::ConfidenceAnnotation { .. }
            | DeepKind::IntentDeclaration { .. }
            | DeepKind::ReasoningContext { .. } => {
                return Err(RaisingError::AgentOnly {
                    path: path.clone(),
                    variant: node.variant_name(),
                })
            }
        };
        Ok(SurfaceNode::new(kind, span))
    }

    fn raise_statements(
        &self,
        nodes: &[DeepNode],
        parent: &NodePath,
    ) -> Result<Vec<SurfaceNode>, RaisingError> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_agent_only())
            .map(|(i, n)| self.raise_node(n, &parent.child(i as u32)))
            .collect()
    }

    fn boxed(&self, node: &DeepNode, path: &NodePath) -> Result<Box<SurfaceNode>, RaisingError> {
        self.raise_node(node, path).map(Box::new)
    }
}

impl ReverseTranslate for Raising {
    fn raise(&self, deep: &DeepNode) -> Result<SurfaceNode, RaisingError> {
        let depth = deep.depth();
        if depth > self.max_depth {
            return Err(RaisingError::TooDeep {
                depth,
                limit: self.max_depth,
            });
        }
        self.raise_node(deep, &NodePath::root())
    }
}

/// Span of a deep node's surface origin, if it has one.
pub fn origin_span(node: &DeepNode) -> Option<Span> {
    node.attribution.and_then(|a| a.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonical_surface;
    use crate::{ForwardTranslate, Lowering};
    use clarity_dsl::builder::*;
    use clarity_dsl::deep::{Attribution, BeliefDecay, Confidence};
    use clarity_dsl::{BinaryOperator, UnaryOperator};

    #[test]
    fn lower_then_raise_restores_structure_and_spans() {
        let span = Span::from_coords(2, 5, 2, 14);
        let ast = program(vec![func(
            "loop_forever",
            vec![],
            None,
            block(vec![while_(boolean(true), block(vec![]))]).at(span),
        )]);
        let deep = Lowering::default().lower(&ast).unwrap().deep;
        let back = Raising::default().raise(&deep).unwrap();

        assert_eq!(
            canonical_surface(&back).unwrap(),
            canonical_surface(&ast).unwrap()
        );
        assert_eq!(back, ast);
    }

    #[test]
    fn statement_level_agent_nodes_are_skipped() {
        let belief = DeepNode::new(
            DeepKind::BeliefAssertion {
                fact: "agent_note".into(),
                value: None,
                decay: BeliefDecay::None,
            },
            Confidence::CERTAIN,
        )
        .with_attribution(Attribution::synthesized());
        let ret_node = Lowering::default()
            .lower(&ret(None))
            .unwrap()
            .deep;
        let deep = DeepNode::new(
            DeepKind::Block {
                statements: vec![belief, ret_node],
            },
            Confidence::CERTAIN,
        );

        let surface = Raising::default().raise(&deep).unwrap();
        assert_eq!(surface, block(vec![ret(None)]));
    }

    #[test]
    fn agent_node_in_expression_position_fails() {
        let note = DeepNode::new(
            DeepKind::ConfidenceAnnotation {
                subject: "x".into(),
                note: "guess".into(),
            },
            Confidence::CERTAIN,
        );
        let deep = DeepNode::new(
            DeepKind::Return {
                value: Some(Box::new(note)),
            },
            Confidence::CERTAIN,
        );
        assert_eq!(
            Raising::default().raise(&deep).unwrap_err(),
            RaisingError::AgentOnly {
                path: NodePath::from_indices([0]),
                variant: "ConfidenceAnnotation",
            }
        );
    }

    #[test]
    fn non_param_in_signature_fails() {
        let lowered = Lowering::default()
            .lower(&binary(BinaryOperator::Add, int(1), int(2)))
            .unwrap()
            .deep;
        let body = Lowering::default().lower(&block(vec![])).unwrap().deep;
        let deep = DeepNode::new(
            DeepKind::FunctionDecl {
                name: "f".into(),
                params: vec![lowered],
                return_type: None,
                body: Box::new(body),
            },
            Confidence::CERTAIN,
        );
        assert!(matches!(
            Raising::default().raise(&deep),
            Err(RaisingError::UnexpectedNode {
                expected: "Param",
                actual: "BinaryOp",
                ..
            })
        ));
    }

    #[test]
    fn deep_trees_over_the_limit_are_refused() {
        let mut expr = int(1);
        for _ in 0..6 {
            expr = unary(UnaryOperator::Not, expr);
        }
        let deep = Lowering::default().lower(&block(vec![ret(Some(expr))])).unwrap().deep;
        assert_eq!(
            Raising::new(4).raise(&deep),
            Err(RaisingError::TooDeep { depth: 8, limit: 4 })
        );
        assert!(Raising::new(8).raise(&deep).is_ok());
    }
}
