//! Surface → deep lowering.
//!
//! Every surface node becomes a deep node at the same path. On top of the
//! mirrored structure the pass attaches agent-only annotations:
//!
//! | surface        | deep                | annotations                                   |
//! |----------------|---------------------|-----------------------------------------------|
//! | `Program`      | `Program`           | intent `execute_program`                      |
//! | `FunctionDecl` | `FunctionDecl`      | intent, reasoning context (0.7), preservation |
//! | `Param`        | `Param` (0.95)      | none; constraints inferred from type and name |
//! | `VarDecl`      | `VarDecl`           | belief `variable_<name>_initialized` (0.95)   |
//! | `If`           | `Conditional`       | reasoning context (0.5)                       |
//! | `While`        | `Iteration` (rewritten) | termination annotation (0.5)              |
//!
//! With `fold_constants` enabled, integer arithmetic on two literals collapses
//! into one literal; the three surface nodes then share one deep path.

use crate::analysis::{analyze_function, param_constraints};
use crate::canonical::DEFAULT_MAX_DEPTH;
use crate::source_map::REWRITE_CONFIDENCE;
use crate::{Correspondence, ForwardTranslate, Lowered, MappingKind};
use clarity_dsl::deep::{
    Attribution, BeliefDecay, Confidence, ConfidenceError, DeepKind, DeepNode, Origin, Priority,
};
use clarity_dsl::surface::{BinaryOperator, Literal, SurfaceKind, SurfaceNode};
use clarity_dsl::NodePath;
use thiserror::Error;

const PARAM_CONFIDENCE: Confidence = Confidence::known(0.95);
const BELIEF_CONFIDENCE: Confidence = Confidence::known(0.95);
const PROGRAM_INTENT_CONFIDENCE: Confidence = Confidence::known(0.9);
const FUNCTION_THRESHOLD: Confidence = Confidence::known(0.7);
const CONDITIONAL_THRESHOLD: Confidence = Confidence::known(0.5);
const TERMINATION_CONFIDENCE: Confidence = Confidence::known(0.5);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    #[error("{variant} at {path} is not allowed here: {reason}")]
    Misplaced {
        path: NodePath,
        variant: &'static str,
        reason: &'static str,
    },

    #[error("tree depth {depth} exceeds the limit of {limit}")]
    TooDeep { depth: usize, limit: usize },

    #[error("invalid confidence: {0}")]
    Confidence(#[from] ConfidenceError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoweringConfig {
    /// Collapse integer arithmetic on literals into a single literal.
    pub fold_constants: bool,
    /// Confidence assigned to restructured nodes (`While` → `Iteration`).
    pub rewrite_confidence: Confidence,
    /// Deepest surface tree the pass accepts. Checked up front, before any
    /// recursion.
    pub max_depth: usize,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            fold_constants: false,
            rewrite_confidence: REWRITE_CONFIDENCE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// The built-in forward pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowering {
    config: LoweringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root,
    Param,
    Other,
}

impl Lowering {
    pub fn new(config: LoweringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    // Recursive path: lower_node → lower_kind → boxed/lower_list. Annotation
    // building lives in `decorate` so its temporaries stay off that path.
    fn lower_node(
        &self,
        node: &SurfaceNode,
        path: &NodePath,
        slot: Slot,
        out: &mut Vec<Correspondence>,
    ) -> Result<DeepNode, LoweringError> {
        check_slot(node, path, slot)?;

        if self.config.fold_constants {
            if let Some(folded) = self.try_fold(node, path, out) {
                return Ok(folded);
            }
        }

        let kind = self.lower_kind(node, path, out)?;
        let deep = self.decorate(node, kind)?;
        let mapping = match node.kind {
            SurfaceKind::While { .. } => MappingKind::Rewritten,
            _ => MappingKind::Direct,
        };
        out.push(Correspondence::new(path.clone(), path.clone(), mapping));
        Ok(deep)
    }

    /// The mirrored deep variant, children lowered.
    fn lower_kind(
        &self,
        node: &SurfaceNode,
        path: &NodePath,
        out: &mut Vec<Correspondence>,
    ) -> Result<DeepKind, LoweringError> {
        Ok(match &node.kind {
            SurfaceKind::Program { items } => DeepKind::Program {
                items: self.lower_list(items, path, 0, Slot::Other, out)?,
            },
            SurfaceKind::Block { statements } => DeepKind::Block {
                statements: self.lower_list(statements, path, 0, Slot::Other, out)?,
            },
            SurfaceKind::FunctionDecl {
                name,
                params,
                return_type,
                body,
            } => DeepKind::FunctionDecl {
                name: name.clone(),
                params: self.lower_list(params, path, 0, Slot::Param, out)?,
                return_type: return_type.clone(),
                body: self.boxed(body, path, params.len(), out)?,
            },
            SurfaceKind::Param { name, ty } => DeepKind::Param {
                name: name.clone(),
                ty: ty.clone(),
                constraints: param_constraints(name, ty),
            },
            SurfaceKind::VarDecl {
                name,
                mutable,
                ty,
                value,
            } => DeepKind::VarDecl {
                name: name.clone(),
                mutable: *mutable,
                ty: ty.clone(),
                value: self.boxed(value, path, 0, out)?,
            },
            SurfaceKind::Assign { target, value } => DeepKind::Assign {
                target: target.clone(),
                value: self.boxed(value, path, 0, out)?,
            },
            SurfaceKind::Return { value } => DeepKind::Return {
                value: match value {
                    Some(v) => Some(self.boxed(v, path, 0, out)?),
                    None => None,
                },
            },
            SurfaceKind::If {
                condition,
                then_branch,
                else_branch,
            } => DeepKind::Conditional {
                condition: self.boxed(condition, path, 0, out)?,
                then_branch: self.boxed(then_branch, path, 1, out)?,
                else_branch: match else_branch {
                    Some(e) => Some(self.boxed(e, path, 2, out)?),
                    None => None,
                },
            },
            SurfaceKind::While { condition, body } => DeepKind::Iteration {
                condition: self.boxed(condition, path, 0, out)?,
                body: self.boxed(body, path, 1, out)?,
            },
            SurfaceKind::Call { callee, args } => DeepKind::Call {
                callee: callee.clone(),
                args: self.lower_list(args, path, 0, Slot::Other, out)?,
            },
            SurfaceKind::BinaryOp { op, lhs, rhs } => DeepKind::BinaryOp {
                op: *op,
                lhs: self.boxed(lhs, path, 0, out)?,
                rhs: self.boxed(rhs, path, 1, out)?,
            },
            SurfaceKind::UnaryOp { op, operand } => DeepKind::UnaryOp {
                op: *op,
                operand: self.boxed(operand, path, 0, out)?,
            },
            SurfaceKind::Identifier { name } => DeepKind::Identifier { name: name.clone() },
            SurfaceKind::Literal { value } => DeepKind::Literal {
                value: value.clone(),
            },
        })
    }

    /// Confidence, attribution and agent-only annotations for a lowered node.
    fn decorate(&self, node: &SurfaceNode, kind: DeepKind) -> Result<DeepNode, LoweringError> {
        let mut confidence = Confidence::CERTAIN;
        let mut attribution = Attribution::surface(Origin::HumanWritten, node.span);
        let mut annotations = Vec::new();

        match &node.kind {
            SurfaceKind::Program { .. } => annotations.push(synthesized(
                DeepKind::IntentDeclaration {
                    action: "execute_program".to_string(),
                    priority: Priority::Normal,
                    side_effects: Vec::new(),
                },
                PROGRAM_INTENT_CONFIDENCE,
            )),
            SurfaceKind::FunctionDecl {
                params,
                return_type,
                ..
            } => annotations.extend(self.function_annotations(node, params, return_type.as_deref())?),
            SurfaceKind::Param { .. } => confidence = PARAM_CONFIDENCE,
            SurfaceKind::VarDecl {
                name,
                mutable,
                value,
                ..
            } => {
                let known = match &value.kind {
                    SurfaceKind::Literal { value } => Some(value.clone()),
                    _ => None,
                };
                annotations.push(synthesized(
                    DeepKind::BeliefAssertion {
                        fact: format!("variable_{name}_initialized"),
                        value: known,
                        decay: if *mutable {
                            BeliefDecay::OverTime
                        } else {
                            BeliefDecay::None
                        },
                    },
                    BELIEF_CONFIDENCE,
                ));
            }
            SurfaceKind::If { .. } => annotations.push(synthesized(
                DeepKind::ReasoningContext {
                    assumptions: vec!["condition_is_boolean".to_string()],
                    preconditions: Vec::new(),
                    postconditions: vec!["exactly_one_branch_executes".to_string()],
                    invariants: Vec::new(),
                    confidence_threshold: CONDITIONAL_THRESHOLD,
                },
                Confidence::CERTAIN,
            )),
            SurfaceKind::While { .. } => {
                confidence = self.config.rewrite_confidence;
                attribution = Attribution::surface(Origin::Rewritten, node.span);
                annotations.push(synthesized(
                    DeepKind::ConfidenceAnnotation {
                        subject: "termination".to_string(),
                        note: "loop_termination_not_proven".to_string(),
                    },
                    TERMINATION_CONFIDENCE,
                ));
            }
            _ => {}
        }

        Ok(DeepNode {
            kind,
            confidence,
            attribution: Some(attribution),
            annotations,
        })
    }

    fn lower_list(
        &self,
        nodes: &[SurfaceNode],
        parent: &NodePath,
        offset: usize,
        slot: Slot,
        out: &mut Vec<Correspondence>,
    ) -> Result<Vec<DeepNode>, LoweringError> {
        nodes
            .iter()
            .enumerate()
            .map(|(i, n)| self.lower_node(n, &parent.child((offset + i) as u32), slot, out))
            .collect()
    }

    fn boxed(
        &self,
        node: &SurfaceNode,
        parent: &NodePath,
        index: usize,
        out: &mut Vec<Correspondence>,
    ) -> Result<Box<DeepNode>, LoweringError> {
        self.lower_node(node, &parent.child(index as u32), Slot::Other, out)
            .map(Box::new)
    }

    fn function_annotations(
        &self,
        decl: &SurfaceNode,
        params: &[SurfaceNode],
        return_type: Option<&str>,
    ) -> Result<Vec<DeepNode>, LoweringError> {
        let Some(analysis) = analyze_function(decl) else {
            return Ok(Vec::new());
        };
        let typed_params: Vec<(String, Vec<String>)> = params
            .iter()
            .filter_map(|p| match &p.kind {
                SurfaceKind::Param { name, ty } => Some((name.clone(), param_constraints(name, ty))),
                _ => None,
            })
            .collect();

        Ok(vec![
            synthesized(
                DeepKind::IntentDeclaration {
                    action: format!("execute_function_{}", analysis.name),
                    priority: analysis.priority,
                    side_effects: analysis.side_effect_labels(),
                },
                Confidence::CERTAIN,
            ),
            synthesized(
                DeepKind::ReasoningContext {
                    assumptions: analysis.assumptions(),
                    preconditions: analysis.preconditions(&typed_params),
                    postconditions: analysis.postconditions(return_type),
                    invariants: analysis.invariants(),
                    confidence_threshold: FUNCTION_THRESHOLD,
                },
                Confidence::CERTAIN,
            ),
            synthesized(
                DeepKind::ConfidenceAnnotation {
                    subject: "semantic_preservation".to_string(),
                    note: analysis.summary(),
                },
                Confidence::new(analysis.preservation_score)?,
            ),
        ])
    }

    /// Fold `<int> op <int>` into one literal when the result is defined.
    fn try_fold(
        &self,
        node: &SurfaceNode,
        path: &NodePath,
        out: &mut Vec<Correspondence>,
    ) -> Option<DeepNode> {
        let SurfaceKind::BinaryOp { op, lhs, rhs } = &node.kind else {
            return None;
        };
        let (
            SurfaceKind::Literal {
                value: Literal::Int(a),
            },
            SurfaceKind::Literal {
                value: Literal::Int(b),
            },
        ) = (&lhs.kind, &rhs.kind)
        else {
            return None;
        };
        let value = match op {
            BinaryOperator::Add => a.checked_add(*b)?,
            BinaryOperator::Sub => a.checked_sub(*b)?,
            BinaryOperator::Mul => a.checked_mul(*b)?,
            BinaryOperator::Div => a.checked_div(*b)?,
            BinaryOperator::Rem => a.checked_rem(*b)?,
            _ => return None,
        };

        for surface_path in [path.child(0), path.child(1), path.clone()] {
            out.push(Correspondence::new(surface_path, path.clone(), MappingKind::Folded));
        }
        Some(
            DeepNode::new(
                DeepKind::Literal {
                    value: Literal::Int(value),
                },
                Confidence::CERTAIN,
            )
            .with_attribution(Attribution::surface(Origin::Rewritten, node.span)),
        )
    }
}

impl ForwardTranslate for Lowering {
    fn lower(&self, surface: &SurfaceNode) -> Result<Lowered, LoweringError> {
        let depth = surface.depth();
        if depth > self.config.max_depth {
            return Err(LoweringError::TooDeep {
                depth,
                limit: self.config.max_depth,
            });
        }
        let surface_nodes = surface.node_count();
        let mut correspondences = Vec::with_capacity(surface_nodes);
        let deep = self.lower_node(surface, &NodePath::root(), Slot::Root, &mut correspondences)?;
        tracing::debug!(
            surface_nodes,
            deep_nodes = deep.node_count(),
            correspondences = correspondences.len(),
            "lowered surface tree"
        );
        Ok(Lowered {
            deep,
            correspondences,
        })
    }
}

fn check_slot(node: &SurfaceNode, path: &NodePath, slot: Slot) -> Result<(), LoweringError> {
    let reason = match (&node.kind, slot) {
        (SurfaceKind::Program { .. }, Slot::Root) => return Ok(()),
        (SurfaceKind::Program { .. }, _) => "a program must be the root",
        (SurfaceKind::Param { .. }, Slot::Param) => return Ok(()),
        (SurfaceKind::Param { .. }, _) => "parameters only appear in a function signature",
        (_, Slot::Param) => "a function signature only holds parameters",
        _ => return Ok(()),
    };
    Err(LoweringError::Misplaced {
        path: path.clone(),
        variant: node.variant_name(),
        reason,
    })
}

fn synthesized(kind: DeepKind, confidence: Confidence) -> DeepNode {
    DeepNode::new(kind, confidence).with_attribution(Attribution::synthesized())
}
