//! Clarity surface syntax tree.
//!
//! The tree is produced by an external parser; this module only fixes the
//! contract. Every node carries its source [`Span`]; paths are derived by
//! traversal ([`SurfaceNode::walk`], [`SurfaceNode::node_at`]).
//!
//! Child order (the order used for paths and canonical serialization):
//!
//! | variant        | children                           |
//! |----------------|------------------------------------|
//! | `Program`      | items                              |
//! | `Block`        | statements                         |
//! | `FunctionDecl` | params…, body                      |
//! | `VarDecl`      | value                              |
//! | `Assign`       | value                              |
//! | `Return`       | value?                             |
//! | `If`           | condition, then_branch, else_branch?|
//! | `While`        | condition, body                    |
//! | `Call`         | args…                              |
//! | `BinaryOp`     | lhs, rhs                           |
//! | `UnaryOp`      | operand                            |

use crate::path::{NodePath, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Literals and operators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => "Int",
            Literal::Float(_) => "Float",
            Literal::Str(_) => "String",
            Literal::Bool(_) => "Bool",
            Literal::Unit => "Unit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq | BinaryOperator::Ne => 3,
            BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => 4,
            BinaryOperator::Add | BinaryOperator::Sub => 5,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Rem => 6,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Neg,
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Not => "!",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A surface syntax node with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceNode {
    #[serde(flatten)]
    pub kind: SurfaceKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum SurfaceKind {
    Program {
        items: Vec<SurfaceNode>,
    },
    Block {
        statements: Vec<SurfaceNode>,
    },
    FunctionDecl {
        name: String,
        params: Vec<SurfaceNode>,
        return_type: Option<String>,
        body: Box<SurfaceNode>,
    },
    Param {
        name: String,
        ty: String,
    },
    VarDecl {
        name: String,
        mutable: bool,
        ty: Option<String>,
        value: Box<SurfaceNode>,
    },
    Assign {
        target: String,
        value: Box<SurfaceNode>,
    },
    Return {
        value: Option<Box<SurfaceNode>>,
    },
    If {
        condition: Box<SurfaceNode>,
        then_branch: Box<SurfaceNode>,
        else_branch: Option<Box<SurfaceNode>>,
    },
    While {
        condition: Box<SurfaceNode>,
        body: Box<SurfaceNode>,
    },
    Call {
        callee: String,
        args: Vec<SurfaceNode>,
    },
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<SurfaceNode>,
        rhs: Box<SurfaceNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<SurfaceNode>,
    },
    Identifier {
        name: String,
    },
    Literal {
        value: Literal,
    },
}

impl SurfaceKind {
    pub fn variant_name(&self) -> &'static str {
        match self {
            SurfaceKind::Program { .. } => "Program",
            SurfaceKind::Block { .. } => "Block",
            SurfaceKind::FunctionDecl { .. } => "FunctionDecl",
            SurfaceKind::Param { .. } => "Param",
            SurfaceKind::VarDecl { .. } => "VarDecl",
            SurfaceKind::Assign { .. } => "Assign",
            SurfaceKind::Return { .. } => "Return",
            SurfaceKind::If { .. } => "If",
            SurfaceKind::While { .. } => "While",
            SurfaceKind::Call { .. } => "Call",
            SurfaceKind::BinaryOp { .. } => "BinaryOp",
            SurfaceKind::UnaryOp { .. } => "UnaryOp",
            SurfaceKind::Identifier { .. } => "Identifier",
            SurfaceKind::Literal { .. } => "Literal",
        }
    }
}

impl SurfaceNode {
    pub fn new(kind: SurfaceKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn variant_name(&self) -> &'static str {
        self.kind.variant_name()
    }

    /// Children in declaration order.
    pub fn children(&self) -> Vec<&SurfaceNode> {
        match &self.kind {
            SurfaceKind::Program { items } => items.iter().collect(),
            SurfaceKind::Block { statements } => statements.iter().collect(),
            SurfaceKind::FunctionDecl { params, body, .. } => {
                params.iter().chain(std::iter::once(body.as_ref())).collect()
            }
            SurfaceKind::VarDecl { value, .. } | SurfaceKind::Assign { value, .. } => {
                vec![value.as_ref()]
            }
            SurfaceKind::Return { value } => value.as_deref().into_iter().collect(),
            SurfaceKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![condition.as_ref(), then_branch.as_ref()];
                out.extend(else_branch.as_deref());
                out
            }
            SurfaceKind::While { condition, body } => vec![condition.as_ref(), body.as_ref()],
            SurfaceKind::Call { args, .. } => args.iter().collect(),
            SurfaceKind::BinaryOp { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            SurfaceKind::UnaryOp { operand, .. } => vec![operand.as_ref()],
            SurfaceKind::Param { .. } | SurfaceKind::Identifier { .. } | SurfaceKind::Literal { .. } => {
                Vec::new()
            }
        }
    }

    pub fn child(&self, index: usize) -> Option<&SurfaceNode> {
        self.children().get(index).copied()
    }

    /// Resolve a path relative to this node.
    pub fn node_at(&self, path: &NodePath) -> Option<&SurfaceNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &idx| node.child(idx as usize))
    }

    /// Pre-order traversal yielding every node with its (recomputed) path.
    pub fn walk(&self) -> Vec<(NodePath, &SurfaceNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(NodePath::root(), self)];
        while let Some((path, node)) = stack.pop() {
            let children = node.children();
            for (idx, child) in children.into_iter().enumerate().rev() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    fn sample() -> SurfaceNode {
        program(vec![func(
            "f",
            vec![param("x", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Add, ident("x"), int(1))))]),
        )])
    }

    #[test]
    fn walk_is_preorder_with_unique_paths() {
        let ast = sample();
        let walked = ast.walk();
        let names: Vec<_> = walked.iter().map(|(_, n)| n.variant_name()).collect();
        assert_eq!(
            names,
            vec![
                "Program",
                "FunctionDecl",
                "Param",
                "Block",
                "Return",
                "BinaryOp",
                "Identifier",
                "Literal"
            ]
        );

        let mut paths: Vec<_> = walked.iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), walked.len());
        assert_eq!(ast.node_count(), walked.len());
    }

    #[test]
    fn node_at_resolves_walked_paths() {
        let ast = sample();
        for (path, node) in ast.walk() {
            assert_eq!(ast.node_at(&path), Some(node));
        }
        assert!(ast.node_at(&NodePath::from_indices([0, 7])).is_none());
    }

    #[test]
    fn depth_counts_edges_to_the_deepest_node() {
        assert_eq!(ident("x").depth(), 0);
        // Program / FunctionDecl / Block / Return / BinaryOp / Identifier
        assert_eq!(sample().depth(), 5);

        let mut chain = int(1);
        for _ in 0..1000 {
            chain = unary(UnaryOperator::Neg, chain);
        }
        assert_eq!(chain.depth(), 1000);
        assert_eq!(chain.node_count(), 1001);
    }

    #[test]
    fn surface_tree_json_roundtrip() {
        let ast = sample();
        let json = serde_json::to_string(&ast).unwrap();
        let back: SurfaceNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ast);
    }
}
