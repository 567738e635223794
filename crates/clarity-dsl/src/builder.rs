//! Programmatic construction of surface trees.
//!
//! The surface parser lives outside this workspace; callers that build
//! programs in code (tools, tests) use these helpers instead. Nodes start with
//! an empty span; use [`SurfaceNode::at`] to attach a real one.
//!
//! ```
//! use clarity_dsl::builder::*;
//! use clarity_dsl::BinaryOperator;
//!
//! let f = func(
//!     "inc",
//!     vec![param("x", "Int")],
//!     Some("Int"),
//!     block(vec![ret(Some(binary(BinaryOperator::Add, ident("x"), int(1))))]),
//! );
//! assert_eq!(f.variant_name(), "FunctionDecl");
//! ```

use crate::path::Span;
use crate::surface::{BinaryOperator, Literal, SurfaceKind, SurfaceNode, UnaryOperator};

impl SurfaceNode {
    /// Replace this node's span.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

fn node(kind: SurfaceKind) -> SurfaceNode {
    SurfaceNode::new(kind, Span::default())
}

pub fn program(items: Vec<SurfaceNode>) -> SurfaceNode {
    node(SurfaceKind::Program { items })
}

pub fn block(statements: Vec<SurfaceNode>) -> SurfaceNode {
    node(SurfaceKind::Block { statements })
}

pub fn func(
    name: &str,
    params: Vec<SurfaceNode>,
    return_type: Option<&str>,
    body: SurfaceNode,
) -> SurfaceNode {
    node(SurfaceKind::FunctionDecl {
        name: name.to_string(),
        params,
        return_type: return_type.map(str::to_string),
        body: Box::new(body),
    })
}

pub fn param(name: &str, ty: &str) -> SurfaceNode {
    node(SurfaceKind::Param {
        name: name.to_string(),
        ty: ty.to_string(),
    })
}

pub fn let_(name: &str, ty: Option<&str>, value: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::VarDecl {
        name: name.to_string(),
        mutable: false,
        ty: ty.map(str::to_string),
        value: Box::new(value),
    })
}

pub fn let_mut(name: &str, ty: Option<&str>, value: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::VarDecl {
        name: name.to_string(),
        mutable: true,
        ty: ty.map(str::to_string),
        value: Box::new(value),
    })
}

pub fn assign(target: &str, value: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::Assign {
        target: target.to_string(),
        value: Box::new(value),
    })
}

pub fn ret(value: Option<SurfaceNode>) -> SurfaceNode {
    node(SurfaceKind::Return {
        value: value.map(Box::new),
    })
}

pub fn if_(condition: SurfaceNode, then_branch: SurfaceNode, else_branch: Option<SurfaceNode>) -> SurfaceNode {
    node(SurfaceKind::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_(condition: SurfaceNode, body: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::While {
        condition: Box::new(condition),
        body: Box::new(body),
    })
}

pub fn call(callee: &str, args: Vec<SurfaceNode>) -> SurfaceNode {
    node(SurfaceKind::Call {
        callee: callee.to_string(),
        args,
    })
}

pub fn binary(op: BinaryOperator, lhs: SurfaceNode, rhs: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::BinaryOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn unary(op: UnaryOperator, operand: SurfaceNode) -> SurfaceNode {
    node(SurfaceKind::UnaryOp {
        op,
        operand: Box::new(operand),
    })
}

pub fn ident(name: &str) -> SurfaceNode {
    node(SurfaceKind::Identifier {
        name: name.to_string(),
    })
}

pub fn lit(value: Literal) -> SurfaceNode {
    node(SurfaceKind::Literal { value })
}

pub fn int(v: i64) -> SurfaceNode {
    lit(Literal::Int(v))
}

pub fn float(v: f64) -> SurfaceNode {
    lit(Literal::Float(v))
}

pub fn string(v: &str) -> SurfaceNode {
    lit(Literal::Str(v.to_string()))
}

pub fn boolean(v: bool) -> SurfaceNode {
    lit(Literal::Bool(v))
}

pub fn unit() -> SurfaceNode {
    lit(Literal::Unit)
}
