//! Render a surface tree back to Clarity source text.
//!
//! Output is normalized (4-space indentation, one statement per line,
//! minimal parentheses), so rendering a re-parsed program yields the same
//! text. Spans are ignored.

use crate::surface::{Literal, SurfaceKind, SurfaceNode};
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Render a whole tree (a program, a declaration, a statement or an expression).
pub fn render(node: &SurfaceNode) -> String {
    let mut out = String::new();
    match &node.kind {
        SurfaceKind::Program { items } => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_statement(&mut out, item, 0);
            }
        }
        SurfaceKind::Block { .. }
        | SurfaceKind::FunctionDecl { .. }
        | SurfaceKind::VarDecl { .. }
        | SurfaceKind::Assign { .. }
        | SurfaceKind::Return { .. }
        | SurfaceKind::If { .. }
        | SurfaceKind::While { .. } => write_statement(&mut out, node, 0),
        _ => out.push_str(&render_expr(node)),
    }
    out
}

fn pad(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_block(out: &mut String, node: &SurfaceNode, depth: usize) {
    out.push_str("{\n");
    match &node.kind {
        SurfaceKind::Block { statements } => {
            for stmt in statements {
                write_statement(out, stmt, depth + 1);
            }
        }
        // A non-block body still renders as a one-statement block.
        _ => write_statement(out, node, depth + 1),
    }
    pad(out, depth);
    out.push('}');
}

fn write_statement(out: &mut String, node: &SurfaceNode, depth: usize) {
    pad(out, depth);
    match &node.kind {
        SurfaceKind::FunctionDecl {
            name,
            params,
            return_type,
            body,
        } => {
            let params: Vec<String> = params.iter().map(render_expr).collect();
            let _ = write!(out, "fn {name}({})", params.join(", "));
            if let Some(ty) = return_type {
                let _ = write!(out, " -> {ty}");
            }
            out.push(' ');
            write_block(out, body, depth);
        }
        SurfaceKind::Block { .. } => write_block(out, node, depth),
        SurfaceKind::VarDecl {
            name,
            mutable,
            ty,
            value,
        } => {
            out.push_str("let ");
            if *mutable {
                out.push_str("mut ");
            }
            out.push_str(name);
            if let Some(ty) = ty {
                let _ = write!(out, ": {ty}");
            }
            let _ = write!(out, " = {};", render_expr(value));
        }
        SurfaceKind::Assign { target, value } => {
            let _ = write!(out, "{target} = {};", render_expr(value));
        }
        SurfaceKind::Return { value } => match value {
            Some(v) => {
                let _ = write!(out, "return {};", render_expr(v));
            }
            None => out.push_str("return;"),
        },
        SurfaceKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let _ = write!(out, "if {} ", render_expr(condition));
            write_block(out, then_branch, depth);
            if let Some(else_branch) = else_branch {
                out.push_str(" else ");
                write_block(out, else_branch, depth);
            }
        }
        SurfaceKind::While { condition, body } => {
            let _ = write!(out, "while {} ", render_expr(condition));
            write_block(out, body, depth);
        }
        SurfaceKind::Program { .. } => out.push_str(render(node).trim_end()),
        _ => {
            out.push_str(&render_expr(node));
            out.push(';');
        }
    }
    out.push('\n');
}

/// Render an expression (or a parameter) on one line.
pub fn render_expr(node: &SurfaceNode) -> String {
    match &node.kind {
        SurfaceKind::Literal { value } => render_literal(value),
        SurfaceKind::Identifier { name } => name.clone(),
        SurfaceKind::Param { name, ty } => format!("{name}: {ty}"),
        SurfaceKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(render_expr).collect();
            format!("{callee}({})", args.join(", "))
        }
        SurfaceKind::UnaryOp { op, operand } => {
            let inner = render_expr(operand);
            if matches!(operand.kind, SurfaceKind::BinaryOp { .. }) {
                format!("{op}({inner})")
            } else {
                format!("{op}{inner}")
            }
        }
        SurfaceKind::BinaryOp { op, lhs, rhs } => {
            let prec = op.precedence();
            let left = render_operand(lhs, prec, false);
            let right = render_operand(rhs, prec, true);
            format!("{left} {op} {right}")
        }
        // Statements in expression position: fall back to statement form.
        _ => render(node).trim_end().to_string(),
    }
}

fn render_operand(node: &SurfaceNode, parent_prec: u8, is_right: bool) -> String {
    let text = render_expr(node);
    match &node.kind {
        SurfaceKind::BinaryOp { op, .. } => {
            let prec = op.precedence();
            // Left-associative: equal precedence on the right needs parens.
            if prec < parent_prec || (is_right && prec == parent_prec) {
                format!("({text})")
            } else {
                text
            }
        }
        _ => text,
    }
}

pub fn render_literal(value: &Literal) -> String {
    match value {
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => format!("{v:?}"),
        Literal::Str(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
        Literal::Bool(b) => b.to_string(),
        Literal::Unit => "()".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::surface::{BinaryOperator, UnaryOperator};

    #[test]
    fn renders_function_with_return() {
        let f = program(vec![func(
            "f",
            vec![param("x", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Add, ident("x"), int(1))))]),
        )]);
        assert_eq!(render(&f), "fn f(x: Int) -> Int {\n    return x + 1;\n}\n");
    }

    #[test]
    fn renders_control_flow_nested() {
        let body = block(vec![
            let_mut("i", Some("Int"), int(0)),
            while_(
                binary(BinaryOperator::Lt, ident("i"), int(10)),
                block(vec![
                    if_(
                        call("even", vec![ident("i")]),
                        block(vec![call("print", vec![string("even")])]),
                        Some(block(vec![])),
                    ),
                    assign("i", binary(BinaryOperator::Add, ident("i"), int(1))),
                ]),
            ),
        ]);
        let text = render(&func("count", vec![], None, body));
        let expected = "\
fn count() {
    let mut i: Int = 0;
    while i < 10 {
        if even(i) {
            print(\"even\");
        } else {
        }
        i = i + 1;
    }
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn parenthesizes_by_precedence() {
        let e = binary(
            BinaryOperator::Mul,
            binary(BinaryOperator::Add, ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(render_expr(&e), "(a + b) * c");

        let e = binary(
            BinaryOperator::Sub,
            ident("a"),
            binary(BinaryOperator::Sub, ident("b"), ident("c")),
        );
        assert_eq!(render_expr(&e), "a - (b - c)");

        let e = unary(UnaryOperator::Not, binary(BinaryOperator::And, boolean(true), ident("x")));
        assert_eq!(render_expr(&e), "!(true && x)");
    }

    #[test]
    fn escapes_strings_and_keeps_float_point() {
        assert_eq!(render_literal(&Literal::Str("a\"b\\".into())), "\"a\\\"b\\\\\"");
        assert_eq!(render_literal(&Literal::Float(2.0)), "2.0");
        assert_eq!(render_literal(&Literal::Unit), "()");
    }
}
