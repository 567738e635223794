//! Property-based tests for the translation engine
//!
//! 1. Translation is deterministic (same input, same digests and map)
//! 2. Lowering then raising is the identity under canonicalization
//! 3. Changing any leaf changes the surface digest
//! 4. Spans never influence digests
//! 5. Source maps cover every surface node and every mirrored deep node

use clarity_bridge::canonical::canonical_surface;
use clarity_bridge::proof::ProofGenerator;
use clarity_bridge::{
    ForwardTranslate, Lowering, Raising, ReverseTranslate, SourceMapBuilder, Translator,
};
use clarity_dsl::builder::*;
use clarity_dsl::{BinaryOperator, Literal, Span, SurfaceKind, SurfaceNode, UnaryOperator};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Int".to_string()),
        Just("Float".to_string()),
        Just("String".to_string()),
        Just("Bool".to_string()),
    ]
}

fn literal_strategy() -> impl Strategy<Value = SurfaceNode> {
    prop_oneof![
        any::<i64>().prop_map(int),
        (-1.0e6f64..1.0e6f64).prop_map(float),
        "[a-z \"]{0,8}".prop_map(|s| string(&s)),
        any::<bool>().prop_map(boolean),
        Just(unit()),
    ]
}

fn binop_strategy() -> impl Strategy<Value = BinaryOperator> {
    prop_oneof![
        Just(BinaryOperator::Add),
        Just(BinaryOperator::Sub),
        Just(BinaryOperator::Mul),
        Just(BinaryOperator::Div),
        Just(BinaryOperator::Lt),
        Just(BinaryOperator::Eq),
        Just(BinaryOperator::And),
    ]
}

fn expr_strategy() -> impl Strategy<Value = SurfaceNode> {
    let leaf = prop_oneof![name_strategy().prop_map(|n| ident(&n)), literal_strategy()];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (binop_strategy(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| binary(op, l, r)),
            (prop_oneof![Just(UnaryOperator::Neg), Just(UnaryOperator::Not)], inner.clone())
                .prop_map(|(op, e)| unary(op, e)),
            (name_strategy(), prop::collection::vec(inner, 0..3))
                .prop_map(|(callee, args)| call(&callee, args)),
        ]
    })
}

fn stmt_strategy() -> impl Strategy<Value = SurfaceNode> {
    let simple = prop_oneof![
        (name_strategy(), any::<bool>(), expr_strategy()).prop_map(|(n, m, e)| if m {
            let_mut(&n, None, e)
        } else {
            let_(&n, Some("Int"), e)
        }),
        (name_strategy(), expr_strategy()).prop_map(|(n, e)| assign(&n, e)),
        prop::option::of(expr_strategy()).prop_map(ret),
        (name_strategy(), prop::collection::vec(expr_strategy(), 0..2))
            .prop_map(|(n, a)| call(&n, a)),
    ];
    simple.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (
                expr_strategy(),
                prop::collection::vec(inner.clone(), 0..3),
                prop::option::of(prop::collection::vec(inner.clone(), 0..3)),
            )
                .prop_map(|(c, t, e)| if_(c, block(t), e.map(block))),
            (expr_strategy(), prop::collection::vec(inner, 0..3))
                .prop_map(|(c, body)| while_(c, block(body))),
        ]
    })
}

fn function_strategy() -> impl Strategy<Value = SurfaceNode> {
    (
        name_strategy(),
        prop::collection::vec((name_strategy(), type_strategy()), 0..3),
        prop::option::of(type_strategy()),
        prop::collection::vec(stmt_strategy(), 0..4),
    )
        .prop_map(|(name, params, ret_ty, body)| {
            let params = params.iter().map(|(n, t)| param(n, t)).collect();
            func(&name, params, ret_ty.as_deref(), block(body))
        })
}

fn program_strategy() -> impl Strategy<Value = SurfaceNode> {
    prop::collection::vec(function_strategy(), 0..3).prop_map(program)
}

// ============================================================================
// Helpers
// ============================================================================

/// Pre-order visit of every node, mutably.
fn visit_mut(node: &mut SurfaceNode, f: &mut dyn FnMut(&mut SurfaceNode)) {
    f(node);
    match &mut node.kind {
        SurfaceKind::Program { items: nodes }
        | SurfaceKind::Block { statements: nodes }
        | SurfaceKind::Call { args: nodes, .. } => {
            for n in nodes {
                visit_mut(n, f);
            }
        }
        SurfaceKind::FunctionDecl { params, body, .. } => {
            for p in params {
                visit_mut(p, f);
            }
            visit_mut(body, f);
        }
        SurfaceKind::VarDecl { value, .. } | SurfaceKind::Assign { value, .. } => {
            visit_mut(value, f)
        }
        SurfaceKind::Return { value } => {
            if let Some(v) = value {
                visit_mut(v, f);
            }
        }
        SurfaceKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            visit_mut(condition, f);
            visit_mut(then_branch, f);
            if let Some(e) = else_branch {
                visit_mut(e, f);
            }
        }
        SurfaceKind::While { condition, body } => {
            visit_mut(condition, f);
            visit_mut(body, f);
        }
        SurfaceKind::BinaryOp { lhs, rhs, .. } => {
            visit_mut(lhs, f);
            visit_mut(rhs, f);
        }
        SurfaceKind::UnaryOp { operand, .. } => visit_mut(operand, f),
        SurfaceKind::Param { .. } | SurfaceKind::Identifier { .. } | SurfaceKind::Literal { .. } => {}
    }
}

fn is_leaf(node: &SurfaceNode) -> bool {
    matches!(
        node.kind,
        SurfaceKind::Param { .. } | SurfaceKind::Identifier { .. } | SurfaceKind::Literal { .. }
    )
}

fn mutate_leaf(node: &mut SurfaceNode) {
    match &mut node.kind {
        SurfaceKind::Param { name, .. } | SurfaceKind::Identifier { name } => name.push('\''),
        SurfaceKind::Literal { value } => {
            *value = match value {
                Literal::Int(v) => Literal::Int(v.wrapping_add(1)),
                Literal::Float(v) => Literal::Float(*v + 1.0),
                Literal::Str(s) => Literal::Str(format!("{s}!")),
                Literal::Bool(b) => Literal::Bool(!*b),
                Literal::Unit => Literal::Int(0),
            }
        }
        _ => {}
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn translation_is_deterministic(ast in program_strategy()) {
        let translator = Translator::default();
        let a = translator.translate_with_provenance(&ast, "", "1.0", "0.1").unwrap();
        let b = translator.translate_with_provenance(&ast, "", "1.0", "0.1").unwrap();
        prop_assert_eq!(&a.proof.combined_hash, &b.proof.combined_hash);
        prop_assert_eq!(&a.proof.deep_fragment_hash, &b.proof.deep_fragment_hash);
        prop_assert_eq!(&a.source_map, &b.source_map);
        prop_assert_eq!(&a.versioning_info, &b.versioning_info);
    }

    #[test]
    fn round_trip_is_identity_under_canonicalization(ast in program_strategy()) {
        let deep = Lowering::default().lower(&ast).unwrap().deep;
        let back = Raising::default().raise(&deep).unwrap();
        prop_assert_eq!(canonical_surface(&back).unwrap(), canonical_surface(&ast).unwrap());

        let bundle = Translator::default()
            .translate_with_provenance(&ast, "", "1.0", "0.1")
            .unwrap();
        prop_assert!(bundle.trust_boundary_validation.validated);
        prop_assert!(bundle.trust_boundary_validation.discrepancies.is_empty());
    }

    #[test]
    fn any_leaf_change_changes_the_digest(ast in program_strategy(), pick in any::<usize>()) {
        let mut leaves = 0usize;
        let mut scratch = ast.clone();
        visit_mut(&mut scratch, &mut |n: &mut SurfaceNode| if is_leaf(n) { leaves += 1 });
        prop_assume!(leaves > 0);

        let target = pick % leaves;
        let mut seen = 0usize;
        let mut mutated = ast.clone();
        visit_mut(&mut mutated, &mut |n: &mut SurfaceNode| {
            if is_leaf(n) {
                if seen == target {
                    mutate_leaf(n);
                }
                seen += 1;
            }
        });

        let digests = ProofGenerator::default();
        prop_assert_ne!(
            digests.digest_surface(&ast).unwrap(),
            digests.digest_surface(&mutated).unwrap()
        );
    }

    #[test]
    fn spans_never_reach_the_digest(ast in program_strategy(), seed in 1u32..1000) {
        let mut spanned = ast.clone();
        let mut line = seed;
        visit_mut(&mut spanned, &mut |n: &mut SurfaceNode| {
            n.span = Span::from_coords(line, 1, line, 1 + (line % 40));
            line += 1;
        });

        let translator = Translator::default();
        let a = translator.translate_with_provenance(&ast, "", "1.0", "0.1").unwrap();
        let b = translator.translate_with_provenance(&spanned, "", "1.0", "0.1").unwrap();
        prop_assert_eq!(a.proof.combined_hash, b.proof.combined_hash);
    }

    #[test]
    fn source_map_is_total(ast in program_strategy()) {
        let mut spanned = ast.clone();
        let mut line = 1u32;
        visit_mut(&mut spanned, &mut |n: &mut SurfaceNode| {
            n.span = Span::from_coords(line, 1, line, 2);
            line += 1;
        });

        let lowered = Lowering::default().lower(&spanned).unwrap();
        let map = SourceMapBuilder::default()
            .build(&spanned, &lowered.deep, &lowered.correspondences)
            .unwrap();
        prop_assert_eq!(map.len(), spanned.node_count());

        for (path, node) in lowered.deep.walk() {
            let spans = map.deep_path_to_spans(&path);
            if node.is_agent_only() {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(spans.len(), 1);
                prop_assert_eq!(Some(spans[0]), spanned.node_at(&path).map(|s| s.span));
            }
        }
    }
}
