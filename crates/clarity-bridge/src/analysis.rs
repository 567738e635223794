//! Static analysis of surface functions.
//!
//! The forward pass uses these results to fill in the agent-only constructs
//! it attaches to each function (intent, reasoning context, preservation
//! score). Everything here is derived from the syntax tree; nothing is
//! guessed from names except where a name is the only signal available
//! (priority, parameter roles, effectful callees).

use clarity_dsl::deep::Priority;
use clarity_dsl::surface::{BinaryOperator, SurfaceKind, SurfaceNode};
use std::collections::BTreeSet;

/// Callee-name fragments that indicate an effect class.
const IO_MARKERS: &[&str] = &["print", "read", "write", "file", "io"];
const NETWORK_MARKERS: &[&str] = &["fetch", "send", "request", "network"];
const ALLOCATION_MARKERS: &[&str] = &["create", "allocate", "buffer", "array"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SideEffect {
    /// Assigns to a name that is neither a parameter nor a local.
    ModifiesState,
    Io,
    Network,
    MemoryAllocation,
}

impl SideEffect {
    pub fn as_str(self) -> &'static str {
        match self {
            SideEffect::ModifiesState => "modifies_state",
            SideEffect::Io => "io_operations",
            SideEffect::Network => "network_operations",
            SideEffect::MemoryAllocation => "memory_allocation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAnalysis {
    pub name: String,
    pub recursive: bool,
    pub loops: usize,
    pub conditionals: usize,
    /// Distinct callee names, sorted.
    pub calls: BTreeSet<String>,
    pub side_effects: BTreeSet<SideEffect>,
    pub divides: bool,
    pub priority: Priority,
    pub preservation_score: f64,
}

impl FunctionAnalysis {
    pub fn assumptions(&self) -> Vec<String> {
        let mut out = vec!["inputs_are_valid".to_string()];
        out.extend(
            self.calls
                .iter()
                .filter(|c| **c != self.name)
                .map(|c| format!("callee_{c}_is_defined")),
        );
        if self.recursive {
            out.push("recursion_reaches_base_case".to_string());
        }
        out
    }

    pub fn preconditions(&self, params: &[(String, Vec<String>)]) -> Vec<String> {
        let mut out: Vec<String> = params
            .iter()
            .flat_map(|(name, constraints)| constraints.iter().map(move |c| format!("{name}:{c}")))
            .collect();
        if self.divides {
            out.push("divisors_nonzero".to_string());
        }
        out
    }

    pub fn postconditions(&self, return_type: Option<&str>) -> Vec<String> {
        let mut out = vec![format!("returns_{}", return_type.unwrap_or("Unit"))];
        if self.side_effects.is_empty() {
            out.push("no_observable_side_effects".to_string());
        }
        out
    }

    pub fn invariants(&self) -> Vec<String> {
        let mut out = vec!["type_safety_maintained".to_string()];
        if self.loops > 0 {
            out.push("loop_conditions_eventually_false".to_string());
        }
        out
    }

    pub fn side_effect_labels(&self) -> Vec<String> {
        self.side_effects.iter().map(|e| e.as_str().to_string()).collect()
    }

    /// Compact `key=value` summary used in confidence annotations.
    pub fn summary(&self) -> String {
        format!(
            "recursive={};loops={};conditionals={};calls={}",
            self.recursive,
            self.loops,
            self.conditionals,
            self.calls.len()
        )
    }
}

/// Analyze a `FunctionDecl` node; `None` for any other node.
pub fn analyze_function(decl: &SurfaceNode) -> Option<FunctionAnalysis> {
    let SurfaceKind::FunctionDecl {
        name, params, body, ..
    } = &decl.kind
    else {
        return None;
    };

    let mut locals: BTreeSet<String> = params
        .iter()
        .filter_map(|p| match &p.kind {
            SurfaceKind::Param { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();

    let mut acc = Accumulator::default();
    acc.visit(body, &mut locals);

    let recursive = acc.calls.contains(name);
    let mut side_effects = BTreeSet::new();
    if acc.writes_nonlocal {
        side_effects.insert(SideEffect::ModifiesState);
    }
    for callee in &acc.calls {
        let lower = callee.to_lowercase();
        if IO_MARKERS.iter().any(|m| lower.contains(m)) {
            side_effects.insert(SideEffect::Io);
        }
        if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
            side_effects.insert(SideEffect::Network);
        }
        if ALLOCATION_MARKERS.iter().any(|m| lower.contains(m)) {
            side_effects.insert(SideEffect::MemoryAllocation);
        }
    }

    Some(FunctionAnalysis {
        name: name.clone(),
        recursive,
        loops: acc.loops,
        conditionals: acc.conditionals,
        calls: acc.calls,
        side_effects,
        divides: acc.divides,
        priority: priority_for(name),
        preservation_score: preservation_score(recursive, acc.loops, acc.conditionals),
    })
}

#[derive(Default)]
struct Accumulator {
    loops: usize,
    conditionals: usize,
    calls: BTreeSet<String>,
    writes_nonlocal: bool,
    divides: bool,
}

impl Accumulator {
    fn visit(&mut self, node: &SurfaceNode, locals: &mut BTreeSet<String>) {
        match &node.kind {
            SurfaceKind::While { .. } => self.loops += 1,
            SurfaceKind::If { .. } => self.conditionals += 1,
            SurfaceKind::Call { callee, .. } => {
                self.calls.insert(callee.clone());
            }
            SurfaceKind::VarDecl { name, .. } => {
                locals.insert(name.clone());
            }
            SurfaceKind::Assign { target, .. } => {
                if !locals.contains(target) {
                    self.writes_nonlocal = true;
                }
            }
            SurfaceKind::BinaryOp {
                op: BinaryOperator::Div | BinaryOperator::Rem,
                ..
            } => self.divides = true,
            // Nested functions get their own analysis.
            SurfaceKind::FunctionDecl { .. } => return,
            _ => {}
        }
        for child in node.children() {
            self.visit(child, locals);
        }
    }
}

/// Constraints implied by a parameter's type and role.
pub fn param_constraints(name: &str, ty: &str) -> Vec<String> {
    let mut out: Vec<&str> = match ty {
        "Int" => vec!["within_machine_limits"],
        "Float" => vec!["finite_number"],
        "String" => vec!["valid_utf8"],
        _ => vec![],
    };

    let lower = name.to_lowercase();
    if lower.contains("count") || lower.contains("size") || lower.contains("len") {
        out.push("non_negative");
    } else if lower.contains("index") || lower == "idx" {
        out.push("within_bounds");
    } else if lower.contains("ratio") || lower.contains("percentage") {
        out.push("between_0_and_1");
    }
    out.into_iter().map(str::to_string).collect()
}

pub fn priority_for(name: &str) -> Priority {
    let lower = name.to_lowercase();
    if lower.contains("critical") || lower.contains("emergency") {
        Priority::High
    } else if lower.contains("background") || lower.contains("maintenance") {
        Priority::Low
    } else {
        Priority::Normal
    }
}

/// How much of a function's meaning the deep layer is expected to keep.
///
/// Starts at 0.95, loses 0.05 each for recursion, more than two loops and more
/// than three conditionals, never below 0.7.
pub fn preservation_score(recursive: bool, loops: usize, conditionals: usize) -> f64 {
    let mut score: f64 = 0.95;
    if recursive {
        score -= 0.05;
    }
    if loops > 2 {
        score -= 0.05;
    }
    if conditionals > 3 {
        score -= 0.05;
    }
    score.max(0.7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use clarity_dsl::builder::*;

    fn factorial() -> SurfaceNode {
        func(
            "factorial",
            vec![param("n", "Int")],
            Some("Int"),
            block(vec![if_(
                binary(BinaryOperator::Le, ident("n"), int(1)),
                block(vec![ret(Some(int(1)))]),
                Some(block(vec![ret(Some(binary(
                    BinaryOperator::Mul,
                    ident("n"),
                    call(
                        "factorial",
                        vec![binary(BinaryOperator::Sub, ident("n"), int(1))],
                    ),
                )))])),
            )]),
        )
    }

    #[test]
    fn detects_recursion_and_branches() {
        let a = analyze_function(&factorial()).unwrap();
        assert!(a.recursive);
        assert_eq!(a.conditionals, 1);
        assert_eq!(a.loops, 0);
        assert!(a.side_effects.is_empty());
        assert_relative_eq!(a.preservation_score, 0.90, epsilon = 1e-12);
        assert_eq!(a.assumptions().last().unwrap(), "recursion_reaches_base_case");
    }

    #[test]
    fn detects_effects_from_body() {
        let f = func(
            "log_total",
            vec![param("count", "Int")],
            None,
            block(vec![
                let_mut("i", None, int(0)),
                while_(
                    binary(BinaryOperator::Lt, ident("i"), ident("count")),
                    block(vec![
                        assign("i", binary(BinaryOperator::Add, ident("i"), int(1))),
                        assign("total", binary(BinaryOperator::Div, ident("total"), ident("i"))),
                    ]),
                ),
                call("print_line", vec![ident("total")]),
            ]),
        );
        let a = analyze_function(&f).unwrap();
        assert_eq!(a.loops, 1);
        assert!(a.divides);
        assert_eq!(
            a.side_effect_labels(),
            vec!["modifies_state", "io_operations"]
        );
        assert_eq!(
            a.preconditions(&[("count".into(), param_constraints("count", "Int"))]),
            vec![
                "count:within_machine_limits",
                "count:non_negative",
                "divisors_nonzero"
            ]
        );
        assert!(a.invariants().contains(&"loop_conditions_eventually_false".to_string()));
    }

    #[test]
    fn non_function_has_no_analysis() {
        assert!(analyze_function(&int(3)).is_none());
    }

    #[test]
    fn score_has_floor() {
        assert_relative_eq!(preservation_score(true, 3, 4), 0.80, epsilon = 1e-12);
        assert_relative_eq!(preservation_score(false, 0, 0), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn priority_and_constraints_from_names() {
        assert_eq!(priority_for("emergency_shutdown"), Priority::High);
        assert_eq!(priority_for("background_sync"), Priority::Low);
        assert_eq!(priority_for("add"), Priority::Normal);
        assert_eq!(
            param_constraints("ratio", "Float"),
            vec!["finite_number", "between_0_and_1"]
        );
        assert!(param_constraints("name", "Custom").is_empty());
    }
}
