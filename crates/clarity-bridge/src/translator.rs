//! Translation orchestrator.
//!
//! Runs the stages in a fixed order and returns everything or nothing:
//!
//! ```text
//! lower → source map → proof → compatibility → trust validation → bundle
//! ```
//!
//! A failing stage aborts the call with a [`TranslationError`] naming the
//! stage. An unknown version pair or a failed round trip is not a failure:
//! both are reported inside the [`ProvenanceBundle`].

use crate::compat::{CompatibilityMatrix, CompatibilityTracker, RuleTable, VersionToken};
use crate::config::BridgeConfig;
use crate::proof::{ProofGenerator, TranslationProof};
use crate::source_map::{align, SourceMap, SourceMapError};
use crate::trust::{TrustBoundaryValidation, TrustError, TrustValidator};
use crate::{
    Correspondence, ForwardTranslate, Lowered, Lowering, LoweringError, RaisingError,
    ReverseTranslate, SerializationError,
};
use clarity_dsl::render::render;
use clarity_dsl::{DeepNode, SurfaceNode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lowering,
    SourceMap,
    Proof,
    TrustValidation,
    Raising,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Lowering => "lowering",
            Stage::SourceMap => "source map",
            Stage::Proof => "proof",
            Stage::TrustValidation => "trust validation",
            Stage::Raising => "raising",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Lowering(#[from] LoweringError),
    #[error(transparent)]
    Raising(#[from] RaisingError),
    #[error(transparent)]
    SourceMap(#[from] SourceMapError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Trust(#[from] TrustError),
}

#[derive(Debug, Error)]
#[error("translation failed at {stage}: {cause}")]
pub struct TranslationError {
    pub stage: Stage,
    #[source]
    pub cause: StageFailure,
}

impl TranslationError {
    fn at(stage: Stage) -> impl FnOnce(StageFailure) -> Self {
        move |cause| Self { stage, cause }
    }
}

/// Everything a consumer needs to check one translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceBundle {
    pub proof: TranslationProof,
    pub source_map: SourceMap,
    pub versioning_info: CompatibilityMatrix,
    pub trust_boundary_validation: TrustBoundaryValidation,
}

/// Stateless across calls; share one instance between threads freely.
pub struct Translator {
    config: BridgeConfig,
    rules: Arc<RuleTable>,
    forward: Box<dyn ForwardTranslate>,
    reverse: Box<dyn ReverseTranslate>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("config", &self.config)
            .field("rules", &self.rules.rules().len())
            .finish_non_exhaustive()
    }
}

impl Translator {
    pub fn new(config: BridgeConfig) -> Self {
        let rules = Arc::new(config.rules.clone());
        let forward = Box::new(Lowering::new(config.lowering()));
        let reverse = Box::new(config.raising());
        Self {
            config,
            rules,
            forward,
            reverse,
        }
    }

    /// Share an already-loaded rule table instead of the config's copy.
    pub fn with_rules(mut self, rules: Arc<RuleTable>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_forward(mut self, forward: impl ForwardTranslate + 'static) -> Self {
        self.forward = Box::new(forward);
        self
    }

    pub fn with_reverse(mut self, reverse: impl ReverseTranslate + 'static) -> Self {
        self.reverse = Box::new(reverse);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Run only the forward pass.
    pub fn lower(&self, surface: &SurfaceNode) -> Result<Lowered, TranslationError> {
        self.check_depth(surface.depth())?;
        self.forward
            .lower(surface)
            .map_err(|e| TranslationError::at(Stage::Lowering)(e.into()))
    }

    pub fn translate_with_provenance(
        &self,
        surface: &SurfaceNode,
        source_text: &str,
        surface_version: &str,
        deep_version: &str,
    ) -> Result<ProvenanceBundle, TranslationError> {
        let lowered = self.lower(surface)?;
        self.assemble(
            surface,
            &lowered.deep,
            &lowered.correspondences,
            source_text,
            surface_version,
            deep_version,
        )
    }

    /// Provenance for a deep tree produced elsewhere.
    ///
    /// Correspondences come from structural alignment; the round trip still
    /// uses this translator's own passes, and the supplied tree is checked
    /// against them.
    pub fn translate_supplied(
        &self,
        surface: &SurfaceNode,
        deep: &DeepNode,
        source_text: &str,
        surface_version: &str,
        deep_version: &str,
    ) -> Result<ProvenanceBundle, TranslationError> {
        self.check_depth(surface.depth())?;
        self.check_depth(deep.depth())?;
        let correspondences = align(surface, deep);
        self.assemble(
            surface,
            deep,
            &correspondences,
            source_text,
            surface_version,
            deep_version,
        )
    }

    /// Translate independent programs in parallel. Results keep input order.
    pub fn translate_batch(
        &self,
        programs: &[(SurfaceNode, String)],
        surface_version: &str,
        deep_version: &str,
    ) -> Vec<Result<ProvenanceBundle, TranslationError>> {
        programs
            .par_iter()
            .map(|(ast, text)| {
                self.translate_with_provenance(ast, text, surface_version, deep_version)
            })
            .collect()
    }

    /// Raise a deep tree and render it as Clarity text.
    pub fn render_surface(&self, deep: &DeepNode) -> Result<String, TranslationError> {
        let (depth, limit) = (deep.depth(), self.config.max_depth);
        if depth > limit {
            return Err(TranslationError::at(Stage::Raising)(
                RaisingError::TooDeep { depth, limit }.into(),
            ));
        }
        let surface = self
            .reverse
            .raise(deep)
            .map_err(|e| TranslationError::at(Stage::Raising)(e.into()))?;
        Ok(render(&surface))
    }

    /// Depth limit for input trees, checked ahead of every recursive pass
    /// (including an injected `ForwardTranslate`).
    fn check_depth(&self, depth: usize) -> Result<(), TranslationError> {
        let limit = self.config.max_depth;
        if depth > limit {
            return Err(TranslationError::at(Stage::Lowering)(
                LoweringError::TooDeep { depth, limit }.into(),
            ));
        }
        Ok(())
    }

    fn assemble(
        &self,
        surface: &SurfaceNode,
        deep: &DeepNode,
        correspondences: &[Correspondence],
        source_text: &str,
        surface_version: &str,
        deep_version: &str,
    ) -> Result<ProvenanceBundle, TranslationError> {
        let canonicalizer = self.config.canonicalizer();

        let source_map = self
            .config
            .source_map_builder()
            .build(surface, deep, correspondences)
            .map_err(|e| TranslationError::at(Stage::SourceMap)(e.into()))?;

        let proof = ProofGenerator::new(canonicalizer)
            .generate(surface, deep)
            .map_err(|e| TranslationError::at(Stage::Proof)(e.into()))?;

        let mut tracker = CompatibilityTracker::new(&self.rules);
        tracker.record(
            &VersionToken::new(surface_version),
            &VersionToken::new(deep_version),
        );

        let validation = TrustValidator::new(self.forward.as_ref(), self.reverse.as_ref())
            .with_canonicalizer(canonicalizer)
            .validate(surface, deep)
            .map_err(|e| TranslationError::at(Stage::TrustValidation)(e.into()))?;

        if !validation.validated {
            for d in &validation.discrepancies {
                let excerpt = surface
                    .node_at(&d.path)
                    .and_then(|n| n.span.excerpt(source_text))
                    .unwrap_or("");
                tracing::warn!(
                    path = %d.path,
                    expected = %d.expected_variant,
                    actual = %d.actual_variant,
                    expected_detail = d.expected_detail.as_deref().unwrap_or(""),
                    actual_detail = d.actual_detail.as_deref().unwrap_or(""),
                    source = excerpt,
                    "round trip diverged"
                );
            }
        }

        tracing::info!(
            combined_hash = %proof.combined_hash,
            entries = source_map.len(),
            validated = validation.validated,
            "translation complete"
        );

        Ok(ProvenanceBundle {
            proof,
            source_map,
            versioning_info: tracker.into_matrix(),
            trust_boundary_validation: validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarity_dsl::builder::*;
    use clarity_dsl::{BinaryOperator, Span, UnaryOperator};

    struct Broken;

    impl ForwardTranslate for Broken {
        fn lower(&self, surface: &SurfaceNode) -> Result<Lowered, LoweringError> {
            Ok(Lowered {
                deep: Lowering::default().lower(surface)?.deep,
                correspondences: vec![Correspondence::new(
                    clarity_dsl::NodePath::from_indices([9, 9]),
                    clarity_dsl::NodePath::root(),
                    crate::MappingKind::Direct,
                )],
            })
        }
    }

    #[test]
    fn stage_is_reported_on_failure() {
        let ast = program(vec![]);
        let err = Translator::default()
            .with_forward(Broken)
            .translate_with_provenance(&ast, "", "1.0", "0.1")
            .unwrap_err();
        assert_eq!(err.stage, Stage::SourceMap);
        assert_eq!(
            err.to_string(),
            "translation failed at source map: correspondence refers to missing surface node /9/9"
        );
    }

    #[test]
    fn non_finite_literal_fails_at_proof() {
        let ast = block(vec![ret(Some(float(f64::INFINITY)))]);
        let err = Translator::default()
            .translate_with_provenance(&ast, "", "1.0", "0.1")
            .unwrap_err();
        assert_eq!(err.stage, Stage::Proof);
    }

    #[test]
    fn renders_deep_tree_as_text() {
        let translator = Translator::default();
        let ast = program(vec![func(
            "f",
            vec![param("x", "Int")],
            Some("Int"),
            block(vec![ret(Some(binary(BinaryOperator::Add, ident("x"), int(1))))]),
        )]);
        let lowered = translator.lower(&ast).unwrap();
        assert_eq!(
            translator.render_surface(&lowered.deep).unwrap(),
            "fn f(x: Int) -> Int {\n    return x + 1;\n}\n"
        );
    }

    #[test]
    fn batch_keeps_input_order() {
        let translator = Translator::default();
        let programs: Vec<(SurfaceNode, String)> = (0..8)
            .map(|i| {
                let src = format!("let v = {i};");
                let ast = block(vec![let_("v", None, int(i)).at(Span::from_coords(1, 1, 1, 12))]);
                (ast, src)
            })
            .collect();

        let results = translator.translate_batch(&programs, "1.0", "0.1");
        assert_eq!(results.len(), 8);
        for ((ast, text), result) in programs.iter().zip(&results) {
            let expected = translator
                .translate_with_provenance(ast, text, "1.0", "0.1")
                .unwrap();
            assert_eq!(
                result.as_ref().unwrap().proof.combined_hash,
                expected.proof.combined_hash
            );
        }
    }

    #[test]
    fn injected_rule_table_is_used() {
        let translator = Translator::default().with_rules(Arc::new(RuleTable::empty()));
        let bundle = translator
            .translate_with_provenance(&program(vec![]), "", "1.0", "0.1")
            .unwrap();
        let record = bundle.versioning_info.records().next().unwrap();
        assert!(!record.forward_compatible);
        assert!(record.rules_applied.is_empty());
    }

    struct Unreachable;

    impl ForwardTranslate for Unreachable {
        fn lower(&self, _: &SurfaceNode) -> Result<Lowered, LoweringError> {
            unreachable!("depth is checked before the forward pass runs")
        }
    }

    #[test]
    fn depth_limit_applies_before_an_injected_forward_pass() {
        let config = BridgeConfig {
            max_depth: 3,
            ..BridgeConfig::default()
        };
        // block / return / neg / neg / literal
        let ast = block(vec![ret(Some(unary(
            UnaryOperator::Neg,
            unary(UnaryOperator::Neg, int(1)),
        )))]);
        let err = Translator::new(config)
            .with_forward(Unreachable)
            .translate_with_provenance(&ast, "", "1.0", "0.1")
            .unwrap_err();
        assert_eq!(err.stage, Stage::Lowering);
        assert!(matches!(
            err.cause,
            StageFailure::Lowering(LoweringError::TooDeep { depth: 4, limit: 3 })
        ));
    }
}
