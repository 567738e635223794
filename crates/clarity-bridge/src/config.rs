//! Translator configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "fold_constants": true, "rewrite_confidence": 0.85 }
//! ```

use crate::canonical::{Canonicalizer, DEFAULT_MAX_DEPTH};
use crate::compat::{default_rules, RuleTable};
use crate::lowering::LoweringConfig;
use crate::raising::Raising;
use crate::source_map::SourceMapBuilder;
use anyhow::Context as _;
use clarity_dsl::Confidence;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("compatibility rule id `{id}` is used more than once")]
    DuplicateRuleId { id: String },

    #[error("max_depth must be at least 1")]
    ZeroDepth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Mapping confidence for restructured nodes (loops).
    pub rewrite_confidence: Confidence,
    /// Mapping confidence for constant-folded nodes.
    pub folded_confidence: Confidence,
    pub fold_constants: bool,
    /// Deepest tree any pass accepts (lowering, raising, canonical form).
    pub max_depth: usize,
    pub rules: RuleTable,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let builder = SourceMapBuilder::default();
        Self {
            rewrite_confidence: builder.rewrite_confidence,
            folded_confidence: builder.folded_confidence,
            fold_constants: false,
            max_depth: DEFAULT_MAX_DEPTH,
            rules: default_rules().clone(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("loading config {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            rules = config.rules.rules().len(),
            "loaded bridge config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if let Some(id) = self.rules.duplicate_ids().first() {
            return Err(ConfigError::DuplicateRuleId {
                id: (*id).to_string(),
            });
        }
        Ok(())
    }

    pub fn lowering(&self) -> LoweringConfig {
        LoweringConfig {
            fold_constants: self.fold_constants,
            rewrite_confidence: self.rewrite_confidence,
            max_depth: self.max_depth,
        }
    }

    pub fn raising(&self) -> Raising {
        Raising::new(self.max_depth)
    }

    pub fn source_map_builder(&self) -> SourceMapBuilder {
        SourceMapBuilder::new(self.rewrite_confidence, self.folded_confidence)
    }

    pub fn canonicalizer(&self) -> Canonicalizer {
        Canonicalizer::new(self.max_depth)
    }
}
