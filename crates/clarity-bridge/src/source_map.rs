//! Source maps: surface spans ⇄ deep-tree paths.
//!
//! Entries are sorted by surface span (start, then end), deep path and
//! mapping confidence, so the same correspondences always yield the same map whatever order they
//! were produced in. Two indices are derived from the entries and rebuilt on
//! deserialization; lookups that miss return an empty slice.

use crate::{Correspondence, MappingKind};
use clarity_dsl::deep::{Confidence, DeepNode};
use clarity_dsl::surface::SurfaceNode;
use clarity_dsl::{NodePath, Position, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceMapError {
    #[error("correspondence refers to missing surface node {path}")]
    UnresolvedSurfacePath { path: NodePath },

    #[error("correspondence refers to missing deep node {path}")]
    UnresolvedDeepPath { path: NodePath },

    #[error("surface node {surface_path} mapped onto agent-only {variant} at {deep_path}")]
    AgentOnlyTarget {
        surface_path: NodePath,
        deep_path: NodePath,
        variant: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub surface_span: Span,
    pub deep_path: NodePath,
    pub confidence_of_mapping: Confidence,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "SourceMapRepr", into = "SourceMapRepr")]
pub struct SourceMap {
    entries: Vec<SourceMapEntry>,
    by_span: BTreeMap<Span, Vec<NodePath>>,
    by_deep: BTreeMap<NodePath, Vec<Span>>,
}

#[derive(Serialize, Deserialize)]
struct SourceMapRepr {
    entries: Vec<SourceMapEntry>,
}

impl From<SourceMapRepr> for SourceMap {
    fn from(repr: SourceMapRepr) -> Self {
        SourceMap::from_entries(repr.entries)
    }
}

impl From<SourceMap> for SourceMapRepr {
    fn from(map: SourceMap) -> Self {
        SourceMapRepr {
            entries: map.entries,
        }
    }
}

impl SourceMap {
    /// Sort the entries and build both indices.
    pub fn from_entries(mut entries: Vec<SourceMapEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.surface_span
                .cmp(&b.surface_span)
                .then_with(|| a.deep_path.cmp(&b.deep_path))
                .then_with(|| {
                    a.confidence_of_mapping
                        .fixed_point()
                        .cmp(&b.confidence_of_mapping.fixed_point())
                })
        });

        let mut by_span: BTreeMap<Span, Vec<NodePath>> = BTreeMap::new();
        let mut by_deep: BTreeMap<NodePath, Vec<Span>> = BTreeMap::new();
        for entry in &entries {
            let paths = by_span.entry(entry.surface_span).or_default();
            if !paths.contains(&entry.deep_path) {
                paths.push(entry.deep_path.clone());
            }
            let spans = by_deep.entry(entry.deep_path.clone()).or_default();
            if !spans.contains(&entry.surface_span) {
                spans.push(entry.surface_span);
            }
        }

        Self {
            entries,
            by_span,
            by_deep,
        }
    }

    pub fn entries(&self) -> &[SourceMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn span_to_deep_paths(&self, span: &Span) -> &[NodePath] {
        self.by_span.get(span).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn deep_path_to_spans(&self, path: &NodePath) -> &[Span] {
        self.by_deep.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Narrowest entry whose span contains `(line, column)`.
    ///
    /// Among equal spans the entry with the deepest path wins.
    pub fn innermost_at(&self, line: u32, column: u32) -> Option<&SourceMapEntry> {
        let pos = Position::new(line, column);
        self.entries
            .iter()
            .filter(|e| e.surface_span.contains(pos))
            .max_by(|a, b| {
                a.surface_span
                    .start
                    .cmp(&b.surface_span.start)
                    .then_with(|| b.surface_span.end.cmp(&a.surface_span.end))
                    .then_with(|| a.deep_path.depth().cmp(&b.deep_path.depth()))
            })
    }
}

/// Default mapping confidence for restructured nodes.
pub const REWRITE_CONFIDENCE: Confidence = Confidence::known(0.9);

/// Default mapping confidence for constant-folded nodes.
pub const FOLDED_CONFIDENCE: Confidence = Confidence::known(0.8);

/// Turns correspondences into a [`SourceMap`].
#[derive(Debug, Clone, Copy)]
pub struct SourceMapBuilder {
    pub rewrite_confidence: Confidence,
    pub folded_confidence: Confidence,
}

impl Default for SourceMapBuilder {
    fn default() -> Self {
        Self {
            rewrite_confidence: REWRITE_CONFIDENCE,
            folded_confidence: FOLDED_CONFIDENCE,
        }
    }
}

impl SourceMapBuilder {
    pub fn new(rewrite_confidence: Confidence, folded_confidence: Confidence) -> Self {
        Self {
            rewrite_confidence,
            folded_confidence,
        }
    }

    pub fn confidence_for(&self, kind: MappingKind) -> Confidence {
        match kind {
            MappingKind::Direct => Confidence::CERTAIN,
            MappingKind::Rewritten => self.rewrite_confidence,
            MappingKind::Folded => self.folded_confidence,
        }
    }

    pub fn build(
        &self,
        surface: &SurfaceNode,
        deep: &DeepNode,
        correspondences: &[Correspondence],
    ) -> Result<SourceMap, SourceMapError> {
        let entries = correspondences
            .iter()
            .map(|c| {
                let surface_node = surface.node_at(&c.surface_path).ok_or_else(|| {
                    SourceMapError::UnresolvedSurfacePath {
                        path: c.surface_path.clone(),
                    }
                })?;
                let deep_node =
                    deep.node_at(&c.deep_path)
                        .ok_or_else(|| SourceMapError::UnresolvedDeepPath {
                            path: c.deep_path.clone(),
                        })?;
                if deep_node.is_agent_only() {
                    return Err(SourceMapError::AgentOnlyTarget {
                        surface_path: c.surface_path.clone(),
                        deep_path: c.deep_path.clone(),
                        variant: deep_node.variant_name(),
                    });
                }
                Ok(SourceMapEntry {
                    surface_span: surface_node.span,
                    deep_path: c.deep_path.clone(),
                    confidence_of_mapping: self.confidence_for(c.kind),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceMap::from_entries(entries))
    }
}

/// Correspondences for a deep tree that was produced elsewhere.
///
/// Walks both trees in lockstep and pairs nodes whose deep variant mirrors
/// the surface variant. Descent stops below the first mismatch.
pub fn align(surface: &SurfaceNode, deep: &DeepNode) -> Vec<Correspondence> {
    let mut out = Vec::new();
    align_into(surface, deep, NodePath::root(), &mut out);
    out
}

fn align_into(
    surface: &SurfaceNode,
    deep: &DeepNode,
    path: NodePath,
    out: &mut Vec<Correspondence>,
) {
    if deep.kind.surface_counterpart() != Some(surface.variant_name()) {
        return;
    }
    let kind = if surface.variant_name() == deep.variant_name() {
        MappingKind::Direct
    } else {
        MappingKind::Rewritten
    };
    for (idx, (s, d)) in surface
        .children()
        .into_iter()
        .zip(deep.structural_children())
        .enumerate()
    {
        align_into(s, d, path.child(idx as u32), out);
    }
    out.push(Correspondence::new(path.clone(), path, kind));
}
