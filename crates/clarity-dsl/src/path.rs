//! Source positions and structural node paths.
//!
//! Surface and deep trees share one addressing scheme: a [`NodePath`] is the
//! sequence of child indices walked from the root. Paths render as
//! `/0/2/1` (the root is `/`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Spans
// ============================================================================

/// A 1-based line/column position in surface source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range: `start` is inclusive, `end` points one column
/// past the last character.
///
/// Ordering is by `start`, then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Span::new(Position::new(..), Position::new(..))`.
    pub const fn from_coords(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }

    pub fn encloses(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Slice the text this span covers out of `source`.
    ///
    /// Returns `None` when either endpoint falls outside the text.
    pub fn excerpt<'a>(&self, source: &'a str) -> Option<&'a str> {
        let start = byte_offset(source, self.start)?;
        let end = byte_offset(source, self.end)?;
        if end < start {
            return None;
        }
        source.get(start..end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn byte_offset(source: &str, pos: Position) -> Option<usize> {
    if pos.line == 0 || pos.column == 0 {
        return None;
    }
    let target_line = (pos.line - 1) as usize;
    let col = (pos.column - 1) as usize;

    let mut line_start = 0usize;
    for (idx, line) in source.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let content = line.strip_suffix('\n').unwrap_or(line);
            return match content.char_indices().nth(col) {
                Some((off, _)) => Some(line_start + off),
                None if col == content.chars().count() => Some(line_start + content.len()),
                None => None,
            };
        }
        line_start += line.len();
    }

    // The position just after a trailing newline.
    (target_line == source.split_inclusive('\n').count() && col == 0).then_some(source.len())
}

// ============================================================================
// Node paths
// ============================================================================

/// Structural address of a node: child indices from the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<u32>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: impl IntoIterator<Item = u32>) -> Self {
        Self(indices.into_iter().collect())
    }

    /// The path of this node's `index`-th child.
    pub fn child(&self, index: u32) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for idx in &self.0 {
            write!(f, "/{idx}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node path `{input}`: {reason}")]
pub struct NodePathParseError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for NodePath {
    type Err = NodePathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| NodePathParseError {
            input: s.to_string(),
            reason,
        };

        let rest = s.strip_prefix('/').ok_or_else(|| err("must start with `/`"))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        rest.split('/')
            .map(|seg| seg.parse::<u32>().map_err(|_| err("segments must be child indices")))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

// Paths travel as their `/a/b/c` string form so JSON documents stay readable.
impl Serialize for NodePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display_and_parse_agree() {
        let p = NodePath::root().child(0).child(3).child(1);
        assert_eq!(p.to_string(), "/0/3/1");
        assert_eq!("/0/3/1".parse::<NodePath>().unwrap(), p);
        assert_eq!("/".parse::<NodePath>().unwrap(), NodePath::root());
    }

    #[test]
    fn path_parse_rejects_garbage() {
        assert!("0/1".parse::<NodePath>().is_err());
        assert!("/a/1".parse::<NodePath>().is_err());
        assert!("/1//2".parse::<NodePath>().is_err());
    }

    #[test]
    fn parent_of_root_is_none() {
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(
            NodePath::from_indices([2, 5]).parent(),
            Some(NodePath::from_indices([2]))
        );
    }

    #[test]
    fn excerpt_slices_single_and_multi_line_spans() {
        let src = "fn f(x: Int) -> Int {\n    return x + 1;\n}\n";
        let ret = Span::from_coords(2, 5, 2, 18);
        assert_eq!(ret.excerpt(src), Some("return x + 1;"));

        let whole = Span::from_coords(1, 1, 3, 2);
        assert_eq!(whole.excerpt(src), Some(src.trim_end()));

        let past_end = Span::from_coords(9, 1, 9, 2);
        assert_eq!(past_end.excerpt(src), None);
    }

    #[test]
    fn span_contains_is_half_open() {
        let s = Span::from_coords(1, 5, 1, 10);
        assert!(s.contains(Position::new(1, 5)));
        assert!(s.contains(Position::new(1, 9)));
        assert!(!s.contains(Position::new(1, 10)));
        assert!(s.encloses(&Span::from_coords(1, 6, 1, 8)));
    }
}
