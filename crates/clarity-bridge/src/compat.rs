//! Version compatibility between surface and deep-layer releases.
//!
//! A [`RuleTable`] is an ordered list of rules; the first rule whose
//! predicate matches a `(surface_version, deep_version)` pair decides the
//! outcome. An unmatched pair is recorded as incompatible in both directions
//! with no rules applied. That is data for the caller, never an error.
//!
//! Rule tables are immutable once built. The built-in table lives in a
//! process-wide [`OnceLock`]; custom tables are loaded from JSON and shared
//! through an `Arc`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// Version tokens
// ============================================================================

/// An opaque version identifier.
///
/// Dotted-numeric tokens (`"1"`, `"0.2.10"`) compare numerically, with
/// missing trailing components treated as zero; they order before any other
/// token. Other tokens compare as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn components(&self) -> Option<Vec<u64>> {
        self.0.split('.').map(|c| c.parse().ok()).collect()
    }

    /// Leading numeric component, if the token is dotted-numeric.
    pub fn major(&self) -> Option<u64> {
        self.components().and_then(|c| c.first().copied())
    }

    /// Comparison that treats `"0.1"` and `"0.1.0"` as the same version.
    pub fn version_cmp(&self, other: &Self) -> Ordering {
        match (self.components(), other.components()) {
            (Some(a), Some(b)) => {
                let len = a.len().max(b.len());
                (0..len)
                    .map(|i| {
                        let x = a.get(i).copied().unwrap_or(0);
                        let y = b.get(i).copied().unwrap_or(0);
                        x.cmp(&y)
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version_cmp(other).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum VersionPattern {
    Any,
    Exact { version: VersionToken },
    Major { major: u64 },
    AtLeast { version: VersionToken },
    Below { version: VersionToken },
}

impl VersionPattern {
    pub fn matches(&self, v: &VersionToken) -> bool {
        match self {
            VersionPattern::Any => true,
            VersionPattern::Exact { version } => v.version_cmp(version).is_eq(),
            VersionPattern::Major { major } => v.major() == Some(*major),
            VersionPattern::AtLeast { version } => v.version_cmp(version).is_ge(),
            VersionPattern::Below { version } => v.version_cmp(version).is_lt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RulePredicate {
    /// Both sides must match their pattern; patterns may be lists (all must hold).
    Pair {
        surface: Vec<VersionPattern>,
        deep: Vec<VersionPattern>,
    },
    /// Both versions are dotted-numeric and share a major component.
    SameMajor,
    All,
}

impl RulePredicate {
    pub fn matches(&self, surface: &VersionToken, deep: &VersionToken) -> bool {
        match self {
            RulePredicate::Pair {
                surface: sp,
                deep: dp,
            } => sp.iter().all(|p| p.matches(surface)) && dp.iter().all(|p| p.matches(deep)),
            RulePredicate::SameMajor => match (surface.major(), deep.major()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            RulePredicate::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub id: String,
    pub predicate: RulePredicate,
    pub forward: bool,
    pub backward: bool,
}

/// Ordered, immutable list of compatibility rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<CompatibilityRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<CompatibilityRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn rules(&self) -> &[CompatibilityRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn first_match(
        &self,
        surface: &VersionToken,
        deep: &VersionToken,
    ) -> Option<&CompatibilityRule> {
        self.rules.iter().find(|r| r.predicate.matches(surface, deep))
    }

    /// Ids that occur more than once.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::BTreeSet::new();
        let mut dups = Vec::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) && !dups.contains(&rule.id.as_str()) {
                dups.push(rule.id.as_str());
            }
        }
        dups
    }
}

/// The built-in rule table, built once per process.
///
/// | id                   | surface | deep         | forward | backward |
/// |----------------------|---------|--------------|---------|----------|
/// | `clarity1-deep0.1`   | 1.x     | 0.1          | yes     | yes      |
/// | `clarity1-deep0.2+`  | 1.x     | 0.x, ≥ 0.2   | yes     | no       |
/// | `same-major`         | N.x     | N.x          | yes     | yes      |
pub fn default_rules() -> &'static RuleTable {
    static DEFAULT: OnceLock<RuleTable> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        RuleTable::new(vec![
            CompatibilityRule {
                id: "clarity1-deep0.1".to_string(),
                predicate: RulePredicate::Pair {
                    surface: vec![VersionPattern::Major { major: 1 }],
                    deep: vec![VersionPattern::Exact {
                        version: VersionToken::new("0.1"),
                    }],
                },
                forward: true,
                backward: true,
            },
            CompatibilityRule {
                id: "clarity1-deep0.2+".to_string(),
                predicate: RulePredicate::Pair {
                    surface: vec![VersionPattern::Major { major: 1 }],
                    deep: vec![
                        VersionPattern::Major { major: 0 },
                        VersionPattern::AtLeast {
                            version: VersionToken::new("0.2"),
                        },
                    ],
                },
                forward: true,
                backward: false,
            },
            CompatibilityRule {
                id: "same-major".to_string(),
                predicate: RulePredicate::SameMajor,
                forward: true,
                backward: true,
            },
        ])
    })
}

// ============================================================================
// Records and matrix
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRecord {
    pub surface_version: VersionToken,
    pub deep_version: VersionToken,
    pub forward_compatible: bool,
    pub backward_compatible: bool,
    pub rules_applied: Vec<String>,
}

/// `(surface_version, deep_version)` → record, one record per pair.
///
/// Serialized as a list of records ordered by pair; a list that repeats a
/// pair is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<CompatibilityRecord>", into = "Vec<CompatibilityRecord>")]
pub struct CompatibilityMatrix {
    records: BTreeMap<(VersionToken, VersionToken), CompatibilityRecord>,
}

impl TryFrom<Vec<CompatibilityRecord>> for CompatibilityMatrix {
    type Error = String;

    fn try_from(records: Vec<CompatibilityRecord>) -> Result<Self, Self::Error> {
        let mut matrix = CompatibilityMatrix::default();
        for record in records {
            let key = (record.surface_version.clone(), record.deep_version.clone());
            if matrix.records.contains_key(&key) {
                return Err(format!(
                    "duplicate compatibility record for surface {} / deep {}",
                    key.0, key.1
                ));
            }
            matrix.records.insert(key, record);
        }
        Ok(matrix)
    }
}

impl From<CompatibilityMatrix> for Vec<CompatibilityRecord> {
    fn from(matrix: CompatibilityMatrix) -> Self {
        matrix.records.into_values().collect()
    }
}

impl CompatibilityMatrix {
    pub fn get(&self, surface: &VersionToken, deep: &VersionToken) -> Option<&CompatibilityRecord> {
        self.records.get(&(surface.clone(), deep.clone()))
    }

    pub fn insert(&mut self, record: CompatibilityRecord) {
        self.records.insert(
            (record.surface_version.clone(), record.deep_version.clone()),
            record,
        );
    }

    pub fn records(&self) -> impl Iterator<Item = &CompatibilityRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Evaluates a rule table and accumulates the outcomes in a matrix.
#[derive(Debug, Clone)]
pub struct CompatibilityTracker<'r> {
    rules: &'r RuleTable,
    matrix: CompatibilityMatrix,
}

impl<'r> CompatibilityTracker<'r> {
    pub fn new(rules: &'r RuleTable) -> Self {
        Self {
            rules,
            matrix: CompatibilityMatrix::default(),
        }
    }

    pub fn record(
        &mut self,
        surface_version: &VersionToken,
        deep_version: &VersionToken,
    ) -> CompatibilityRecord {
        let record = match self.rules.first_match(surface_version, deep_version) {
            Some(rule) => CompatibilityRecord {
                surface_version: surface_version.clone(),
                deep_version: deep_version.clone(),
                forward_compatible: rule.forward,
                backward_compatible: rule.backward,
                rules_applied: vec![rule.id.clone()],
            },
            None => {
                tracing::warn!(
                    surface = %surface_version,
                    deep = %deep_version,
                    "no compatibility rule matches version pair"
                );
                CompatibilityRecord {
                    surface_version: surface_version.clone(),
                    deep_version: deep_version.clone(),
                    forward_compatible: false,
                    backward_compatible: false,
                    rules_applied: Vec::new(),
                }
            }
        };
        self.matrix.insert(record.clone());
        record
    }

    pub fn matrix(&self) -> &CompatibilityMatrix {
        &self.matrix
    }

    pub fn into_matrix(self) -> CompatibilityMatrix {
        self.matrix
    }
}
