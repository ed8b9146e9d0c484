//! Data types (rule catalog + match records) for tagscan.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.
//! The rule wire format is JSON; parsing of severity and confidence is
//! case-insensitive, unknown pattern kinds degrade to [`PatternKind::Unknown`]
//! so the compiler can drop them with a warning instead of failing the load.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Authored impact of a rule. Reported on every match, never used for
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[schemars(rename_all = "kebab-case")]
pub enum Severity {
    Critical,
    Important,
    Moderate,
    BestPractice,
    ManualReview,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Moderate => "moderate",
            Severity::BestPractice => "best-practice",
            Severity::ManualReview => "manual-review",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "important" => Ok(Severity::Important),
            "moderate" => Ok(Severity::Moderate),
            "best-practice" | "bestpractice" => Ok(Severity::BestPractice),
            "manual-review" | "manualreview" => Ok(Severity::ManualReview),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    /// Unrecognized values degrade to [`Severity::Moderate`] instead of
    /// failing the catalog load; hard failure is reserved for structurally
    /// malformed JSON.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Severity::Moderate))
    }
}

/// Authored quality of a pattern; drives runtime filtering in the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, JsonSchema)]
#[schemars(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence '{other}'")),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Confidence {
    /// Unrecognized values degrade to [`Confidence::Medium`] instead of
    /// failing the catalog load.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Confidence::Medium))
    }
}

/// How a pattern's text is interpreted by the compiler.
///
/// `String` matches with word boundaries on both sides, `Substring` without;
/// `RegexWord` wraps the pattern in `\b(...)\b`. Unrecognized values parse to
/// `Unknown` and are dropped (with a warning) during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, JsonSchema)]
#[schemars(rename_all = "kebab-case")]
pub enum PatternKind {
    String,
    Substring,
    #[default]
    Regex,
    RegexWord,
    Unknown,
}

impl PatternKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::String => "string",
            PatternKind::Substring => "substring",
            PatternKind::Regex => "regex",
            PatternKind::RegexWord => "regex-word",
            PatternKind::Unknown => "unknown",
        }
    }
}

impl Serialize for PatternKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PatternKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "string" => PatternKind::String,
            "substring" => PatternKind::Substring,
            "regex" => PatternKind::Regex,
            "regex-word" | "regexword" => PatternKind::RegexWord,
            _ => PatternKind::Unknown,
        })
    }
}

/// Where a pattern may match within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PatternScope {
    All,
    Code,
    Comment,
}

impl<'de> Deserialize<'de> for PatternScope {
    /// Unrecognized values degrade to [`PatternScope::All`] instead of
    /// failing the catalog load.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "code" => PatternScope::Code,
            "comment" => PatternScope::Comment,
            _ => PatternScope::All,
        })
    }
}

/// One matcher inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPattern {
    pub pattern: String,

    #[serde(rename = "type", default)]
    pub kind: PatternKind,

    #[serde(default)]
    pub confidence: Confidence,

    /// Absent means "all scopes".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<PatternScope>>,

    /// Recognized: `i` (case-insensitive), `m` (multiline).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xpaths: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jsonpaths: Vec<String>,
}

/// Gates a rule on the presence/absence of another pattern near the match.
///
/// `search_in` is kept verbatim from the catalog because it embeds arguments
/// (e.g. `finding-region(3,3)`); the compiler parses it into a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchCondition {
    pub pattern: SearchPattern,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_in: Option<String>,

    #[serde(default)]
    pub negate_finding: bool,
}

/// A named, tagged match intent, deserialized from the JSON catalog.
///
/// Unknown fields are ignored. A rule with no patterns is degenerate and
/// never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Dotted-path tags, e.g. `Cryptography.Protocol.TLS`.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_severity")]
    pub severity: Severity,

    /// Language names this rule applies to. Empty = universal.
    #[serde(default)]
    pub applies_to: Vec<String>,

    /// File-name regexes this rule applies to. Empty = universal.
    #[serde(default)]
    pub applies_to_file_regex: Vec<String>,

    #[serde(default)]
    pub patterns: Vec<SearchPattern>,

    #[serde(default)]
    pub conditions: Vec<SearchCondition>,
}

fn default_severity() -> Severity {
    Severity::Moderate
}

/// Half-open region of a file: `[index, index + length)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Boundary {
    pub index: usize,
    pub length: usize,
}

impl Boundary {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    pub fn end(&self) -> usize {
        self.index + self.length
    }

    pub fn overlaps(&self, other: &Boundary) -> bool {
        self.index < other.end() && other.index < self.end()
    }
}

/// 1-indexed line/column position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// What kind of file a language usually lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Code,
    Build,
    Manifest,
    #[default]
    Unknown,
}

/// Resolved language identity for a scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageInfo {
    pub name: String,
    pub kind: FileKind,
}

impl LanguageInfo {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One reported finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchRecord {
    pub file_path: String,
    pub language: LanguageInfo,

    pub rule_id: String,
    pub rule_name: String,
    pub rule_description: String,
    pub tags: Vec<String>,
    pub severity: Severity,

    /// The pattern text that produced this match.
    pub pattern: String,
    pub pattern_kind: PatternKind,
    pub confidence: Confidence,

    pub boundary: Boundary,
    pub start: Location,
    pub end: Location,

    /// At most 200 chars of the matched text.
    pub sample: String,

    /// Surrounding lines, dedented; empty when excerpts are disabled.
    pub excerpt: String,
}

/// A rule that failed validation during catalog compilation.
///
/// Violations are data, not errors: the catalog stays usable without the
/// offending rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleViolation {
    pub rule_id: String,

    /// Clause label within the rule, when the violation is clause-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,

    pub reason: String,
}
