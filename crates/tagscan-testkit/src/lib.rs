//! Shared test utilities for the tagscan workspace.
//!
//! This crate provides:
//! - **builders**: terse constructors for rules and patterns
//! - **fixtures**: sample rule catalogs in JSON form
//! - **arb**: proptest strategies for generating valid inputs

use tagscan_types::{
    Confidence, PatternKind, PatternScope, Rule, SearchCondition, SearchPattern, Severity,
};

pub mod arb;
pub mod fixtures;

/// A pattern with everything defaulted except text and kind.
pub fn pattern(text: &str, kind: PatternKind) -> SearchPattern {
    SearchPattern {
        pattern: text.to_string(),
        kind,
        confidence: Confidence::Medium,
        scopes: None,
        modifiers: vec![],
        xpaths: vec![],
        jsonpaths: vec![],
    }
}

pub fn pattern_with_confidence(
    text: &str,
    kind: PatternKind,
    confidence: Confidence,
) -> SearchPattern {
    SearchPattern {
        confidence,
        ..pattern(text, kind)
    }
}

pub fn pattern_in_scope(text: &str, kind: PatternKind, scopes: Vec<PatternScope>) -> SearchPattern {
    SearchPattern {
        scopes: Some(scopes),
        ..pattern(text, kind)
    }
}

pub fn condition(p: SearchPattern, search_in: &str, negate: bool) -> SearchCondition {
    SearchCondition {
        pattern: p,
        search_in: Some(search_in.to_string()),
        negate_finding: negate,
    }
}

/// A universal rule with one tag and the given patterns.
pub fn rule(id: &str, tag: &str, patterns: Vec<SearchPattern>) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("{id} name"),
        description: format!("{id} description"),
        tags: vec![tag.to_string()],
        severity: Severity::Moderate,
        applies_to: vec![],
        applies_to_file_regex: vec![],
        patterns,
        conditions: vec![],
    }
}

pub fn rule_for_language(id: &str, tag: &str, language: &str, patterns: Vec<SearchPattern>) -> Rule {
    Rule {
        applies_to: vec![language.to_string()],
        ..rule(id, tag, patterns)
    }
}
