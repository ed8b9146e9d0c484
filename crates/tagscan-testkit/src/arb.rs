//! Proptest strategies for generating valid tagscan inputs.

use proptest::prelude::*;
use tagscan_types::{Confidence, PatternKind, Rule, SearchPattern, Severity};

pub fn arb_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(&[
        Severity::Critical,
        Severity::Important,
        Severity::Moderate,
        Severity::BestPractice,
        Severity::ManualReview,
    ])
}

pub fn arb_confidence() -> impl Strategy<Value = Confidence> {
    prop::sample::select(&[Confidence::Low, Confidence::Medium, Confidence::High])
}

/// Pattern kinds that always compile (no regex syntax involved for the
/// substring kinds; the literal body below is regex-safe for the rest).
pub fn arb_pattern_kind() -> impl Strategy<Value = PatternKind> {
    prop::sample::select(&[
        PatternKind::String,
        PatternKind::Substring,
        PatternKind::Regex,
        PatternKind::RegexWord,
    ])
}

pub fn arb_tag() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,8}(\\.[A-Z][a-z]{1,8}){1,2}").expect("valid regex")
}

pub fn arb_rule_id() -> impl Strategy<Value = String> {
    prop::string::string_regex("TS[0-9]{4}").expect("valid regex")
}

/// Pattern text safe for every kind: plain word characters only.
pub fn arb_pattern_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{2,12}").expect("valid regex")
}

pub fn arb_search_pattern() -> impl Strategy<Value = SearchPattern> {
    (arb_pattern_text(), arb_pattern_kind(), arb_confidence()).prop_map(
        |(pattern, kind, confidence)| SearchPattern {
            pattern,
            kind,
            confidence,
            scopes: None,
            modifiers: vec![],
            xpaths: vec![],
            jsonpaths: vec![],
        },
    )
}

pub fn arb_rule() -> impl Strategy<Value = Rule> {
    (
        arb_rule_id(),
        arb_tag(),
        arb_severity(),
        prop::collection::vec(arb_search_pattern(), 1..4),
    )
        .prop_map(|(id, tag, severity, patterns)| Rule {
            name: format!("{id} name"),
            id,
            description: String::new(),
            tags: vec![tag],
            severity,
            applies_to: vec![],
            applies_to_file_regex: vec![],
            patterns,
            conditions: vec![],
        })
}

/// Source-ish file content: word soup with newlines and occasional comment
/// markers.
pub fn arb_content() -> impl Strategy<Value = String> {
    prop::string::string_regex("([a-z0-9_ .;(){}=+-]{0,60}\n){0,20}").expect("valid regex")
}
