//! Rule compiler: turns a declarative [`Rule`] into a flat clause list plus
//! a boolean expression over clause labels.
//!
//! The compiler only ever produces expressions of the shape
//! `(0 OR 1 OR ...) AND k AND l ...` — one label per pattern inside the
//! parenthesized group, one per condition appended with `AND`. A regex that
//! fails to compile drops the whole rule and records a violation, whether it
//! came from a top-level pattern or a condition's pattern; conditions with
//! unrecognized selectors or pattern kinds are dropped individually with a
//! warning.

use regex::RegexBuilder;
use tagscan_types::{PatternKind, PatternScope, Rule, RuleViolation, SearchPattern};
use tracing::warn;

/// Compiler output for one rule. Holds an index into the catalog's rule
/// arena instead of a reference, so compiled rules stay `'static`-free and
/// cheap to store.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule_index: usize,
    pub clauses: Vec<Clause>,
    pub expression: String,
}

impl CompiledRule {
    /// A degenerate rule never matches (no patterns survived compilation).
    pub fn is_degenerate(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    /// Stringified clause number, referenced by the expression; `None` for
    /// condition sub-clauses.
    pub label: Option<String>,
    /// Index of the originating pattern within the rule. Captures carry this
    /// so reports cite the right pattern even when earlier patterns were
    /// dropped during compilation.
    pub pattern_index: usize,
    pub kind: ClauseKind,
    pub scopes: Vec<PatternScope>,
    pub invert: bool,
    /// Modifier strings (`i`, `m`).
    pub arguments: Vec<String>,
    pub json_paths: Vec<String>,
    pub x_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ClauseKind {
    Substring {
        needles: Vec<String>,
        word_boundaries: bool,
    },
    RegexIndex {
        patterns: Vec<String>,
    },
    Within {
        region: WithinRegion,
        inner: Box<Clause>,
    },
}

/// Proximity selector of a compiled condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithinRegion {
    FindingOnly,
    FindingRegion { before: i64, after: i64 },
    SameLine,
    SameFile,
    OnlyBefore,
    OnlyAfter,
}

/// Compile one rule. Returns `None` (plus violations) when the rule cannot
/// be used at all; a rule without usable patterns compiles to a degenerate
/// rule that never matches.
pub fn compile_rule(
    rule: &Rule,
    rule_index: usize,
    violations: &mut Vec<RuleViolation>,
) -> Option<CompiledRule> {
    let mut clauses: Vec<Clause> = Vec::with_capacity(rule.patterns.len());
    let mut clause_no = 0usize;
    let mut expression = String::from("(");

    for (pattern_index, pattern) in rule.patterns.iter().enumerate() {
        let clause = match build_clause(pattern, Some(clause_no.to_string()), pattern_index) {
            ClauseBuild::Ok(clause) => clause,
            ClauseBuild::UnknownKind => {
                warn!(rule = %rule.id, pattern = %pattern.pattern, "dropping pattern with unknown type");
                continue;
            }
            ClauseBuild::InvalidRegex(reason) => {
                violations.push(RuleViolation {
                    rule_id: rule.id.clone(),
                    clause: Some(clause_no.to_string()),
                    reason,
                });
                return None;
            }
        };

        if clause_no > 0 {
            expression.push_str(" OR ");
        }
        expression.push_str(&clause_no.to_string());
        clauses.push(clause);
        clause_no += 1;
    }

    if clauses.is_empty() {
        return Some(CompiledRule {
            rule_index,
            clauses: Vec::new(),
            expression: String::new(),
        });
    }

    expression.push(')');

    for condition in &rule.conditions {
        let Some(region) = parse_search_in(condition.search_in.as_deref()) else {
            warn!(
                rule = %rule.id,
                search_in = condition.search_in.as_deref().unwrap_or(""),
                "dropping condition with unrecognized search_in selector"
            );
            continue;
        };

        let inner = match build_clause(&condition.pattern, None, 0) {
            ClauseBuild::Ok(clause) => clause,
            ClauseBuild::UnknownKind => {
                warn!(rule = %rule.id, "dropping condition with unknown pattern type");
                continue;
            }
            // A condition's pattern is still a pattern: an invalid regex
            // drops the whole rule, same as a top-level pattern.
            ClauseBuild::InvalidRegex(reason) => {
                violations.push(RuleViolation {
                    rule_id: rule.id.clone(),
                    clause: Some(clause_no.to_string()),
                    reason,
                });
                return None;
            }
        };

        clauses.push(Clause {
            label: Some(clause_no.to_string()),
            pattern_index: 0,
            kind: ClauseKind::Within {
                region,
                inner: Box::new(inner),
            },
            scopes: vec![PatternScope::All],
            invert: condition.negate_finding,
            arguments: Vec::new(),
            json_paths: Vec::new(),
            x_paths: Vec::new(),
        });
        expression.push_str(" AND ");
        expression.push_str(&clause_no.to_string());
        clause_no += 1;
    }

    Some(CompiledRule {
        rule_index,
        clauses,
        expression,
    })
}

enum ClauseBuild {
    Ok(Clause),
    UnknownKind,
    InvalidRegex(String),
}

fn build_clause(
    pattern: &SearchPattern,
    label: Option<String>,
    pattern_index: usize,
) -> ClauseBuild {
    let scopes = pattern
        .scopes
        .clone()
        .unwrap_or_else(|| vec![PatternScope::All]);

    let kind = match pattern.kind {
        PatternKind::String => ClauseKind::Substring {
            needles: vec![pattern.pattern.clone()],
            word_boundaries: true,
        },
        PatternKind::Substring => ClauseKind::Substring {
            needles: vec![pattern.pattern.clone()],
            word_boundaries: false,
        },
        PatternKind::Regex => ClauseKind::RegexIndex {
            patterns: vec![pattern.pattern.clone()],
        },
        PatternKind::RegexWord => ClauseKind::RegexIndex {
            patterns: vec![format!("\\b({})\\b", pattern.pattern)],
        },
        PatternKind::Unknown => return ClauseBuild::UnknownKind,
    };

    if let ClauseKind::RegexIndex { patterns } = &kind {
        let case_insensitive = pattern.modifiers.iter().any(|m| m == "i");
        let multi_line = pattern.modifiers.iter().any(|m| m == "m");
        for source in patterns {
            if let Err(err) = RegexBuilder::new(source)
                .case_insensitive(case_insensitive)
                .multi_line(multi_line)
                .build()
            {
                return ClauseBuild::InvalidRegex(format!(
                    "invalid regex '{source}': {err}"
                ));
            }
        }
    }

    ClauseBuild::Ok(Clause {
        label,
        pattern_index,
        kind,
        scopes,
        invert: false,
        arguments: pattern.modifiers.clone(),
        json_paths: pattern.jsonpaths.clone(),
        x_paths: pattern.xpaths.clone(),
    })
}

/// Parse a `search_in` selector. Absence defaults to `finding-only`;
/// unrecognized selectors return `None` so the caller can drop the
/// condition.
fn parse_search_in(raw: Option<&str>) -> Option<WithinRegion> {
    let raw = match raw {
        None => return Some(WithinRegion::FindingOnly),
        Some(raw) => raw.trim(),
    };

    let lowered = raw.to_ascii_lowercase();
    match lowered.as_str() {
        "" | "finding-only" => return Some(WithinRegion::FindingOnly),
        "same-line" => return Some(WithinRegion::SameLine),
        "same-file" => return Some(WithinRegion::SameFile),
        "only-before" => return Some(WithinRegion::OnlyBefore),
        "only-after" => return Some(WithinRegion::OnlyAfter),
        _ => {}
    }

    let args = lowered
        .strip_prefix("finding-region(")
        .and_then(|rest| rest.strip_suffix(')'))?;
    let (before, after) = args.split_once(',')?;
    let before = before.trim().parse::<i64>().ok()?;
    let after = after.trim().parse::<i64>().ok()?;
    Some(WithinRegion::FindingRegion { before, after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscan_types::{Confidence, SearchCondition};

    fn pattern(text: &str, kind: PatternKind) -> SearchPattern {
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

    fn rule_with(patterns: Vec<SearchPattern>, conditions: Vec<SearchCondition>) -> Rule {
        Rule {
            id: "T1".to_string(),
            name: "test".to_string(),
            description: String::new(),
            tags: vec!["Test.Tag".to_string()],
            severity: tagscan_types::Severity::Moderate,
            applies_to: vec![],
            applies_to_file_regex: vec![],
            patterns,
            conditions,
        }
    }

    #[test]
    fn expression_shape_matches_pattern_and_condition_counts() {
        let rule = rule_with(
            vec![
                pattern("a", PatternKind::String),
                pattern("b", PatternKind::Regex),
            ],
            vec![SearchCondition {
                pattern: pattern("c", PatternKind::Substring),
                search_in: Some("same-line".to_string()),
                negate_finding: false,
            }],
        );

        let mut violations = Vec::new();
        let compiled = compile_rule(&rule, 0, &mut violations).unwrap();
        assert_eq!(compiled.expression, "(0 OR 1) AND 2");
        assert_eq!(compiled.clauses.len(), 3);
        assert!(violations.is_empty());
    }

    #[test]
    fn regex_word_wraps_in_word_boundaries() {
        let rule = rule_with(vec![pattern("secret", PatternKind::RegexWord)], vec![]);
        let compiled = compile_rule(&rule, 0, &mut Vec::new()).unwrap();
        match &compiled.clauses[0].kind {
            ClauseKind::RegexIndex { patterns } => {
                assert_eq!(patterns[0], "\\b(secret)\\b");
            }
            other => panic!("expected regex clause, got {other:?}"),
        }
    }

    #[test]
    fn invalid_pattern_regex_drops_rule_with_violation() {
        let rule = rule_with(vec![pattern("(unclosed", PatternKind::Regex)], vec![]);
        let mut violations = Vec::new();
        assert!(compile_rule(&rule, 0, &mut violations).is_none());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "T1");
        assert!(violations[0].reason.contains("(unclosed"));
    }

    #[test]
    fn invalid_condition_regex_drops_rule_with_violation() {
        let rule = rule_with(
            vec![pattern("a", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("(unclosed", PatternKind::Regex),
                search_in: Some("same-line".to_string()),
                negate_finding: false,
            }],
        );
        let mut violations = Vec::new();
        assert!(compile_rule(&rule, 0, &mut violations).is_none());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "T1");
        assert_eq!(violations[0].clause.as_deref(), Some("1"));
    }

    #[test]
    fn dropped_pattern_keeps_pattern_indices_aligned() {
        let rule = rule_with(
            vec![
                pattern("mystery", PatternKind::Unknown),
                pattern("kept", PatternKind::String),
            ],
            vec![],
        );
        let compiled = compile_rule(&rule, 0, &mut Vec::new()).unwrap();
        assert_eq!(compiled.expression, "(0)");
        assert_eq!(compiled.clauses.len(), 1);
        // The surviving clause still cites the second pattern.
        assert_eq!(compiled.clauses[0].pattern_index, 1);
    }

    #[test]
    fn no_patterns_compiles_to_degenerate_rule() {
        let rule = rule_with(vec![], vec![]);
        let compiled = compile_rule(&rule, 0, &mut Vec::new()).unwrap();
        assert!(compiled.is_degenerate());
        assert_eq!(compiled.expression, "");
    }

    #[test]
    fn unknown_condition_selector_is_dropped_not_fatal() {
        let rule = rule_with(
            vec![pattern("a", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("b", PatternKind::String),
                search_in: Some("sideways".to_string()),
                negate_finding: false,
            }],
        );
        let compiled = compile_rule(&rule, 0, &mut Vec::new()).unwrap();
        assert_eq!(compiled.expression, "(0)");
        assert_eq!(compiled.clauses.len(), 1);
    }

    #[test]
    fn search_in_selector_parsing() {
        assert_eq!(parse_search_in(None), Some(WithinRegion::FindingOnly));
        assert_eq!(
            parse_search_in(Some("finding-only")),
            Some(WithinRegion::FindingOnly)
        );
        assert_eq!(
            parse_search_in(Some("finding-region(3, 5)")),
            Some(WithinRegion::FindingRegion { before: 3, after: 5 })
        );
        assert_eq!(parse_search_in(Some("same-line")), Some(WithinRegion::SameLine));
        assert_eq!(parse_search_in(Some("same-file")), Some(WithinRegion::SameFile));
        assert_eq!(
            parse_search_in(Some("only-before")),
            Some(WithinRegion::OnlyBefore)
        );
        assert_eq!(
            parse_search_in(Some("only-after")),
            Some(WithinRegion::OnlyAfter)
        );
        assert_eq!(parse_search_in(Some("sideways")), None);
        assert_eq!(parse_search_in(Some("finding-region(x,y)")), None);
    }
}
