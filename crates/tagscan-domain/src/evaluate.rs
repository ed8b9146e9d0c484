//! Clause evaluator: runs a compiled rule's boolean expression against a
//! text container.
//!
//! The expression grammar is tiny — `(`, `)`, `AND`, `OR`, integer labels —
//! with equal precedence evaluated left to right, which is all the compiler
//! ever emits. Every clause is evaluated (no short-circuiting) so capture
//! accumulation stays deterministic and `Within` clauses always see the
//! captures gathered by the clauses to their left.

use std::collections::BTreeSet;

use tagscan_types::Boundary;

use crate::compile::{Clause, ClauseKind, CompiledRule, WithinRegion};
use crate::ops;
use crate::structured;
use crate::text::TextContainer;

/// `(pattern_index, boundary)` — which pattern inside the rule produced the
/// hit, and where.
pub type Capture = (usize, Boundary);

#[derive(Debug, Clone, Default)]
pub struct RuleEvaluation {
    pub matched: bool,
    /// De-duplicated, ordered by `(pattern_index, boundary)`.
    pub captures: Vec<Capture>,
}

pub fn evaluate_rule(
    compiled: &CompiledRule,
    container: &TextContainer,
    treat_all_as_code: bool,
) -> RuleEvaluation {
    if compiled.is_degenerate() {
        return RuleEvaluation::default();
    }

    let tokens = tokenize(&compiled.expression);
    if tokens.is_empty() {
        return RuleEvaluation::default();
    }

    let mut ctx = EvalContext {
        container,
        treat_all_as_code,
        clauses: &compiled.clauses,
        acc: BTreeSet::new(),
    };
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let matched = parser.parse_sequence(&mut ctx).unwrap_or(false);

    RuleEvaluation {
        matched,
        captures: ctx.acc.into_iter().collect(),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Label(String),
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let mut flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        tokens.push(match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            other => Token::Label(other.to_string()),
        });
        word.clear();
    };

    for ch in expression.chars() {
        match ch {
            '(' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Open);
            }
            ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Close);
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct EvalContext<'a> {
    container: &'a TextContainer,
    treat_all_as_code: bool,
    clauses: &'a [Clause],
    acc: BTreeSet<Capture>,
}

impl EvalContext<'_> {
    fn eval_label(&mut self, label: &str) -> bool {
        let Some(clause) = self
            .clauses
            .iter()
            .find(|c| c.label.as_deref() == Some(label))
        else {
            return false;
        };
        let (matched, captures) =
            eval_clause(clause, self.container, &self.acc, self.treat_all_as_code);
        self.acc.extend(captures);
        matched
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn parse_sequence(&mut self, ctx: &mut EvalContext<'_>) -> Option<bool> {
        let mut value = self.parse_primary(ctx)?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    let rhs = self.parse_primary(ctx)?;
                    value = value && rhs;
                }
                Some(Token::Or) => {
                    self.pos += 1;
                    let rhs = self.parse_primary(ctx)?;
                    value = value || rhs;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_primary(&mut self, ctx: &mut EvalContext<'_>) -> Option<bool> {
        match self.next()? {
            Token::Open => {
                let value = self.parse_sequence(ctx)?;
                match self.next()? {
                    Token::Close => Some(value),
                    _ => None,
                }
            }
            Token::Label(label) => Some(ctx.eval_label(label)),
            _ => None,
        }
    }
}

fn eval_clause(
    clause: &Clause,
    container: &TextContainer,
    prior: &BTreeSet<Capture>,
    treat_all_as_code: bool,
) -> (bool, BTreeSet<Capture>) {
    if let ClauseKind::Within { region, inner } = &clause.kind {
        let (_, inner_captures) = eval_clause(inner, container, prior, treat_all_as_code);
        let holds = within_holds(*region, &inner_captures, prior, container);
        let matched = if clause.invert { !holds } else { holds };
        // Conditions gate the rule; they contribute no captures of their own.
        return (matched, BTreeSet::new());
    }

    let case_insensitive = clause.arguments.iter().any(|m| m == "i");
    let multi_line = clause.arguments.iter().any(|m| m == "m");

    let mut hits = match &clause.kind {
        ClauseKind::Substring {
            needles,
            word_boundaries,
        } => ops::find_substrings(container.content(), needles, case_insensitive, *word_boundaries),
        ClauseKind::RegexIndex { patterns } => {
            ops::find_regex_matches(container.content(), patterns, case_insensitive, multi_line)
        }
        ClauseKind::Within { .. } => unreachable!("handled above"),
    };

    if !clause.json_paths.is_empty() || !clause.x_paths.is_empty() {
        let mut windows = structured::json_windows(container.content(), &clause.json_paths);
        windows.extend(structured::xml_windows(container.content(), &clause.x_paths));
        hits.retain(|hit| {
            windows
                .iter()
                .any(|w| hit.index >= w.index && hit.end() <= w.end())
        });
    }

    if !treat_all_as_code {
        hits.retain(|hit| container.scope_match(&clause.scopes, hit));
    }

    let captures: BTreeSet<Capture> = hits
        .into_iter()
        .map(|boundary| (clause.pattern_index, boundary))
        .collect();

    if clause.invert {
        (captures.is_empty(), BTreeSet::new())
    } else {
        (!captures.is_empty(), captures)
    }
}

fn within_holds(
    region: WithinRegion,
    inner: &BTreeSet<Capture>,
    prior: &BTreeSet<Capture>,
    container: &TextContainer,
) -> bool {
    match region {
        WithinRegion::SameFile => !inner.is_empty(),
        WithinRegion::FindingOnly => inner
            .iter()
            .any(|(_, s)| prior.iter().any(|(_, p)| s.overlaps(p))),
        WithinRegion::FindingRegion { before, after } => inner.iter().any(|(_, s)| {
            let s_line = container.get_location(s.index).line as i64;
            prior.iter().any(|(_, p)| {
                let p_line = container.get_location(p.index).line as i64;
                s_line >= p_line - before && s_line <= p_line + after
            })
        }),
        WithinRegion::SameLine => inner.iter().any(|(_, s)| {
            let s_line = container.get_location(s.index).line;
            prior
                .iter()
                .any(|(_, p)| container.get_location(p.index).line == s_line)
        }),
        WithinRegion::OnlyBefore => inner
            .iter()
            .any(|(_, s)| prior.iter().any(|(_, p)| s.index < p.index)),
        WithinRegion::OnlyAfter => inner
            .iter()
            .any(|(_, s)| prior.iter().any(|(_, p)| s.index > p.index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_rule;
    use tagscan_types::{
        Confidence, PatternKind, PatternScope, Rule, SearchCondition, SearchPattern, Severity,
    };

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

    fn rule(patterns: Vec<SearchPattern>, conditions: Vec<SearchCondition>) -> Rule {
        Rule {
            id: "E1".to_string(),
            name: "eval test".to_string(),
            description: String::new(),
            tags: vec!["Test".to_string()],
            severity: Severity::Moderate,
            applies_to: vec![],
            applies_to_file_regex: vec![],
            patterns,
            conditions,
        }
    }

    fn eval(rule: &Rule, content: &str, language: &str) -> RuleEvaluation {
        let compiled = compile_rule(rule, 0, &mut Vec::new()).unwrap();
        let container = TextContainer::new(content, language);
        evaluate_rule(&compiled, &container, false)
    }

    #[test]
    fn tokenizer_splits_parens_and_labels() {
        let tokens = tokenize("(0 OR 1) AND 2");
        assert_eq!(
            tokens,
            vec![
                Token::Open,
                Token::Label("0".to_string()),
                Token::Or,
                Token::Label("1".to_string()),
                Token::Close,
                Token::And,
                Token::Label("2".to_string()),
            ]
        );
    }

    #[test]
    fn or_over_patterns_unions_captures_with_indices() {
        let r = rule(
            vec![
                pattern("alpha", PatternKind::String),
                pattern("beta", PatternKind::String),
            ],
            vec![],
        );
        let result = eval(&r, "alpha beta alpha", "rust");
        assert!(result.matched);
        let indices: Vec<usize> = result.captures.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 0, 1]);
    }

    #[test]
    fn condition_same_line_gates_the_rule() {
        let r = rule(
            vec![pattern("password", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("example", PatternKind::String),
                search_in: Some("same-line".to_string()),
                negate_finding: false,
            }],
        );
        assert!(eval(&r, "password = example\n", "rust").matched);
        assert!(!eval(&r, "password = real\nexample elsewhere is too far? no:", "rust").matched);
    }

    #[test]
    fn condition_same_line_works_across_lines() {
        let r = rule(
            vec![pattern("password", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("example", PatternKind::String),
                search_in: Some("same-line".to_string()),
                negate_finding: false,
            }],
        );
        // Condition hit on a different line does not satisfy same-line.
        assert!(!eval(&r, "password = x\nexample\n", "rust").matched);
    }

    #[test]
    fn condition_finding_region_respects_line_window() {
        let content_with_anchor_at = |anchor_line: usize| {
            let mut content = String::new();
            for line in 1..=20 {
                if line == 10 {
                    content.push_str("needle here\n");
                } else if line == anchor_line {
                    content.push_str("anchor\n");
                } else {
                    content.push_str("filler\n");
                }
            }
            content
        };
        let r = rule(
            vec![pattern("needle", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("anchor", PatternKind::String),
                search_in: Some("finding-region(3,3)".to_string()),
                negate_finding: false,
            }],
        );
        // Needle at line 10; the condition window is lines 7..=13.
        assert!(eval(&r, &content_with_anchor_at(12), "rust").matched);
        assert!(!eval(&r, &content_with_anchor_at(14), "rust").matched);
    }

    #[test]
    fn negated_condition_inverts_the_gate() {
        let r = rule(
            vec![pattern("api_key", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("secret", PatternKind::String),
                search_in: Some("same-file".to_string()),
                negate_finding: true,
            }],
        );
        assert!(eval(&r, "api_key = 1\n", "rust").matched);
        assert!(!eval(&r, "api_key = 1\nsecret\n", "rust").matched);
    }

    #[test]
    fn only_before_and_only_after() {
        let before = rule(
            vec![pattern("use_it", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("declare_it", PatternKind::String),
                search_in: Some("only-before".to_string()),
                negate_finding: false,
            }],
        );
        assert!(eval(&before, "declare_it\nuse_it\n", "rust").matched);
        assert!(!eval(&before, "use_it\ndeclare_it\n", "rust").matched);

        let after = rule(
            vec![pattern("use_it", PatternKind::String)],
            vec![SearchCondition {
                pattern: pattern("declare_it", PatternKind::String),
                search_in: Some("only-after".to_string()),
                negate_finding: false,
            }],
        );
        assert!(eval(&after, "use_it\ndeclare_it\n", "rust").matched);
    }

    #[test]
    fn inverted_pattern_clause_matches_on_absence() {
        let r = rule(vec![pattern("secret", PatternKind::String)], vec![]);
        let mut compiled = compile_rule(&r, 0, &mut Vec::new()).unwrap();
        compiled.clauses[0].invert = true;

        let clean = TextContainer::new("nothing to see\n", "rust");
        let result = evaluate_rule(&compiled, &clean, false);
        assert!(result.matched);
        assert!(result.captures.is_empty());

        let dirty = TextContainer::new("the secret is out\n", "rust");
        assert!(!evaluate_rule(&compiled, &dirty, false).matched);
    }

    #[test]
    fn scope_restriction_drops_comment_hits() {
        let mut p = pattern("token", PatternKind::String);
        p.scopes = Some(vec![PatternScope::Code]);
        let r = rule(vec![p], vec![]);
        let result = eval(&r, "token = 1; // token\n", "rust");
        assert!(result.matched);
        assert_eq!(result.captures.len(), 1);
        assert_eq!(result.captures[0].1.index, 0);
    }

    #[test]
    fn treat_all_as_code_ignores_scopes() {
        let mut p = pattern("token", PatternKind::String);
        p.scopes = Some(vec![PatternScope::Code]);
        let r = rule(vec![p], vec![]);
        let compiled = compile_rule(&r, 0, &mut Vec::new()).unwrap();
        let container = TextContainer::new("// token only in comment\n", "rust");
        assert!(!evaluate_rule(&compiled, &container, false).matched);
        assert!(evaluate_rule(&compiled, &container, true).matched);
    }

    #[test]
    fn jsonpath_restriction_limits_hits() {
        let mut p = pattern("Franklin", PatternKind::String);
        p.jsonpaths = vec!["$.books[*].title".to_string()];
        let r = rule(vec![p], vec![]);
        let doc = r#"{
            "books": [
                { "title": "Franklin of Philadelphia", "author": "Esmond Wright" },
                { "title": "Something Else", "author": "Benjamin Franklin" }
            ]
        }"#;
        let result = eval(&r, doc, "json");
        assert!(result.matched);
        assert_eq!(result.captures.len(), 1);
    }

    #[test]
    fn degenerate_rule_never_matches() {
        let r = rule(vec![], vec![]);
        let result = eval(&r, "anything", "rust");
        assert!(!result.matched);
    }
}
