//! Compiled rule catalog: rule arena plus selection indices.
//!
//! Rules are compiled once and immutable afterwards. Invalid rules are
//! dropped during construction and recorded as violations; the catalog is
//! usable without them. Selection returns indices into the arena so the
//! processor never holds cross-references between rules and clauses.

use std::collections::HashSet;

use regex::Regex;
use tagscan_types::{Rule, RuleViolation};
use tracing::debug;

use crate::compile::{compile_rule, CompiledRule};

#[derive(Debug)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    compiled: Vec<CompiledRule>,
    /// Compiled `applies_to_file_regex`, parallel to `rules`.
    file_regexes: Vec<Vec<Regex>>,
    violations: Vec<RuleViolation>,
}

impl RuleCatalog {
    pub fn from_rules(source: Vec<Rule>) -> Self {
        let mut rules = Vec::with_capacity(source.len());
        let mut compiled = Vec::with_capacity(source.len());
        let mut file_regexes = Vec::with_capacity(source.len());
        let mut violations = Vec::new();

        'rules: for rule in source {
            let mut regexes = Vec::with_capacity(rule.applies_to_file_regex.len());
            for raw in &rule.applies_to_file_regex {
                match Regex::new(raw) {
                    Ok(re) => regexes.push(re),
                    Err(err) => {
                        violations.push(RuleViolation {
                            rule_id: rule.id.clone(),
                            clause: None,
                            reason: format!("invalid file-name regex '{raw}': {err}"),
                        });
                        continue 'rules;
                    }
                }
            }

            let index = rules.len();
            let Some(c) = compile_rule(&rule, index, &mut violations) else {
                continue;
            };
            rules.push(rule);
            compiled.push(c);
            file_regexes.push(regexes);
        }

        debug!(
            rules = rules.len(),
            violations = violations.len(),
            "rule catalog compiled"
        );
        Self {
            rules,
            compiled,
            file_regexes,
            violations,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    pub fn compiled(&self, index: usize) -> &CompiledRule {
        &self.compiled[index]
    }

    pub fn violations(&self) -> &[RuleViolation] {
        &self.violations
    }

    fn is_universal(&self, index: usize) -> bool {
        self.rules[index].applies_to.is_empty() && self.file_regexes[index].is_empty()
    }

    fn language_matches(&self, index: usize, language: &str) -> bool {
        self.rules[index]
            .applies_to
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }

    fn filename_matches(&self, index: usize, file_name: &str) -> bool {
        self.file_regexes[index].iter().any(|re| re.is_match(file_name))
    }

    /// Rules with neither language nor filename restrictions.
    pub fn universal_rules(&self) -> Vec<usize> {
        (0..self.rules.len())
            .filter(|&i| self.is_universal(i))
            .collect()
    }

    pub fn by_language(&self, language: &str) -> Vec<usize> {
        (0..self.rules.len())
            .filter(|&i| self.language_matches(i, language))
            .collect()
    }

    pub fn by_filename(&self, file_name: &str) -> Vec<usize> {
        (0..self.rules.len())
            .filter(|&i| self.filename_matches(i, file_name))
            .collect()
    }

    /// Union of universal, by-language, and by-filename selection, in catalog
    /// order, de-duplicated by rule id (first definition wins).
    pub fn rules_for(&self, language: &str, file_name: &str) -> Vec<usize> {
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for i in 0..self.rules.len() {
            if !(self.is_universal(i)
                || self.language_matches(i, language)
                || self.filename_matches(i, file_name))
            {
                continue;
            }
            if seen_ids.insert(self.rules[i].id.as_str()) {
                out.push(i);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscan_types::{Confidence, PatternKind, SearchPattern, Severity};

    fn rule(id: &str, applies_to: Vec<&str>, file_regex: Vec<&str>) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            tags: vec!["Test".to_string()],
            severity: Severity::Moderate,
            applies_to: applies_to.into_iter().map(String::from).collect(),
            applies_to_file_regex: file_regex.into_iter().map(String::from).collect(),
            patterns: vec![SearchPattern {
                pattern: "x".to_string(),
                kind: PatternKind::Substring,
                confidence: Confidence::Medium,
                scopes: None,
                modifiers: vec![],
                xpaths: vec![],
                jsonpaths: vec![],
            }],
            conditions: vec![],
        }
    }

    #[test]
    fn selection_unions_and_dedupes() {
        let catalog = RuleCatalog::from_rules(vec![
            rule("universal", vec![], vec![]),
            rule("rust-only", vec!["rust"], vec![]),
            rule("pom-only", vec![], vec!["pom\\.xml"]),
            rule("both", vec!["rust"], vec!["pom\\.xml"]),
        ]);

        assert_eq!(catalog.universal_rules(), vec![0]);
        assert_eq!(catalog.by_language("RUST"), vec![1, 3]);
        assert_eq!(catalog.by_filename("pom.xml"), vec![2, 3]);

        let selected = catalog.rules_for("rust", "pom.xml");
        assert_eq!(selected, vec![0, 1, 2, 3]);

        let selected = catalog.rules_for("go", "main.go");
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn duplicate_ids_keep_first_definition() {
        let catalog = RuleCatalog::from_rules(vec![
            rule("dup", vec!["rust"], vec![]),
            rule("dup", vec![], vec![]),
        ]);
        // Second "dup" is universal but loses to the first on id.
        assert_eq!(catalog.rules_for("rust", "lib.rs"), vec![0]);
        assert_eq!(catalog.rules_for("go", "main.go"), vec![1]);
    }

    #[test]
    fn invalid_file_regex_drops_rule_with_violation() {
        let catalog = RuleCatalog::from_rules(vec![
            rule("bad", vec![], vec!["[unclosed"]),
            rule("good", vec![], vec![]),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.violations().len(), 1);
        assert_eq!(catalog.violations()[0].rule_id, "bad");
    }
}
