//! Rule processor: applies a compiled catalog to one file buffer and emits
//! match records.
//!
//! Per file it builds a `TextContainer`, selects the applicable rules,
//! evaluates each clause tree, filters captures by confidence / tags / build
//! kind, resolves overlapping captures, and extracts sample and excerpt
//! text. Timeout and cancellation are cooperative, checked between rules.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tagscan_types::{Boundary, Confidence, FileKind, LanguageInfo, MatchRecord};
use tracing::warn;

use crate::catalog::RuleCatalog;
use crate::evaluate::{evaluate_rule, Capture};
use crate::text::TextContainer;

const SAMPLE_MAX_CHARS: usize = 200;

/// Bitmask of confidences the processor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceFilter(u8);

impl ConfidenceFilter {
    pub const LOW: ConfidenceFilter = ConfidenceFilter(1 << 0);
    pub const MEDIUM: ConfidenceFilter = ConfidenceFilter(1 << 1);
    pub const HIGH: ConfidenceFilter = ConfidenceFilter(1 << 2);
    pub const ALL: ConfidenceFilter = ConfidenceFilter(0b111);

    pub fn union(self, other: ConfidenceFilter) -> ConfidenceFilter {
        ConfidenceFilter(self.0 | other.0)
    }

    pub fn accepts(self, confidence: Confidence) -> bool {
        let bit = match confidence {
            Confidence::Low => Self::LOW.0,
            Confidence::Medium => Self::MEDIUM.0,
            Confidence::High => Self::HIGH.0,
        };
        self.0 & bit != 0
    }
}

impl Default for ConfidenceFilter {
    /// High and medium; low-confidence patterns are opt-in.
    fn default() -> Self {
        Self::MEDIUM.union(Self::HIGH)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub confidence_filter: ConfidenceFilter,
    /// Accept every tag in build files instead of only `Metadata.` tags.
    pub allow_all_tags_in_build_files: bool,
    /// When set, suppress repeat records per tag (one witness per tag set).
    pub unique_tags_only: bool,
    /// Tag regexes exempt from uniqueness suppression.
    pub unique_tag_exceptions: Vec<String>,
    /// Excerpt lines on either side of a match; `-1` disables excerpts.
    pub context_lines: i32,
    /// Force every scope check to accept.
    pub treat_everything_as_code: bool,
    /// Allow concurrent per-file evaluation in the orchestrator.
    pub parallel: bool,
    /// Per-file evaluation budget; `0` means no timeout.
    pub file_timeout_ms: u64,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            confidence_filter: ConfidenceFilter::default(),
            allow_all_tags_in_build_files: false,
            unique_tags_only: false,
            unique_tag_exceptions: Vec::new(),
            context_lines: 3,
            treat_everything_as_code: false,
            parallel: false,
            file_timeout_ms: 0,
        }
    }
}

/// Cooperative cancellation flag, checked between rules and between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Analyzed,
    TimedOut,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct FileScan {
    pub status: FileStatus,
    pub records: Vec<MatchRecord>,
}

pub struct RuleProcessor<'a> {
    catalog: &'a RuleCatalog,
    options: ProcessorOptions,
    tag_exceptions: Vec<Regex>,
    cancel: CancellationToken,
}

impl<'a> RuleProcessor<'a> {
    pub fn new(catalog: &'a RuleCatalog, options: ProcessorOptions) -> Self {
        let tag_exceptions = options
            .unique_tag_exceptions
            .iter()
            .filter_map(|raw| match Regex::new(raw) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %raw, %err, "ignoring invalid unique-tag exception");
                    None
                }
            })
            .collect();
        Self {
            catalog,
            options,
            tag_exceptions,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Analyze one file buffer.
    ///
    /// `tag_filter` is the cross-call set of already-witnessed tags; pass
    /// `Some` to suppress repeat records per tag (one witness per tag),
    /// subject to the configured exceptions. `context_lines` overrides the
    /// option of the same name when given.
    pub fn analyze_file(
        &self,
        content: &str,
        file_path: &str,
        language: &LanguageInfo,
        mut tag_filter: Option<&mut BTreeSet<String>>,
        context_lines: Option<i32>,
    ) -> FileScan {
        let context_lines = context_lines.unwrap_or(self.options.context_lines);
        let deadline = (self.options.file_timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(self.options.file_timeout_ms));

        let container = TextContainer::new(content, &language.name);
        let file_name = file_path.rsplit(['/', '\\']).next().unwrap_or(file_path);
        let selected = self.catalog.rules_for(&language.name, file_name);

        let mut records = Vec::new();
        for rule_index in selected {
            if self.cancel.is_canceled() {
                return FileScan {
                    status: FileStatus::Canceled,
                    records,
                };
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return FileScan {
                        status: FileStatus::TimedOut,
                        records: Vec::new(),
                    };
                }
            }

            let rule = self.catalog.rule(rule_index);
            let compiled = self.catalog.compiled(rule_index);
            let evaluation =
                evaluate_rule(compiled, &container, self.options.treat_everything_as_code);
            if !evaluation.matched {
                continue;
            }

            let mut captures = evaluation.captures;
            if captures.is_empty() {
                // An inverted rule matched on absence; anchor one witness at
                // the start of the file. Empty files stay silent.
                if container.content().is_empty() {
                    continue;
                }
                captures.push((0, Boundary::new(0, 1)));
            }

            for (pattern_index, boundary) in resolve_overlaps(captures) {
                let Some(pattern) = rule.patterns.get(pattern_index) else {
                    continue;
                };
                if !self.options.confidence_filter.accepts(pattern.confidence) {
                    continue;
                }
                if language.kind == FileKind::Build
                    && !self.options.allow_all_tags_in_build_files
                    && !rule.tags.iter().any(|t| t.starts_with("Metadata."))
                {
                    continue;
                }
                if let Some(seen) = tag_filter.as_deref_mut() {
                    if self.suppressed_by_tags(&rule.tags, seen) {
                        continue;
                    }
                    for tag in &rule.tags {
                        seen.insert(tag.clone());
                    }
                }

                records.push(self.make_record(
                    &container,
                    file_path,
                    language,
                    rule_index,
                    pattern_index,
                    boundary,
                    context_lines,
                ));
            }
        }

        FileScan {
            status: FileStatus::Analyzed,
            records,
        }
    }

    fn suppressed_by_tags(&self, tags: &[String], seen: &BTreeSet<String>) -> bool {
        if tags.is_empty() {
            return false;
        }
        let all_seen = tags.iter().all(|t| seen.contains(t));
        let exempt = tags
            .iter()
            .any(|t| self.tag_exceptions.iter().any(|re| re.is_match(t)));
        all_seen && !exempt
    }

    #[allow(clippy::too_many_arguments)]
    fn make_record(
        &self,
        container: &TextContainer,
        file_path: &str,
        language: &LanguageInfo,
        rule_index: usize,
        pattern_index: usize,
        boundary: Boundary,
        context_lines: i32,
    ) -> MatchRecord {
        let rule = self.catalog.rule(rule_index);
        let pattern = &rule.patterns[pattern_index];

        let start = container.get_location(boundary.index);
        let end = container.get_location(boundary.end());
        let sample: String = container
            .get_boundary_text(&boundary)
            .chars()
            .take(SAMPLE_MAX_CHARS)
            .collect();
        let excerpt = extract_excerpt(container, start.line, context_lines);

        MatchRecord {
            file_path: file_path.to_string(),
            language: language.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_description: rule.description.clone(),
            tags: rule.tags.clone(),
            severity: rule.severity,
            pattern: pattern.pattern.clone(),
            pattern_kind: pattern.kind,
            confidence: pattern.confidence,
            boundary,
            start,
            end,
            sample,
            excerpt,
        }
    }
}

/// Best-match overlap resolution within one rule: longer boundaries win,
/// ties go to the smaller index. Survivors are ordered by
/// `(index, length)` ascending.
fn resolve_overlaps(mut captures: Vec<Capture>) -> Vec<Capture> {
    captures.sort_by(|a, b| {
        b.1.length
            .cmp(&a.1.length)
            .then(a.1.index.cmp(&b.1.index))
            .then(a.0.cmp(&b.0))
    });

    let mut kept: Vec<Capture> = Vec::new();
    for capture in captures {
        if !kept.iter().any(|k| k.1.overlaps(&capture.1)) {
            kept.push(capture);
        }
    }
    kept.sort_by_key(|(index, b)| (b.index, b.length, *index));
    kept
}

/// `context` lines on either side of `line`, with the common leading
/// whitespace of the window trimmed. Negative context disables excerpts.
fn extract_excerpt(container: &TextContainer, line: usize, context: i32) -> String {
    if context < 0 {
        return String::new();
    }
    let context = context as usize;
    let lo = line.saturating_sub(context).max(1);
    let hi = (line + context).min(container.line_count());
    let lines: Vec<&str> = (lo..=hi).map(|l| container.get_line_content(l)).collect();

    let mut prefix: Option<&str> = None;
    for l in &lines {
        if l.trim().is_empty() {
            continue;
        }
        let ws_len = l.len() - l.trim_start_matches([' ', '\t']).len();
        let ws = &l[..ws_len];
        prefix = Some(match prefix {
            None => ws,
            Some(p) => common_prefix(p, ws),
        });
    }
    let prefix_len = prefix.map_or(0, str::len);

    lines
        .iter()
        .map(|l| l.get(prefix_len..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'p>(a: &'p str, b: &str) -> &'p str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}
