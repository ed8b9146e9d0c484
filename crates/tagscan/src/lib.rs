//! tagscan scans source-code buffers for rule-defined patterns and reports
//! matches with tags, confidence, severity, and location metadata.
//!
//! The heart of the library is the rules engine in `tagscan-domain`: a JSON
//! rule catalog compiles into clause trees that run regex, substring,
//! JSONPath-, and XPath-anchored patterns against text while honoring scope
//! (code vs. comment) and proximity conditions. This crate adds catalog
//! loading and multi-file orchestration.
//!
//! ```no_run
//! use tagscan::{analyze_files, load_rules_from_str, CancellationToken, FileEntry, ProcessorOptions};
//!
//! let catalog = load_rules_from_str(r#"[{
//!     "id": "TS0001", "name": "Contoso URL", "tags": ["Network.Url"],
//!     "severity": "moderate",
//!     "patterns": [{ "pattern": "contoso\\.com", "type": "regex", "confidence": "high" }]
//! }]"#)?;
//!
//! let entries = vec![FileEntry::new("src/main.rs", "let u = \"https://contoso.com\";")];
//! let results = analyze_files(
//!     &catalog,
//!     &entries,
//!     ProcessorOptions::default(),
//!     CancellationToken::new(),
//! );
//! for (path, scan) in &results {
//!     for record in &scan.records {
//!         println!("{path}:{}: {}", record.start.line, record.rule_id);
//!     }
//! }
//! # Ok::<(), tagscan::LoadError>(())
//! ```

use std::collections::BTreeSet;
use std::sync::Mutex;

use rayon::prelude::*;

pub mod loader;

pub use loader::{load_rules_from_dir, load_rules_from_file, load_rules_from_str, LoadError};
pub use tagscan_domain::{
    from_file_name, CancellationToken, ConfidenceFilter, FileScan, FileStatus, ProcessorOptions,
    RuleCatalog, RuleProcessor, TextContainer,
};
pub use tagscan_types::{
    Boundary, Confidence, FileKind, LanguageInfo, Location, MatchRecord, PatternKind,
    PatternScope, Rule, RuleViolation, SearchCondition, SearchPattern, Severity,
};

/// One file handed to the scanner: a path (for language detection and
/// reporting) and its content. Archive walkers and file enumerators live
/// outside the library and feed entries in.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Analyze a batch of files against a compiled catalog.
///
/// Files the language registry does not recognize are skipped. With
/// `options.parallel` the batch fans out over rayon; with
/// `options.unique_tags_only` a shared tag set keeps one witness per tag
/// across the whole batch. Cancellation is checked between files and between
/// rules; already-produced results are returned.
pub fn analyze_files(
    catalog: &RuleCatalog,
    entries: &[FileEntry],
    options: ProcessorOptions,
    cancel: CancellationToken,
) -> Vec<(String, FileScan)> {
    let processor = RuleProcessor::new(catalog, options.clone()).with_cancellation(cancel.clone());
    let shared_tags = options
        .unique_tags_only
        .then(|| Mutex::new(BTreeSet::<String>::new()));

    let analyze_one = |entry: &FileEntry| -> Option<(String, FileScan)> {
        let language = from_file_name(&entry.path)?;
        let scan = match &shared_tags {
            Some(seen) => {
                let mut guard = seen.lock().expect("shared tag set lock");
                processor.analyze_file(
                    &entry.content,
                    &entry.path,
                    &language,
                    Some(&mut guard),
                    None,
                )
            }
            None => processor.analyze_file(&entry.content, &entry.path, &language, None, None),
        };
        Some((entry.path.clone(), scan))
    };

    if options.parallel {
        entries.par_iter().filter_map(analyze_one).collect()
    } else {
        let mut out = Vec::new();
        for entry in entries {
            if cancel.is_canceled() {
                break;
            }
            if let Some(result) = analyze_one(entry) {
                out.push(result);
            }
        }
        out
    }
}
