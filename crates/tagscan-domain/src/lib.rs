//! Rules engine core: language registry, text container, rule compiler,
//! clause evaluator, and rule processor.
//!
//! This crate is I/O-free and designed to be highly testable: callers hand
//! it rule documents and file buffers, it hands back match records. Loading
//! rules from disk lives in the `tagscan` facade crate.

pub mod catalog;
pub mod compile;
pub mod evaluate;
pub mod language;
mod ops;
pub mod processor;
mod structured;
pub mod text;

pub use catalog::RuleCatalog;
pub use compile::{compile_rule, Clause, ClauseKind, CompiledRule, WithinRegion};
pub use evaluate::{evaluate_rule, Capture, RuleEvaluation};
pub use language::{comment_style, from_file_name, CommentStyle};
pub use processor::{
    CancellationToken, ConfidenceFilter, FileScan, FileStatus, ProcessorOptions, RuleProcessor,
};
pub use text::TextContainer;
