//! Pattern operations: substring and regex matchers over a text container.
//!
//! Both operators return raw boundaries; scope filtering, structured-window
//! restriction, and capture labeling happen in the evaluator. Compiled
//! regexes are cached process-wide, keyed by `(source, options)`; a failed
//! compilation caches a sentinel so the warning fires once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tagscan_types::Boundary;
use tracing::warn;

const OPT_CASE_INSENSITIVE: u8 = 1 << 0;
const OPT_MULTI_LINE: u8 = 1 << 1;

#[allow(clippy::type_complexity)]
static REGEX_CACHE: Lazy<Mutex<HashMap<(String, u8), Option<Arc<Regex>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch (or compile and cache) a regex. Returns `None` for sources that do
/// not compile; the sentinel is cached so repeated lookups stay silent.
pub(crate) fn cached_regex(
    source: &str,
    case_insensitive: bool,
    multi_line: bool,
) -> Option<Arc<Regex>> {
    let mut options = 0u8;
    if case_insensitive {
        options |= OPT_CASE_INSENSITIVE;
    }
    if multi_line {
        options |= OPT_MULTI_LINE;
    }

    let mut cache = REGEX_CACHE.lock().expect("regex cache lock");
    if let Some(entry) = cache.get(&(source.to_string(), options)) {
        return entry.clone();
    }

    let entry = match RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .build()
    {
        Ok(regex) => Some(Arc::new(regex)),
        Err(err) => {
            warn!(%source, %err, "regex failed to compile; clause will not match");
            None
        }
    };
    cache.insert((source.to_string(), options), entry.clone());
    entry
}

/// Every occurrence of every needle. Case-insensitivity is ASCII-only so
/// byte offsets stay aligned with the original content; word boundaries
/// require a non-word byte (or the file edge) on both sides.
pub(crate) fn find_substrings(
    content: &str,
    needles: &[String],
    case_insensitive: bool,
    word_boundaries: bool,
) -> Vec<Boundary> {
    let hay = content.as_bytes();
    let mut out = Vec::new();

    for needle in needles {
        let nb = needle.as_bytes();
        if nb.is_empty() || nb.len() > hay.len() {
            continue;
        }
        for start in 0..=hay.len() - nb.len() {
            let window = &hay[start..start + nb.len()];
            let hit = if case_insensitive {
                window.eq_ignore_ascii_case(nb)
            } else {
                window == nb
            };
            if hit && (!word_boundaries || is_word_bounded(hay, start, nb.len())) {
                out.push(Boundary::new(start, nb.len()));
            }
        }
    }
    out
}

/// Join patterns with `|`, compile through the cache, and report every
/// non-empty match. Empty matches are discarded: a regex that matches the
/// empty string yields no captures.
pub(crate) fn find_regex_matches(
    content: &str,
    patterns: &[String],
    case_insensitive: bool,
    multi_line: bool,
) -> Vec<Boundary> {
    let joined = patterns.join("|");
    let Some(regex) = cached_regex(&joined, case_insensitive, multi_line) else {
        return Vec::new();
    };

    regex
        .find_iter(content)
        .filter(|m| m.end() > m.start())
        .map(|m| Boundary::new(m.start(), m.end() - m.start()))
        .collect()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_word_bounded(hay: &[u8], start: usize, len: usize) -> bool {
    let left_ok = start == 0 || !is_word_byte(hay[start - 1]);
    let right_ok = start + len == hay.len() || !is_word_byte(hay[start + len]);
    left_ok && right_ok
}
