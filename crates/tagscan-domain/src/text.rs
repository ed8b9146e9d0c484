//! Language-aware indexed view of one source file.
//!
//! A [`TextContainer`] owns the file content, a 1-indexed line index, and a
//! lazily populated map of which byte offsets sit inside a comment. It is
//! constructed once per file and immutable afterwards except for the memoized
//! commented-state map, which only ever grows and whose writes are
//! idempotent (racing writers compute the same value for an offset).

use std::collections::HashMap;
use std::sync::Mutex;

use tagscan_types::{Boundary, Location, PatternScope};

use crate::language::{self, CommentStyle};

pub struct TextContainer {
    content: String,
    language: String,
    comment: CommentStyle,
    /// 1-indexed; slot 0 is a sentinel.
    line_starts: Vec<u32>,
    /// 1-indexed; slot 0 is a sentinel. `line_ends[i]` is the offset of the
    /// `\n` terminating line `i` (or the last offset of the file when the
    /// final line is unterminated).
    line_ends: Vec<u32>,
    commented_states: Mutex<HashMap<usize, bool>>,
}

impl TextContainer {
    pub fn new(content: impl Into<String>, language: &str) -> Self {
        let content = content.into();
        let bytes = content.as_bytes();

        let mut line_starts: Vec<u32> = vec![0, 0];
        let mut line_ends: Vec<u32> = vec![0];

        for (pos, byte) in bytes.iter().enumerate() {
            if *byte == b'\n' {
                line_ends.push(pos as u32);
                if pos + 1 < bytes.len() {
                    line_starts.push((pos + 1) as u32);
                }
            }
        }
        // An unterminated final line still needs a line end.
        if line_ends.len() < line_starts.len() {
            line_ends.push(bytes.len().saturating_sub(1) as u32);
        }

        Self {
            content,
            language: language.to_string(),
            comment: language::comment_style(language),
            line_starts,
            line_ends,
            commented_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }

    /// 1-indexed line number owning the given byte offset: the smallest line
    /// whose end is at or past the offset, clamped to the last line.
    fn line_for(&self, index: usize) -> usize {
        let i = self.line_ends[1..].partition_point(|&end| (end as usize) < index);
        (i + 1).min(self.line_count().max(1))
    }

    pub fn get_line_boundary(&self, index: usize) -> Boundary {
        let line = self.line_for(index);
        let start = self.line_starts[line] as usize;
        let end = self.line_ends[line] as usize;
        Boundary::new(start, end - start + 1)
    }

    /// Content of a 1-indexed line, without the trailing newline. Out-of-range
    /// lines clamp to the last line.
    pub fn get_line_content(&self, line: usize) -> &str {
        let line = line.clamp(1, self.line_count().max(1));
        let start = self.line_starts[line] as usize;
        let end = (self.line_ends[line] as usize + 1).min(self.content.len());
        self.slice(start, end).trim_end_matches(['\n', '\r'])
    }

    pub fn get_location(&self, index: usize) -> Location {
        let line = self.line_for(index);
        let start = self.line_starts[line] as usize;
        Location {
            line,
            column: index.saturating_sub(start) + 1,
        }
    }

    pub fn get_boundary_text(&self, boundary: &Boundary) -> &str {
        self.slice(boundary.index, boundary.end())
    }

    /// Byte-range slice clamped to the content and floored to char
    /// boundaries, so multi-byte text never panics.
    fn slice(&self, start: usize, end: usize) -> &str {
        let end = self.floor_char_boundary(end.min(self.content.len()));
        let start = self.floor_char_boundary(start.min(end));
        &self.content[start..end]
    }

    fn floor_char_boundary(&self, mut i: usize) -> usize {
        while i > 0 && !self.content.is_char_boundary(i) {
            i -= 1;
        }
        i
    }

    /// Whether a pattern restricted to `scopes` may report a hit at
    /// `boundary`. `All` and comment-less languages accept everything;
    /// otherwise the answer is an explicit code-vs-comment predicate on the
    /// boundary start.
    pub fn scope_match(&self, scopes: &[PatternScope], boundary: &Boundary) -> bool {
        if scopes.contains(&PatternScope::All) || !self.comment.has_comments() {
            return true;
        }
        let in_comment = self.is_commented(boundary.index);
        (in_comment && scopes.contains(&PatternScope::Comment))
            || (!in_comment && scopes.contains(&PatternScope::Code))
    }

    /// Whether the byte at `index` sits inside a comment. Offsets past the
    /// end clamp to the last byte. Results are memoized; entries never
    /// change once written.
    pub fn is_commented(&self, index: usize) -> bool {
        if self.content.is_empty() {
            return false;
        }
        let clamped = index.min(self.content.len() - 1);

        {
            let states = self.commented_states.lock().expect("commented-state lock");
            if let Some(&known) = states.get(&clamped) {
                drop(states);
                return self.memoize(index, clamped, known);
            }
        }

        self.populate_states(clamped);

        let known = {
            let states = self.commented_states.lock().expect("commented-state lock");
            states.get(&clamped).copied().unwrap_or(false)
        };
        self.memoize(index, clamped, known)
    }

    fn memoize(&self, index: usize, clamped: usize, value: bool) -> bool {
        if index != clamped {
            self.commented_states
                .lock()
                .expect("commented-state lock")
                .insert(index, value);
        }
        value
    }

    /// Fill the commented-state map around `q`.
    ///
    /// Finds the closest block-comment prefix and inline-comment opener at or
    /// before `q`, marks their comment spans `true`, then back-fills `false`
    /// from `q` down to the first already-known offset.
    fn populate_states(&self, q: usize) {
        let bytes = self.content.as_bytes();
        let mut states = self.commented_states.lock().expect("commented-state lock");

        if let (Some(prefix), Some(suffix)) = (self.comment.prefix, self.comment.suffix) {
            if let Some(p) = rfind_at_or_before(bytes, prefix.as_bytes(), q) {
                if !states.contains_key(&p) {
                    let s = find_from(bytes, suffix.as_bytes(), p)
                        .unwrap_or(bytes.len() - 1);
                    for offset in p..=s {
                        states.entry(offset).or_insert(true);
                    }
                }
            }
        }

        if let Some(inline) = self.comment.inline {
            let mut search_end = q;
            loop {
                let Some(p) = rfind_at_or_before(bytes, inline.as_bytes(), search_end) else {
                    break;
                };
                // An opener with an unbalanced quote count before it on its
                // line sits inside a string literal (`https://...`), not at
                // the start of a comment; keep searching backward.
                if inside_string_literal(bytes, p) {
                    if p == 0 {
                        break;
                    }
                    search_end = p - 1;
                    continue;
                }
                if !states.contains_key(&p) {
                    let n = find_from(bytes, b"\n", p).unwrap_or(bytes.len() - 1);
                    for offset in p..=n {
                        states.entry(offset).or_insert(true);
                    }
                }
                break;
            }
        }

        let mut offset = q;
        loop {
            if states.contains_key(&offset) {
                break;
            }
            states.insert(offset, false);
            if offset == 0 {
                break;
            }
            offset -= 1;
        }
    }
}

/// Whether offset `p` has an odd number of `"` or `'` before it on its own
/// line, i.e. sits inside a string literal.
fn inside_string_literal(hay: &[u8], p: usize) -> bool {
    let line_start = hay[..p]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |n| n + 1);
    let mut double_quotes = 0usize;
    let mut single_quotes = 0usize;
    for &b in &hay[line_start..p] {
        match b {
            b'"' => double_quotes += 1,
            b'\'' => single_quotes += 1,
            _ => {}
        }
    }
    double_quotes % 2 == 1 || single_quotes % 2 == 1
}

/// Greatest `p <= q` where `hay[p..]` starts with `needle`.
fn rfind_at_or_before(hay: &[u8], needle: &[u8], q: usize) -> Option<usize> {
    if needle.is_empty() || hay.is_empty() {
        return None;
    }
    let mut p = q.min(hay.len() - 1);
    loop {
        if hay[p..].starts_with(needle) {
            return Some(p);
        }
        if p == 0 {
            return None;
        }
        p -= 1;
    }
}

/// Least `s >= from` where `hay[s..]` starts with `needle`.
fn find_from(hay: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= hay.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(content: &str, language: &str) -> TextContainer {
        TextContainer::new(content, language)
    }

    #[test]
    fn line_index_handles_trailing_newline() {
        let c = container("ab\ncd\n", "rust");
        assert_eq!(c.line_count(), 2);
        assert_eq!(c.get_location(0), Location { line: 1, column: 1 });
        assert_eq!(c.get_location(4), Location { line: 2, column: 2 });
    }

    #[test]
    fn line_index_handles_missing_trailing_newline() {
        let c = container("ab\ncd", "rust");
        assert_eq!(c.line_count(), 2);
        // Final line end equals the last offset of the file.
        assert_eq!(c.get_line_boundary(4), Boundary::new(3, 2));
    }

    #[test]
    fn empty_content_answers_without_panicking() {
        let c = container("", "rust");
        assert_eq!(c.line_count(), 1);
        assert_eq!(c.get_location(0), Location { line: 1, column: 1 });
        assert!(!c.is_commented(0));
        assert_eq!(c.get_boundary_text(&Boundary::new(0, 5)), "");
    }

    #[test]
    fn get_line_content_clamps_out_of_range() {
        let c = container("first\nsecond", "rust");
        assert_eq!(c.get_line_content(1), "first");
        assert_eq!(c.get_line_content(2), "second");
        assert_eq!(c.get_line_content(99), "second");
    }

    #[test]
    fn boundary_text_clamps_to_char_boundaries() {
        let c = container("héllo", "rust");
        // 'é' spans bytes 1..3; slicing through it must not panic.
        let text = c.get_boundary_text(&Boundary::new(0, 2));
        assert_eq!(text, "h");
    }

    #[test]
    fn inline_comment_state() {
        let c = container("let x = 1; // trailing note\nlet y = 2;\n", "rust");
        let comment_pos = c.content().find("trailing").unwrap();
        let code_pos = c.content().find("y = 2").unwrap();
        assert!(c.is_commented(comment_pos));
        assert!(!c.is_commented(0));
        assert!(!c.is_commented(code_pos));
    }

    #[test]
    fn inline_marker_inside_string_does_not_start_comment() {
        let c = container("let u = \"https://contoso.com\"; // real comment\n", "rust");
        let in_string = c.content().find("contoso").unwrap();
        let in_comment = c.content().find("real").unwrap();
        assert!(!c.is_commented(in_string));
        assert!(c.is_commented(in_comment));
    }

    #[test]
    fn block_comment_state() {
        let c = container("a /* hidden */ b", "c");
        let hidden = c.content().find("hidden").unwrap();
        let after = c.content().find(" b").unwrap() + 1;
        assert!(c.is_commented(hidden));
        assert!(!c.is_commented(after));
        assert!(!c.is_commented(0));
    }

    #[test]
    fn unterminated_block_comment_runs_to_eof() {
        let c = container("x = 1\n/* open comment\nstill inside", "c");
        let inside = c.content().find("still").unwrap();
        assert!(c.is_commented(inside));
        assert!(!c.is_commented(0));
    }

    #[test]
    fn is_commented_is_deterministic_on_requery() {
        let c = container("code // comment\nmore", "rust");
        let pos = c.content().find("comment").unwrap();
        let first = c.is_commented(pos);
        for _ in 0..3 {
            assert_eq!(c.is_commented(pos), first);
        }
    }

    #[test]
    fn hash_comment_language() {
        let c = container("x = 1  # note\ny = 2\n", "python");
        let note = c.content().find("note").unwrap();
        assert!(c.is_commented(note));
        assert!(!c.is_commented(c.content().find("y = 2").unwrap()));
    }

    #[test]
    fn scope_match_all_accepts_everything() {
        let c = container("// only a comment", "rust");
        assert!(c.scope_match(&[PatternScope::All], &Boundary::new(3, 4)));
    }

    #[test]
    fn scope_match_distinguishes_code_and_comment() {
        let c = container("url(); // url()", "rust");
        let code = Boundary::new(0, 3);
        let comment = Boundary::new(c.content().rfind("url").unwrap(), 3);

        assert!(c.scope_match(&[PatternScope::Code], &code));
        assert!(!c.scope_match(&[PatternScope::Code], &comment));
        assert!(c.scope_match(&[PatternScope::Comment], &comment));
        assert!(!c.scope_match(&[PatternScope::Comment], &code));
    }

    #[test]
    fn scope_match_accepts_when_language_has_no_comments() {
        let c = container("{\"k\": \"v\"}", "json");
        assert!(c.scope_match(&[PatternScope::Code], &Boundary::new(1, 3)));
        assert!(c.scope_match(&[PatternScope::Comment], &Boundary::new(1, 3)));
    }
}
