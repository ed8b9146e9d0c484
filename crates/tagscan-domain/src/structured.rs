//! Structure-aware pre-projection for JSON and XML documents.
//!
//! When a pattern carries `jsonpaths` or `xpaths`, matching is restricted to
//! the byte windows of the selected nodes. JSON nodes are located in the raw
//! content by first-occurrence literal search (the parsed tree has no
//! offsets); the XML reader scans the raw buffer itself and records
//! text-node spans directly, so XPath windows are exact.
//!
//! Both selector dialects are small subsets: JSONPath supports `$`, `.name`,
//! `["name"]`, `[n]`, `[*]`, and `.*`; XPath supports absolute element paths
//! with `name`, `*`, and `*[local-name(.)='name']` steps, compared by local
//! name only. Unparseable documents or selectors select zero nodes.

use serde_json::Value;
use tagscan_types::Boundary;
use tracing::warn;

// ---------------------------------------------------------------------------
// JSONPath
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum JsonSeg {
    Key(String),
    Index(usize),
    Wild,
}

pub(crate) fn json_windows(content: &str, paths: &[String]) -> Vec<Boundary> {
    let Ok(root) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for path in paths {
        let Some(segments) = parse_json_path(path) else {
            warn!(%path, "unsupported jsonpath expression; selecting nothing");
            continue;
        };

        let mut nodes: Vec<&Value> = vec![&root];
        for seg in &segments {
            let mut next = Vec::new();
            for node in nodes {
                match seg {
                    JsonSeg::Key(key) => {
                        if let Some(value) = node.get(key.as_str()) {
                            next.push(value);
                        }
                    }
                    JsonSeg::Index(idx) => {
                        if let Some(value) = node.get(*idx) {
                            next.push(value);
                        }
                    }
                    JsonSeg::Wild => match node {
                        Value::Array(items) => next.extend(items.iter()),
                        Value::Object(map) => next.extend(map.values()),
                        _ => {}
                    },
                }
            }
            nodes = next;
        }

        for node in nodes {
            let literal = match node {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if literal.is_empty() {
                continue;
            }
            if let Some(pos) = content.find(&literal) {
                out.push(Boundary::new(pos, literal.len()));
            }
        }
    }
    out
}

fn parse_json_path(path: &str) -> Option<Vec<JsonSeg>> {
    let rest = path.trim();
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    let bytes = rest.as_bytes();

    let mut segs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                i += 1;
                if bytes.get(i) == Some(&b'.') {
                    // Recursive descent is out of dialect.
                    return None;
                }
                if bytes.get(i) == Some(&b'*') {
                    segs.push(JsonSeg::Wild);
                    i += 1;
                    continue;
                }
                let start = i;
                while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                    i += 1;
                }
                if start == i {
                    return None;
                }
                segs.push(JsonSeg::Key(rest[start..i].to_string()));
            }
            b'[' => {
                i += 1;
                match *bytes.get(i)? {
                    b'*' => {
                        segs.push(JsonSeg::Wild);
                        i += 1;
                    }
                    quote @ (b'"' | b'\'') => {
                        i += 1;
                        let start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        if i >= bytes.len() {
                            return None;
                        }
                        segs.push(JsonSeg::Key(rest[start..i].to_string()));
                        i += 1;
                    }
                    _ => {
                        let start = i;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                        if start == i {
                            return None;
                        }
                        segs.push(JsonSeg::Index(rest[start..i].parse().ok()?));
                    }
                }
                if bytes.get(i) != Some(&b']') {
                    return None;
                }
                i += 1;
            }
            _ => return None,
        }
    }
    Some(segs)
}

// ---------------------------------------------------------------------------
// XML + XPath
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct XmlElement {
    name: String,
    children: Vec<XmlElement>,
    /// Byte spans of this element's text runs, whitespace-trimmed.
    texts: Vec<Boundary>,
}

#[derive(Debug, PartialEq, Eq)]
enum XmlStep {
    Name(String),
    Any,
    LocalName(String),
}

pub(crate) fn xml_windows(content: &str, paths: &[String]) -> Vec<Boundary> {
    let Some(root) = parse_xml(content) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for path in paths {
        let Some(steps) = parse_xpath(path) else {
            warn!(%path, "unsupported xpath expression; selecting nothing");
            continue;
        };
        let Some((first, rest)) = steps.split_first() else {
            continue;
        };
        if !step_matches(&root, first) {
            continue;
        }

        let mut current: Vec<&XmlElement> = vec![&root];
        for step in rest {
            let mut next = Vec::new();
            for element in current {
                for child in &element.children {
                    if step_matches(child, step) {
                        next.push(child);
                    }
                }
            }
            current = next;
        }
        for element in current {
            out.extend(element.texts.iter().copied());
        }
    }
    out
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn step_matches(element: &XmlElement, step: &XmlStep) -> bool {
    match step {
        XmlStep::Any => true,
        // Plain names also compare namespace-agnostically.
        XmlStep::Name(n) | XmlStep::LocalName(n) => local_name(&element.name) == n,
    }
}

fn parse_xpath(path: &str) -> Option<Vec<XmlStep>> {
    let path = path.trim().strip_prefix('/')?;
    if path.is_empty() || path.contains("//") {
        return None;
    }
    path.split('/').map(parse_xpath_step).collect()
}

fn parse_xpath_step(step: &str) -> Option<XmlStep> {
    let step = step.trim();
    if step.is_empty() {
        return None;
    }
    if let Some(rest) = step.strip_prefix("*[local-name(.)=") {
        let rest = rest.strip_suffix(']')?.trim();
        let inner = rest
            .strip_prefix('\'')
            .and_then(|r| r.strip_suffix('\''))
            .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))?;
        return Some(XmlStep::LocalName(inner.to_string()));
    }
    if step == "*" {
        return Some(XmlStep::Any);
    }
    if step.contains(['[', '(', '@']) {
        return None;
    }
    Some(XmlStep::Name(step.to_string()))
}

/// Minimal non-validating XML reader. Attributes are skipped, entities stay
/// raw (windows must match the original bytes), mismatched close tags are
/// tolerated by popping whatever is open. Returns the first root element, or
/// `None` for input too broken to read.
fn parse_xml(content: &str) -> Option<XmlElement> {
    let bytes = content.as_bytes();
    let len = bytes.len();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let start = i;
            while i < len && bytes[i] != b'<' {
                i += 1;
            }
            if let Some(top) = stack.last_mut() {
                if let Some(span) = trimmed_span(bytes, start, i) {
                    top.texts.push(span);
                }
            }
            continue;
        }

        if bytes[i..].starts_with(b"<?") {
            i = skip_past(bytes, i + 2, b"?>")?;
        } else if bytes[i..].starts_with(b"<!--") {
            i = skip_past(bytes, i + 4, b"-->")?;
        } else if bytes[i..].starts_with(b"<![CDATA[") {
            let start = i + 9;
            let end = find_sub(bytes, start, b"]]>")?;
            if let Some(top) = stack.last_mut() {
                if let Some(span) = trimmed_span(bytes, start, end) {
                    top.texts.push(span);
                }
            }
            i = end + 3;
        } else if bytes[i..].starts_with(b"<!") {
            i = skip_past(bytes, i + 2, b">")?;
        } else if bytes[i..].starts_with(b"</") {
            i = skip_past(bytes, i + 2, b">")?;
            let element = stack.pop()?;
            match stack.last_mut() {
                Some(parent) => parent.children.push(element),
                None => {
                    root.get_or_insert(element);
                }
            }
        } else {
            let name_start = i + 1;
            let mut j = name_start;
            while j < len && !matches!(bytes[j], b' ' | b'\t' | b'\r' | b'\n' | b'/' | b'>') {
                j += 1;
            }
            if j == name_start {
                return None;
            }
            let name = content.get(name_start..j)?.to_string();

            // Scan to the tag close, ignoring '>' inside quoted attributes.
            let mut quote: Option<u8> = None;
            while j < len {
                let b = bytes[j];
                if let Some(q) = quote {
                    if b == q {
                        quote = None;
                    }
                } else if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'>' {
                    break;
                }
                j += 1;
            }
            if j >= len {
                return None;
            }

            let element = XmlElement {
                name,
                children: Vec::new(),
                texts: Vec::new(),
            };
            if bytes[j - 1] == b'/' {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => {
                        root.get_or_insert(element);
                    }
                }
            } else {
                stack.push(element);
            }
            i = j + 1;
        }
    }

    // Tolerate unterminated elements by closing them.
    while let Some(element) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                root.get_or_insert(element);
            }
        }
    }
    root
}

fn trimmed_span(bytes: &[u8], mut start: usize, mut end: usize) -> Option<Boundary> {
    while start < end && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    (start < end).then(|| Boundary::new(start, end - start))
}

/// Index just past the first occurrence of `pat` at or after `from`.
fn skip_past(bytes: &[u8], from: usize, pat: &[u8]) -> Option<usize> {
    find_sub(bytes, from, pat).map(|i| i + pat.len())
}

fn find_sub(bytes: &[u8], from: usize, pat: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(pat.len())
        .position(|w| w == pat)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKS: &str = r#"{
        "books": [
            { "title": "The Wind in the Willows", "author": "Kenneth Grahame" },
            { "title": "Poor Richard's Almanack", "author": "Benjamin Franklin" },
            { "title": "Franklin of Philadelphia", "author": "Esmond Wright" }
        ]
    }"#;

    #[test]
    fn jsonpath_selects_titles_only() {
        let windows = json_windows(BOOKS, &["$.books[*].title".to_string()]);
        assert_eq!(windows.len(), 3);
        for w in &windows {
            let text = &BOOKS[w.index..w.index + w.length];
            assert!(text.contains("Willows") || text.contains("Almanack") || text.contains("Franklin of"));
        }
        // The author containing "Franklin" is not selected.
        assert!(!windows
            .iter()
            .any(|w| &BOOKS[w.index..w.index + w.length] == "Benjamin Franklin"));
    }

    #[test]
    fn jsonpath_index_and_quoted_key() {
        let windows = json_windows(BOOKS, &["$.books[0][\"author\"]".to_string()]);
        assert_eq!(windows.len(), 1);
        assert_eq!(&BOOKS[windows[0].index..windows[0].index + windows[0].length], "Kenneth Grahame");
    }

    #[test]
    fn jsonpath_numbers_match_their_literal() {
        let doc = r#"{ "port": 8080 }"#;
        let windows = json_windows(doc, &["$.port".to_string()]);
        assert_eq!(windows.len(), 1);
        assert_eq!(&doc[windows[0].index..windows[0].index + windows[0].length], "8080");
    }

    #[test]
    fn malformed_json_selects_nothing() {
        assert!(json_windows("{ not json", &["$.a".to_string()]).is_empty());
    }

    #[test]
    fn unsupported_jsonpath_selects_nothing() {
        assert!(json_windows(BOOKS, &["$..title".to_string()]).is_empty());
    }

    const POM_PLAIN: &str = "<project>\n  <properties>\n    <java.version>17</java.version>\n  </properties>\n</project>\n";
    const POM_NS: &str = "<?xml version=\"1.0\"?>\n<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n  <properties>\n    <java.version>17</java.version>\n  </properties>\n</project>\n";

    const JAVA_VERSION_XPATH: &str =
        "/*[local-name(.)='project']/*[local-name(.)='properties']/*[local-name(.)='java.version']";

    #[test]
    fn xpath_selects_with_and_without_namespace() {
        for doc in [POM_PLAIN, POM_NS] {
            let windows = xml_windows(doc, &[JAVA_VERSION_XPATH.to_string()]);
            assert_eq!(windows.len(), 1, "doc: {doc}");
            let w = windows[0];
            assert_eq!(&doc[w.index..w.index + w.length], "17");
        }
    }

    #[test]
    fn xpath_plain_names_ignore_prefixes() {
        let doc = "<m:project><m:properties><m:java.version>17</m:java.version></m:properties></m:project>";
        let windows = xml_windows(doc, &["/project/properties/java.version".to_string()]);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn xml_reader_skips_comments_and_declarations() {
        let doc = "<?xml version=\"1.0\"?><!-- note --><root><!-- inner --><item>x</item></root>";
        let windows = xml_windows(doc, &["/root/item".to_string()]);
        assert_eq!(windows.len(), 1);
        assert_eq!(&doc[windows[0].index..windows[0].index + windows[0].length], "x");
    }

    #[test]
    fn self_closing_and_attributes_do_not_derail_parsing() {
        let doc = "<root a=\"x>y\"><empty/><item label='v'>hit</item></root>";
        let windows = xml_windows(doc, &["/root/item".to_string()]);
        assert_eq!(windows.len(), 1);
        assert_eq!(&doc[windows[0].index..windows[0].index + windows[0].length], "hit");
    }

    #[test]
    fn malformed_xml_selects_nothing() {
        assert!(xml_windows("<unclosed <<", &["/a".to_string()]).is_empty());
    }
}
