//! Structural checks for rendered HTML.
//!
//! A small tag scanner, not a parser: it tracks the open-element stack and
//! the attributes of each start tag, which is all the rules need.
//!
//! | Rule                  | Severity |
//! |-----------------------|----------|
//! | `tag-pair`            | error    |
//! | `attr-no-duplication` | error    |
//! | `id-unique`           | error    |
//! | `doctype-first`       | warning  |

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub line: usize,
    pub col: usize,
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}  {} ({})", self.line, self.col, self.message, self.rule)
    }
}

/// Check a document, returning problems in document order.
pub fn check(html: &str) -> Vec<Problem> {
    let mut scanner = Scanner::new(html);
    scanner.run();
    scanner.problems
}

struct OpenTag {
    name: String,
    offset: usize,
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line_starts: Vec<usize>,
    stack: Vec<OpenTag>,
    ids: FxHashMap<String, usize>,
    seen_first_tag: bool,
    problems: Vec<Problem>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line_starts,
            stack: Vec::new(),
            ids: FxHashMap::default(),
            seen_first_tag: false,
            problems: Vec::new(),
        }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let col = offset - self.line_starts[line - 1] + 1;
        (line, col)
    }

    fn report(&mut self, offset: usize, rule: &'static str, severity: Severity, message: String) {
        let (line, col) = self.position(offset);
        self.problems.push(Problem {
            line,
            col,
            rule,
            severity,
            message,
        });
    }

    fn run(&mut self) {
        while let Some(found) = self.src[self.pos..].find('<') {
            let start = self.pos + found;
            self.pos = start + 1;
            let rest = &self.src[start..];

            if rest.starts_with("<!--") {
                self.skip_past(start + 4, "-->");
            } else if rest.starts_with("<!") {
                let is_doctype = rest
                    .get(2..9)
                    .is_some_and(|s| s.eq_ignore_ascii_case("doctype"));
                if is_doctype {
                    self.seen_first_tag = true;
                }
                self.skip_past(start, ">");
            } else if rest.starts_with("<?") {
                self.skip_past(start, ">");
            } else if rest.starts_with("</") {
                self.end_tag(start);
            } else if self.bytes.get(start + 1).is_some_and(u8::is_ascii_alphabetic) {
                self.start_tag(start);
            }
        }

        let unclosed = std::mem::take(&mut self.stack);
        for tag in unclosed.into_iter().rev() {
            let (line, _) = self.position(tag.offset);
            self.report(
                tag.offset,
                "tag-pair",
                Severity::Error,
                format!("Tag must be paired, missing: [ </{}> ], open tag at line {line}", tag.name),
            );
        }
    }

    fn skip_past(&mut self, from: usize, needle: &str) {
        self.pos = match self.src[from..].find(needle) {
            Some(i) => from + i + needle.len(),
            None => self.src.len(),
        };
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'='))
        {
            self.pos += 1;
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn skip_whitespace(&mut self) {
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn end_tag(&mut self, start: usize) {
        self.pos = start + 2;
        let name = self.read_name();
        self.skip_past(self.pos, ">");

        if self.stack.last().is_some_and(|t| t.name == name) {
            self.stack.pop();
            return;
        }

        match self.stack.iter().rposition(|t| t.name == name) {
            Some(index) => {
                let unclosed = self.stack.split_off(index + 1);
                self.stack.pop();
                for tag in unclosed.into_iter().rev() {
                    self.report(
                        tag.offset,
                        "tag-pair",
                        Severity::Error,
                        format!("Tag must be paired, missing: [ </{}> ]", tag.name),
                    );
                }
            }
            None => self.report(
                start,
                "tag-pair",
                Severity::Error,
                format!("Tag must be paired, no start tag: [ </{name}> ]"),
            ),
        }
    }

    fn start_tag(&mut self, start: usize) {
        if !self.seen_first_tag {
            self.seen_first_tag = true;
            self.report(
                start,
                "doctype-first",
                Severity::Warning,
                "Doctype must be declared first.".into(),
            );
        }

        self.pos = start + 1;
        let name = self.read_name();
        let mut seen_attrs = FxHashSet::default();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.bytes.get(self.pos) == Some(&b'>') {
                        self_closing = true;
                        self.pos += 1;
                        break;
                    }
                }
                Some(_) => {
                    let attr_offset = self.pos;
                    let attr = self.read_name();
                    let value = self.read_value();
                    if attr.is_empty() {
                        // stray '=' or similar; make progress by one char
                        if self.pos == attr_offset {
                            self.pos += self.src[self.pos..].chars().next().map_or(1, char::len_utf8);
                        }
                        continue;
                    }
                    if !seen_attrs.insert(attr.clone()) {
                        self.report(
                            attr_offset,
                            "attr-no-duplication",
                            Severity::Error,
                            format!("Duplicate of attribute name [ {attr} ] was found at [ {name} ]"),
                        );
                    }
                    if attr == "id"
                        && let Some(id) = value.filter(|v| !v.is_empty())
                    {
                        self.check_id(attr_offset, id);
                    }
                }
            }
        }

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.skip_raw_text(&name);
        }
        self.stack.push(OpenTag {
            name,
            offset: start,
        });
    }

    fn read_value(&mut self) -> Option<String> {
        let before = self.pos;
        self.skip_whitespace();
        if self.bytes.get(self.pos) != Some(&b'=') {
            self.pos = before;
            return None;
        }
        self.pos += 1;
        self.skip_whitespace();

        match self.bytes.get(self.pos) {
            Some(&quote @ (b'"' | b'\'')) => {
                let start = self.pos + 1;
                let end = self.bytes[start..]
                    .iter()
                    .position(|&b| b == quote)
                    .map_or(self.src.len(), |i| start + i);
                self.pos = (end + 1).min(self.src.len());
                Some(self.src[start..end].to_string())
            }
            _ => {
                let start = self.pos;
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                {
                    self.pos += 1;
                }
                Some(self.src[start..self.pos].to_string())
            }
        }
    }

    fn check_id(&mut self, offset: usize, id: String) {
        let (line, _) = self.position(offset);
        if let Some(first) = self.ids.get(&id) {
            let first = *first;
            self.report(
                offset,
                "id-unique",
                Severity::Error,
                format!("The id value [ {id} ] must be unique, first used at line {first}"),
            );
        } else {
            self.ids.insert(id, line);
        }
    }

    /// Jump to the end tag of a raw-text element, leaving it to be scanned.
    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let haystack = self.src[self.pos..].to_ascii_lowercase();
        self.pos = match haystack.find(&closing) {
            Some(i) => self.pos + i,
            None => self.src.len(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(html: &str) -> Vec<&'static str> {
        check(html).into_iter().map(|p| p.rule).collect()
    }

    #[test]
    fn test_valid_document() {
        let html = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>a < b</title></head>\n\
                    <body><img src=/a.png><br/><p id=\"x\">hi</p></body></html>";
        assert!(check(html).is_empty());
    }

    #[test]
    fn test_missing_end_tag() {
        let problems = check("<!DOCTYPE html>\n<div>\n<p>text\n</div>");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].rule, "tag-pair");
        assert_eq!(problems[0].line, 3);
        assert!(problems[0].message.contains("</p>"));
    }

    #[test]
    fn test_stray_end_tag() {
        let problems = check("<!doctype html><div></span></div>");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.contains("no start tag"));
    }

    #[test]
    fn test_unclosed_at_eof() {
        assert_eq!(rules("<!DOCTYPE html><main><section>"), ["tag-pair", "tag-pair"]);
    }

    #[test]
    fn test_duplicate_attribute() {
        let problems = check("<!DOCTYPE html><a href=\"/\" HREF='/x'>x</a>");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].rule, "attr-no-duplication");
        assert_eq!(problems[0].severity, Severity::Error);
    }

    #[test]
    fn test_duplicate_id() {
        let html = "<!DOCTYPE html>\n<p id=\"a\"></p>\n<p id=\"a\"></p>";
        let problems = check(html);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].rule, "id-unique");
        assert_eq!(problems[0].line, 3);
        assert!(problems[0].message.contains("line 2"));
    }

    #[test]
    fn test_doctype_first_is_warning() {
        let problems = check("<!-- note --><div></div>");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].rule, "doctype-first");
        assert!(problems.iter().all(|p| p.severity == Severity::Warning));
    }

    #[test]
    fn test_stray_equals_before_non_ascii() {
        let problems = check("<!DOCTYPE html><p =\"x\"é>text</p>");
        assert!(problems.is_empty(), "{problems:?}");

        assert_eq!(rules("<!DOCTYPE html><p =é id=a>x</p><p id=a>y</p>"), ["id-unique"]);
    }

    #[test]
    fn test_script_content_not_scanned() {
        let html = "<!DOCTYPE html><script>if (a < b && c > d) { x = '</div>'.length }</script>";
        assert!(check(html).is_empty());
    }
}
