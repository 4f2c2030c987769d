//! Snippet flattening
//!
//! Providers may return snippet syntax (`${1:name}`, `$0`, `${2|a,b|}`).
//! Ghost text shows the snippet as plain text; the editor's snippet engine
//! performs the real insertion on accept.

use serde::{Deserialize, Serialize};

use crate::types::{OffsetRange, Range};

/// Snippet attached to a candidate: the snippet source and the range it
/// replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetInfo {
    pub snippet: String,
    pub range: Range,
}

/// A tab stop found while flattening, in offsets of the plain text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabStop {
    pub index: u32,
    pub range: OffsetRange,
}

/// Result of flattening a snippet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSnippet {
    pub text: String,
    pub tab_stops: Vec<TabStop>,
}

impl ParsedSnippet {
    /// Where the caret goes after insertion: the lowest positive tab stop,
    /// then `$0`, then the end of the text
    pub fn initial_caret_offset(&self) -> usize {
        let first = self
            .tab_stops
            .iter()
            .filter(|t| t.index > 0)
            .min_by_key(|t| (t.index, t.range.start));
        let last = self.tab_stops.iter().find(|t| t.index == 0);
        first
            .or(last)
            .map(|t| t.range.start)
            .unwrap_or_else(|| self.text.chars().count())
    }
}

/// Flatten snippet syntax into the text the snippet would insert
pub fn parse_snippet(snippet: &str) -> ParsedSnippet {
    let chars: Vec<char> = snippet.chars().collect();
    let mut parser = Parser {
        chars: &chars,
        pos: 0,
        out: ParsedSnippet::default(),
        out_len: 0,
    };
    parser.parse_until(None);
    parser.out
}

/// Plain text of a snippet
pub fn snippet_to_plain_text(snippet: &str) -> String {
    parse_snippet(snippet).text
}

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    out: ParsedSnippet,
    out_len: usize,
}

impl Parser<'_> {
    fn push(&mut self, c: char) {
        self.out.text.push(c);
        self.out_len += 1;
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Consume until the closing brace of the current placeholder (or the end)
    fn parse_until(&mut self, terminator: Option<char>) {
        while let Some(c) = self.peek() {
            if Some(c) == terminator {
                self.pos += 1;
                return;
            }
            match c {
                '\\' => {
                    let next = self.chars.get(self.pos + 1).copied();
                    match next {
                        Some(escaped @ ('$' | '}' | '\\' | ',' | '|')) => {
                            self.push(escaped);
                            self.pos += 2;
                        }
                        _ => {
                            self.push('\\');
                            self.pos += 1;
                        }
                    }
                }
                '$' => self.parse_dollar(),
                _ => {
                    self.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn read_name(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        (start != self.pos).then(|| self.chars[start..self.pos].iter().collect())
    }

    fn parse_dollar(&mut self) {
        self.pos += 1;
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let index = self.read_number().unwrap_or(0);
                self.record_tab_stop(index, self.out_len);
            }
            Some('{') => {
                self.pos += 1;
                self.parse_braced();
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                // Unresolved variables insert nothing.
                let _ = self.read_name();
            }
            _ => self.push('$'),
        }
    }

    fn parse_braced(&mut self) {
        let start = self.out_len;
        if let Some(index) = self.read_number() {
            match self.peek() {
                Some(':') => {
                    self.pos += 1;
                    self.parse_until(Some('}'));
                }
                Some('|') => {
                    self.pos += 1;
                    self.parse_choice();
                }
                Some('}') => self.pos += 1,
                _ => self.parse_until(Some('}')),
            }
            self.record_tab_stop(index, start);
            return;
        }
        let _ = self.read_name();
        match self.peek() {
            Some(':') => {
                self.pos += 1;
                self.parse_until(Some('}'));
            }
            _ => self.skip_past('}'),
        }
    }

    fn parse_choice(&mut self) {
        let mut first = true;
        while let Some(c) = self.peek() {
            match c {
                '|' if self.chars.get(self.pos + 1) == Some(&'}') => {
                    self.pos += 2;
                    return;
                }
                ',' => {
                    first = false;
                    self.pos += 1;
                }
                '\\' => {
                    if let Some(escaped) = self.chars.get(self.pos + 1).copied() {
                        if first {
                            self.push(escaped);
                        }
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                _ => {
                    if first {
                        self.push(c);
                    }
                    self.pos += 1;
                }
            }
        }
    }

    fn skip_past(&mut self, c: char) {
        while let Some(next) = self.peek() {
            self.pos += 1;
            if next == c {
                return;
            }
        }
    }

    fn record_tab_stop(&mut self, index: u32, start: usize) {
        self.out.tab_stops.push(TabStop {
            index,
            range: OffsetRange::new(start, self.out_len),
        });
    }
}
