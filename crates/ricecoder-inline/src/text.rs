//! Character-indexed string helpers and the rope-backed text snapshot.
//!
//! Columns and offsets throughout the crate count Unicode scalar values, not
//! bytes. Content is LF-normalized; a buffer's preferred line ending is only
//! consulted when measuring accepted lengths.

use ropey::Rope;

use crate::types::{OffsetRange, Position, Range};

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Substring by character indices, clamped to the string length
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    text.chars().skip(start).take(end - start).collect()
}

/// Substring from a character index to the end
pub fn char_tail(text: &str, start: usize) -> String {
    text.chars().skip(start).collect()
}

/// Length of the longest common prefix, in characters
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Length of the longest common suffix, in characters
pub fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Leading whitespace (spaces and tabs) of a line
pub fn leading_whitespace(text: &str) -> String {
    text.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

/// Splits text on `\n`, `\r\n` and `\r`. An empty string yields one empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    normalize_eol(text).split('\n').map(str::to_string).collect()
}

/// Converts `\r\n` and lone `\r` to `\n`
pub fn normalize_eol(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Case-insensitive subsequence test: every character of `word` occurs in
/// `target` in order.
pub fn matches_sub_string(word: &str, target: &str) -> bool {
    let mut target_chars = target.chars().flat_map(char::to_lowercase);
    word.chars()
        .flat_map(char::to_lowercase)
        .all(|wc| target_chars.any(|tc| tc == wc))
}

/// LF-normalized text backed by a [`Rope`]. Clones share the rope's nodes,
/// so snapshots handed to providers are cheap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextSnapshot {
    rope: Rope,
}

impl TextSnapshot {
    /// Create a snapshot; line endings are normalized to `\n`
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(&normalize_eol(text)),
        }
    }

    /// Total length in characters
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    /// Whether the snapshot holds no characters
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Number of lines (always at least one)
    pub fn line_count(&self) -> u32 {
        self.rope.len_lines() as u32
    }

    /// Length of a line in characters, excluding the line break
    pub fn line_length(&self, line: u32) -> u32 {
        self.line_bounds(line)
            .map_or(0, |(start, end)| (end - start) as u32)
    }

    /// Content of a line without the line break
    pub fn line_content(&self, line: u32) -> String {
        self.line_bounds(line)
            .map(|(start, end)| self.rope.slice(start..end).to_string())
            .unwrap_or_default()
    }

    /// Full text
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Converts a position to an offset, clamping to the document
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line.clamp(1, self.line_count());
        let start = self.rope.line_to_char((line - 1) as usize);
        let max_column = self.line_length(line) + 1;
        let column = position.column.clamp(1, max_column);
        start + (column - 1) as usize
    }

    /// Converts an offset to a position, clamping to the document
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_chars());
        let line_idx = self.rope.char_to_line(offset);
        let column = offset - self.rope.line_to_char(line_idx);
        Position::new(line_idx as u32 + 1, column as u32 + 1)
    }

    /// Offset range covered by a position range
    pub fn offset_range(&self, range: Range) -> OffsetRange {
        OffsetRange::new(self.offset_at(range.start), self.offset_at(range.end))
    }

    /// Position range covered by an offset range
    pub fn range_of(&self, offsets: OffsetRange) -> Range {
        Range::from_positions(self.position_at(offsets.start), self.position_at(offsets.end))
    }

    /// Text covered by an offset range
    pub fn value_in_offset_range(&self, offsets: OffsetRange) -> String {
        let (start, end) = self.clamp(offsets);
        self.rope.slice(start..end).to_string()
    }

    /// Text covered by a position range
    pub fn value_in_range(&self, range: Range) -> String {
        self.value_in_offset_range(self.offset_range(range))
    }

    /// Whether `position` addresses an existing line and column
    pub fn is_valid_position(&self, position: Position) -> bool {
        position.line >= 1
            && position.line <= self.line_count()
            && position.column >= 1
            && position.column <= self.line_length(position.line) + 1
    }

    /// Replaces the characters in `offsets` with `text` (LF-normalized)
    pub fn replace(&mut self, offsets: OffsetRange, text: &str) {
        let (start, end) = self.clamp(offsets);
        if start < end {
            self.rope.remove(start..end);
        }
        if !text.is_empty() {
            self.rope.insert(start, &normalize_eol(text));
        }
    }

    fn clamp(&self, offsets: OffsetRange) -> (usize, usize) {
        let end = offsets.end.min(self.rope.len_chars());
        (offsets.start.min(end), end)
    }

    /// Character bounds of a line, line break excluded
    fn line_bounds(&self, line: u32) -> Option<(usize, usize)> {
        if line == 0 || line > self.line_count() {
            return None;
        }
        let idx = (line - 1) as usize;
        let start = self.rope.line_to_char(idx);
        let end = if idx + 1 < self.rope.len_lines() {
            self.rope.line_to_char(idx + 1) - 1
        } else {
            self.rope.len_chars()
        };
        Some((start, end))
    }
}
