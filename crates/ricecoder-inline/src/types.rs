//! Core geometry and edit types
//!
//! Positions are 1-based (line and column), matching what editors display.
//! Offsets are 0-based character indices into LF-normalized content.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::TextBuffer;
use crate::text::{char_len, char_slice, common_prefix_len, common_suffix_len, normalize_eol};

/// A 1-based line/column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number, starting at 1
    pub line: u32,
    /// Column, starting at 1
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Shift by a line and column delta, saturating at 1
    pub fn delta(&self, lines: i64, columns: i64) -> Self {
        let line = (i64::from(self.line) + lines).max(1) as u32;
        let column = (i64::from(self.column) + columns).max(1) as u32;
        Self { line, column }
    }

    pub fn is_before_or_equal(&self, other: &Position) -> bool {
        self <= other
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// A range between two positions; `start <= end` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self::from_positions(
            Position::new(start_line, start_column),
            Position::new(end_line, end_column),
        )
    }

    /// Range spanning two positions in either order
    pub fn from_positions(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Empty range at a position
    pub fn empty_at(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }

    /// Whether the position lies inside the range, edges included
    pub fn contains_position(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// Intersection of two ranges, `None` when disjoint
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Range { start, end })
    }

    /// Whether this range starts where `other` starts and ends no earlier
    pub fn extends(&self, other: &Range) -> bool {
        self.start == other.start && other.end <= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// Half-open character offset range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn empty_at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest range covering both
    pub fn join(&self, other: &OffsetRange) -> OffsetRange {
        OffsetRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift by a signed delta, saturating at zero
    pub fn delta(&self, delta: i64) -> OffsetRange {
        let shift = |v: usize| (v as i64 + delta).max(0) as usize;
        OffsetRange {
            start: shift(self.start),
            end: shift(self.end),
        }
    }
}

/// Half-open range of columns on one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRange {
    pub start: u32,
    pub end_exclusive: u32,
}

impl ColumnRange {
    pub fn new(start: u32, end_exclusive: u32) -> Self {
        Self {
            start,
            end_exclusive: end_exclusive.max(start),
        }
    }

    pub fn to_range(&self, line: u32) -> Range {
        Range::new(line, self.start, line, self.end_exclusive)
    }
}

/// Half-open range of line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end_exclusive: u32,
}

impl LineRange {
    /// Lines touched by a range, both ends inclusive
    pub fn from_range_inclusive(range: &Range) -> Self {
        Self {
            start: range.start.line,
            end_exclusive: range.end.line + 1,
        }
    }

    pub fn add_margin(&self, before: u32, after: u32) -> Self {
        Self {
            start: self.start.saturating_sub(before).max(1),
            end_exclusive: self.end_exclusive + after,
        }
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line < self.end_exclusive
    }
}

/// Extent of a piece of text: how many line breaks and the length of the
/// last line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLength {
    pub line_count: u32,
    pub column_count: u32,
}

impl TextLength {
    pub fn of_text(text: &str) -> Self {
        let text = normalize_eol(text);
        let line_count = text.matches('\n').count() as u32;
        let last_line = text.rsplit('\n').next().unwrap_or("");
        Self {
            line_count,
            column_count: char_len(last_line) as u32,
        }
    }

    /// Position reached after writing this text starting at `position`
    pub fn add_to_position(&self, position: Position) -> Position {
        if self.line_count == 0 {
            Position::new(position.line, position.column + self.column_count)
        } else {
            Position::new(position.line + self.line_count, self.column_count + 1)
        }
    }

    pub fn create_range(&self, start: Position) -> Range {
        Range::from_positions(start, self.add_to_position(start))
    }
}

/// Replacement of a buffer range with new text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

impl TextEdit {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    /// Pure insertion at a position
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::new(Range::empty_at(position), text)
    }

    /// True when the edit neither removes nor inserts anything
    pub fn is_empty(&self) -> bool {
        self.range.is_empty() && self.text.is_empty()
    }

    /// Drops the part of the new text that merely repeats the replaced text
    /// at the start. When `valid_range` is given only the intersection of the
    /// edit range with it is compared.
    pub fn remove_common_prefix(
        &self,
        buffer: &dyn TextBuffer,
        valid_range: Option<Range>,
    ) -> TextEdit {
        let compared_range = match valid_range {
            Some(valid) => match self.range.intersect(&valid) {
                Some(r) => r,
                None => return self.clone(),
            },
            None => self.range,
        };
        let normalized = normalize_eol(&self.text);
        let replaced = buffer.value_in_range(compared_range);
        let prefix_len = common_prefix_len(&replaced, &normalized);
        let start = TextLength::of_text(&char_slice(&replaced, 0, prefix_len))
            .add_to_position(self.range.start);
        let text = char_slice(&normalized, prefix_len, char_len(&normalized));
        TextEdit::new(Range::from_positions(start, self.range.end), text)
    }

    /// Drops the part of the new text that merely repeats the replaced text
    /// at the end
    pub fn remove_common_suffix(&self, buffer: &dyn TextBuffer) -> TextEdit {
        let replaced = buffer.value_in_range(self.range);
        let normalized = normalize_eol(&self.text);
        let suffix_len = common_suffix_len(&replaced, &normalized);
        let kept_old = char_slice(&replaced, 0, char_len(&replaced) - suffix_len);
        let end = TextLength::of_text(&kept_old).add_to_position(self.range.start);
        let text = char_slice(&normalized, 0, char_len(&normalized) - suffix_len);
        TextEdit::new(Range::from_positions(self.range.start, end), text)
    }

    pub fn remove_common_prefix_and_suffix(&self, buffer: &dyn TextBuffer) -> TextEdit {
        self.remove_common_prefix(buffer, None)
            .remove_common_suffix(buffer)
    }

    /// Whether applying the edit would leave the buffer unchanged
    pub fn is_no_op(&self, buffer: &dyn TextBuffer) -> bool {
        buffer.value_in_range(self.range) == normalize_eol(&self.text)
    }
}

impl fmt::Display for TextEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {:?}", self.range, self.text)
    }
}

/// Ranges the edits' new text occupies once all of them are applied. Edits
/// must not overlap; results are returned in the input order.
pub fn modified_ranges_after_applying(edits: &[TextEdit]) -> Vec<Range> {
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by(|a, b| edits[*a].range.start.cmp(&edits[*b].range.start));

    let mut result = vec![Range::empty_at(Position::new(1, 1)); edits.len()];
    let mut previous_end_line = 0;
    let mut line_offset: i64 = 0;
    let mut column_offset: i64 = 0;

    for idx in order {
        let edit = &edits[idx];
        let column_shift = if edit.range.start.line == previous_end_line {
            column_offset
        } else {
            0
        };
        let new_start = Position::new(
            (i64::from(edit.range.start.line) + line_offset) as u32,
            (i64::from(edit.range.start.column) + column_shift) as u32,
        );
        let new_range = TextLength::of_text(&edit.text).create_range(new_start);
        line_offset = i64::from(new_range.end.line) - i64::from(edit.range.end.line);
        column_offset = i64::from(new_range.end.column) - i64::from(edit.range.end.column);
        previous_end_line = edit.range.end.line;
        result[idx] = new_range;
    }
    result
}

/// End positions of the edits once all of them are applied
pub fn end_positions_after_applying(edits: &[TextEdit]) -> Vec<Position> {
    modified_ranges_after_applying(edits)
        .into_iter()
        .map(|range| range.end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEditor;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 5) < Position::new(2, 1));
        assert!(Position::new(3, 2).is_before_or_equal(&Position::new(3, 2)));
    }

    #[test]
    fn test_range_from_positions_normalizes() {
        let range = Range::from_positions(Position::new(2, 1), Position::new(1, 4));
        assert_eq!(range.start, Position::new(1, 4));
        assert!(!range.is_single_line());
    }

    #[test]
    fn test_text_length_add_to_position() {
        let single = TextLength::of_text("abc");
        assert_eq!(single.add_to_position(Position::new(2, 3)), Position::new(2, 6));
        let multi = TextLength::of_text("ab\ncd");
        assert_eq!(multi.add_to_position(Position::new(2, 3)), Position::new(3, 3));
    }

    #[test]
    fn test_line_range_margin() {
        let lines = LineRange::from_range_inclusive(&Range::new(5, 1, 6, 3)).add_margin(1, 1);
        assert!(lines.contains(4));
        assert!(lines.contains(7));
        assert!(!lines.contains(8));
    }

    #[test]
    fn test_remove_common_prefix() {
        let editor = InMemoryEditor::new("fo");
        let edit = TextEdit::new(Range::new(1, 1, 1, 3), "foo bar");
        let stripped = edit.remove_common_prefix(&editor, None);
        assert_eq!(stripped.range, Range::new(1, 3, 1, 3));
        assert_eq!(stripped.text, "o bar");
    }

    #[test]
    fn test_remove_common_prefix_and_suffix() {
        let editor = InMemoryEditor::new("call(x)");
        let edit = TextEdit::new(Range::new(1, 1, 1, 8), "call(x, y)");
        let stripped = edit.remove_common_prefix_and_suffix(&editor);
        assert_eq!(stripped.range, Range::new(1, 7, 1, 7));
        assert_eq!(stripped.text, ", y");
    }

    #[test]
    fn test_end_positions_after_applying_same_line() {
        let edits = vec![
            TextEdit::insert(Position::new(1, 5), "xx"),
            TextEdit::insert(Position::new(1, 2), "abc"),
        ];
        let ends = end_positions_after_applying(&edits);
        assert_eq!(ends[1], Position::new(1, 5));
        assert_eq!(ends[0], Position::new(1, 10));
    }

    #[test]
    fn test_end_positions_after_applying_multiline() {
        let edits = vec![
            TextEdit::insert(Position::new(1, 1), "a\nb"),
            TextEdit::insert(Position::new(2, 1), "c"),
        ];
        let ends = end_positions_after_applying(&edits);
        assert_eq!(ends[0], Position::new(2, 2));
        assert_eq!(ends[1], Position::new(3, 2));
    }
}
