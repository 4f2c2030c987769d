//! Ghost text for inline suggestions
//!
//! Ghost text is the faded overlay that shows what accepting a suggestion
//! would insert. [`compute_ghost_text`] turns a single [`TextEdit`] into a
//! line-anchored list of insertion parts, or into a whole-range
//! [`GhostTextReplacement`] when replacements may be shown.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, TextDiff};

use crate::buffer::TextBuffer;
use crate::error::{InlineError, InlineResult};
use crate::text::{char_len, char_slice, char_tail, leading_whitespace, split_lines};
use crate::types::{ColumnRange, Position, Range, TextEdit};

/// Texts longer than this are never diffed
const MAX_DIFF_LENGTH: usize = 5000;

/// Upper bound on the time spent diffing one suggestion
const DIFF_TIMEOUT: Duration = Duration::from_millis(50);

/// How an edit may be rendered as ghost text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GhostTextMode {
    /// Only a single insertion at the end of the replaced text
    Prefix,
    /// Any number of insertions inside the replaced text
    Subword,
    /// Like `Subword`, but nothing may be inserted before the cursor
    #[default]
    SubwordSmart,
    /// Like `Subword`; edits that delete text render as a replacement
    Replacement,
}

/// One inserted fragment, anchored at a column of the ghost text's line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostTextPart {
    pub column: u32,
    pub text: String,
    /// Whether this fragment only previews a suffix the suggest widget
    /// would add
    pub preview: bool,
    lines: Vec<String>,
}

impl GhostTextPart {
    pub fn new(column: u32, text: impl Into<String>, preview: bool) -> Self {
        let text = text.into();
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            split_lines(&text)
        };
        Self {
            column,
            text,
            preview,
            lines,
        }
    }

    /// The inserted text split into rendered lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Insertions anchored on one line, ordered by column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostText {
    pub line_number: u32,
    parts: Vec<GhostTextPart>,
}

impl GhostText {
    /// Create ghost text; parts must be ordered by non-decreasing column
    pub fn new(line_number: u32, parts: Vec<GhostTextPart>) -> InlineResult<Self> {
        if let Some(pair) = parts.windows(2).find(|w| w[0].column > w[1].column) {
            return Err(InlineError::invalid_ghost_text(format!(
                "part at column {} follows part at column {}",
                pair[1].column, pair[0].column
            )));
        }
        Ok(Self { line_number, parts })
    }

    pub fn parts(&self) -> &[GhostTextPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.lines.is_empty())
    }

    /// Screen lines taken by the ghost text, counting the anchor line
    pub fn line_count(&self) -> usize {
        1 + self
            .parts
            .iter()
            .map(|p| p.lines.len().saturating_sub(1))
            .sum::<usize>()
    }

    /// Renders the anchor line with every part inserted
    pub fn render(&self, line_text: &str) -> String {
        let mut result = String::new();
        let mut consumed = 0;
        for part in &self.parts {
            let at = part.column.saturating_sub(1) as usize;
            result.push_str(&char_slice(line_text, consumed, at));
            result.push_str(&part.lines.join("\n"));
            consumed = consumed.max(at);
        }
        result.push_str(&char_tail(line_text, consumed));
        result
    }

    /// Text a screen reader announces: the line from the first part to the
    /// last part with the parts inserted
    pub fn render_for_screen_reader(&self, line_text: &str) -> String {
        let (Some(first), Some(last)) = (self.parts.first(), self.parts.last()) else {
            return String::new();
        };
        let capped = char_slice(line_text, 0, last.column.saturating_sub(1) as usize);
        let rendered = self.render(&capped);
        char_tail(&rendered, first.column.saturating_sub(1) as usize)
    }
}

/// Replacement of a column range of one line with new text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostTextReplacement {
    pub line_number: u32,
    pub column_range: ColumnRange,
    pub text: String,
    /// Extra screen lines to reserve below the anchor line
    pub additional_reserved_line_count: u32,
    parts: Vec<GhostTextPart>,
}

impl GhostTextReplacement {
    pub fn new(
        line_number: u32,
        column_range: ColumnRange,
        text: impl Into<String>,
        additional_reserved_line_count: u32,
    ) -> Self {
        let text = text.into();
        let parts = vec![GhostTextPart::new(column_range.end_exclusive, text.clone(), false)];
        Self {
            line_number,
            column_range,
            text,
            additional_reserved_line_count,
            parts,
        }
    }

    pub fn parts(&self) -> &[GhostTextPart] {
        &self.parts
    }

    pub fn new_lines(&self) -> Vec<String> {
        split_lines(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.lines.is_empty())
    }

    pub fn line_count(&self) -> usize {
        self.new_lines().len()
    }

    pub fn render(&self, line_text: &str) -> String {
        let start = (self.column_range.start - 1) as usize;
        let end = (self.column_range.end_exclusive - 1) as usize;
        format!(
            "{}{}{}",
            char_slice(line_text, 0, start),
            self.text,
            char_tail(line_text, end)
        )
    }

    pub fn render_for_screen_reader(&self, _line_text: &str) -> String {
        self.new_lines().join("\n")
    }
}

/// Either rendering variant. Values of different variants never compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GhostTextOrReplacement {
    Text(GhostText),
    Replacement(GhostTextReplacement),
}

impl GhostTextOrReplacement {
    pub fn line_number(&self) -> u32 {
        match self {
            GhostTextOrReplacement::Text(g) => g.line_number,
            GhostTextOrReplacement::Replacement(r) => r.line_number,
        }
    }

    pub fn parts(&self) -> &[GhostTextPart] {
        match self {
            GhostTextOrReplacement::Text(g) => g.parts(),
            GhostTextOrReplacement::Replacement(r) => r.parts(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GhostTextOrReplacement::Text(g) => g.is_empty(),
            GhostTextOrReplacement::Replacement(r) => r.is_empty(),
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            GhostTextOrReplacement::Text(g) => g.line_count(),
            GhostTextOrReplacement::Replacement(r) => r.line_count(),
        }
    }

    pub fn as_ghost_text(&self) -> Option<&GhostText> {
        match self {
            GhostTextOrReplacement::Text(g) => Some(g),
            GhostTextOrReplacement::Replacement(_) => None,
        }
    }
}

/// Equality over optional ghost texts; `None` only equals `None`
pub fn ghost_text_or_replacement_equals(
    a: Option<&GhostTextOrReplacement>,
    b: Option<&GhostTextOrReplacement>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Equality over slices of optional ghost texts
pub fn ghost_texts_equal(
    a: &[Option<GhostTextOrReplacement>],
    b: &[Option<GhostTextOrReplacement>],
) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| ghost_text_or_replacement_equals(x.as_ref(), y.as_ref()))
}

/// A character-level change between replaced and inserted text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CharChange {
    pub(crate) original_start: usize,
    pub(crate) original_length: usize,
    pub(crate) modified_start: usize,
    pub(crate) modified_length: usize,
}

pub(crate) fn char_changes(original: &str, modified: &str) -> Option<Vec<CharChange>> {
    if char_len(original) > MAX_DIFF_LENGTH || char_len(modified) > MAX_DIFF_LENGTH {
        return None;
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_chars(original, modified);
    let changes = diff
        .ops()
        .iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .map(|op| {
            let old = op.old_range();
            let new = op.new_range();
            CharChange {
                original_start: old.start,
                original_length: old.len(),
                modified_start: new.start,
                modified_length: new.len(),
            }
        })
        .collect();
    Some(changes)
}

/// Converts an edit into ghost text anchored on its line.
///
/// Returns `None` when the edit cannot be shown as an overlay in `mode`:
/// it spans several lines after removing the already-typed prefix, it
/// deletes text (unless `mode` is [`GhostTextMode::Replacement`]), or it
/// would insert before the cursor in [`GhostTextMode::SubwordSmart`]. The
/// last `preview_suffix_length` characters of the inserted text are marked
/// as preview.
pub fn compute_ghost_text(
    edit: &TextEdit,
    buffer: &dyn TextBuffer,
    mode: GhostTextMode,
    cursor: Option<Position>,
    preview_suffix_length: usize,
) -> Option<GhostTextOrReplacement> {
    let mut e = edit.remove_common_prefix(buffer, None);
    if !e.range.is_single_line() {
        return None;
    }

    let source_line = buffer.line_content(e.range.start.line);
    let indentation_length = char_len(&leading_whitespace(&source_line));
    let start_index = e.range.start.column.saturating_sub(1) as usize;
    let touches_indentation = start_index <= indentation_length;
    if touches_indentation {
        let added_indentation_length = char_len(&leading_whitespace(&e.text));
        let replaced_indentation = char_slice(
            &source_line,
            start_index,
            indentation_length,
        );
        let replaced_length = char_len(&replaced_indentation);
        let (start, end) = (e.range.start, e.range.end);
        let new_start = if start.column as usize + replaced_length <= end.column as usize {
            start.delta(0, replaced_length as i64)
        } else {
            end
        };
        let text = if e.text.starts_with(&replaced_indentation) {
            char_tail(&e.text, replaced_length)
        } else {
            char_tail(&e.text, added_indentation_length)
        };
        e = TextEdit::new(Range::from_positions(new_start, end), text);
    }

    let replaced = buffer.value_in_range(e.range);
    let changes = char_changes(&replaced, &e.text)?;
    let line_number = e.range.start.line;

    if mode == GhostTextMode::Prefix {
        let insertions: Vec<&CharChange> =
            changes.iter().filter(|c| c.original_length == 0).collect();
        let replaced_length = char_len(&replaced);
        if insertions.len() > 1
            || (insertions.len() == 1 && insertions[0].original_start != replaced_length)
        {
            return None;
        }
    }

    let text_length = char_len(&e.text);
    let preview_start = text_length.saturating_sub(preview_suffix_length);
    let mut parts = Vec::new();
    for change in &changes {
        let insert_column =
            e.range.start.column + (change.original_start + change.original_length) as u32;
        if mode == GhostTextMode::SubwordSmart {
            if let Some(cursor) = cursor {
                if cursor.line == line_number && insert_column < cursor.column {
                    return None;
                }
            }
        }
        if change.original_length > 0 {
            if mode == GhostTextMode::Replacement {
                return Some(GhostTextOrReplacement::Replacement(GhostTextReplacement::new(
                    line_number,
                    ColumnRange::new(e.range.start.column, e.range.end.column),
                    e.text.clone(),
                    0,
                )));
            }
            return None;
        }
        if change.modified_length == 0 {
            continue;
        }
        let modified_end = change.modified_start + change.modified_length;
        let non_preview_end = change.modified_start.max(modified_end.min(preview_start));
        let non_preview = char_slice(&e.text, change.modified_start, non_preview_end);
        let preview = char_slice(&e.text, non_preview_end, modified_end);
        if !non_preview.is_empty() {
            parts.push(GhostTextPart::new(insert_column, non_preview, false));
        }
        if !preview.is_empty() {
            parts.push(GhostTextPart::new(insert_column, preview, true));
        }
    }

    GhostText::new(line_number, parts)
        .ok()
        .map(GhostTextOrReplacement::Text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEditor;

    fn ghost(
        text: &str,
        edit: TextEdit,
        mode: GhostTextMode,
        cursor: Option<Position>,
    ) -> Option<GhostTextOrReplacement> {
        let editor = InMemoryEditor::new(text);
        compute_ghost_text(&edit, &editor, mode, cursor, 0)
    }

    #[test]
    fn test_simple_insertion() {
        let result = ghost(
            "fo",
            TextEdit::insert(Position::new(1, 3), "o bar"),
            GhostTextMode::Prefix,
            Some(Position::new(1, 3)),
        )
        .unwrap();
        let g = result.as_ghost_text().unwrap();
        assert_eq!(g.line_number, 1);
        assert_eq!(g.parts().len(), 1);
        assert_eq!(g.parts()[0].column, 3);
        assert_eq!(g.parts()[0].lines(), ["o bar".to_string()]);
        assert_eq!(g.line_count(), 1);
    }

    #[test]
    fn test_typed_prefix_is_stripped() {
        let result = ghost(
            "let x = fo",
            TextEdit::new(Range::new(1, 9, 1, 11), "foo()"),
            GhostTextMode::SubwordSmart,
            Some(Position::new(1, 11)),
        )
        .unwrap();
        assert_eq!(result.parts()[0].column, 11);
        assert_eq!(result.parts()[0].text, "o()");
    }

    #[test]
    fn test_subword_insertions() {
        let result = ghost(
            "foo()",
            TextEdit::new(Range::new(1, 1, 1, 6), "foo(bar)"),
            GhostTextMode::Subword,
            None,
        )
        .unwrap();
        assert_eq!(result.parts().len(), 1);
        assert_eq!(result.parts()[0].column, 5);
        assert_eq!(result.parts()[0].text, "bar");
    }

    #[test]
    fn test_prefix_mode_rejects_inner_insertion() {
        let result = ghost(
            "ab)",
            TextEdit::new(Range::new(1, 1, 1, 4), "abc)"),
            GhostTextMode::Prefix,
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_subword_smart_rejects_insertion_before_cursor() {
        let result = ghost(
            "ac",
            TextEdit::new(Range::new(1, 1, 1, 3), "abc"),
            GhostTextMode::SubwordSmart,
            Some(Position::new(1, 3)),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_deletion_needs_replacement_mode() {
        let edit = TextEdit::new(Range::new(1, 1, 1, 4), "xyz");
        assert!(ghost("abc", edit.clone(), GhostTextMode::Subword, None).is_none());
        let result = ghost("abc", edit, GhostTextMode::Replacement, None).unwrap();
        match result {
            GhostTextOrReplacement::Replacement(r) => {
                assert_eq!(r.column_range, ColumnRange::new(1, 4));
                assert_eq!(r.render("abc"), "xyz");
                assert_eq!(r.line_count(), 1);
            }
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn test_multiline_range_is_rejected() {
        let result = ghost(
            "a\nb",
            TextEdit::new(Range::new(1, 1, 2, 2), "x\ny"),
            GhostTextMode::Subword,
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_multiline_insertion_line_count() {
        let result = ghost(
            "fn main() {",
            TextEdit::insert(Position::new(1, 12), "\n    body();\n}"),
            GhostTextMode::SubwordSmart,
            Some(Position::new(1, 12)),
        )
        .unwrap();
        assert_eq!(result.line_count(), 3);
        assert_eq!(result.parts()[0].lines().len(), 3);
    }

    #[test]
    fn test_indentation_is_not_duplicated() {
        let result = ghost(
            "    ",
            TextEdit::new(Range::new(1, 1, 1, 5), "    return 1;"),
            GhostTextMode::SubwordSmart,
            Some(Position::new(1, 5)),
        )
        .unwrap();
        assert_eq!(result.parts()[0].column, 5);
        assert_eq!(result.parts()[0].text, "return 1;");
    }

    #[test]
    fn test_preview_suffix_is_split() {
        let editor = InMemoryEditor::new("");
        let edit = TextEdit::insert(Position::new(1, 1), "console.log");
        let result =
            compute_ghost_text(&edit, &editor, GhostTextMode::Subword, None, 3).unwrap();
        let parts = result.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, "console.");
        assert!(!parts[0].preview);
        assert_eq!(parts[1].text, "log");
        assert!(parts[1].preview);
    }

    #[test]
    fn test_out_of_order_parts_are_rejected() {
        let parts = vec![
            GhostTextPart::new(5, "a", false),
            GhostTextPart::new(2, "b", false),
        ];
        assert!(GhostText::new(1, parts).is_err());
    }

    #[test]
    fn test_render() {
        let g = GhostText::new(
            1,
            vec![
                GhostTextPart::new(4, "X", false),
                GhostTextPart::new(5, "Y", false),
            ],
        )
        .unwrap();
        assert_eq!(g.render("foo()"), "fooX(Y)");
        assert_eq!(g.render_for_screen_reader("foo()"), "X(Y");
    }

    #[test]
    fn test_render_column_zero_renders_at_line_start() {
        let g = GhostText::new(1, vec![GhostTextPart::new(0, "X", false)]).unwrap();
        assert_eq!(g.render("foo"), "Xfoo");
        assert_eq!(g.render_for_screen_reader("foo"), "X");
    }

    #[test]
    fn test_diff_limit_counts_characters() {
        let wide = "é".repeat(MAX_DIFF_LENGTH);
        assert!(wide.len() > MAX_DIFF_LENGTH);
        assert!(char_changes(&wide, &wide).is_some());
        assert!(char_changes(&format!("{wide}é"), &wide).is_none());
    }

    #[test]
    fn test_empty_and_mixed_variant_equality() {
        let empty = GhostText::new(1, vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.line_count(), 1);

        let text = GhostTextOrReplacement::Text(
            GhostText::new(1, vec![GhostTextPart::new(3, "abc", false)]).unwrap(),
        );
        let replacement = GhostTextOrReplacement::Replacement(GhostTextReplacement::new(
            1,
            ColumnRange::new(3, 3),
            "abc",
            0,
        ));
        assert_eq!(text.parts()[0].lines(), replacement.parts()[0].lines());
        assert!(!ghost_text_or_replacement_equals(Some(&text), Some(&replacement)));
        assert!(ghost_text_or_replacement_equals(Some(&text), Some(&text.clone())));
        assert!(!ghost_text_or_replacement_equals(Some(&text), None));
    }
}
