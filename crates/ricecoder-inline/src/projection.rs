//! Mirrors the primary cursor's edit onto secondary cursors.
//!
//! An edit is mirrored only when the text around a secondary cursor matches
//! the text around the primary cursor, so that typing the suggestion at every
//! cursor would have had the same effect.

use crate::buffer::TextBuffer;
use crate::text::{char_slice, char_tail};
use crate::types::{OffsetRange, Position, Range, TextEdit};

fn offset_range_to_range(buffer: &dyn TextBuffer, range: OffsetRange) -> Range {
    Range::from_positions(buffer.position_at(range.start), buffer.position_at(range.end))
}

fn document_length(buffer: &dyn TextBuffer) -> usize {
    let last_line = buffer.line_count();
    buffer.offset_at(Position::new(last_line, buffer.line_length(last_line) + 1))
}

/// Projects `primary_edit`, made at `positions[0]`, onto the other
/// positions.
///
/// The result has one entry per secondary position (`positions[1..]`), in
/// order; `None` marks a cursor whose surrounding text differs from the
/// primary's. A projected edit replaces the whole context range, so applying
/// it changes the text around the secondary cursor exactly as the primary
/// edit changes the text around the primary cursor. A single cursor yields
/// an empty list.
pub fn project_secondary_edits(
    buffer: &dyn TextBuffer,
    positions: &[Position],
    primary_edit: &TextEdit,
) -> Vec<Option<TextEdit>> {
    let Some((primary_position, secondary_positions)) = positions.split_first() else {
        return Vec::new();
    };
    if secondary_positions.is_empty() {
        return Vec::new();
    }

    let primary_offset = buffer.offset_at(*primary_position);
    let stripped = primary_edit.remove_common_prefix_and_suffix(buffer);
    let replace_range = OffsetRange::new(
        buffer.offset_at(stripped.range.start),
        buffer.offset_at(stripped.range.end),
    );
    let context_range = replace_range.join(&OffsetRange::empty_at(primary_offset));
    let context_text = buffer.value_in_range(offset_range_to_range(buffer, context_range));

    // Where the replaced part sits inside the context.
    let relative_start = replace_range.start - context_range.start;
    let relative_end = replace_range.end - context_range.start;
    let new_text = format!(
        "{}{}{}",
        char_slice(&context_text, 0, relative_start),
        stripped.text,
        char_tail(&context_text, relative_end)
    );

    let length = document_length(buffer);
    secondary_positions
        .iter()
        .map(|position| {
            let offset = buffer.offset_at(*position) as i64;
            let start = offset + context_range.start as i64 - primary_offset as i64;
            let end = offset + context_range.end as i64 - primary_offset as i64;
            if start < 0 || end as usize > length {
                return None;
            }
            let range = OffsetRange::new(start as usize, end as usize);
            let range = offset_range_to_range(buffer, range);
            if buffer.value_in_range(range) != context_text {
                return None;
            }
            Some(TextEdit::new(range, new_text.clone()))
        })
        .collect()
}
