//! Headless [`Editor`] implementation backed by a rope.
//!
//! Edits are applied to the rope in place. Undo history keeps the rope
//! before and after each undo group; rope clones share structure, so a
//! group costs little more than the edited nodes.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::buffer::{
    ChangeReason, ContentChange, ContentChangeEvent, EditSource, Editor, EditorId, EndOfLine,
    Selection, TextBuffer,
};
use crate::snippet::parse_snippet;
use crate::text::{char_len, common_prefix_len, common_suffix_len, normalize_eol, TextSnapshot};
use crate::types::{OffsetRange, Position, Range, TextEdit};

static NEXT_EDITOR_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
struct UndoGroup {
    before: TextSnapshot,
    after: TextSnapshot,
    alternative_before: u64,
    alternative_after: u64,
    selections_before: Vec<Selection>,
    selections_after: Vec<Selection>,
    source: EditSource,
}

/// In-memory editor with multi-cursor support and undo/redo
#[derive(Debug)]
pub struct InMemoryEditor {
    id: EditorId,
    snapshot: TextSnapshot,
    language_id: String,
    eol: EndOfLine,
    selections: Vec<Selection>,
    version_id: u64,
    alternative_version_id: u64,
    undo_stack: Vec<UndoGroup>,
    redo_stack: Vec<UndoGroup>,
    group_open: bool,
    viewport: Option<(u32, u32)>,
    last_revealed: Option<Range>,
}

impl InMemoryEditor {
    /// Create an editor holding `text`, caret at the start
    pub fn new(text: &str) -> Self {
        let eol = if text.contains("\r\n") {
            EndOfLine::CrLf
        } else {
            EndOfLine::Lf
        };
        Self {
            id: EditorId(NEXT_EDITOR_ID.fetch_add(1, Ordering::Relaxed)),
            snapshot: TextSnapshot::new(text),
            language_id: "plaintext".to_string(),
            eol,
            selections: vec![Selection::caret(Position::new(1, 1))],
            version_id: 1,
            alternative_version_id: 1,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            group_open: false,
            viewport: None,
            last_revealed: None,
        }
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    pub fn with_eol(mut self, eol: EndOfLine) -> Self {
        self.eol = eol;
        self
    }

    /// Restrict the visible viewport to an inclusive line span
    pub fn set_viewport(&mut self, first_line: u32, last_line: u32) {
        self.viewport = Some((first_line, last_line));
    }

    pub fn last_revealed(&self) -> Option<Range> {
        self.last_revealed
    }

    /// Place carets at the given character offsets; the first is primary
    pub fn set_cursor_offsets(&mut self, offsets: &[usize]) {
        let selections = offsets
            .iter()
            .map(|offset| Selection::caret(self.snapshot.position_at(*offset)))
            .collect();
        self.set_selections(selections);
    }

    /// Type text at every cursor, replacing selected text
    pub fn type_text(&mut self, text: &str) -> ContentChangeEvent {
        let edits: Vec<TextEdit> = self
            .selections
            .iter()
            .map(|s| TextEdit::new(s.range(), text))
            .collect();
        let event = self.apply_edits(&edits, EditSource::Typing);
        let carets = crate::types::end_positions_after_applying(&edits)
            .into_iter()
            .map(Selection::caret)
            .collect();
        self.selections = carets;
        event
    }

    /// Delete one character left of every caret
    pub fn backspace(&mut self) -> ContentChangeEvent {
        let edits: Vec<TextEdit> = self
            .selections
            .iter()
            .map(|s| {
                if s.is_empty() {
                    let offset = self.snapshot.offset_at(s.active);
                    let start = self.snapshot.position_at(offset.saturating_sub(1));
                    TextEdit::new(Range::from_positions(start, s.active), "")
                } else {
                    TextEdit::new(s.range(), "")
                }
            })
            .collect();
        let event = self.apply_edits(&edits, EditSource::Typing);
        self.selections = crate::types::end_positions_after_applying(&edits)
            .into_iter()
            .map(Selection::caret)
            .collect();
        event
    }

    /// Revert the last undo group
    pub fn undo(&mut self) -> Option<ContentChangeEvent> {
        let group = self.undo_stack.pop()?;
        self.group_open = false;
        let event = self.replace_document(
            group.before.clone(),
            group.alternative_before,
            ChangeReason {
                source: EditSource::History,
                is_undoing: true,
                is_redoing: false,
            },
        );
        self.selections = group.selections_before.clone();
        self.redo_stack.push(group);
        Some(event)
    }

    /// Re-apply the last undone group
    pub fn redo(&mut self) -> Option<ContentChangeEvent> {
        let group = self.redo_stack.pop()?;
        self.group_open = false;
        let event = self.replace_document(
            group.after.clone(),
            group.alternative_after,
            ChangeReason {
                source: EditSource::History,
                is_undoing: false,
                is_redoing: true,
            },
        );
        self.selections = group.selections_after.clone();
        self.undo_stack.push(group);
        Some(event)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn replace_document(
        &mut self,
        target: TextSnapshot,
        alternative_version_id: u64,
        reason: ChangeReason,
    ) -> ContentChangeEvent {
        let old_text = self.snapshot.text();
        let new_text = target.text();
        let prefix = common_prefix_len(&old_text, &new_text);
        let old_rest: String = old_text.chars().skip(prefix).collect();
        let new_rest: String = new_text.chars().skip(prefix).collect();
        let suffix = common_suffix_len(&old_rest, &new_rest);
        let old_len = char_len(&old_rest) - suffix;
        let inserted: String = new_rest.chars().take(char_len(&new_rest) - suffix).collect();
        let range = self
            .snapshot
            .range_of(OffsetRange::new(prefix, prefix + old_len));

        self.snapshot = target;
        self.version_id += 1;
        self.alternative_version_id = alternative_version_id;

        ContentChangeEvent {
            changes: vec![ContentChange {
                range,
                range_offset: prefix,
                range_length: old_len,
                text: inserted,
            }],
            version_id: self.version_id,
            alternative_version_id: self.alternative_version_id,
            reason,
        }
    }

    fn transform_offset(offset: usize, edits: &[(OffsetRange, usize)]) -> usize {
        let mut delta: i64 = 0;
        for (range, new_len) in edits {
            if offset >= range.end && !(range.is_empty() && offset == range.start) {
                delta += *new_len as i64 - range.len() as i64;
            } else if offset > range.start {
                return (range.start as i64 + delta + *new_len as i64) as usize;
            }
        }
        (offset as i64 + delta) as usize
    }
}

impl TextBuffer for InMemoryEditor {
    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn line_count(&self) -> u32 {
        self.snapshot.line_count()
    }

    fn line_content(&self, line: u32) -> String {
        self.snapshot.line_content(line)
    }

    fn line_length(&self, line: u32) -> u32 {
        self.snapshot.line_length(line)
    }

    fn value(&self) -> String {
        self.snapshot.text()
    }

    fn value_in_range(&self, range: Range) -> String {
        self.snapshot.value_in_range(range)
    }

    fn offset_at(&self, position: Position) -> usize {
        self.snapshot.offset_at(position)
    }

    fn position_at(&self, offset: usize) -> Position {
        self.snapshot.position_at(offset)
    }

    fn version_id(&self) -> u64 {
        self.version_id
    }

    fn alternative_version_id(&self) -> u64 {
        self.alternative_version_id
    }

    fn eol(&self) -> EndOfLine {
        self.eol
    }
}

impl Editor for InMemoryEditor {
    fn id(&self) -> EditorId {
        self.id
    }

    fn as_text_buffer(&self) -> &dyn TextBuffer {
        self
    }

    fn selections(&self) -> Vec<Selection> {
        self.selections.clone()
    }

    fn set_selections(&mut self, selections: Vec<Selection>) {
        if selections.is_empty() {
            return;
        }
        self.selections = selections;
    }

    fn apply_edits(&mut self, edits: &[TextEdit], source: EditSource) -> ContentChangeEvent {
        let mut offset_edits: Vec<(OffsetRange, String)> = edits
            .iter()
            .map(|e| (self.snapshot.offset_range(e.range), normalize_eol(&e.text)))
            .collect();
        offset_edits.sort_by_key(|(range, _)| range.start);
        // Overlapping edits are clipped to start where the previous one ended.
        let mut cursor = 0;
        for (range, _) in offset_edits.iter_mut() {
            let start = range.start.max(cursor);
            *range = OffsetRange::new(start, range.end.max(start));
            cursor = range.end;
        }

        let changes: Vec<ContentChange> = offset_edits
            .iter()
            .rev()
            .map(|(range, text)| ContentChange {
                range: self.snapshot.range_of(*range),
                range_offset: range.start,
                range_length: range.len(),
                text: text.clone(),
            })
            .collect();

        let lengths: Vec<(OffsetRange, usize)> = offset_edits
            .iter()
            .map(|(range, text)| (*range, char_len(text)))
            .collect();
        let selection_offsets: Vec<(usize, usize)> = self
            .selections
            .iter()
            .map(|s| {
                (
                    Self::transform_offset(self.snapshot.offset_at(s.anchor), &lengths),
                    Self::transform_offset(self.snapshot.offset_at(s.active), &lengths),
                )
            })
            .collect();

        let selections_before = self.selections.clone();
        let alternative_before = self.alternative_version_id;
        let before = self.snapshot.clone();

        for (range, text) in offset_edits.iter().rev() {
            self.snapshot.replace(*range, text);
        }
        self.version_id += 1;
        self.alternative_version_id = self.version_id;
        self.selections = selection_offsets
            .into_iter()
            .map(|(anchor, active)| Selection {
                anchor: self.snapshot.position_at(anchor),
                active: self.snapshot.position_at(active),
            })
            .collect();
        self.redo_stack.clear();

        let extend = self.group_open
            && self
                .undo_stack
                .last()
                .is_some_and(|group| group.source == source);
        if extend {
            if let Some(group) = self.undo_stack.last_mut() {
                group.after = self.snapshot.clone();
                group.alternative_after = self.alternative_version_id;
                group.selections_after = self.selections.clone();
            }
        } else {
            self.undo_stack.push(UndoGroup {
                before,
                after: self.snapshot.clone(),
                alternative_before,
                alternative_after: self.alternative_version_id,
                selections_before,
                selections_after: self.selections.clone(),
                source: source.clone(),
            });
            self.group_open = true;
        }
        trace!(version = self.version_id, source = source.label(), "applied edits");

        ContentChangeEvent {
            changes,
            version_id: self.version_id,
            alternative_version_id: self.alternative_version_id,
            reason: ChangeReason::new(source),
        }
    }

    fn push_undo_stop(&mut self) {
        self.group_open = false;
    }

    fn insert_snippet(&mut self, snippet: &str) -> ContentChangeEvent {
        let parsed = parse_snippet(snippet);
        let selection = self.selections[0];
        let start_offset = self.snapshot.offset_at(selection.range().start);
        let edit = TextEdit::new(selection.range(), parsed.text.clone());
        let joins_open_group = self.group_open && !self.undo_stack.is_empty();
        let depth = self.undo_stack.len();
        let event = self.apply_edits(&[edit], EditSource::Snippet);
        let caret = self
            .snapshot
            .position_at(start_offset + parsed.initial_caret_offset());
        self.selections = vec![Selection::caret(caret)];
        // Snippets continue the open undo group whatever its source.
        if joins_open_group && self.undo_stack.len() == depth + 1 {
            if let Some(snippet_group) = self.undo_stack.pop() {
                if let Some(group) = self.undo_stack.last_mut() {
                    group.after = snippet_group.after;
                    group.alternative_after = snippet_group.alternative_after;
                }
            }
        }
        if let Some(group) = self.undo_stack.last_mut() {
            group.selections_after = self.selections.clone();
        }
        event
    }

    fn reveal_position(&mut self, position: Position) {
        self.last_revealed = Some(Range::empty_at(position));
    }

    fn reveal_range(&mut self, range: Range) {
        self.last_revealed = Some(range);
    }

    fn visible_ranges(&self) -> Vec<Range> {
        let (first, last) = self.viewport.unwrap_or((1, self.snapshot.line_count()));
        let last = last.min(self.snapshot.line_count());
        vec![Range::new(first, 1, last, self.snapshot.line_length(last) + 1)]
    }
}
