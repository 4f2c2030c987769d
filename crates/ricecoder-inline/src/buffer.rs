//! Editor surface consumed by the inline suggestion engine
//!
//! The engine never owns the text. It reads through [`TextBuffer`] and
//! mutates only through [`Editor::apply_edits`], which reports back the
//! resulting [`ContentChangeEvent`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::text::TextSnapshot;
use crate::types::{Position, Range, TextEdit};

/// Identifier of an editor instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditorId(pub u64);

/// Preferred line ending of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndOfLine {
    #[default]
    Lf,
    CrLf,
}

impl EndOfLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndOfLine::Lf => "\n",
            EndOfLine::CrLf => "\r\n",
        }
    }
}

/// Read access to buffer content. Content is LF-normalized.
pub trait TextBuffer {
    /// Language identifier of the buffer (e.g. "rust")
    fn language_id(&self) -> &str;

    fn line_count(&self) -> u32;

    /// Line content without its line break
    fn line_content(&self, line: u32) -> String;

    fn line_length(&self, line: u32) -> u32;

    /// Column of the first non-whitespace character (line length + 1 when
    /// the line is blank)
    fn line_indent_column(&self, line: u32) -> u32 {
        let content = self.line_content(line);
        let indent = content
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .count() as u32;
        indent + 1
    }

    fn value(&self) -> String;

    fn value_in_range(&self, range: Range) -> String;

    fn offset_at(&self, position: Position) -> usize;

    fn position_at(&self, offset: usize) -> Position;

    /// Monotonic version, bumped on every change
    fn version_id(&self) -> u64;

    /// Version that returns to an earlier value when undo/redo restores an
    /// earlier state
    fn alternative_version_id(&self) -> u64;

    fn eol(&self) -> EndOfLine;
}

/// Identifies a buffer state across undo/redo, independent of how the host
/// numbers its versions: two states with the same fingerprint hold the same
/// content at the same history point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferFingerprint {
    pub alternative_version_id: u64,
    pub content_hash: u64,
}

impl BufferFingerprint {
    pub fn of(buffer: &dyn TextBuffer) -> Self {
        let mut hasher = DefaultHasher::new();
        buffer.value().hash(&mut hasher);
        Self {
            alternative_version_id: buffer.alternative_version_id(),
            content_hash: hasher.finish(),
        }
    }
}

/// A cursor with an optional selection; `active` is where the caret is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn caret(position: Position) -> Self {
        Self {
            anchor: position,
            active: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }

    pub fn range(&self) -> Range {
        Range::from_positions(self.anchor, self.active)
    }
}

/// Origin of a buffer modification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditSource {
    /// Characters typed by the user
    Typing,
    Paste,
    Snippet,
    /// Accepting an item of the suggest widget
    SuggestWidget,
    InlineCompletionAccept,
    InlineCompletionPartialAccept,
    /// Undo or redo replaying history
    History,
    /// Any other programmatic change, tagged with its origin
    Programmatic(String),
}

impl EditSource {
    pub fn label(&self) -> &str {
        match self {
            EditSource::Typing => "typing",
            EditSource::Paste => "paste",
            EditSource::Snippet => "snippet",
            EditSource::SuggestWidget => "suggestWidget",
            EditSource::InlineCompletionAccept => "inlineCompletionAccept",
            EditSource::InlineCompletionPartialAccept => "inlineCompletionPartialAccept",
            EditSource::History => "history",
            EditSource::Programmatic(origin) => origin,
        }
    }
}

/// Why the buffer changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReason {
    pub source: EditSource,
    pub is_undoing: bool,
    pub is_redoing: bool,
}

impl ChangeReason {
    pub fn new(source: EditSource) -> Self {
        Self {
            source,
            is_undoing: false,
            is_redoing: false,
        }
    }

    /// Direct character input, excluding history replay
    pub fn is_user_typing(&self) -> bool {
        self.source == EditSource::Typing && !self.is_undoing && !self.is_redoing
    }
}

/// One replaced fragment, expressed in pre-change coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub range: Range,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

/// All fragments of one buffer modification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChangeEvent {
    pub changes: Vec<ContentChange>,
    pub version_id: u64,
    pub alternative_version_id: u64,
    pub reason: ChangeReason,
}

impl ContentChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.changes
            .iter()
            .all(|c| c.range_length == 0 && c.text.is_empty())
    }
}

/// Why the cursor moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorChangeReason {
    /// Moved by a user gesture (click, arrow keys)
    Explicit,
    /// Moved as a side effect of an edit
    ContentFlush,
    /// Moved programmatically through an API call
    Api,
}

/// Full editor surface: buffer plus cursors, undo stops and viewport
pub trait Editor: TextBuffer {
    fn id(&self) -> EditorId;

    /// Read access to the buffer behind this editor
    fn as_text_buffer(&self) -> &dyn TextBuffer;

    /// All selections; the first one is the primary cursor
    fn selections(&self) -> Vec<Selection>;

    fn set_selections(&mut self, selections: Vec<Selection>);

    /// Apply non-overlapping edits as one change
    fn apply_edits(&mut self, edits: &[TextEdit], source: EditSource) -> ContentChangeEvent;

    /// Close the current undo group
    fn push_undo_stop(&mut self);

    /// Insert a snippet at the primary cursor through the host's snippet
    /// engine, without an undo stop before it
    fn insert_snippet(&mut self, snippet: &str) -> ContentChangeEvent;

    fn reveal_position(&mut self, position: Position);

    fn reveal_range(&mut self, range: Range);

    /// Line ranges currently visible in the viewport
    fn visible_ranges(&self) -> Vec<Range>;

    /// Primary caret position
    fn primary_position(&self) -> Position {
        self.selections()
            .first()
            .map(|s| s.active)
            .unwrap_or(Position::new(1, 1))
    }

    fn set_position(&mut self, position: Position) {
        self.set_selections(vec![Selection::caret(position)]);
    }
}

/// Immutable copy of a buffer, handed to providers across await points
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    snapshot: TextSnapshot,
    language_id: String,
    version_id: u64,
    alternative_version_id: u64,
    eol: EndOfLine,
}

impl BufferSnapshot {
    pub fn capture(buffer: &dyn TextBuffer) -> Self {
        Self {
            snapshot: TextSnapshot::new(&buffer.value()),
            language_id: buffer.language_id().to_string(),
            version_id: buffer.version_id(),
            alternative_version_id: buffer.alternative_version_id(),
            eol: buffer.eol(),
        }
    }
}

impl TextBuffer for BufferSnapshot {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEditor;

    #[test]
    fn test_user_typing_excludes_history() {
        let mut reason = ChangeReason::new(EditSource::Typing);
        assert!(reason.is_user_typing());
        reason.is_undoing = true;
        assert!(!reason.is_user_typing());
        assert!(!ChangeReason::new(EditSource::Paste).is_user_typing());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut editor = InMemoryEditor::new("abc");
        let before = BufferFingerprint::of(&editor);
        editor.type_text("d");
        assert_ne!(before, BufferFingerprint::of(&editor));
        editor.undo();
        assert_eq!(before, BufferFingerprint::of(&editor));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut editor = InMemoryEditor::new("fn a()").with_language("rust");
        let snapshot = BufferSnapshot::capture(&editor);
        editor.type_text("x");
        assert_eq!(snapshot.value(), "fn a()");
        assert_eq!(snapshot.language_id(), "rust");
        assert_eq!(snapshot.version_id() + 1, editor.version_id());
    }

    #[test]
    fn test_indent_column() {
        let editor = InMemoryEditor::new("    let x = 1;\n\t\n");
        assert_eq!(editor.line_indent_column(1), 5);
        assert_eq!(editor.line_indent_column(2), 2);
    }
}
