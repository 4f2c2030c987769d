//! Fetched suggestions and their lifetime
//!
//! A [`Candidate`] is shared between the suggestion source (which owns the
//! candidate set) and the model (which holds extra references while a
//! suggestion is shown or accepted). The explicit reference count decides
//! when the provider is told that the suggestion is gone; the end-of-life
//! report reaches the provider exactly once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::buffer::{ContentChange, ContentChangeEvent, TextBuffer};
use crate::command::Command;
use crate::error::{InlineError, InlineResult};
use crate::language::default_replace_range;
use crate::snippet::{snippet_to_plain_text, SnippetInfo};
use crate::source::InlineCompletionProvider;
use crate::text::{char_slice, char_tail, matches_sub_string};
use crate::types::{Position, Range, TextEdit, TextLength};

/// Identity of a suggestion, equal for suggestions with equal content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SemanticId(String);

impl SemanticId {
    pub fn new(provider_id: &str, insert_text: &str, start: Position) -> InlineResult<Self> {
        let encoded =
            serde_json::to_string(&(provider_id, insert_text, start.line, start.column))?;
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SemanticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final disposition of a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EndOfLifeReason {
    Accepted,
    Rejected,
    /// Dropped without a user decision, possibly replaced by another item
    Ignored {
        superseded_by: Option<SemanticId>,
    },
}

/// Unit of a partial accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartialAcceptKind {
    Word,
    Line,
}

/// Details reported with a partial accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAcceptInfo {
    pub kind: PartialAcceptKind,
    /// Accepted characters, line breaks counted in the buffer's convention
    pub accepted_length: usize,
}

/// Where a suggestion wants to be displayed when it is not at the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLocation {
    pub range: Range,
    pub label: String,
}

/// A suggestion as returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineCompletionItem {
    pub insert_text: String,
    /// `insert_text` uses snippet syntax
    pub is_snippet: bool,
    /// Replaced range; defaults to the word at the cursor through the end
    /// of the line
    pub range: Option<Range>,
    /// A larger rewrite rather than an insertion at the cursor
    pub is_inline_edit: bool,
    pub additional_text_edits: Vec<TextEdit>,
    #[serde(skip)]
    pub command: Option<Command>,
    pub display_location: Option<DisplayLocation>,
}

impl InlineCompletionItem {
    pub fn new(insert_text: impl Into<String>) -> Self {
        Self {
            insert_text: insert_text.into(),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn as_inline_edit(mut self) -> Self {
        self.is_inline_edit = true;
        self
    }

    pub fn as_snippet(mut self) -> Self {
        self.is_snippet = true;
        self
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_additional_edits(mut self, edits: Vec<TextEdit>) -> Self {
        self.additional_text_edits = edits;
        self
    }

    pub fn with_display_location(mut self, location: DisplayLocation) -> Self {
        self.display_location = Some(location);
        self
    }
}

/// A fetched suggestion with tracked range and lifetime
pub struct Candidate {
    provider: Rc<dyn InlineCompletionProvider>,
    semantic_id: SemanticId,
    original_range: Range,
    range: Cell<Range>,
    updated: Cell<bool>,
    insert_text: String,
    is_inline_edit: bool,
    snippet_info: Option<SnippetInfo>,
    additional_text_edits: Vec<TextEdit>,
    command: Option<Command>,
    display_location: Option<DisplayLocation>,
    ref_count: Cell<usize>,
    end_of_life: RefCell<Option<EndOfLifeReason>>,
    shown: Cell<bool>,
    disposed: Cell<bool>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("provider", &self.provider.id())
            .field("semantic_id", &self.semantic_id)
            .field("range", &self.range.get())
            .field("insert_text", &self.insert_text)
            .field("is_inline_edit", &self.is_inline_edit)
            .field("ref_count", &self.ref_count.get())
            .finish()
    }
}

impl Candidate {
    /// Build a candidate from a provider item fetched at `position`. The
    /// new candidate holds one reference, owned by the candidate set it is
    /// placed in; dropping it unshared reports nothing to the provider.
    pub fn from_item(
        item: InlineCompletionItem,
        provider: Rc<dyn InlineCompletionProvider>,
        buffer: &dyn TextBuffer,
        position: Position,
        word: &Regex,
    ) -> InlineResult<Self> {
        let range = item
            .range
            .unwrap_or_else(|| default_replace_range(buffer, position, word));
        if !is_valid_range(buffer, range) {
            return Err(InlineError::invalid_range(format!(
                "{} from provider '{}' is outside the buffer",
                range,
                provider.id()
            )));
        }
        let (insert_text, snippet_info) = if item.is_snippet {
            (
                snippet_to_plain_text(&item.insert_text),
                Some(SnippetInfo {
                    snippet: item.insert_text.clone(),
                    range,
                }),
            )
        } else {
            (item.insert_text.clone(), None)
        };
        let semantic_id = SemanticId::new(provider.id(), &insert_text, range.start)?;
        Ok(Self {
            provider,
            semantic_id,
            original_range: range,
            range: Cell::new(range),
            updated: Cell::new(false),
            insert_text,
            is_inline_edit: item.is_inline_edit,
            snippet_info,
            additional_text_edits: item.additional_text_edits,
            command: item.command,
            display_location: item.display_location,
            ref_count: Cell::new(1),
            end_of_life: RefCell::new(None),
            shown: Cell::new(false),
            disposed: Cell::new(false),
        })
    }

    pub fn semantic_id(&self) -> &SemanticId {
        &self.semantic_id
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn provider_group(&self) -> Option<&str> {
        self.provider.group_id()
    }

    /// Whether the provider asked for its items to survive refetches
    pub fn is_forward_stable(&self) -> bool {
        self.provider.forward_stable()
    }

    pub fn is_inline_edit(&self) -> bool {
        self.is_inline_edit
    }

    pub fn insert_text(&self) -> &str {
        &self.insert_text
    }

    /// The edit against the current buffer
    pub fn edit(&self) -> TextEdit {
        TextEdit::new(self.range.get(), self.insert_text.clone())
    }

    /// The edit as fetched
    pub fn original_edit(&self) -> TextEdit {
        TextEdit::new(self.original_range, self.insert_text.clone())
    }

    /// Whether a buffer change touched the edit range after the fetch
    pub fn is_updated(&self) -> bool {
        self.updated.get()
    }

    pub fn snippet_info(&self) -> Option<&SnippetInfo> {
        self.snippet_info.as_ref()
    }

    pub fn additional_text_edits(&self) -> &[TextEdit] {
        &self.additional_text_edits
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn display_location(&self) -> Option<&DisplayLocation> {
        self.display_location.as_ref()
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.get()
    }

    pub fn add_ref(&self) {
        self.ref_count.set(self.ref_count.get() + 1);
    }

    /// Releases one reference; the last release reports `Ignored` if no
    /// end of life was reported yet and disposes the candidate
    pub fn remove_ref(&self) {
        let count = self.ref_count.get();
        if count == 0 {
            warn!(id = %self.semantic_id, "candidate released more often than referenced");
            return;
        }
        self.ref_count.set(count - 1);
        if count == 1 {
            self.report_end_of_life(EndOfLifeReason::Ignored {
                superseded_by: None,
            });
            self.disposed.set(true);
            trace!(id = %self.semantic_id, "candidate disposed");
            self.provider.handle_disposed(self);
        }
    }

    /// Takes a reference released when the guard drops
    pub fn acquire(self: &Rc<Self>) -> CandidateRef {
        self.add_ref();
        CandidateRef(Rc::clone(self))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn end_of_life(&self) -> Option<EndOfLifeReason> {
        self.end_of_life.borrow().clone()
    }

    /// Reports the final disposition; later reports are ignored
    pub fn report_end_of_life(&self, reason: EndOfLifeReason) {
        if self.end_of_life.borrow().is_some() {
            return;
        }
        *self.end_of_life.borrow_mut() = Some(reason.clone());
        self.provider.handle_end_of_life(self, &reason);
    }

    pub fn report_partial_accept(&self, info: PartialAcceptInfo) {
        self.provider.handle_partial_accept(self, &info);
    }

    /// Reports the first display; returns whether this call reported it
    pub fn report_shown(&self) -> bool {
        if self.shown.replace(true) {
            return false;
        }
        self.provider.handle_item_did_show(self);
        true
    }

    pub fn was_shown(&self) -> bool {
        self.shown.get()
    }

    /// Moves the tracked range through a buffer change. Changes before the
    /// range shift it; changes touching the range grow it.
    pub fn apply_content_change(&self, event: &ContentChangeEvent) {
        let mut changes: Vec<&ContentChange> = event.changes.iter().collect();
        changes.sort_by(|a, b| b.range.start.cmp(&a.range.start));
        for change in changes {
            let range = self.range.get();
            if change.range.start <= range.end && change.range.end >= range.start {
                self.updated.set(true);
            }
            let start = transform_position(range.start, change, false);
            let end = transform_position(range.end, change, true);
            self.range.set(Range::from_positions(start, end));
        }
    }

    /// Whether the suggestion still fits what was typed at `cursor`: the
    /// text before the cursor must be a prefix of the suggestion and the
    /// text after it a subsequence of the rest
    pub fn is_visible(&self, buffer: &dyn TextBuffer, cursor: Position) -> bool {
        let minimized = self.edit().remove_common_prefix(buffer, None);
        if self.range.get().start != self.original_range.start
            || cursor.line != minimized.range.start.line
            || minimized.is_empty()
        {
            return false;
        }
        let original_value = buffer.value_in_range(minimized.range);
        let filter_text = minimized.text.as_str();
        let cursor_index = cursor.column.saturating_sub(minimized.range.start.column) as usize;

        let mut filter_before = char_slice(filter_text, 0, cursor_index);
        let mut filter_after = char_tail(filter_text, cursor_index);
        let mut original_before = char_slice(&original_value, 0, cursor_index);
        let mut original_after = char_tail(&original_value, cursor_index);

        let indent_column = buffer.line_indent_column(minimized.range.start.line);
        if minimized.range.start.column <= indent_column {
            original_before = original_before.trim_start().to_string();
            if original_before.is_empty() {
                original_after = original_after.trim_start().to_string();
            }
            filter_before = filter_before.trim_start().to_string();
            if filter_before.is_empty() {
                filter_after = filter_after.trim_start().to_string();
            }
        }
        filter_before.starts_with(&original_before)
            && matches_sub_string(&original_after, &filter_after)
    }

    /// Whether a refetch at `position` may keep showing this candidate
    pub fn can_be_reused(&self, buffer: &dyn TextBuffer, position: Position) -> bool {
        if self.is_inline_edit {
            return is_valid_range(buffer, self.range.get());
        }
        self.range.get().contains_position(position) && self.is_visible(buffer, position)
    }
}

/// Reference held on a candidate until dropped
#[derive(Debug)]
pub struct CandidateRef(Rc<Candidate>);

impl CandidateRef {
    pub fn candidate(&self) -> &Rc<Candidate> {
        &self.0
    }
}

impl Drop for CandidateRef {
    fn drop(&mut self) {
        self.0.remove_ref();
    }
}

fn is_valid_range(buffer: &dyn TextBuffer, range: Range) -> bool {
    let valid = |p: Position| {
        p.line >= 1
            && p.line <= buffer.line_count()
            && p.column >= 1
            && p.column <= buffer.line_length(p.line) + 1
    };
    valid(range.start) && valid(range.end)
}

fn transform_position(position: Position, change: &ContentChange, grows: bool) -> Position {
    let replaced = change.range;
    if position < replaced.start || (position == replaced.start && !grows) {
        return position;
    }
    let inserted_end = TextLength::of_text(&change.text).add_to_position(replaced.start);
    if position >= replaced.end {
        if position.line == replaced.end.line {
            Position::new(
                inserted_end.line,
                inserted_end.column + (position.column - replaced.end.column),
            )
        } else {
            Position::new(
                position.line + inserted_end.line - replaced.end.line,
                position.column,
            )
        }
    } else if grows {
        inserted_end
    } else {
        replaced.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Editor;
    use crate::language::{LanguageConfigurationRegistry, LanguageConfigurationService};
    use crate::memory::InMemoryEditor;
    use crate::source::ProviderRequest;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingProvider {
        end_of_life: RefCell<Vec<EndOfLifeReason>>,
        disposed: Cell<usize>,
        shown: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl InlineCompletionProvider for RecordingProvider {
        fn id(&self) -> &str {
            "recording"
        }

        async fn provide(&self, _request: &ProviderRequest) -> InlineResult<Vec<InlineCompletionItem>> {
            Ok(Vec::new())
        }

        fn handle_item_did_show(&self, _candidate: &Candidate) {
            self.shown.set(self.shown.get() + 1);
        }

        fn handle_end_of_life(&self, _candidate: &Candidate, reason: &EndOfLifeReason) {
            self.end_of_life.borrow_mut().push(reason.clone());
        }

        fn handle_disposed(&self, _candidate: &Candidate) {
            self.disposed.set(self.disposed.get() + 1);
        }
    }

    fn candidate(
        editor: &InMemoryEditor,
        item: InlineCompletionItem,
        position: Position,
    ) -> (Rc<RecordingProvider>, Rc<Candidate>) {
        let provider = Rc::new(RecordingProvider::default());
        let registry = LanguageConfigurationRegistry::new().unwrap();
        let candidate = Candidate::from_item(
            item,
            provider.clone(),
            editor,
            position,
            registry.word_definition("plaintext"),
        )
        .unwrap();
        (provider, Rc::new(candidate))
    }

    #[test]
    fn test_semantic_id_is_content_based() {
        let a = SemanticId::new("p", "foo", Position::new(1, 1)).unwrap();
        let b = SemanticId::new("p", "foo", Position::new(1, 1)).unwrap();
        let c = SemanticId::new("p", "foo", Position::new(1, 2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_default_range_covers_word_to_line_end() {
        let editor = InMemoryEditor::new("let fo");
        let (_, c) = candidate(&editor, InlineCompletionItem::new("foo"), Position::new(1, 7));
        assert_eq!(c.edit().range, Range::new(1, 5, 1, 7));
    }

    #[test]
    fn test_out_of_buffer_range_is_rejected() {
        let editor = InMemoryEditor::new("x");
        let provider = Rc::new(RecordingProvider::default());
        let registry = LanguageConfigurationRegistry::new().unwrap();
        let result = Candidate::from_item(
            InlineCompletionItem::new("y").with_range(Range::new(4, 1, 4, 1)),
            provider,
            &editor,
            Position::new(1, 1),
            registry.word_definition("plaintext"),
        );
        assert!(matches!(result, Err(InlineError::InvalidRange(_))));
    }

    #[test]
    fn test_snippet_is_flattened() {
        let editor = InMemoryEditor::new("");
        let (_, c) = candidate(
            &editor,
            InlineCompletionItem::new("fn ${1:name}()")
                .as_snippet()
                .with_range(Range::new(1, 1, 1, 1)),
            Position::new(1, 1),
        );
        assert_eq!(c.insert_text(), "fn name()");
        assert_eq!(c.snippet_info().unwrap().snippet, "fn ${1:name}()");
    }

    #[test]
    fn test_end_of_life_reported_once_and_dispose_on_last_release() {
        let editor = InMemoryEditor::new("");
        let (provider, c) = candidate(
            &editor,
            InlineCompletionItem::new("x").with_range(Range::new(1, 1, 1, 1)),
            Position::new(1, 1),
        );
        {
            let _guard = c.acquire();
            assert_eq!(c.ref_count(), 2);
            c.report_end_of_life(EndOfLifeReason::Accepted);
            c.report_end_of_life(EndOfLifeReason::Rejected);
        }
        assert_eq!(c.ref_count(), 1);
        assert!(!c.is_disposed());
        c.remove_ref();
        assert!(c.is_disposed());
        c.remove_ref();
        assert_eq!(*provider.end_of_life.borrow(), vec![EndOfLifeReason::Accepted]);
        assert_eq!(provider.disposed.get(), 1);
    }

    #[test]
    fn test_release_without_decision_reports_ignored() {
        let editor = InMemoryEditor::new("");
        let (provider, c) = candidate(
            &editor,
            InlineCompletionItem::new("x").with_range(Range::new(1, 1, 1, 1)),
            Position::new(1, 1),
        );
        c.remove_ref();
        assert_eq!(
            *provider.end_of_life.borrow(),
            vec![EndOfLifeReason::Ignored {
                superseded_by: None
            }]
        );
    }

    #[test]
    fn test_shown_reported_once() {
        let editor = InMemoryEditor::new("");
        let (provider, c) = candidate(
            &editor,
            InlineCompletionItem::new("x").with_range(Range::new(1, 1, 1, 1)),
            Position::new(1, 1),
        );
        assert!(c.report_shown());
        assert!(!c.report_shown());
        assert_eq!(provider.shown.get(), 1);
    }

    #[test]
    fn test_typing_into_suggestion_grows_range() {
        let mut editor = InMemoryEditor::new("fo");
        editor.set_position(Position::new(1, 3));
        let (_, c) = candidate(
            &editor,
            InlineCompletionItem::new("o bar").with_range(Range::new(1, 3, 1, 3)),
            Position::new(1, 3),
        );
        let event = editor.type_text("o");
        c.apply_content_change(&event);
        assert_eq!(c.edit().range, Range::new(1, 3, 1, 4));
        assert!(c.is_updated());
        assert!(c.is_visible(&editor, Position::new(1, 4)));
    }

    #[test]
    fn test_change_before_range_shifts_it() {
        let mut editor = InMemoryEditor::new("a\nfoo");
        let (_, c) = candidate(
            &editor,
            InlineCompletionItem::new("foobar").with_range(Range::new(2, 1, 2, 4)),
            Position::new(2, 4),
        );
        editor.set_position(Position::new(1, 1));
        let event = editor.type_text("x\n");
        c.apply_content_change(&event);
        assert_eq!(c.edit().range, Range::new(3, 1, 3, 4));
        assert!(!c.is_updated());
    }

    #[test]
    fn test_disagreeing_text_is_not_visible() {
        let mut editor = InMemoryEditor::new("fo");
        editor.set_position(Position::new(1, 3));
        let (_, c) = candidate(
            &editor,
            InlineCompletionItem::new("o bar").with_range(Range::new(1, 3, 1, 3)),
            Position::new(1, 3),
        );
        let event = editor.type_text("x");
        c.apply_content_change(&event);
        assert!(!c.is_visible(&editor, Position::new(1, 4)));
    }

    #[test]
    fn test_visible_with_text_after_cursor() {
        let editor = InMemoryEditor::new("foo()");
        let (_, c) = candidate(
            &editor,
            InlineCompletionItem::new("foo(bar)").with_range(Range::new(1, 1, 1, 6)),
            Position::new(1, 5),
        );
        assert!(c.is_visible(&editor, Position::new(1, 5)));
        assert!(!c.is_visible(&editor, Position::new(2, 1)));
    }
}
