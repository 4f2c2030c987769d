//! Accepting, partially accepting and jumping to suggestions

use regex::Regex;
use tracing::{debug, warn};

use super::{positions_of, AcceptedInfo, InlineCompletionsModel, ModelEvent, StopReason};
use crate::buffer::{ContentChangeEvent, EditSource, EditorId, Selection};
use crate::candidate::{EndOfLifeReason, PartialAcceptInfo, PartialAcceptKind};
use crate::error::{InlineError, InlineResult};
use crate::model::state::InlineCompletionsState;
use crate::projection::project_secondary_edits;
use crate::text::{char_len, char_slice};
use crate::types::{
    end_positions_after_applying, modified_ranges_after_applying, Position, Range, TextEdit,
    TextLength,
};

impl InlineCompletionsModel {
    fn ensure_own_editor(&self, editor: EditorId) -> InlineResult<()> {
        let own = self.editor.borrow().id();
        if own != editor {
            return Err(InlineError::bug(format!(
                "accept requested for editor {:?} by the model of editor {:?}",
                editor, own
            )));
        }
        Ok(())
    }

    /// Accepts the shown suggestion
    pub async fn accept(&self) -> InlineResult<()> {
        let editor = self.editor.borrow().id();
        self.accept_in(editor).await
    }

    /// Accepts the shown suggestion into `editor`, which must be the
    /// model's own editor
    pub async fn accept_in(&self, editor: EditorId) -> InlineResult<()> {
        self.ensure_own_editor(editor)?;
        let Some(state) = self.state() else {
            return Ok(());
        };
        let candidate = match &state {
            InlineCompletionsState::GhostText(ghost) => {
                if ghost.primary_ghost_text.is_empty() {
                    return Ok(());
                }
                match &ghost.candidate {
                    Some(candidate) => candidate.clone(),
                    None => return Ok(()),
                }
            }
            InlineCompletionsState::InlineEdit(edit) => edit.candidate.clone(),
        };
        let is_inline_edit = state.is_inline_edit();
        let guard = candidate.acquire();

        let (events, ranges): (Vec<ContentChangeEvent>, Vec<Range>) = {
            let mut editor = self.editor.borrow_mut();
            editor.push_undo_stop();
            if let Some(snippet) = candidate.snippet_info() {
                let range = candidate.edit().range;
                let mut edits = vec![TextEdit::new(range, "")];
                edits.extend(candidate.additional_text_edits().iter().cloned());
                let removed = editor.apply_edits(&edits, EditSource::InlineCompletionAccept);
                editor.set_position(range.start);
                let inserted = editor.insert_snippet(&snippet.snippet);
                let ranges = vec![TextLength::of_text(candidate.insert_text()).create_range(range.start)];
                (vec![removed, inserted], ranges)
            } else {
                let edits = state.edits().to_vec();
                let minimal: Vec<TextEdit> = if is_inline_edit {
                    edits.clone()
                } else {
                    edits
                        .iter()
                        .map(|e| e.remove_common_prefix_and_suffix(editor.as_text_buffer()))
                        .collect()
                };
                let selections: Vec<Selection> = end_positions_after_applying(&minimal)
                    .into_iter()
                    .map(Selection::caret)
                    .collect();
                let mut all = edits;
                all.extend(candidate.additional_text_edits().iter().cloned());
                let event = editor.apply_edits(&all, EditSource::InlineCompletionAccept);
                if candidate.display_location().is_none() {
                    let selections = if is_inline_edit {
                        selections.last().copied().into_iter().collect()
                    } else {
                        selections
                    };
                    editor.set_selections(selections);
                }
                (vec![event], modified_ranges_after_applying(&all))
            }
        };
        for event in &events {
            self.handle_content_change(event);
        }

        let fade_out = is_inline_edit && !self.config.borrow().reduce_motion;
        self.emit(ModelEvent::Accepted {
            semantic_id: candidate.semantic_id().clone(),
            ranges,
            fade_out,
        });
        self.stop_with(StopReason::Automatic);

        if let Some(command) = candidate.command() {
            if let Err(err) = self
                .commands
                .execute_command(&command.id, &command.arguments)
                .await
            {
                warn!(command = %command.id, error = %err, "command after accept failed");
            }
        }
        candidate.report_end_of_life(EndOfLifeReason::Accepted);
        drop(guard);

        let version_after = self.editor.borrow().version_id();
        let mut inner = self.inner.borrow_mut();
        inner.in_accept_flow = true;
        inner.last_accepted = Some(AcceptedInfo {
            version_after,
            is_inline_edit,
        });
        debug!(id = %candidate.semantic_id(), is_inline_edit, "suggestion accepted");
        Ok(())
    }

    /// Accepts the shown ghost text up to the end of the next word
    pub async fn accept_next_word(&self) -> InlineResult<()> {
        self.accept_next(PartialAcceptKind::Word).await
    }

    /// Accepts the shown ghost text through the next line break
    pub async fn accept_next_line(&self) -> InlineResult<()> {
        self.accept_next(PartialAcceptKind::Line).await
    }

    async fn accept_next(&self, kind: PartialAcceptKind) -> InlineResult<()> {
        let Some(InlineCompletionsState::GhostText(state)) = self.state() else {
            return Ok(());
        };
        if state.primary_ghost_text.is_empty() {
            return Ok(());
        }
        let Some(candidate) = state.candidate.clone() else {
            return Ok(());
        };
        if candidate.snippet_info().is_some() {
            return self.accept().await;
        }

        let ghost = &state.primary_ghost_text;
        let Some(first_part) = ghost.parts().first() else {
            return Ok(());
        };
        let ghost_position = Position::new(ghost.line_number(), first_part.column);
        let ghost_value = first_part.text.clone();
        let accept_until = match kind {
            PartialAcceptKind::Word => {
                let language_id = self.editor.borrow().language_id().to_string();
                word_accept_length(&ghost_value, self.language.word_definition(&language_id))?
            }
            PartialAcceptKind::Line => line_accept_length(&ghost_value),
        };
        if accept_until == char_len(&ghost_value) && ghost.parts().len() == 1 {
            return self.accept().await;
        }
        let partial = char_slice(&ghost_value, 0, accept_until);

        let guard = candidate.acquire();
        let edit_start = candidate.edit().range.start;
        let (event, accepted_length) = {
            let mut editor = self.editor.borrow_mut();
            let positions = positions_of(&*editor);
            let cursor = positions[0];
            let replace_range = Range::from_positions(cursor, ghost_position);
            let new_text = format!("{}{}", editor.value_in_range(replace_range), partial);
            let primary = TextEdit::new(replace_range, new_text);
            let mut edits = vec![primary.clone()];
            edits.extend(
                project_secondary_edits(editor.as_text_buffer(), &positions, &primary)
                    .into_iter()
                    .flatten(),
            );
            let selections = end_positions_after_applying(&edits)
                .into_iter()
                .map(Selection::caret)
                .collect();

            editor.push_undo_stop();
            let event = editor.apply_edits(&edits, EditSource::InlineCompletionPartialAccept);
            editor.set_selections(selections);
            let primary_position = editor.primary_position();
            editor.reveal_position(primary_position);

            let accepted_range = Range::from_positions(
                edit_start,
                TextLength::of_text(&partial).add_to_position(ghost_position),
            );
            let accepted = editor.value_in_range(accepted_range);
            let line_breaks = accepted.matches('\n').count();
            let extra_per_break = editor.eol().as_str().len() - 1;
            (event, char_len(&accepted) + line_breaks * extra_per_break)
        };
        self.handle_content_change(&event);

        let info = PartialAcceptInfo {
            kind,
            accepted_length,
        };
        candidate.report_partial_accept(info);
        self.emit(ModelEvent::PartiallyAccepted {
            semantic_id: candidate.semantic_id().clone(),
            info,
        });
        drop(guard);
        debug!(id = %candidate.semantic_id(), accepted_length, ?kind, "suggestion partially accepted");
        Ok(())
    }

    /// Moves the cursor to the shown inline edit without refetching
    pub fn jump(&self) {
        let Some(InlineCompletionsState::InlineEdit(state)) = self.state() else {
            return;
        };
        let target = state.candidate.edit().range;
        {
            let mut inner = self.inner.borrow_mut();
            inner.jumped_to_id = Some(state.candidate.semantic_id().clone());
            inner.pending.dont_refetch = true;
            inner.pending.dirty = true;
        }
        let mut editor = self.editor.borrow_mut();
        editor.set_position(target.start);
        let single_line = target.is_single_line()
            && (state.candidate.display_location().is_some()
                || !state.candidate.insert_text().contains('\n'));
        if single_line {
            editor.reveal_position(target.start);
        } else {
            editor.reveal_range(Range::new(
                target.start.line.saturating_sub(1).max(1),
                1,
                target.end.line + 1,
                1,
            ));
        }
        debug!(id = %state.candidate.semantic_id(), "jumped to inline edit");
    }
}

/// Characters accepted by a word step: through the first word when the text
/// starts with one, else up to the next word, never past the first run of
/// whitespace
fn word_accept_length(text: &str, word: &Regex) -> InlineResult<usize> {
    let mut until = match word.find(text) {
        Some(m) if m.start() == 0 => m.end(),
        Some(m) => m.start(),
        None => text.len(),
    };
    let whitespace = Regex::new(r"\s+")?;
    if let Some(ws) = whitespace.find(text) {
        if ws.end() < until {
            until = ws.end();
        }
    }
    Ok(text[..until].chars().count())
}

/// Characters accepted by a line step: through the first line break, else
/// everything
fn line_accept_length(text: &str) -> usize {
    match text.find('\n') {
        Some(index) => text[..=index].chars().count(),
        None => char_len(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::DEFAULT_WORD_PATTERN;

    #[test]
    fn test_word_accept_length() {
        let word = Regex::new(DEFAULT_WORD_PATTERN).unwrap();
        assert_eq!(word_accept_length("o bar", &word).unwrap(), 1);
        assert_eq!(word_accept_length("foo.bar", &word).unwrap(), 3);
        assert_eq!(word_accept_length(".bar", &word).unwrap(), 1);
        assert_eq!(word_accept_length("  bar", &word).unwrap(), 2);
        assert_eq!(word_accept_length("bar", &word).unwrap(), 3);
        assert_eq!(word_accept_length("((", &word).unwrap(), 2);
    }

    #[test]
    fn test_line_accept_length() {
        assert_eq!(line_accept_length("a\nb"), 2);
        assert_eq!(line_accept_length("ab"), 2);
    }
}
