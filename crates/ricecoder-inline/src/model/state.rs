//! Display state derived from candidates, cursors and configuration

use std::rc::Rc;

use crate::buffer::TextBuffer;
use crate::candidate::Candidate;
use crate::config::InlineSuggestConfig;
use crate::ghost_text::{char_changes, compute_ghost_text, GhostTextMode, GhostTextOrReplacement};
use crate::projection::project_secondary_edits;
use crate::source::{CandidateSet, SelectedSuggestionInfo};
use crate::text::{char_len, char_slice};
use crate::types::{LineRange, Position, Range, TextEdit, TextLength};

/// Ghost text shown at the cursors
#[derive(Debug, Clone)]
pub struct GhostTextState {
    /// Primary edit first, then the projected edits that render
    pub edits: Vec<TextEdit>,
    pub primary_ghost_text: GhostTextOrReplacement,
    /// One entry per edit in `edits`
    pub ghost_texts: Vec<GhostTextOrReplacement>,
    /// Absent when only the suggest widget item is previewed
    pub candidate: Option<Rc<Candidate>>,
    pub suggest_item: Option<SelectedSuggestionInfo>,
}

/// An inline edit shown away from or around the cursor
#[derive(Debug, Clone)]
pub struct InlineEditState {
    /// The edit with the already-present prefix removed
    pub edit: TextEdit,
    /// Edits applied on accept; the edit split into its changed fragments
    /// once the buffer moved under it
    pub edits: Vec<TextEdit>,
    pub candidate: Rc<Candidate>,
    pub cursor_is_near_edit: bool,
}

/// What the model currently displays
#[derive(Debug, Clone)]
pub enum InlineCompletionsState {
    GhostText(GhostTextState),
    InlineEdit(InlineEditState),
}

impl InlineCompletionsState {
    pub fn candidate(&self) -> Option<&Rc<Candidate>> {
        match self {
            InlineCompletionsState::GhostText(state) => state.candidate.as_ref(),
            InlineCompletionsState::InlineEdit(state) => Some(&state.candidate),
        }
    }

    pub fn edits(&self) -> &[TextEdit] {
        match self {
            InlineCompletionsState::GhostText(state) => &state.edits,
            InlineCompletionsState::InlineEdit(state) => &state.edits,
        }
    }

    pub fn is_inline_edit(&self) -> bool {
        matches!(self, InlineCompletionsState::InlineEdit(_))
    }

    pub fn ghost_texts(&self) -> &[GhostTextOrReplacement] {
        match self {
            InlineCompletionsState::GhostText(state) => &state.ghost_texts,
            InlineCompletionsState::InlineEdit(_) => &[],
        }
    }
}

fn same_candidate(a: Option<&Rc<Candidate>>, b: Option<&Rc<Candidate>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for InlineCompletionsState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (InlineCompletionsState::GhostText(a), InlineCompletionsState::GhostText(b)) => {
                a.ghost_texts == b.ghost_texts
                    && same_candidate(a.candidate.as_ref(), b.candidate.as_ref())
                    && a.suggest_item == b.suggest_item
            }
            (InlineCompletionsState::InlineEdit(a), InlineCompletionsState::InlineEdit(b)) => {
                a.edit == b.edit
                    && Rc::ptr_eq(&a.candidate, &b.candidate)
                    && a.cursor_is_near_edit == b.cursor_is_near_edit
            }
            _ => false,
        }
    }
}

/// Candidates of the current set, split by kind
#[derive(Debug, Default, Clone)]
pub(crate) struct CandidateSelection {
    /// Completions visible at the cursor, in provider order
    pub completions: Vec<Rc<Candidate>>,
    pub inline_edit: Option<Rc<Candidate>>,
}

pub(crate) fn select_candidates(
    set: Option<&CandidateSet>,
    buffer: &dyn TextBuffer,
    cursor: Position,
) -> CandidateSelection {
    let Some(set) = set else {
        return CandidateSelection::default();
    };
    let mut selection = CandidateSelection::default();
    for candidate in set.candidates() {
        if candidate.is_inline_edit() {
            if selection.inline_edit.is_none() {
                selection.inline_edit = Some(candidate.clone());
            }
        } else if candidate.is_visible(buffer, cursor) {
            selection.completions.push(candidate.clone());
        }
    }
    if !selection.completions.is_empty() {
        selection.inline_edit = None;
    }
    selection
}

pub(crate) struct StateInputs<'a> {
    pub buffer: &'a dyn TextBuffer,
    pub positions: &'a [Position],
    pub selection: &'a CandidateSelection,
    pub selected_index: usize,
    pub is_active: bool,
    pub suggest_item: Option<&'a SelectedSuggestionInfo>,
    pub widget_completions: Option<&'a CandidateSet>,
    pub peek_open: bool,
    pub config: &'a InlineSuggestConfig,
}

pub(crate) fn derive_state(inputs: &StateInputs<'_>) -> Option<InlineCompletionsState> {
    let cursor = inputs.positions.first().copied()?;

    if let Some(candidate) = &inputs.selection.inline_edit {
        if inputs.peek_open || !inputs.config.show_inline_edits {
            return None;
        }
        let target = candidate.edit();
        let edit = target.remove_common_prefix(inputs.buffer, None);
        let cursor_is_near_edit = LineRange::from_range_inclusive(&target.range)
            .add_margin(1, 1)
            .contains(cursor.line);
        let edits = if candidate.is_updated() {
            decompose_edit(&edit, inputs.buffer)
        } else {
            vec![edit.clone()]
        };
        return Some(InlineCompletionsState::InlineEdit(InlineEditState {
            edit,
            edits,
            candidate: candidate.clone(),
            cursor_is_near_edit,
        }));
    }

    if let Some(item) = inputs.suggest_item {
        let suggest_edit = item.single_text_edit().remove_common_prefix(inputs.buffer, None);
        let augmentation = compute_augmentation(&suggest_edit, inputs);
        if !inputs.config.suggest_preview && augmentation.is_none() {
            return None;
        }
        let (full_edit, candidate, preview_length) = match augmentation {
            Some((candidate, edit)) => {
                let preview = char_len(&edit.text).saturating_sub(char_len(&suggest_edit.text));
                (edit, Some(candidate), preview)
            }
            None => (suggest_edit, None, 0),
        };
        let (edits, ghost_texts) = ghost_texts_for(
            full_edit,
            inputs.buffer,
            inputs.positions,
            inputs.config.suggest_preview_mode,
            preview_length,
        )?;
        return Some(InlineCompletionsState::GhostText(GhostTextState {
            primary_ghost_text: ghost_texts[0].clone(),
            edits,
            ghost_texts,
            candidate,
            suggest_item: Some(item.clone()),
        }));
    }

    if !inputs.is_active {
        return None;
    }
    let candidate = inputs.selection.completions.get(inputs.selected_index)?;
    let (edits, ghost_texts) = ghost_texts_for(
        candidate.edit(),
        inputs.buffer,
        inputs.positions,
        inputs.config.completion_mode(),
        0,
    )?;
    Some(InlineCompletionsState::GhostText(GhostTextState {
        primary_ghost_text: ghost_texts[0].clone(),
        edits,
        ghost_texts,
        candidate: Some(candidate.clone()),
        suggest_item: None,
    }))
}

/// Ghost text for the primary edit and every projected edit that renders.
/// `None` when the primary edit does not render.
fn ghost_texts_for(
    primary: TextEdit,
    buffer: &dyn TextBuffer,
    positions: &[Position],
    mode: GhostTextMode,
    preview_length: usize,
) -> Option<(Vec<TextEdit>, Vec<GhostTextOrReplacement>)> {
    let primary_ghost_text =
        compute_ghost_text(&primary, buffer, mode, positions.first().copied(), preview_length)?;
    let secondary = project_secondary_edits(buffer, positions, &primary);
    let mut edits = vec![primary];
    let mut ghost_texts = vec![primary_ghost_text];
    for (edit, position) in secondary.into_iter().zip(positions.iter().skip(1)) {
        let Some(edit) = edit else {
            continue;
        };
        if let Some(ghost_text) = compute_ghost_text(&edit, buffer, mode, Some(*position), preview_length) {
            edits.push(edit);
            ghost_texts.push(ghost_text);
        }
    }
    Some((edits, ghost_texts))
}

/// First completion whose edit extends the suggest widget item
fn compute_augmentation(
    suggest_edit: &TextEdit,
    inputs: &StateInputs<'_>,
) -> Option<(Rc<Candidate>, TextEdit)> {
    let candidates: Vec<Rc<Candidate>> = match inputs.widget_completions {
        Some(set) => set
            .candidates()
            .iter()
            .filter(|c| !c.is_inline_edit())
            .cloned()
            .collect(),
        None => inputs
            .selection
            .completions
            .get(inputs.selected_index)
            .cloned()
            .into_iter()
            .collect(),
    };
    candidates.into_iter().find_map(|candidate| {
        let edit = candidate.edit();
        let valid_range = Range::from_positions(edit.range.start, suggest_edit.range.end);
        let edit = edit.remove_common_prefix(inputs.buffer, Some(valid_range));
        augments(&edit, suggest_edit).then_some((candidate, edit))
    })
}

fn augments(edit: &TextEdit, base: &TextEdit) -> bool {
    edit.text.starts_with(&base.text) && edit.range.extends(&base.range)
}

/// Splits an edit into the fragments that actually change text
pub(crate) fn decompose_edit(edit: &TextEdit, buffer: &dyn TextBuffer) -> Vec<TextEdit> {
    let original = buffer.value_in_range(edit.range);
    let changes = match char_changes(&original, &edit.text) {
        Some(changes) if !changes.is_empty() => changes,
        _ => return vec![edit.clone()],
    };
    let position_of = |offset: usize| {
        TextLength::of_text(&char_slice(&original, 0, offset)).add_to_position(edit.range.start)
    };
    changes
        .iter()
        .map(|change| {
            let start = position_of(change.original_start);
            let end = position_of(change.original_start + change.original_length);
            TextEdit::new(
                Range::from_positions(start, end),
                char_slice(
                    &edit.text,
                    change.modified_start,
                    change.modified_start + change.modified_length,
                ),
            )
        })
        .collect()
}
