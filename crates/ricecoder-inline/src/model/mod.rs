//! Inline suggestion orchestration for one editor
//!
//! [`InlineCompletionsModel`] decides when to fetch, which fetched
//! candidate to show, how it renders at each cursor, and what accepting it
//! does to the buffer. Hosts feed it buffer and cursor changes, call
//! [`InlineCompletionsModel::update`] to run the fetch decision, and read
//! the derived [`InlineCompletionsState`].
//!
//! Edits the model applies itself (accepts, partial accepts) are processed
//! internally; hosts forward only the changes they make.

mod accept;
mod fetch;
mod state;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::buffer::{BufferFingerprint, ContentChangeEvent, CursorChangeReason, EditSource, Editor};
use crate::candidate::{Candidate, EndOfLifeReason, PartialAcceptInfo, SemanticId};
use crate::command::CommandService;
use crate::config::{ConfigLoader, InlineSuggestConfig};
use crate::error::InlineResult;
use crate::ghost_text::GhostTextOrReplacement;
use crate::language::LanguageConfigurationService;
use crate::memo::Memo;
use crate::source::{
    ProviderRegistry, ProviderSuggestionSource, SelectedSuggestionInfo, SuggestionSource,
};
use crate::types::{Position, Range, TextEdit};
use crate::typing::{Clock, TypingInterval, TypingIntervalTracker};

pub use fetch::TriggerOptions;
pub use state::{GhostTextState, InlineCompletionsState, InlineEditState};

use fetch::ChangeSummary;
use state::{derive_state, select_candidates, CandidateSelection, StateInputs};

/// Why the model stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Stopped by the model itself (accept, cursor move, snooze)
    Automatic,
    /// Dismissed by the user; the shown candidate is rejected
    ExplicitCancel,
}

/// Notifications for the host UI
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    Shown {
        semantic_id: SemanticId,
        is_inline_edit: bool,
    },
    Accepted {
        semantic_id: SemanticId,
        /// Buffer ranges covered by the applied edits
        ranges: Vec<Range>,
        /// Fade the accepted inline edit out
        fade_out: bool,
    },
    PartiallyAccepted {
        semantic_id: SemanticId,
        info: PartialAcceptInfo,
    },
    Stopped {
        reason: StopReason,
    },
}

#[derive(Debug, Clone, Copy)]
struct ShownInfo {
    fingerprint: BufferFingerprint,
    is_inline_edit: bool,
}

#[derive(Debug, Clone, Copy)]
struct AcceptedInfo {
    version_after: u64,
    is_inline_edit: bool,
}

#[derive(Debug, Default)]
struct ModelInner {
    is_active: bool,
    in_accept_flow: bool,
    selected_id: Option<SemanticId>,
    jumped_to_id: Option<SemanticId>,
    suggest_item: Option<SelectedSuggestionInfo>,
    peek_open: bool,
    suppressed_groups: BTreeSet<String>,
    pending: ChangeSummary,
    last_shown: Option<ShownInfo>,
    last_accepted: Option<AcceptedInfo>,
    disposed: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct CandidateKey {
    address: usize,
    edit: TextEdit,
    updated: bool,
}

impl CandidateKey {
    fn of(candidate: &Rc<Candidate>) -> Self {
        Self {
            address: Rc::as_ptr(candidate) as usize,
            edit: candidate.edit(),
            updated: candidate.is_updated(),
        }
    }
}

/// Everything the display state depends on
#[derive(Debug, Clone, PartialEq)]
struct StateKey {
    version_id: u64,
    positions: Vec<Position>,
    is_active: bool,
    selected_index: usize,
    completions: Vec<CandidateKey>,
    inline_edit: Option<CandidateKey>,
    widget: Vec<CandidateKey>,
    suggest_item: Option<SelectedSuggestionInfo>,
    peek_open: bool,
    config: InlineSuggestConfig,
}

/// Inline suggestion state machine bound to one editor
pub struct InlineCompletionsModel {
    editor: Rc<RefCell<dyn Editor>>,
    source: Rc<dyn SuggestionSource>,
    providers: Rc<RefCell<ProviderRegistry>>,
    commands: Rc<dyn CommandService>,
    language: Rc<dyn LanguageConfigurationService>,
    config: RefCell<InlineSuggestConfig>,
    typing: RefCell<TypingIntervalTracker>,
    inner: RefCell<ModelInner>,
    display: Memo<StateKey, Option<InlineCompletionsState>>,
    events: RefCell<Vec<ModelEvent>>,
}

impl std::fmt::Debug for InlineCompletionsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineCompletionsModel")
            .field("editor", &self.editor.borrow().id())
            .field("inner", &self.inner.borrow())
            .field("config", &self.config.borrow())
            .finish()
    }
}

impl InlineCompletionsModel {
    /// Creates a model fetching from `providers` through a
    /// [`ProviderSuggestionSource`]
    pub fn new(
        editor: Rc<RefCell<dyn Editor>>,
        providers: Rc<RefCell<ProviderRegistry>>,
        commands: Rc<dyn CommandService>,
        language: Rc<dyn LanguageConfigurationService>,
    ) -> Self {
        let source = Rc::new(ProviderSuggestionSource::new(language.clone()));
        Self {
            editor,
            source,
            providers,
            commands,
            language,
            config: RefCell::new(InlineSuggestConfig::default()),
            typing: RefCell::new(TypingIntervalTracker::new()),
            inner: RefCell::new(ModelInner::default()),
            display: Memo::new(),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn with_config(self, config: InlineSuggestConfig) -> InlineResult<Self> {
        self.set_config(config)?;
        Ok(self)
    }

    pub fn with_source(mut self, source: Rc<dyn SuggestionSource>) -> Self {
        self.source = source;
        self
    }

    /// Measure typing speed against `clock`
    pub fn with_clock(self, clock: Rc<dyn Clock>) -> Self {
        *self.typing.borrow_mut() = TypingIntervalTracker::with_clock(clock);
        self
    }

    pub fn set_config(&self, config: InlineSuggestConfig) -> InlineResult<()> {
        ConfigLoader::validate_config(&config)?;
        debug!(enabled = config.enabled, mode = ?config.mode, "inline suggestion config updated");
        *self.config.borrow_mut() = config;
        self.inner.borrow_mut().pending.dirty = true;
        Ok(())
    }

    pub fn config(&self) -> InlineSuggestConfig {
        self.config.borrow().clone()
    }

    pub fn source(&self) -> &Rc<dyn SuggestionSource> {
        &self.source
    }

    fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Records a buffer change made by the host
    pub fn handle_content_change(&self, event: &ContentChangeEvent) {
        if self.is_disposed() {
            return;
        }
        self.typing.borrow_mut().handle_content_change(event);
        self.source.cancel_update();
        let mut tracked: Vec<Rc<Candidate>> = Vec::new();
        for set in [
            self.source.inline_completions(),
            self.source.suggest_widget_inline_completions(),
        ]
        .into_iter()
        .flatten()
        {
            for candidate in set.candidates() {
                if !tracked.iter().any(|c| Rc::ptr_eq(c, candidate)) {
                    tracked.push(candidate.clone());
                }
            }
        }
        for candidate in &tracked {
            candidate.apply_content_change(event);
        }

        let enabled = self.config.borrow().enabled;
        let mut inner = self.inner.borrow_mut();
        let undid_inline_edit = event.reason.is_undoing
            && inner.last_accepted.is_some_and(|accepted| {
                accepted.is_inline_edit && accepted.version_after + 1 == event.version_id
            });
        if undid_inline_edit {
            inner.last_accepted = None;
        }
        if event.reason.is_user_typing() && enabled {
            inner.is_active = true;
        }
        let pending = &mut inner.pending;
        pending.dirty = true;
        pending.text_change = true;
        pending.change_reason = event.reason.source.label().to_string();
        if event.reason.is_undoing
            || event.reason.is_redoing
            || event.reason.source == EditSource::InlineCompletionPartialAccept
        {
            pending.preserve_current = true;
        }
        if undid_inline_edit {
            pending.did_undo_inline_edit = true;
        }
    }

    /// Cursor moves by the user or an API stop the model, unless an inline
    /// edit is shown
    pub fn handle_cursor_change(&self, reason: CursorChangeReason) {
        if self.is_disposed() || reason == CursorChangeReason::ContentFlush {
            return;
        }
        let state = self.state();
        if state.as_ref().is_some_and(|s| s.is_inline_edit()) {
            return;
        }
        if state.is_none() && !self.is_active() {
            return;
        }
        trace!(?reason, "cursor moved");
        self.inner.borrow_mut().in_accept_flow = false;
        self.stop_with(StopReason::Automatic);
    }

    /// Suggestions were snoozed by the user
    pub fn handle_snooze(&self) {
        self.stop_with(StopReason::Automatic);
    }

    pub fn suppress_provider_group(&self, group_id: impl Into<String>) {
        self.inner.borrow_mut().suppressed_groups.insert(group_id.into());
    }

    pub fn unsuppress_provider_group(&self, group_id: &str) -> bool {
        self.inner.borrow_mut().suppressed_groups.remove(group_id)
    }

    /// Item selected in the suggest widget, `None` when the widget closes
    pub fn set_suggest_widget_item(&self, item: Option<SelectedSuggestionInfo>) {
        let mut inner = self.inner.borrow_mut();
        if inner.suggest_item != item {
            inner.suggest_item = item;
            inner.pending.dirty = true;
        }
    }

    /// Peek views hide inline edits while open
    pub fn set_peek_open(&self, open: bool) {
        self.inner.borrow_mut().peek_open = open;
    }

    /// Stops and rejects the shown suggestion
    pub fn stop(&self) {
        self.stop_with(StopReason::ExplicitCancel);
    }

    pub fn stop_with(&self, reason: StopReason) {
        if self.is_disposed() {
            return;
        }
        if reason == StopReason::ExplicitCancel {
            if let Some(candidate) = self.state().and_then(|s| s.candidate().cloned()) {
                candidate.report_end_of_life(EndOfLifeReason::Rejected);
            }
            self.inner.borrow_mut().in_accept_flow = false;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.is_active = false;
            inner.jumped_to_id = None;
        }
        self.source.clear();
        debug!(?reason, "inline suggestions stopped");
        self.events.borrow_mut().push(ModelEvent::Stopped { reason });
    }

    /// Selects the next visible completion, fetching all candidates first
    pub async fn next(&self) {
        self.cycle(1).await;
    }

    pub async fn previous(&self) {
        self.cycle(-1).await;
    }

    async fn cycle(&self, delta: isize) {
        if self.is_disposed() {
            return;
        }
        self.trigger_explicitly().await;
        let (selection, index) = self.candidate_selection();
        let count = selection.completions.len();
        let selected = (count > 0).then(|| {
            let next = (index as isize + delta).rem_euclid(count as isize) as usize;
            selection.completions[next].semantic_id().clone()
        });
        self.inner.borrow_mut().selected_id = selected;
        self.refresh_shown();
    }

    /// Current display state
    pub fn state(&self) -> Option<InlineCompletionsState> {
        if self.is_disposed() {
            return None;
        }
        let (selection, selected_index) = self.candidate_selection();
        let widget = self.source.suggest_widget_inline_completions();
        let editor = self.editor.borrow();
        let positions = positions_of(&*editor);
        let inner = self.inner.borrow();
        let config = self.config.borrow();

        let key = StateKey {
            version_id: editor.version_id(),
            positions: positions.clone(),
            is_active: inner.is_active,
            selected_index,
            completions: selection.completions.iter().map(CandidateKey::of).collect(),
            inline_edit: selection.inline_edit.as_ref().map(CandidateKey::of),
            widget: widget
                .as_ref()
                .map(|set| set.candidates().iter().map(CandidateKey::of).collect())
                .unwrap_or_default(),
            suggest_item: inner.suggest_item.clone(),
            peek_open: inner.peek_open,
            config: config.clone(),
        };
        self.display.get_or_compute(key, |_| {
            derive_state(&StateInputs {
                buffer: editor.as_text_buffer(),
                positions: &positions,
                selection: &selection,
                selected_index,
                is_active: inner.is_active,
                suggest_item: inner.suggest_item.as_ref(),
                widget_completions: widget.as_deref(),
                peek_open: inner.peek_open,
                config: &config,
            })
        })
    }

    /// Ghost texts of all cursors, primary first
    pub fn ghost_texts(&self) -> Vec<GhostTextOrReplacement> {
        self.state()
            .map(|s| s.ghost_texts().to_vec())
            .unwrap_or_default()
    }

    pub fn primary_ghost_text(&self) -> Option<GhostTextOrReplacement> {
        match self.state()? {
            InlineCompletionsState::GhostText(state) => Some(state.primary_ghost_text),
            InlineCompletionsState::InlineEdit(_) => None,
        }
    }

    /// The completion shown as ghost text
    pub fn selected_candidate(&self) -> Option<Rc<Candidate>> {
        let (selection, index) = self.candidate_selection();
        selection.completions.get(index).cloned()
    }

    /// Number of completions visible at the cursor
    pub fn candidate_count(&self) -> usize {
        self.candidate_selection().0.completions.len()
    }

    pub fn current_index(&self) -> usize {
        self.candidate_selection().1
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().is_active
    }

    /// Set after an accept or an explicit trigger, cleared by dismissal
    pub fn in_accept_flow(&self) -> bool {
        self.inner.borrow().in_accept_flow
    }

    pub fn typing_interval(&self) -> TypingInterval {
        self.typing.borrow().typing_interval()
    }

    /// Whether tab should accept the shown inline edit
    pub fn tab_should_accept_inline_edit(&self) -> bool {
        let Some(InlineCompletionsState::InlineEdit(state)) = self.state() else {
            return false;
        };
        let target = state.candidate.edit().range;
        let editor = self.editor.borrow();
        let cursor = editor.primary_position();
        let inner = self.inner.borrow();
        if inner.in_accept_flow
            && editor
                .visible_ranges()
                .iter()
                .any(|visible| visible.intersect(&target).is_some())
        {
            return true;
        }
        if target.start.line == cursor.line {
            return true;
        }
        if inner.jumped_to_id.as_ref() == Some(state.candidate.semantic_id()) {
            return true;
        }
        let in_indentation = cursor.column <= editor.line_indent_column(cursor.line);
        if in_indentation {
            return false;
        }
        state.cursor_is_near_edit
    }

    /// Whether tab should move the cursor to the shown inline edit
    pub fn tab_should_jump_to_inline_edit(&self) -> bool {
        match self.state() {
            Some(InlineCompletionsState::InlineEdit(state)) => !state.cursor_is_near_edit,
            _ => false,
        }
    }

    /// Takes the events emitted since the last call
    pub fn drain_events(&self) -> Vec<ModelEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Releases all candidates; later calls are no-ops
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.source.clear();
        self.typing.borrow_mut().dispose();
        self.display.invalidate();
        self.inner.borrow_mut().disposed = true;
        debug!("inline completions model disposed");
    }

    /// Visible completions and the index of the selected one. An id that is
    /// no longer visible is forgotten so the selection does not jump back
    /// when it reappears.
    fn candidate_selection(&self) -> (CandidateSelection, usize) {
        let set = self.source.inline_completions();
        let selection = {
            let editor = self.editor.borrow();
            select_candidates(set.as_deref(), editor.as_text_buffer(), editor.primary_position())
        };
        let mut inner = self.inner.borrow_mut();
        let index = inner.selected_id.as_ref().and_then(|id| {
            selection
                .completions
                .iter()
                .position(|c| c.semantic_id() == id)
        });
        let index = match index {
            Some(index) => index,
            None => {
                inner.selected_id = None;
                0
            }
        };
        (selection, index)
    }

    /// Reports the displayed candidate as shown and remembers where it was
    /// shown
    fn refresh_shown(&self) {
        let state = self.state();
        let candidate = state.as_ref().and_then(|s| s.candidate().cloned());
        {
            let mut inner = self.inner.borrow_mut();
            let inline_edit_id = match &state {
                Some(InlineCompletionsState::InlineEdit(s)) => Some(s.candidate.semantic_id()),
                _ => None,
            };
            if inner.jumped_to_id.is_some() && inner.jumped_to_id.as_ref() != inline_edit_id {
                inner.jumped_to_id = None;
            }
        }
        let Some(candidate) = candidate else {
            return;
        };
        let fingerprint = BufferFingerprint::of(self.editor.borrow().as_text_buffer());
        self.inner.borrow_mut().last_shown = Some(ShownInfo {
            fingerprint,
            is_inline_edit: candidate.is_inline_edit(),
        });
        if candidate.report_shown() {
            trace!(id = %candidate.semantic_id(), "suggestion shown");
            self.events.borrow_mut().push(ModelEvent::Shown {
                semantic_id: candidate.semantic_id().clone(),
                is_inline_edit: candidate.is_inline_edit(),
            });
        }
    }

    fn emit(&self, event: ModelEvent) {
        self.events.borrow_mut().push(event);
    }
}

fn positions_of(editor: &dyn Editor) -> Vec<Position> {
    let positions: Vec<Position> = editor.selections().iter().map(|s| s.active).collect();
    if positions.is_empty() {
        vec![editor.primary_position()]
    } else {
        positions
    }
}
