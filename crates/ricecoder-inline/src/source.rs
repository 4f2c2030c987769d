//! Suggestion providers and the source that fetches from them
//!
//! Providers are asynchronous and may answer after the buffer moved on, so
//! every fetch carries a generation number: a fetch whose generation is no
//! longer current discards its results. The source keeps two candidate
//! sets, one for regular requests and one for requests made while the
//! suggest widget has a selected item.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::buffer::{BufferSnapshot, TextBuffer};
use crate::candidate::{
    Candidate, EndOfLifeReason, InlineCompletionItem, PartialAcceptInfo, SemanticId,
};
use crate::error::InlineResult;
use crate::language::LanguageConfigurationService;
use crate::snippet::snippet_to_plain_text;
use crate::types::{Position, Range, TextEdit};
use crate::typing::TypingInterval;

/// How a fetch was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    /// Started by typing or other buffer changes
    #[default]
    Automatic,
    /// Requested by the user
    Explicit,
}

/// The item selected in the suggest widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSuggestionInfo {
    pub range: Range,
    pub text: String,
    pub is_snippet: bool,
}

impl SelectedSuggestionInfo {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
            is_snippet: false,
        }
    }

    /// Edit the widget would apply, with snippet syntax flattened
    pub fn single_text_edit(&self) -> TextEdit {
        let text = if self.is_snippet {
            snippet_to_plain_text(&self.text)
        } else {
            self.text.clone()
        };
        TextEdit::new(self.range, text)
    }
}

/// What a fetch asks providers for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineCompletionContext {
    pub trigger_kind: TriggerKind,
    pub selected_suggestion_info: Option<SelectedSuggestionInfo>,
    pub include_inline_completions: bool,
    pub include_inline_edits: bool,
}

impl Default for InlineCompletionContext {
    fn default() -> Self {
        Self {
            trigger_kind: TriggerKind::Automatic,
            selected_suggestion_info: None,
            include_inline_completions: true,
            include_inline_edits: true,
        }
    }
}

/// Request passed to each provider
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub buffer: BufferSnapshot,
    pub position: Position,
    pub context: InlineCompletionContext,
}

/// Produces inline suggestions and receives lifecycle notifications about
/// them
#[async_trait(?Send)]
pub trait InlineCompletionProvider {
    fn id(&self) -> &str;

    /// Group used to suppress related providers together
    fn group_id(&self) -> Option<&str> {
        None
    }

    /// Items stay displayed across refetches that no longer return them
    fn forward_stable(&self) -> bool {
        false
    }

    async fn provide(&self, request: &ProviderRequest) -> InlineResult<Vec<InlineCompletionItem>>;

    fn handle_item_did_show(&self, _candidate: &Candidate) {}

    fn handle_partial_accept(&self, _candidate: &Candidate, _info: &PartialAcceptInfo) {}

    fn handle_end_of_life(&self, _candidate: &Candidate, _reason: &EndOfLifeReason) {}

    fn handle_disposed(&self, _candidate: &Candidate) {}
}

/// Registry of inline completion providers, queried in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Rc<dyn InlineCompletionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing one with the same id in place
    pub fn register(&mut self, provider: Rc<dyn InlineCompletionProvider>) {
        match self.providers.iter().position(|p| p.id() == provider.id()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.id() != id);
        before != self.providers.len()
    }

    pub fn get(&self, id: &str) -> Option<Rc<dyn InlineCompletionProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn all(&self) -> Vec<Rc<dyn InlineCompletionProvider>> {
        self.providers.clone()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.id()))
            .finish()
    }
}

/// Diagnostics attached to a fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub reason: String,
    pub language_id: String,
    pub typing_interval: TypingInterval,
    /// Set when only one provider is queried
    pub provider_label: Option<String>,
}

/// A fetch as issued by the model
#[derive(Clone)]
pub struct FetchRequest {
    pub providers: Vec<Rc<dyn InlineCompletionProvider>>,
    pub buffer: BufferSnapshot,
    pub position: Position,
    pub context: InlineCompletionContext,
    /// Candidate kept if the providers stop returning it
    pub identity_to_preserve: Option<SemanticId>,
    /// Delay before querying providers; `None` queries immediately
    pub debounce: Option<Duration>,
    /// The user jumped to the preserved inline edit
    pub user_jumped: bool,
    pub provider_specific: bool,
    pub info: RequestInfo,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("providers", &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>())
            .field("position", &self.position)
            .field("context", &self.context)
            .field("identity_to_preserve", &self.identity_to_preserve)
            .field("debounce", &self.debounce)
            .field("info", &self.info)
            .finish()
    }
}

/// Candidates produced by one fetch. The set owns one reference on each
/// candidate and releases it when dropped.
#[derive(Debug)]
pub struct CandidateSet {
    candidates: Vec<Rc<Candidate>>,
    request_position: Position,
    context: InlineCompletionContext,
}

impl CandidateSet {
    fn new(
        candidates: Vec<Rc<Candidate>>,
        request_position: Position,
        context: InlineCompletionContext,
    ) -> Self {
        Self {
            candidates,
            request_position,
            context,
        }
    }

    pub fn candidates(&self) -> &[Rc<Candidate>] {
        &self.candidates
    }

    pub fn find(&self, id: &SemanticId) -> Option<&Rc<Candidate>> {
        self.candidates.iter().find(|c| c.semantic_id() == id)
    }

    pub fn request_position(&self) -> Position {
        self.request_position
    }

    pub fn context(&self) -> &InlineCompletionContext {
        &self.context
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Drop for CandidateSet {
    fn drop(&mut self) {
        for candidate in &self.candidates {
            candidate.remove_ref();
        }
    }
}

/// Fetches and holds the current candidate sets
#[async_trait(?Send)]
pub trait SuggestionSource {
    /// Fetch from `request.providers`; resolves to whether the candidate
    /// set was replaced, `false` when the fetch was superseded
    async fn fetch(&self, request: FetchRequest) -> InlineResult<bool>;

    /// Invalidate the in-flight fetch
    fn cancel_update(&self);

    /// Drop both candidate sets
    fn clear(&self);

    fn inline_completions(&self) -> Option<Rc<CandidateSet>>;

    fn suggest_widget_inline_completions(&self) -> Option<Rc<CandidateSet>>;

    /// Promote the suggest widget set to the regular set
    fn seed_inline_completions_with_suggest_widget(&self);

    fn clear_suggest_widget_inline_completions(&self);

    fn is_loading(&self) -> bool;
}

/// [`SuggestionSource`] querying providers sequentially in registration
/// order
pub struct ProviderSuggestionSource {
    language: Rc<dyn LanguageConfigurationService>,
    inline: RefCell<Option<Rc<CandidateSet>>>,
    widget: RefCell<Option<Rc<CandidateSet>>>,
    generation: Cell<u64>,
    loading: Cell<bool>,
}

impl ProviderSuggestionSource {
    pub fn new(language: Rc<dyn LanguageConfigurationService>) -> Self {
        Self {
            language,
            inline: RefCell::new(None),
            widget: RefCell::new(None),
            generation: Cell::new(0),
            loading: Cell::new(false),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }

    fn collect_candidates(
        &self,
        request: &FetchRequest,
        fetched: Vec<(Rc<dyn InlineCompletionProvider>, Vec<InlineCompletionItem>)>,
        previous: Option<&CandidateSet>,
    ) -> Vec<Rc<Candidate>> {
        let word = self.language.word_definition(request.buffer.language_id());
        let mut candidates: Vec<Rc<Candidate>> = Vec::new();
        for (provider, items) in fetched {
            for item in items {
                let wanted = if item.is_inline_edit {
                    request.context.include_inline_edits
                } else {
                    request.context.include_inline_completions
                };
                if !wanted {
                    continue;
                }
                let candidate = match Candidate::from_item(
                    item,
                    provider.clone(),
                    &request.buffer,
                    request.position,
                    word,
                ) {
                    Ok(candidate) => candidate,
                    Err(err) => {
                        warn!(provider = provider.id(), error = %err, "skipping inline completion item");
                        continue;
                    }
                };
                if candidates.iter().any(|c| c.semantic_id() == candidate.semantic_id()) {
                    continue;
                }
                let existing = previous
                    .and_then(|set| set.find(candidate.semantic_id()))
                    .filter(|c| !c.is_disposed())
                    .cloned();
                match existing {
                    Some(existing) => {
                        existing.add_ref();
                        candidates.push(existing);
                    }
                    None => candidates.push(Rc::new(candidate)),
                }
            }
        }

        if let Some(id) = &request.identity_to_preserve {
            if !candidates.iter().any(|c| c.semantic_id() == id) {
                let preserved = self
                    .inline
                    .borrow()
                    .as_ref()
                    .and_then(|set| set.find(id).cloned());
                if let Some(preserved) = preserved.filter(|c| {
                    !c.is_disposed()
                        && (request.user_jumped || c.can_be_reused(&request.buffer, request.position))
                }) {
                    trace!(id = %preserved.semantic_id(), "preserving current suggestion");
                    preserved.add_ref();
                    candidates.insert(0, preserved);
                }
            }
        }
        candidates
    }
}

impl std::fmt::Debug for ProviderSuggestionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSuggestionSource")
            .field("generation", &self.generation.get())
            .field("loading", &self.loading.get())
            .finish()
    }
}

#[async_trait(?Send)]
impl SuggestionSource for ProviderSuggestionSource {
    async fn fetch(&self, request: FetchRequest) -> InlineResult<bool> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.loading.set(true);
        debug!(
            generation,
            reason = %request.info.reason,
            providers = request.providers.len(),
            "fetching inline completions"
        );

        if let Some(delay) = request.debounce {
            tokio::time::sleep(delay).await;
            if !self.is_current(generation) {
                trace!(generation, "fetch superseded during debounce");
                return Ok(false);
            }
        }

        let provider_request = ProviderRequest {
            buffer: request.buffer.clone(),
            position: request.position,
            context: request.context.clone(),
        };
        let mut fetched = Vec::with_capacity(request.providers.len());
        for provider in &request.providers {
            match provider.provide(&provider_request).await {
                Ok(items) => fetched.push((provider.clone(), items)),
                Err(err) => warn!(provider = provider.id(), error = %err, "inline completion provider failed"),
            }
            if !self.is_current(generation) {
                trace!(generation, "fetch superseded while querying providers");
                return Ok(false);
            }
        }

        let for_widget = request.context.selected_suggestion_info.is_some();
        let slot = if for_widget { &self.widget } else { &self.inline };
        let previous = slot.borrow().clone();
        let mut candidates = self.collect_candidates(&request, fetched, previous.as_deref());
        if request.provider_specific {
            if let Some(previous) = &previous {
                carry_over_unqueried(&mut candidates, previous, &request.providers);
            }
        }

        if let Some(previous) = &previous {
            let superseded_by = candidates.first().map(|c| c.semantic_id().clone());
            for old in previous.candidates() {
                if !candidates.iter().any(|c| Rc::ptr_eq(c, old)) {
                    old.report_end_of_life(EndOfLifeReason::Ignored {
                        superseded_by: superseded_by.clone(),
                    });
                }
            }
        }

        debug!(generation, count = candidates.len(), for_widget, "inline completions updated");
        let set = Rc::new(CandidateSet::new(candidates, request.position, request.context));
        let replaced = slot.replace(Some(set));
        drop(previous);
        drop(replaced);
        self.loading.set(false);
        Ok(true)
    }

    fn cancel_update(&self) {
        self.generation.set(self.generation.get() + 1);
        self.loading.set(false);
    }

    fn clear(&self) {
        self.cancel_update();
        let inline = self.inline.replace(None);
        let widget = self.widget.replace(None);
        drop(inline);
        drop(widget);
    }

    fn inline_completions(&self) -> Option<Rc<CandidateSet>> {
        self.inline.borrow().clone()
    }

    fn suggest_widget_inline_completions(&self) -> Option<Rc<CandidateSet>> {
        self.widget.borrow().clone()
    }

    fn seed_inline_completions_with_suggest_widget(&self) {
        let widget = self.widget.replace(None);
        if widget.is_some() {
            let replaced = self.inline.replace(widget);
            drop(replaced);
        }
    }

    fn clear_suggest_widget_inline_completions(&self) {
        let widget = self.widget.replace(None);
        drop(widget);
    }

    fn is_loading(&self) -> bool {
        self.loading.get()
    }
}

/// Keeps the candidates of providers a single-provider fetch did not query
fn carry_over_unqueried(
    candidates: &mut Vec<Rc<Candidate>>,
    previous: &CandidateSet,
    queried: &[Rc<dyn InlineCompletionProvider>],
) {
    for old in previous.candidates() {
        let was_queried = queried.iter().any(|p| p.id() == old.provider_id());
        if was_queried
            || old.is_disposed()
            || candidates.iter().any(|c| c.semantic_id() == old.semantic_id())
        {
            continue;
        }
        old.add_ref();
        candidates.push(old.clone());
    }
}
