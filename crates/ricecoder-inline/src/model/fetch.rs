//! Fetch decisions
//!
//! Input changes accumulate in a [`ChangeSummary`] until the next
//! [`InlineCompletionsModel::update`], which turns them into at most one
//! fetch.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::InlineCompletionsModel;
use crate::buffer::{BufferFingerprint, BufferSnapshot, TextBuffer};
use crate::source::{FetchRequest, InlineCompletionContext, RequestInfo, TriggerKind};

/// Inputs changed since the last fetch decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChangeSummary {
    pub dirty: bool,
    pub dont_refetch: bool,
    pub preserve_current: bool,
    pub trigger_kind: TriggerKind,
    pub only_inline_edits: bool,
    pub should_debounce: bool,
    pub provider: Option<String>,
    pub text_change: bool,
    pub change_reason: String,
    pub did_undo_inline_edit: bool,
}

impl Default for ChangeSummary {
    fn default() -> Self {
        Self {
            dirty: false,
            dont_refetch: false,
            preserve_current: false,
            trigger_kind: TriggerKind::Automatic,
            only_inline_edits: false,
            should_debounce: true,
            provider: None,
            text_change: false,
            change_reason: String::new(),
            did_undo_inline_edit: false,
        }
    }
}

/// Options for [`InlineCompletionsModel::trigger_with`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerOptions {
    /// Ask providers for inline edits only
    pub only_fetch_inline_edits: bool,
    /// Skip the debounce delay
    pub no_delay: bool,
    /// Query only this provider
    pub provider: Option<String>,
    /// Treat as a user request
    pub explicit: bool,
}

impl TriggerOptions {
    pub fn explicit() -> Self {
        Self {
            explicit: true,
            ..Self::default()
        }
    }

    pub fn for_provider(id: impl Into<String>) -> Self {
        Self {
            provider: Some(id.into()),
            ..Self::default()
        }
    }
}

enum FetchPlan {
    Idle,
    Fetch(Box<FetchRequest>),
}

impl InlineCompletionsModel {
    fn plan_fetch(&self) -> FetchPlan {
        let summary = {
            let mut inner = self.inner.borrow_mut();
            if !inner.pending.dirty {
                return FetchPlan::Idle;
            }
            std::mem::take(&mut inner.pending)
        };

        let (should_update, has_suggest_item) = {
            let inner = self.inner.borrow();
            let enabled = self.config.borrow().enabled;
            let has_item = inner.suggest_item.is_some();
            ((enabled && has_item) || inner.is_active, has_item)
        };
        if !should_update {
            trace!("not active, dropping inline completions");
            self.source.cancel_update();
            self.source.clear();
            return FetchPlan::Idle;
        }

        if self.source.suggest_widget_inline_completions().is_some() && !has_suggest_item {
            self.source.seed_inline_completions_with_suggest_widget();
        }

        if summary.dont_refetch {
            trace!("keeping current inline completions");
            return FetchPlan::Idle;
        }

        if summary.did_undo_inline_edit && summary.trigger_kind != TriggerKind::Explicit {
            debug!("accepted inline edit was undone, clearing");
            self.source.clear();
            self.inner.borrow_mut().is_active = false;
            return FetchPlan::Idle;
        }

        let mut reason = String::new();
        if summary.provider.is_some() {
            reason.push_str("providerOnDidChange");
        } else if summary.trigger_kind == TriggerKind::Explicit {
            reason.push_str("explicit");
        }
        if !summary.change_reason.is_empty() {
            if !reason.is_empty() {
                reason.push(':');
            }
            reason.push_str(&summary.change_reason);
        }

        let config = self.config.borrow().clone();
        let (buffer, position) = {
            let editor = self.editor.borrow();
            (
                BufferSnapshot::capture(editor.as_text_buffer()),
                editor.primary_position(),
            )
        };

        let mut context = InlineCompletionContext {
            trigger_kind: summary.trigger_kind,
            selected_suggestion_info: self.inner.borrow().suggest_item.clone(),
            include_inline_completions: !summary.only_inline_edits,
            include_inline_edits: config.show_inline_edits,
        };
        if summary.trigger_kind == TriggerKind::Automatic && summary.text_change {
            let fingerprint = BufferFingerprint::of(&buffer);
            if let Some(shown) = self.inner.borrow().last_shown.as_ref() {
                if shown.fingerprint == fingerprint {
                    trace!(is_inline_edit = shown.is_inline_edit, "returned to a shown state");
                    context.include_inline_completions = !shown.is_inline_edit;
                    context.include_inline_edits = shown.is_inline_edit;
                }
            }
        }

        let (selection, index) = self.candidate_selection();
        let preserve_candidate = selection
            .completions
            .get(index)
            .cloned()
            .or_else(|| selection.inline_edit.clone());
        let identity_to_preserve = preserve_candidate
            .as_ref()
            .filter(|c| summary.preserve_current || c.is_forward_stable())
            .map(|c| c.semantic_id().clone());
        let user_jumped = match (&self.inner.borrow().jumped_to_id, &selection.inline_edit) {
            (Some(jumped), Some(edit)) => jumped == edit.semantic_id(),
            _ => false,
        };

        let providers = {
            let registry = self.providers.borrow();
            match &summary.provider {
                Some(id) => match registry.get(id) {
                    Some(provider) => vec![provider],
                    None => {
                        warn!(provider = %id, "change signalled by unknown provider");
                        Vec::new()
                    }
                },
                None => registry.all(),
            }
        };
        let suppressed = {
            let inner = self.inner.borrow();
            let mut groups = inner.suppressed_groups.clone();
            groups.extend(config.suppressed_provider_groups.iter().cloned());
            groups
        };
        let providers = providers
            .into_iter()
            .filter(|p| p.group_id().map_or(true, |group| !suppressed.contains(group)))
            .collect::<Vec<_>>();

        let typing_interval = self.typing.borrow().typing_interval();
        let language_id = buffer.language_id().to_string();
        let provider_specific = summary.provider.is_some();
        let debounce = summary
            .should_debounce
            .then(|| Duration::from_millis(config.debounce.resolve(typing_interval)));

        debug!(
            reason = %reason,
            providers = providers.len(),
            preserve = identity_to_preserve.is_some(),
            debounce_ms = debounce.map(|d| d.as_millis() as u64),
            "requesting inline completions"
        );
        FetchPlan::Fetch(Box::new(FetchRequest {
            providers,
            info: RequestInfo {
                reason,
                language_id,
                typing_interval,
                provider_label: summary.provider.map(|id| format!("single:{}", id)),
            },
            buffer,
            position,
            context,
            identity_to_preserve,
            debounce,
            user_jumped,
            provider_specific,
        }))
    }

    /// Runs the fetch decision for the inputs changed since the last call
    /// and awaits the resulting fetch
    pub async fn update(&self) {
        if self.is_disposed() {
            return;
        }
        let request = match self.plan_fetch() {
            FetchPlan::Idle => {
                self.refresh_shown();
                return;
            }
            FetchPlan::Fetch(request) => request,
        };
        match self.source.fetch(*request).await {
            Ok(true) => {
                if self.state().is_none() && !self.source.is_loading() {
                    trace!("no usable inline completion");
                    self.inner.borrow_mut().is_active = false;
                }
            }
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "inline completion fetch failed");
                self.source.clear();
                self.inner.borrow_mut().is_active = false;
            }
        }
        self.refresh_shown();
    }

    /// Activates the model and fetches
    pub async fn trigger(&self) {
        self.trigger_with(TriggerOptions::default()).await;
    }

    /// Fetches on user request, without debounce
    pub async fn trigger_explicitly(&self) {
        self.trigger_with(TriggerOptions::explicit()).await;
    }

    pub async fn trigger_with(&self, options: TriggerOptions) {
        if self.is_disposed() {
            return;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.is_active = true;
            let pending = &mut inner.pending;
            pending.dirty = true;
            if options.only_fetch_inline_edits {
                pending.only_inline_edits = true;
            }
            if options.no_delay {
                pending.should_debounce = false;
            }
            if let Some(provider) = options.provider {
                pending.provider = Some(provider);
                pending.should_debounce = false;
            }
            if options.explicit {
                pending.trigger_kind = TriggerKind::Explicit;
                pending.preserve_current = true;
                pending.should_debounce = false;
                inner.in_accept_flow = true;
            }
        }
        self.update().await;
    }

    /// Refetches after providers changed. Only an active model refetches;
    /// with a provider id only that provider is queried.
    pub async fn handle_providers_changed(&self, provider_id: Option<&str>) {
        if self.is_disposed() || !self.inner.borrow().is_active {
            return;
        }
        match provider_id {
            Some(id) => self.trigger_with(TriggerOptions::for_provider(id)).await,
            None => {
                self.inner.borrow_mut().pending.dirty = true;
                self.update().await;
            }
        }
    }
}
