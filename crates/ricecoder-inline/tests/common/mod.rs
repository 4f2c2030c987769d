//! Shared fixtures for the inline suggestion integration tests
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use ricecoder_inline::{
    Candidate, CommandRegistry, DebounceConfig, Editor, EndOfLifeReason, InMemoryEditor,
    InlineCompletionContext, InlineCompletionItem, InlineCompletionProvider,
    InlineCompletionsModel, InlineError, InlineResult, InlineSuggestConfig,
    LanguageConfigurationRegistry, PartialAcceptInfo, Position, ProviderRegistry,
    ProviderRequest, TextBuffer,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Provider returning a configurable item list and recording every
/// lifecycle notification
pub struct TestProvider {
    id: String,
    group: Option<String>,
    forward_stable: bool,
    fail: Cell<bool>,
    items: RefCell<Vec<InlineCompletionItem>>,
    pub requests: RefCell<Vec<(Position, InlineCompletionContext)>>,
    pub shown: Cell<usize>,
    pub partial_accepts: RefCell<Vec<PartialAcceptInfo>>,
    pub end_of_life: RefCell<Vec<(String, EndOfLifeReason)>>,
    pub disposed: Cell<usize>,
}

impl TestProvider {
    pub fn new(id: &str, items: Vec<InlineCompletionItem>) -> Rc<Self> {
        Rc::new(Self::build(id, None, false, items))
    }

    pub fn in_group(id: &str, group: &str, items: Vec<InlineCompletionItem>) -> Rc<Self> {
        Rc::new(Self::build(id, Some(group.to_string()), false, items))
    }

    pub fn forward_stable(id: &str, items: Vec<InlineCompletionItem>) -> Rc<Self> {
        Rc::new(Self::build(id, None, true, items))
    }

    fn build(
        id: &str,
        group: Option<String>,
        forward_stable: bool,
        items: Vec<InlineCompletionItem>,
    ) -> Self {
        Self {
            id: id.to_string(),
            group,
            forward_stable,
            fail: Cell::new(false),
            items: RefCell::new(items),
            requests: RefCell::new(Vec::new()),
            shown: Cell::new(0),
            partial_accepts: RefCell::new(Vec::new()),
            end_of_life: RefCell::new(Vec::new()),
            disposed: Cell::new(0),
        }
    }

    pub fn set_items(&self, items: Vec<InlineCompletionItem>) {
        *self.items.borrow_mut() = items;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_context(&self) -> Option<InlineCompletionContext> {
        self.requests.borrow().last().map(|(_, context)| context.clone())
    }

    pub fn end_of_life_reasons(&self) -> Vec<EndOfLifeReason> {
        self.end_of_life
            .borrow()
            .iter()
            .map(|(_, reason)| reason.clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl InlineCompletionProvider for TestProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn group_id(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn forward_stable(&self) -> bool {
        self.forward_stable
    }

    async fn provide(&self, request: &ProviderRequest) -> InlineResult<Vec<InlineCompletionItem>> {
        self.requests
            .borrow_mut()
            .push((request.position, request.context.clone()));
        if self.fail.get() {
            return Err(InlineError::provider_error("provider unavailable"));
        }
        Ok(self.items.borrow().clone())
    }

    fn handle_item_did_show(&self, _candidate: &Candidate) {
        self.shown.set(self.shown.get() + 1);
    }

    fn handle_partial_accept(&self, _candidate: &Candidate, info: &PartialAcceptInfo) {
        self.partial_accepts.borrow_mut().push(*info);
    }

    fn handle_end_of_life(&self, candidate: &Candidate, reason: &EndOfLifeReason) {
        self.end_of_life
            .borrow_mut()
            .push((candidate.insert_text().to_string(), reason.clone()));
    }

    fn handle_disposed(&self, _candidate: &Candidate) {
        self.disposed.set(self.disposed.get() + 1);
    }
}

/// Configuration without fetch delay
pub fn immediate_config() -> InlineSuggestConfig {
    InlineSuggestConfig {
        debounce: DebounceConfig {
            default_ms: 0,
            min_ms: 0,
            max_ms: 300,
            adaptive: false,
        },
        ..InlineSuggestConfig::default()
    }
}

pub struct Harness {
    pub editor: Rc<RefCell<InMemoryEditor>>,
    pub registry: Rc<RefCell<ProviderRegistry>>,
    pub commands: Rc<CommandRegistry>,
    pub model: InlineCompletionsModel,
}

impl Harness {
    pub fn new(text: &str, providers: &[&Rc<TestProvider>]) -> Self {
        Self::with_config(text, providers, immediate_config())
    }

    pub fn with_config(
        text: &str,
        providers: &[&Rc<TestProvider>],
        config: InlineSuggestConfig,
    ) -> Self {
        init_tracing();
        let editor = Rc::new(RefCell::new(InMemoryEditor::new(text)));
        let registry = Rc::new(RefCell::new(ProviderRegistry::new()));
        for provider in providers {
            registry
                .borrow_mut()
                .register(Rc::clone(*provider) as Rc<dyn InlineCompletionProvider>);
        }
        let commands = Rc::new(CommandRegistry::new());
        let language = Rc::new(LanguageConfigurationRegistry::new().unwrap());
        let model = InlineCompletionsModel::new(
            editor.clone(),
            registry.clone(),
            commands.clone(),
            language,
        )
        .with_config(config)
        .unwrap();
        Self {
            editor,
            registry,
            commands,
            model,
        }
    }

    /// Moves the caret to the end of the document
    pub fn cursor_at_end(&self) {
        let mut editor = self.editor.borrow_mut();
        let last_line = editor.line_count();
        let column = editor.line_length(last_line) + 1;
        editor.set_position(Position::new(last_line, column));
    }

    /// Types at every cursor and lets the model react
    pub async fn type_text(&self, text: &str) {
        let event = self.editor.borrow_mut().type_text(text);
        self.model.handle_content_change(&event);
        self.model.update().await;
    }

    pub fn undo(&self) {
        let event = self.editor.borrow_mut().undo();
        if let Some(event) = event {
            self.model.handle_content_change(&event);
        }
    }

    pub fn text(&self) -> String {
        self.editor.borrow().value()
    }

    pub fn position(&self) -> Position {
        self.editor.borrow().primary_position()
    }
}
