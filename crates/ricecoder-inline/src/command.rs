//! Commands attached to suggestions
//!
//! A suggestion may carry a command that runs after it is accepted. Command
//! failures are foreign to the engine, so the service reports them as
//! `anyhow` errors and the model only logs them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command to run on behalf of a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl Command {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Executes commands by id
#[async_trait(?Send)]
pub trait CommandService {
    async fn execute_command(&self, id: &str, arguments: &[Value]) -> anyhow::Result<Value>;
}

type CommandHandler = Rc<dyn Fn(&[Value]) -> anyhow::Result<Value>>;

/// In-process command service with registered handlers. Every execution is
/// recorded.
///
/// ```
/// # use ricecoder_inline::{CommandRegistry, CommandService};
/// # use serde_json::json;
/// let registry = CommandRegistry::new();
/// registry.register("editor.format", |_| Ok(json!("formatted")));
/// # tokio_test::block_on(async {
/// let result = registry.execute_command("editor.format", &[]).await.unwrap();
/// assert_eq!(result, json!("formatted"));
/// assert_eq!(registry.executed().len(), 1);
/// # });
/// ```
#[derive(Default)]
pub struct CommandRegistry {
    handlers: RefCell<HashMap<String, CommandHandler>>,
    executed: RefCell<Vec<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous handler for `id`
    pub fn register<F>(&self, id: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    {
        self.handlers.borrow_mut().insert(id.into(), Rc::new(handler));
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.handlers.borrow_mut().remove(id).is_some()
    }

    /// Commands executed so far, in order
    pub fn executed(&self) -> Vec<Command> {
        self.executed.borrow().clone()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.handlers.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait(?Send)]
impl CommandService for CommandRegistry {
    async fn execute_command(&self, id: &str, arguments: &[Value]) -> anyhow::Result<Value> {
        self.executed
            .borrow_mut()
            .push(Command::new(id).with_arguments(arguments.to_vec()));
        let handler = self.handlers.borrow().get(id).cloned();
        match handler {
            Some(handler) => handler(arguments),
            None => anyhow::bail!("command '{}' not found", id),
        }
    }
}
