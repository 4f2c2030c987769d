//! RiceCoder Inline Suggestions
//!
//! Lifecycle engine for suggestions rendered inside the buffer: ghost text
//! after the cursor and inline edits that rewrite nearby code.
//!
//! # Architecture
//!
//! 1. **Buffer Layer**: [`TextBuffer`] and [`Editor`] abstract the host editor;
//!    [`InMemoryEditor`] is a headless implementation with undo and multi-cursor support
//! 2. **Provider Layer**: [`InlineCompletionProvider`]s answer [`ProviderRequest`]s and are
//!    collected in a [`ProviderRegistry`]
//! 3. **Source Layer**: [`ProviderSuggestionSource`] debounces and queries providers and
//!    keeps the resulting [`CandidateSet`]s
//! 4. **Rendering Layer**: [`compute_ghost_text`] turns an edit into [`GhostText`] or a
//!    [`GhostTextReplacement`]; [`project_secondary_edits`] repeats it at secondary cursors
//! 5. **Orchestration Layer**: [`InlineCompletionsModel`] decides when to fetch, derives the
//!    displayed [`InlineCompletionsState`] and performs accept, partial accept and jump
//!
//! # Typing Speed
//!
//! [`TypingIntervalTracker`] groups typing into sessions and reports the average
//! interval between keystrokes, which [`DebounceConfig`] uses to pick the fetch delay.
//!
//! # Configuration
//!
//! [`InlineSuggestConfig`] is loaded from YAML or JSON through [`ConfigLoader`]:
//!
//! ```yaml
//! enabled: true
//! mode: subwordSmart
//! suggest_preview: true
//! ```
//!
//! # Threading
//!
//! The engine is single-threaded: candidates are shared through `Rc` and
//! providers run on the current task (`#[async_trait(?Send)]`).
pub mod buffer;
pub mod candidate;
pub mod command;
pub mod config;
pub mod error;
pub mod ghost_text;
pub mod language;
pub mod memo;
pub mod memory;
pub mod model;
pub mod projection;
pub mod snippet;
pub mod source;
pub mod text;
pub mod types;
pub mod typing;

pub use buffer::{
    BufferFingerprint, BufferSnapshot, ChangeReason, ContentChange, ContentChangeEvent,
    CursorChangeReason, EditSource, Editor, EditorId, EndOfLine, Selection, TextBuffer,
};
pub use candidate::{
    Candidate, CandidateRef, DisplayLocation, EndOfLifeReason, InlineCompletionItem,
    PartialAcceptInfo, PartialAcceptKind, SemanticId,
};
pub use command::{Command, CommandRegistry, CommandService};
pub use config::{ConfigFormat, ConfigLoader, DebounceConfig, InlineSuggestConfig};
pub use error::{InlineError, InlineResult};
pub use ghost_text::{
    compute_ghost_text, ghost_text_or_replacement_equals, ghost_texts_equal, GhostText,
    GhostTextMode, GhostTextOrReplacement, GhostTextPart, GhostTextReplacement,
};
pub use language::{
    default_replace_range, word_at_column, LanguageConfigurationRegistry,
    LanguageConfigurationService, WordAtPosition, DEFAULT_WORD_PATTERN,
};
pub use memo::Memo;
pub use memory::InMemoryEditor;
pub use model::{
    GhostTextState, InlineCompletionsModel, InlineCompletionsState, InlineEditState, ModelEvent,
    StopReason, TriggerOptions,
};
pub use projection::project_secondary_edits;
pub use snippet::{parse_snippet, snippet_to_plain_text, ParsedSnippet, SnippetInfo, TabStop};
pub use source::{
    CandidateSet, FetchRequest, InlineCompletionContext, InlineCompletionProvider,
    ProviderRegistry, ProviderRequest, ProviderSuggestionSource, RequestInfo,
    SelectedSuggestionInfo, SuggestionSource, TriggerKind,
};
pub use text::TextSnapshot;
pub use types::{
    end_positions_after_applying, modified_ranges_after_applying, ColumnRange, LineRange,
    OffsetRange, Position, Range, TextEdit, TextLength,
};
pub use typing::{
    Clock, ManualClock, SystemClock, TypingInterval, TypingIntervalTracker, TypingSession,
    MAX_SESSION_GAP_MS, MIN_CHARS_FOR_RELIABLE_SPEED, MIN_SESSION_DURATION_MS,
    SESSION_HISTORY_LIMIT, TYPING_SPEED_WINDOW_MS,
};
