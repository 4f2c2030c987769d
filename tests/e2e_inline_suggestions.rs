//! End-to-End Test Suite: Inline Suggestions
//!
//! Drives the inline suggestion engine the way a host editor does: a provider
//! answers requests, the host forwards content and cursor changes and reads
//! back ghost text, projected secondary edits and typing statistics.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use ricecoder_inline::{
    project_secondary_edits, CommandRegistry, DebounceConfig, EditSource, Editor,
    GhostTextOrReplacement, InMemoryEditor, InlineCompletionItem, InlineCompletionProvider,
    InlineCompletionsModel, InlineResult, InlineSuggestConfig, LanguageConfigurationRegistry,
    ManualClock, Position, ProviderRegistry, ProviderRequest, Range, TextBuffer, TextEdit,
    TypingIntervalTracker,
};

/// Provider that always answers with the same completion
struct FixedProvider {
    text: String,
}

#[async_trait(?Send)]
impl InlineCompletionProvider for FixedProvider {
    fn id(&self) -> &str {
        "fixed"
    }

    async fn provide(&self, _request: &ProviderRequest) -> InlineResult<Vec<InlineCompletionItem>> {
        Ok(vec![InlineCompletionItem::new(self.text.clone())])
    }
}

fn model_for(editor: Rc<RefCell<InMemoryEditor>>, completion: &str) -> InlineCompletionsModel {
    let registry = Rc::new(RefCell::new(ProviderRegistry::new()));
    registry.borrow_mut().register(Rc::new(FixedProvider {
        text: completion.to_string(),
    }) as Rc<dyn InlineCompletionProvider>);
    let config = InlineSuggestConfig {
        debounce: DebounceConfig {
            default_ms: 0,
            min_ms: 0,
            max_ms: 300,
            adaptive: false,
        },
        ..InlineSuggestConfig::default()
    };
    InlineCompletionsModel::new(
        editor,
        registry,
        Rc::new(CommandRegistry::new()),
        Rc::new(LanguageConfigurationRegistry::new().expect("language registry")),
    )
    .with_config(config)
    .expect("valid config")
}

/// Completing `fo` to `foo bar` shows `o bar` after the cursor and accepting
/// it writes the completion into the buffer.
#[tokio::test]
async fn test_ghost_text_completion_workflow() {
    let editor = Rc::new(RefCell::new(InMemoryEditor::new("fo")));
    editor.borrow_mut().set_position(Position::new(1, 3));
    let model = model_for(editor.clone(), "foo bar");

    model.trigger().await;

    let Some(GhostTextOrReplacement::Text(ghost)) = model.primary_ghost_text() else {
        panic!("expected ghost text");
    };
    assert_eq!(ghost.line_number, 1);
    assert_eq!(ghost.parts().len(), 1);
    assert_eq!(ghost.parts()[0].column, 3);
    assert_eq!(ghost.parts()[0].text, "o bar");
    assert_eq!(ghost.line_count(), 1);

    model.accept().await.expect("accept");

    assert_eq!(editor.borrow().value(), "foo bar");
    assert_eq!(editor.borrow().primary_position(), Position::new(1, 8));
    assert!(model.state().is_none());
}

fn buffer_with(primary_word: &str, secondary_word: &str) -> String {
    format!("0123456789{primary_word}{}{secondary_word}!", "x".repeat(37))
}

/// An edit at offset 10 is mirrored at offset 50 only when the text there
/// matches.
#[test]
fn test_secondary_cursor_projection_workflow() {
    for (secondary_word, projected) in [("foo", true), ("baz", false)] {
        let mut editor = InMemoryEditor::new(&buffer_with("foo", secondary_word));
        editor.set_cursor_offsets(&[10, 50]);
        let positions: Vec<Position> = editor.selections().iter().map(|s| s.active).collect();
        let primary = TextEdit::new(
            Range::from_positions(editor.position_at(10), editor.position_at(13)),
            "foobar",
        );

        let secondary = project_secondary_edits(&editor, &positions, &primary);

        assert_eq!(secondary.len(), 1);
        match &secondary[0] {
            Some(edit) if projected => {
                assert_eq!(editor.offset_at(edit.range.start), 50);
                assert_eq!(editor.offset_at(edit.range.end), 53);
                assert_eq!(edit.text, "foobar");

                editor.apply_edits(
                    &[primary.clone(), edit.clone()],
                    EditSource::Programmatic("multi-cursor".to_string()),
                );
                assert_eq!(editor.value(), buffer_with("foobar", "foobar"));
            }
            None if !projected => {}
            other => panic!("unexpected projection for {secondary_word:?}: {other:?}"),
        }
    }
}

/// A five second pause splits typing into two sessions
#[test]
fn test_typing_pause_workflow() {
    let clock = Rc::new(ManualClock::new(0));
    let mut tracker = TypingIntervalTracker::with_clock(clock.clone());
    let mut editor = InMemoryEditor::new("");

    for burst in 0..2 {
        if burst > 0 {
            clock.advance(5_000);
        }
        for _ in 0..12 {
            clock.advance(110);
            let event = editor.type_text("a");
            tracker.handle_content_change(&event);
        }
    }
    tracker.dispose();

    let sessions: Vec<_> = tracker.sessions().copied().collect();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.duration() >= 1_000));
    assert_eq!(editor.value(), "a".repeat(24));
}
