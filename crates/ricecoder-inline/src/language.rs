//! Word definitions per language
//!
//! Partial acceptance and default replace ranges need to know what a word
//! is. Languages may register their own word pattern; all others use the
//! generic pattern below.

use std::collections::HashMap;

use regex::Regex;

use crate::buffer::TextBuffer;
use crate::error::InlineResult;
use crate::types::{Position, Range};

/// Numbers like `-1.5e3` or runs of characters that are not separators
pub const DEFAULT_WORD_PATTERN: &str =
    r#"(-?\d*\.\d\w*)|([^`~!@#$%^&*()\-=+\[{\]}\\|;:'",.<>/?\s]+)"#;

/// Provides word definitions by language id
pub trait LanguageConfigurationService {
    /// Word pattern for a language
    fn word_definition(&self, language_id: &str) -> &Regex;
}

/// Language configuration backed by a map of compiled patterns
#[derive(Debug, Clone)]
pub struct LanguageConfigurationRegistry {
    default_word: Regex,
    words: HashMap<String, Regex>,
}

impl LanguageConfigurationRegistry {
    pub fn new() -> InlineResult<Self> {
        Ok(Self {
            default_word: Regex::new(DEFAULT_WORD_PATTERN)?,
            words: HashMap::new(),
        })
    }

    /// Register a word pattern for a language
    pub fn register_word_pattern(
        &mut self,
        language_id: &str,
        pattern: &str,
    ) -> InlineResult<()> {
        let regex = Regex::new(pattern)?;
        self.words.insert(language_id.to_string(), regex);
        Ok(())
    }
}

impl LanguageConfigurationService for LanguageConfigurationRegistry {
    fn word_definition(&self, language_id: &str) -> &Regex {
        self.words.get(language_id).unwrap_or(&self.default_word)
    }
}

/// A word found on a line; columns are 1-based, end exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAtPosition {
    pub word: String,
    pub start_column: u32,
    pub end_column: u32,
}

/// Word touching `column` on `line_text`
pub fn word_at_column(line_text: &str, column: u32, word: &Regex) -> Option<WordAtPosition> {
    let offset = (column.max(1) - 1) as usize;
    for m in word.find_iter(line_text) {
        let start = line_text[..m.start()].chars().count();
        let len = m.as_str().chars().count();
        if start <= offset && offset <= start + len {
            return Some(WordAtPosition {
                word: m.as_str().to_string(),
                start_column: start as u32 + 1,
                end_column: (start + len) as u32 + 1,
            });
        }
    }
    None
}

/// Range replaced by a suggestion that does not declare one: from the start
/// of the word at the cursor (or the cursor) to the end of the line
pub fn default_replace_range(buffer: &dyn TextBuffer, position: Position, word: &Regex) -> Range {
    let line_text = buffer.line_content(position.line);
    let end = Position::new(position.line, buffer.line_length(position.line) + 1);
    match word_at_column(&line_text, position.column, word) {
        Some(w) => Range::from_positions(Position::new(position.line, w.start_column), end),
        None => Range::from_positions(position, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEditor;

    #[test]
    fn test_default_word_pattern() {
        let registry = LanguageConfigurationRegistry::new().unwrap();
        let word = registry.word_definition("rust");
        let found: Vec<&str> = word.find_iter("let foo_bar = -1.5;").map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["let", "foo_bar", "-1.5"]);
    }

    #[test]
    fn test_registered_pattern_wins() {
        let mut registry = LanguageConfigurationRegistry::new().unwrap();
        registry.register_word_pattern("css", r"[\w-]+").unwrap();
        let word = registry.word_definition("css");
        assert_eq!(word.find("font-size: 1px").unwrap().as_str(), "font-size");
        assert!(registry.register_word_pattern("bad", "(").is_err());
    }

    #[test]
    fn test_word_at_column() {
        let registry = LanguageConfigurationRegistry::new().unwrap();
        let word = registry.word_definition("plaintext");
        let found = word_at_column("call(arg)", 8, word).unwrap();
        assert_eq!(found.word, "arg");
        assert_eq!(found.start_column, 6);
        assert_eq!(found.end_column, 9);
        assert!(word_at_column("a  b", 3, word).is_none());
    }

    #[test]
    fn test_default_replace_range() {
        let registry = LanguageConfigurationRegistry::new().unwrap();
        let word = registry.word_definition("plaintext");
        let editor = InMemoryEditor::new("let valu;");
        let range = default_replace_range(&editor, Position::new(1, 9), word);
        assert_eq!(range, Range::new(1, 5, 1, 10));
    }
}
