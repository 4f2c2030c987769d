//! Configuration loading and validation for inline suggestions

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InlineError, InlineResult};
use crate::ghost_text::GhostTextMode;
use crate::typing::TypingInterval;

/// Fetch debounce settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Delay used when the typing speed is unknown
    pub default_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    /// Follow the measured typing speed
    pub adaptive: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            default_ms: 75,
            min_ms: 30,
            max_ms: 300,
            adaptive: true,
        }
    }
}

impl DebounceConfig {
    /// Delay for the next debounced fetch
    pub fn resolve(&self, typing: TypingInterval) -> u64 {
        if self.adaptive && typing.is_reliable() {
            typing.average_interval_ms.clamp(self.min_ms, self.max_ms)
        } else {
            self.default_ms
        }
    }
}

/// Inline suggestion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineSuggestConfig {
    /// Fetch suggestions while typing
    pub enabled: bool,
    /// Rendering mode for provider suggestions
    pub mode: GhostTextMode,
    /// Preview the suggest widget's selected item as ghost text
    pub suggest_preview: bool,
    /// Rendering mode for suggest widget previews
    pub suggest_preview_mode: GhostTextMode,
    /// Request and show inline edits
    pub show_inline_edits: bool,
    /// Render deleting suggestions as replacements
    pub show_replacements: bool,
    pub debounce: DebounceConfig,
    /// Provider groups whose suggestions are ignored
    pub suppressed_provider_groups: BTreeSet<String>,
    /// Skip the fade-out decoration after accepting
    pub reduce_motion: bool,
}

impl Default for InlineSuggestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: GhostTextMode::SubwordSmart,
            suggest_preview: true,
            suggest_preview_mode: GhostTextMode::SubwordSmart,
            show_inline_edits: true,
            show_replacements: false,
            debounce: DebounceConfig::default(),
            suppressed_provider_groups: BTreeSet::new(),
            reduce_motion: false,
        }
    }
}

impl InlineSuggestConfig {
    /// Mode used for provider suggestions
    pub fn completion_mode(&self) -> GhostTextMode {
        if self.show_replacements {
            GhostTextMode::Replacement
        } else {
            self.mode
        }
    }
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// Inline suggestion configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load_from_yaml(path: &Path) -> InlineResult<InlineSuggestConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_string(&content, ConfigFormat::Yaml)
    }

    /// Load configuration from a JSON file
    pub fn load_from_json(path: &Path) -> InlineResult<InlineSuggestConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_string(&content, ConfigFormat::Json)
    }

    /// Load configuration from a file, picking the format by extension
    pub fn load_from_file(path: &Path) -> InlineResult<InlineSuggestConfig> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::load_from_yaml(path),
            Some("json") => Self::load_from_json(path),
            _ => Err(InlineError::config_error(format!(
                "Unsupported configuration file: {}",
                path.display()
            ))),
        }
    }

    /// Load configuration from a string
    pub fn load_from_string(
        content: &str,
        format: ConfigFormat,
    ) -> InlineResult<InlineSuggestConfig> {
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate_config(config: &InlineSuggestConfig) -> InlineResult<()> {
        let debounce = &config.debounce;
        if debounce.min_ms > debounce.max_ms {
            return Err(InlineError::config_validation_error(format!(
                "debounce.min_ms ({}) exceeds debounce.max_ms ({})",
                debounce.min_ms, debounce.max_ms
            )));
        }
        if debounce.default_ms < debounce.min_ms || debounce.default_ms > debounce.max_ms {
            return Err(InlineError::config_validation_error(format!(
                "debounce.default_ms ({}) must lie within [{}, {}]",
                debounce.default_ms, debounce.min_ms, debounce.max_ms
            )));
        }
        if config.suppressed_provider_groups.iter().any(|g| g.trim().is_empty()) {
            return Err(InlineError::config_validation_error(
                "suppressed provider group ids cannot be empty",
            ));
        }
        Ok(())
    }
}
