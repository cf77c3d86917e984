//! Debug session configuration loading.

use std::path::Path;

use serde::Deserialize;

use crate::error::DebugError;
use crate::state::DEFAULT_PREVIEW_LENGTH;

/// Smallest preview budget that still leaves room for one character and `...`.
pub const MIN_PREVIEW_LENGTH: usize = 4;

/// What happens to the remaining listeners when one panics during delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerFailurePolicy {
    /// Log the failure and keep delivering to the remaining listeners.
    #[default]
    Continue,
    /// Log the failure and stop delivering this event.
    Abort,
}

impl ListenerFailurePolicy {
    fn parse(text: &str) -> Result<Self, DebugError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            _ => Err(DebugError::InvalidConfig(
                format!("invalid debug.listener_failure '{text}'").into(),
            )),
        }
    }
}

/// Debug session settings, read from the `[debug]` table of a TOML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    /// Preview budget for variable rendering.
    pub preview_length: usize,
    /// What happens when a listener panics.
    pub listener_failure: ListenerFailurePolicy,
    /// Force the verbose trace on (otherwise `PURE_DEBUG_TRACE` decides).
    pub trace: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            preview_length: DEFAULT_PREVIEW_LENGTH,
            listener_failure: ListenerFailurePolicy::Continue,
            trace: false,
        }
    }
}

impl DebugConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DebugError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            DebugError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text. A missing `[debug]` table yields the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, DebugError> {
        let raw: DebugToml = toml::from_str(text)
            .map_err(|err| DebugError::InvalidConfig(format!("debug config: {err}").into()))?;
        raw.into_config()
    }
}

#[derive(Debug, Deserialize)]
struct DebugToml {
    debug: Option<DebugSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebugSection {
    preview_length: Option<usize>,
    listener_failure: Option<String>,
    trace: Option<bool>,
}

impl DebugToml {
    fn into_config(self) -> Result<DebugConfig, DebugError> {
        let defaults = DebugConfig::default();
        let Some(section) = self.debug else {
            return Ok(defaults);
        };
        let preview_length = section.preview_length.unwrap_or(defaults.preview_length);
        if preview_length < MIN_PREVIEW_LENGTH {
            return Err(DebugError::InvalidConfig(
                format!("debug.preview_length must be at least {MIN_PREVIEW_LENGTH}").into(),
            ));
        }
        let listener_failure = section
            .listener_failure
            .as_deref()
            .map(ListenerFailurePolicy::parse)
            .transpose()?
            .unwrap_or(defaults.listener_failure);
        Ok(DebugConfig {
            preview_length,
            listener_failure,
            trace: section.trace.unwrap_or(defaults.trace),
        })
    }
}
