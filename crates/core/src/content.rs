//! Data passed between the sniffer, the host and the popup.

use serde::{Deserialize, Serialize};

/// Content captured from the clipboard or from a file it references.
///
/// Serialized as `{"type": "text"|"image", "data": ...}`. Image data is
/// always a base64 data URL (`data:image/png;base64,...`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum CapturedContent {
    Text(String),
    Image(String),
}

impl CapturedContent {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Returns the text payload, if this is text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    /// Returns the data URL, if this is image content.
    pub fn as_data_url(&self) -> Option<&str> {
        match self {
            Self::Image(url) => Some(url),
            Self::Text(_) => None,
        }
    }

    /// Short description for logs. Never includes the payload.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => format!("text ({} bytes)", text.len()),
            Self::Image(url) => format!("image ({} byte data URL)", url.len()),
        }
    }
}

/// Where the prompt of a submission came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    Preset,
    Custom,
}

/// A single submission from the popup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSelection {
    pub source: PromptSource,
    pub prompt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
}

impl PromptSelection {
    pub fn preset(prompt_text: impl Into<String>, input_text: Option<String>) -> Self {
        Self {
            source: PromptSource::Preset,
            prompt_text: prompt_text.into(),
            input_text,
        }
    }

    pub fn custom(prompt_text: impl Into<String>, input_text: Option<String>) -> Self {
        Self {
            source: PromptSource::Custom,
            prompt_text: prompt_text.into(),
            input_text,
        }
    }

    /// The input text, treating an empty string as absent.
    pub fn input_text(&self) -> Option<&str> {
        self.input_text.as_deref().filter(|t| !t.is_empty())
    }
}
