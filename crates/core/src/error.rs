//! Error types for the paste-helper-core library.
//!
//! [`AppError`] covers the local failure modes (configuration, clipboard,
//! hotkey, UI). [`GatewayError`] is the taxonomy of a single LLM request and
//! knows how to render itself for the popup.

use thiserror::Error;

/// Errors that can occur within the paste-helper-core library.
///
/// Each variant represents a specific failure mode with contextual information
/// to help diagnose and handle errors appropriately.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values, unwritable store).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// Image decoding or encoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The hotkey binding is invalid or could not be registered.
    #[error("Hotkey error: {0}")]
    Hotkey(String),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a clipboard error with the given message.
    pub fn clipboard(msg: impl Into<String>) -> Self {
        Self::Clipboard(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a hotkey error with the given message.
    pub fn hotkey(msg: impl Into<String>) -> Self {
        Self::Hotkey(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single gateway request.
///
/// `ConfigMissing` and `NoContent` are raised before any network activity.
/// None of the variants is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No API key is configured.
    #[error("API key is not configured")]
    ConfigMissing,

    /// Neither input text nor an image was supplied.
    #[error("no text or image content provided")]
    NoContent,

    /// The request did not complete within the timeout.
    #[error("request timed out")]
    Timeout,

    /// No response was received (DNS, connect, TLS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a non-2xx status.
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// A 2xx body that could not be decoded at all.
    #[error("failed to decode API response: {0}")]
    Parse(String),
}

impl GatewayError {
    /// Text shown to the user in the popup in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfigMissing => {
                "Error: API Key not configured. Please set it in Settings.".to_string()
            }
            Self::NoContent => "Error: No input text or image available to process.".to_string(),
            Self::Parse(_) => "Error: Failed to parse API response.".to_string(),
            Self::Timeout | Self::Network(_) | Self::Api { .. } => {
                format!("Error: API call failed. {}", self)
            }
        }
    }
}
