//! Paste Helper Core Library
//!
//! This library provides the core functionality for the paste-helper tool:
//! a global hotkey captures whatever is on the clipboard (text, an image, or
//! a copied file) and opens a popup where the user picks a prompt to run
//! against an OpenRouter-hosted model.
//!
//! # Overview
//!
//! - **Capture**: clipboard sniffing and file loading via [`capture`]
//! - **Configuration**: persisted JSON settings via [`config`]
//! - **AI Integration**: chat-completions client via [`gateway`]
//! - **Routing**: popup lifecycle via [`dispatcher`] and [`host`]
//! - **User Interface**: the egui popup via [`ui`]
//!
//! # Quick Start
//!
//! Headless use goes through the [`PasteHelper`] facade:
//!
//! ```ignore
//! use paste_helper_core::PasteHelper;
//!
//! let app = PasteHelper::new()?;
//! if let Some(content) = app.capture_clipboard() {
//!     let answer = app.ask(&content, "Summarize this").await?;
//!     println!("{}", answer);
//! }
//! ```
//!
//! The interactive daemon wires [`host::Host`] to [`ui::run_popup`].
//!
//! # Module Structure
//!
//! - [`capture`]: clipboard access and content sniffing
//! - [`config`]: configuration model and store
//! - [`content`]: captured content and prompt selection types
//! - [`dispatcher`]: popup surface routing
//! - [`error`]: error types and result aliases
//! - [`gateway`]: LLM HTTP client
//! - [`host`]: the host event loop
//! - [`hotkey`]: hotkey model and registration seam
//! - [`image_processing`]: data URL encoding
//! - [`ipc`]: messages between host and popup
//! - [`ui`]: user interface components

pub mod capture;
pub mod config;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod host;
pub mod hotkey;
pub mod image_processing;
pub mod ipc;
pub mod ui;

// Re-export primary types for convenience
pub use capture::{ArboardClipboard, ClipboardAccess};
pub use config::{ConfigPatch, ConfigStore, Configuration};
pub use content::{CapturedContent, PromptSelection, PromptSource};
pub use error::{AppError, GatewayError, Result};
pub use gateway::LlmClient;
pub use host::{Host, HostEvent};
pub use hotkey::{Hotkey, HotkeyRegistrar, Modifier};

/// Facade for one-shot, windowless use.
///
/// Reads the clipboard and sends a single prompt without the popup or the
/// global hotkey.
pub struct PasteHelper {
    store: ConfigStore,
    gateway: LlmClient,
}

impl PasteHelper {
    /// Creates an instance backed by the default config file.
    ///
    /// Call [`init`] first if the API key may come from a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_store(ConfigStore::open_default())
    }

    /// Creates an instance with a custom store.
    pub fn with_store(store: ConfigStore) -> Result<Self> {
        Ok(Self {
            store,
            gateway: LlmClient::new()?,
        })
    }

    /// Replaces the HTTP client, e.g. to point at another endpoint.
    pub fn with_gateway(mut self, gateway: LlmClient) -> Self {
        self.gateway = gateway;
        self
    }

    /// Current configuration, including the environment key fallback.
    pub fn config(&self) -> Configuration {
        self.store.get()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Reads the system clipboard once.
    pub fn capture_clipboard(&self) -> Option<CapturedContent> {
        capture::capture(&ArboardClipboard.snapshot())
    }

    /// Sends `prompt` about `content` using the stored configuration.
    pub async fn ask(
        &self,
        content: &CapturedContent,
        prompt: &str,
    ) -> std::result::Result<String, GatewayError> {
        self.ask_with(&self.config(), content, prompt).await
    }

    /// Like [`ask`](Self::ask) but with an explicit configuration.
    pub async fn ask_with(
        &self,
        config: &Configuration,
        content: &CapturedContent,
        prompt: &str,
    ) -> std::result::Result<String, GatewayError> {
        let image = Some(content).filter(|c| c.is_image());
        let answer = self
            .gateway
            .send(config, content.as_text(), image, prompt)
            .await?;
        Ok(answer.text)
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup. This loads `.env` files if
/// present so [`config::API_KEY_ENV`] can be picked up.
pub fn init() {
    let _ = dotenvy::dotenv();
}
