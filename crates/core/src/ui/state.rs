//! Popup state and the commands the host sends to it.
//!
//! [`PopupModel`] holds everything the popup shows and applies incoming
//! [`HostMessage`]s to it; the egui layer only renders it.

use crate::content::{CapturedContent, PromptSelection, PromptSource};
use crate::dispatcher::SurfaceId;
use crate::ipc::{HostMessage, ResponseChunk};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Commands from the host thread to the egui thread.
#[derive(Debug)]
pub enum UiCommand {
    /// Show the window as a fresh popup with the given identity.
    Open {
        surface: SurfaceId,
        alive: Arc<AtomicBool>,
    },
    Deliver(HostMessage),
    Focus,
    Close,
    /// Exit the UI event loop, ending the daemon.
    Quit,
}

/// What the response area currently shows.
///
/// `Idle` -> `Loading` (submitted) -> `Response`/`Error` (answer arrived)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiState {
    Idle,
    Loading,
    Response(String),
    Error(String),
}

#[derive(Debug)]
pub struct PopupModel {
    pub content: Option<CapturedContent>,
    /// Editable copy of text content, sent as the request input.
    pub input_text: String,
    pub custom_prompt: String,
    pub state: UiState,
    in_flight: bool,
    /// An image capture was used by a finished request and is gone host-side.
    consumed: bool,
}

impl Default for PopupModel {
    fn default() -> Self {
        Self {
            content: None,
            input_text: String::new(),
            custom_prompt: String::new(),
            state: UiState::Idle,
            in_flight: false,
            consumed: false,
        }
    }
}

impl PopupModel {
    /// Applies one message from the host. The latest text wins.
    pub fn apply(&mut self, message: HostMessage) {
        match message {
            HostMessage::ClipboardContent(content) => {
                self.input_text = content.as_text().unwrap_or_default().to_string();
                self.content = Some(content);
                self.consumed = false;
                if !self.in_flight {
                    self.state = UiState::Idle;
                }
            }
            HostMessage::LlmResponse(ResponseChunk::Text(text)) => {
                self.state = UiState::Response(text);
            }
            HostMessage::LlmResponse(ResponseChunk::Error(text)) => {
                self.state = UiState::Error(text);
            }
            HostMessage::LlmResponse(ResponseChunk::End) => {
                self.in_flight = false;
                self.consumed = self.content.as_ref().is_some_and(CapturedContent::is_image);
                if self.state == UiState::Loading {
                    self.state = UiState::Idle;
                }
            }
        }
    }

    /// Builds a submission, or `None` while submitting is not possible.
    pub fn submit(&mut self, source: PromptSource, prompt_text: String) -> Option<PromptSelection> {
        if !self.can_submit() {
            return None;
        }
        self.in_flight = true;
        self.state = UiState::Loading;

        let input_text = Some(self.input_text.clone()).filter(|t| !t.trim().is_empty());
        Some(PromptSelection {
            source,
            prompt_text,
            input_text,
        })
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// True when the shown image must be captured again before reuse.
    pub fn needs_recapture(&self) -> bool {
        self.consumed
    }

    pub fn can_submit(&self) -> bool {
        !self.in_flight && !self.consumed
    }

    /// The answer text, if one is being shown.
    pub fn answer(&self) -> Option<&str> {
        match &self.state {
            UiState::Response(text) => Some(text),
            _ => None,
        }
    }
}
