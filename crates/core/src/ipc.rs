//! Messages exchanged between the host thread and the popup surface.
//!
//! Each message knows its wire channel name (`clipboard-content`,
//! `llm-response`, ...) for logging and for any serialized transport.

use crate::config::{ConfigPatch, Configuration};
use crate::content::{CapturedContent, PromptSelection};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// Marks the end of a response on the `llm-response` channel.
pub const LLM_STREAM_END: &str = "__LLM_STREAM_END__";

/// One item on the `llm-response` channel.
///
/// A request yields exactly one `Text` or `Error`, then `End`
/// ([`LLM_STREAM_END`] on the wire).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseChunk {
    /// Answer text from the model, whatever it starts with.
    Text(String),
    /// User-facing failure message.
    Error(String),
    End,
}

/// Host to surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostMessage {
    ClipboardContent(CapturedContent),
    LlmResponse(ResponseChunk),
}

impl HostMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::ClipboardContent(_) => "clipboard-content",
            Self::LlmResponse(_) => "llm-response",
        }
    }
}

/// Reply to `set-config`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Surface to host.
#[derive(Debug)]
pub enum SurfaceMessage {
    /// The surface rendered its first frame and can receive content.
    Ready,
    /// The surface was closed or destroyed.
    Closed,
    PromptSelected(PromptSelection),
    CopyAndClose(String),
    ClosePromptWindow,
    GetConfig { reply: Sender<Configuration> },
    SetConfig {
        patch: ConfigPatch,
        reply: Sender<ConfigReply>,
    },
}

impl SurfaceMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::PromptSelected(_) => "prompt-selected",
            Self::CopyAndClose(_) => "copy-and-close",
            Self::ClosePromptWindow => "close-prompt-window",
            Self::GetConfig { .. } => "get-config",
            Self::SetConfig { .. } => "set-config",
        }
    }
}
