//! Clipboard and file sniffing.
//!
//! A capture takes one [`ClipboardSnapshot`] and runs it through an ordered
//! list of strategies, stopping at the first that yields content:
//!
//! 1. a file referenced by the URI list, or by the plain text (as a
//!    `file://` URI or an existing path)
//! 2. the plain clipboard text
//! 3. the clipboard image
//!
//! Failures inside a strategy (unreadable file, bad encoding) are logged
//! and the next strategy runs. Capturing never writes to the clipboard.
//!
//! # Example
//!
//! ```ignore
//! use paste_helper_core::capture::{self, ArboardClipboard, ClipboardAccess};
//!
//! let mut clipboard = ArboardClipboard;
//! if let Some(content) = capture::capture(&clipboard.snapshot()) {
//!     println!("{}", content.describe());
//! }
//! ```

use crate::content::CapturedContent;
use crate::error::{AppError, Result};
use crate::image_processing::ImageProcessor;
use arboard::Clipboard;
use mime_guess::mime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Text files at or above this size are skipped.
pub const MAX_TEXT_FILE_BYTES: u64 = 100 * 1024;

/// `application/*` subtypes that are read as text.
const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "json",
    "xml",
    "javascript",
    "x-javascript",
    "x-sh",
    "x-toml",
    "toml",
    "yaml",
    "x-yaml",
    "sql",
];

/// Raw RGBA pixels read from the clipboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Everything the sniffer looks at, read once per hotkey press.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    /// `text/uri-list` content, one URI per line.
    pub uri_list: Option<String>,
    pub text: Option<String>,
    pub image: Option<RawImage>,
}

/// Clipboard seam used by the host.
pub trait ClipboardAccess {
    /// Reads all formats of interest. Unavailable formats are `None`.
    fn snapshot(&mut self) -> ClipboardSnapshot;

    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard via `arboard`.
///
/// A fresh handle is opened per call; holding one open blocks other
/// clipboard owners on some platforms.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArboardClipboard;

impl ClipboardAccess for ArboardClipboard {
    fn snapshot(&mut self) -> ClipboardSnapshot {
        let mut clipboard = match Clipboard::new() {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not access clipboard: {}", e);
                return ClipboardSnapshot::default();
            }
        };

        let uri_list = clipboard
            .get()
            .file_list()
            .ok()
            .filter(|files| !files.is_empty())
            .map(|files| {
                files
                    .iter()
                    .filter_map(|p| Url::from_file_path(p).ok())
                    .map(|u| u.to_string())
                    .collect::<Vec<_>>()
                    .join("\r\n")
            });

        let text = clipboard.get_text().ok();

        let image = clipboard.get_image().ok().map(|img| RawImage {
            width: img.width as u32,
            height: img.height as u32,
            rgba: img.bytes.into_owned(),
        });

        ClipboardSnapshot {
            uri_list,
            text,
            image,
        }
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = Clipboard::new()
            .map_err(|e| AppError::clipboard(format!("Could not access clipboard: {}", e)))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AppError::clipboard(format!("Failed to copy to clipboard: {}", e)))
    }
}

type Strategy = fn(&ClipboardSnapshot) -> Option<CapturedContent>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("referenced file", from_referenced_file),
    ("clipboard text", from_text),
    ("clipboard image", from_image),
];

/// Produces the content for one hotkey press, or `None` if nothing qualifies.
pub fn capture(snapshot: &ClipboardSnapshot) -> Option<CapturedContent> {
    for (name, strategy) in STRATEGIES {
        if let Some(content) = strategy(snapshot) {
            debug!("Captured {} from {}", content.describe(), name);
            return Some(content);
        }
    }
    debug!("Clipboard is empty or has unsupported content");
    None
}

fn from_referenced_file(snapshot: &ClipboardSnapshot) -> Option<CapturedContent> {
    let path = referenced_path(snapshot)?;
    load_file(&path)
}

fn from_text(snapshot: &ClipboardSnapshot) -> Option<CapturedContent> {
    snapshot
        .text
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| CapturedContent::Text(t.clone()))
}

fn from_image(snapshot: &ClipboardSnapshot) -> Option<CapturedContent> {
    let image = snapshot.image.as_ref()?;
    match ImageProcessor::rgba_to_data_url(image.width, image.height, image.rgba.clone()) {
        Ok(url) => Some(CapturedContent::Image(url)),
        Err(e) => {
            warn!("Skipping clipboard image: {}", e);
            None
        }
    }
}

/// The file path the clipboard points at, if any.
///
/// A URI list wins over plain text; plain text is only consulted when the
/// clipboard carries no URI list.
pub fn referenced_path(snapshot: &ClipboardSnapshot) -> Option<PathBuf> {
    if let Some(list) = &snapshot.uri_list {
        let first = list
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))?;
        return file_uri_to_path(first);
    }

    let text = snapshot.text.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with("file://") {
        return file_uri_to_path(text);
    }
    if text.contains('\n') {
        return None;
    }
    let path = PathBuf::from(text);
    path.exists().then_some(path)
}

/// Converts a `file://` URI to a local path.
///
/// Percent-escapes are decoded and `/C:/...` becomes `C:/...`. Non-file
/// URIs and undecodable input yield `None`.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    let parsed = match Url::parse(uri.trim()) {
        Ok(u) => u,
        Err(e) => {
            debug!("Ignoring malformed URI {:?}: {}", uri, e);
            return None;
        }
    };
    if parsed.scheme() != "file" {
        return None;
    }

    let decoded = match urlencoding::decode(parsed.path()) {
        Ok(p) => p.into_owned(),
        Err(e) => {
            warn!("Failed to decode file URI {:?}: {}", uri, e);
            return None;
        }
    };

    let path = if has_drive_prefix(&decoded) {
        decoded[1..].to_string()
    } else {
        match parsed.host_str() {
            Some(host) if !host.is_empty() && host != "localhost" => {
                format!("//{}{}", host, decoded)
            }
            _ => decoded,
        }
    };
    Some(PathBuf::from(path))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
}

/// Reads a referenced file as content.
///
/// Images become data URLs; text files below [`MAX_TEXT_FILE_BYTES`] are
/// read as text. Anything else, and any read failure, yields `None`.
pub fn load_file(path: &Path) -> Option<CapturedContent> {
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => {
            debug!("{} is not a regular file", path.display());
            return None;
        }
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            return None;
        }
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();

    if mime.type_() == mime::IMAGE {
        return match fs::read(path) {
            Ok(bytes) => Some(CapturedContent::Image(ImageProcessor::bytes_to_data_url(
                mime.essence_str(),
                &bytes,
            ))),
            Err(e) => {
                warn!("Failed to read image file {}: {}", path.display(), e);
                None
            }
        };
    }

    if is_textual(&mime) {
        if metadata.len() >= MAX_TEXT_FILE_BYTES {
            debug!(
                "Skipping {}: {} bytes exceeds text file cap",
                path.display(),
                metadata.len()
            );
            return None;
        }
        return match fs::read_to_string(path) {
            Ok(text) => Some(CapturedContent::Text(text)),
            Err(e) => {
                warn!("Failed to read text file {}: {}", path.display(), e);
                None
            }
        };
    }

    debug!("Unsupported file type {} for {}", mime, path.display());
    None
}

fn is_textual(mime: &mime::Mime) -> bool {
    mime.type_() == mime::TEXT
        || (mime.type_() == mime::APPLICATION
            && TEXTUAL_APPLICATION_TYPES.contains(&mime.subtype().as_str()))
}
