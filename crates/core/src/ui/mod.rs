//! User interface components for paste-helper.
//!
//! The popup is an egui window owned by the UI thread. The host thread
//! drives it through [`EguiSurface`] handles and receives the user's
//! actions as [`HostEvent::Surface`] events.
//!
//! # Architecture
//!
//! - [`state`]: popup model and host-to-UI commands
//! - [`settings`]: inline settings form
//! - [`surface`]: host-side handle implementing [`PromptSurface`](crate::dispatcher::PromptSurface)
//! - [`popup`]: the eframe application
//!
//! # Usage
//!
//! ```ignore
//! use paste_helper_core::ui;
//!
//! let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
//! let (event_tx, event_rx) = std::sync::mpsc::channel();
//!
//! ui::run_popup(cmd_rx, event_tx.clone(), move |ctx| {
//!     let factory = ui::EguiSurfaceFactory::new(cmd_tx, ctx);
//!     // start the host thread with `factory` and `event_rx`
//! })?;
//! ```

mod popup;
mod settings;
mod state;
mod surface;

pub use popup::PromptPopup;
pub use settings::{SettingsForm, Status};
pub use state::{PopupModel, UiCommand, UiState};
pub use surface::{EguiSurface, EguiSurfaceFactory, QuitHandle};

use crate::error::{AppError, Result};
use crate::host::HostEvent;
use eframe::egui;
use std::sync::mpsc::{Receiver, Sender};

/// Runs the popup event loop on the current thread until the app exits.
///
/// The window starts hidden. `on_start` is called once with the egui
/// context, before the first frame, so the caller can hand it to the
/// host for waking the UI.
///
/// # Errors
/// Returns [`AppError::Ui`] if the native window cannot be created.
pub fn run_popup<S>(commands: Receiver<UiCommand>, events: Sender<HostEvent>, on_start: S) -> Result<()>
where
    S: FnOnce(egui::Context) + 'static,
{
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Paste Helper")
            .with_inner_size([450.0, 400.0])
            .with_visible(false)
            .with_decorations(false)
            .with_resizable(true)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Paste Helper",
        options,
        Box::new(move |cc| {
            on_start(cc.egui_ctx.clone());
            Ok(Box::new(PromptPopup::new(commands, events)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
