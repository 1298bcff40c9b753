//! Host-side handle to the egui popup.
//!
//! The host never touches egui state directly: it posts [`UiCommand`]s and
//! wakes the UI thread with `request_repaint`.

use super::state::UiCommand;
use crate::dispatcher::{PromptSurface, SurfaceFactory, SurfaceId};
use crate::ipc::HostMessage;
use eframe::egui;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::warn;

pub struct EguiSurface {
    id: SurfaceId,
    alive: Arc<AtomicBool>,
    commands: Sender<UiCommand>,
    ctx: egui::Context,
}

impl EguiSurface {
    fn post(&self, command: UiCommand) {
        if self.commands.send(command).is_err() {
            warn!("UI thread is gone, marking {} dead", self.id);
            self.alive.store(false, Ordering::SeqCst);
            return;
        }
        self.ctx.request_repaint();
    }
}

impl PromptSurface for EguiSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn send(&self, message: HostMessage) {
        self.post(UiCommand::Deliver(message));
    }

    fn focus(&self) {
        self.post(UiCommand::Focus);
    }

    fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.post(UiCommand::Close);
    }
}

/// Opens the (single) popup window under a new identity.
pub struct EguiSurfaceFactory {
    commands: Sender<UiCommand>,
    ctx: egui::Context,
}

impl EguiSurfaceFactory {
    pub fn new(commands: Sender<UiCommand>, ctx: egui::Context) -> Self {
        Self { commands, ctx }
    }

    /// A handle that can end the UI event loop from any thread.
    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            commands: self.commands.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

/// Asks the popup to close for good, which returns from `run_popup`.
#[derive(Clone)]
pub struct QuitHandle {
    commands: Sender<UiCommand>,
    ctx: egui::Context,
}

impl QuitHandle {
    pub fn quit(&self) {
        if self.commands.send(UiCommand::Quit).is_ok() {
            self.ctx.request_repaint();
        }
    }
}

impl SurfaceFactory for EguiSurfaceFactory {
    type Surface = EguiSurface;

    fn create(&mut self, id: SurfaceId) -> EguiSurface {
        let surface = EguiSurface {
            id,
            alive: Arc::new(AtomicBool::new(true)),
            commands: self.commands.clone(),
            ctx: self.ctx.clone(),
        };
        surface.post(UiCommand::Open {
            surface: id,
            alive: surface.alive.clone(),
        });
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn created_surface_opens_the_popup() {
        let (tx, rx) = channel();
        let mut factory = EguiSurfaceFactory::new(tx, egui::Context::default());
        let surface = factory.create(SurfaceId(3));

        assert!(matches!(
            rx.try_recv(),
            Ok(UiCommand::Open { surface: SurfaceId(3), .. })
        ));
        surface.close();
        assert!(!surface.is_alive());
        assert!(matches!(rx.try_recv(), Ok(UiCommand::Close)));
    }

    #[test]
    fn quit_handle_posts_quit() {
        let (tx, rx) = channel();
        let factory = EguiSurfaceFactory::new(tx, egui::Context::default());
        let quit = factory.quit_handle();
        drop(factory);

        quit.quit();
        assert!(matches!(rx.try_recv(), Ok(UiCommand::Quit)));
    }

    #[test]
    fn surface_is_dead_once_ui_is_gone() {
        let (tx, rx) = channel();
        let mut factory = EguiSurfaceFactory::new(tx, egui::Context::default());
        let surface = factory.create(SurfaceId(1));
        drop(rx);

        surface.focus();
        assert!(!surface.is_alive());
    }
}
