//! Routes captures to the single popup surface.
//!
//! The dispatcher owns the captured-content slot and the surface handle.
//! It is only ever touched from the host thread.

use crate::content::CapturedContent;
use crate::ipc::HostMessage;
use std::fmt;
use tracing::{debug, info};

/// Identity of one popup instance. A reopened popup gets a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A live (or formerly live) popup.
pub trait PromptSurface {
    fn id(&self) -> SurfaceId;
    /// False once the surface has been closed or destroyed.
    fn is_alive(&self) -> bool;
    fn send(&self, message: HostMessage);
    /// Restores the surface if minimized, then focuses it.
    fn focus(&self);
    fn close(&self);
}

/// Creates popups. The new surface must later report `Ready`.
pub trait SurfaceFactory {
    type Surface: PromptSurface;

    fn create(&mut self, id: SurfaceId) -> Self::Surface;
}

pub struct Dispatcher<F: SurfaceFactory> {
    factory: F,
    surface: Option<F::Surface>,
    awaiting_ready: bool,
    captured: Option<CapturedContent>,
    next_id: u64,
}

impl<F: SurfaceFactory> Dispatcher<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            surface: None,
            awaiting_ready: false,
            captured: None,
            next_id: 1,
        }
    }

    /// Stores `content` and shows it, reusing the open popup if there is one.
    pub fn on_capture(&mut self, content: CapturedContent) {
        self.captured = Some(content.clone());

        match self.surface.as_ref().filter(|s| s.is_alive()) {
            Some(surface) if self.awaiting_ready => {
                debug!("{} not ready yet, content will follow", surface.id());
            }
            Some(surface) => {
                debug!("Pushing new content to open {}", surface.id());
                surface.send(HostMessage::ClipboardContent(content));
                surface.focus();
            }
            None => self.open_surface(),
        }
    }

    fn open_surface(&mut self) {
        if let Some(stale) = self.surface.take() {
            debug!("Clearing stale reference to {}", stale.id());
        }
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        info!("Creating prompt popup {}", id);
        self.surface = Some(self.factory.create(id));
        self.awaiting_ready = true;
    }

    /// The surface finished loading; deliver the pending content.
    pub fn on_surface_ready(&mut self, id: SurfaceId) {
        let Some(surface) = self.live_surface(id) else {
            debug!("Ignoring ready from {}", id);
            return;
        };
        match &self.captured {
            Some(content) => surface.send(HostMessage::ClipboardContent(content.clone())),
            None => debug!("{} ready but nothing captured", id),
        }
        surface.focus();
        self.awaiting_ready = false;
    }

    /// Forgets the surface and clears the captured slot.
    pub fn on_surface_closed(&mut self, id: SurfaceId) {
        if self.surface.as_ref().is_some_and(|s| s.id() == id) {
            info!("Prompt popup {} closed", id);
            self.surface = None;
            self.awaiting_ready = false;
            self.captured = None;
        }
    }

    /// The current surface, if it is `id` and still alive.
    pub fn live_surface(&self, id: SurfaceId) -> Option<&F::Surface> {
        self.surface
            .as_ref()
            .filter(|s| s.id() == id && s.is_alive())
    }

    /// Closes the current surface if it is `id`.
    pub fn close_surface(&self, id: SurfaceId) {
        if let Some(surface) = self.live_surface(id) {
            surface.close();
        }
    }

    pub fn captured(&self) -> Option<&CapturedContent> {
        self.captured.as_ref()
    }

    pub fn clear_captured(&mut self) {
        self.captured = None;
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory surface used by dispatcher and host tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum SurfaceCall {
        Send(HostMessage),
        Focus,
        Close,
    }

    #[derive(Clone)]
    pub struct FakeSurface {
        id: SurfaceId,
        alive: Arc<AtomicBool>,
        pub calls: Arc<Mutex<Vec<SurfaceCall>>>,
    }

    impl FakeSurface {
        pub fn destroy(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<SurfaceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn sent(&self) -> Vec<HostMessage> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    SurfaceCall::Send(m) => Some(m),
                    _ => None,
                })
                .collect()
        }
    }

    impl PromptSurface for FakeSurface {
        fn id(&self) -> SurfaceId {
            self.id
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn send(&self, message: HostMessage) {
            self.calls.lock().unwrap().push(SurfaceCall::Send(message));
        }

        fn focus(&self) {
            self.calls.lock().unwrap().push(SurfaceCall::Focus);
        }

        fn close(&self) {
            self.calls.lock().unwrap().push(SurfaceCall::Close);
            self.destroy();
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeFactory {
        pub created: Arc<Mutex<Vec<FakeSurface>>>,
    }

    impl FakeFactory {
        pub fn surfaces(&self) -> Vec<FakeSurface> {
            self.created.lock().unwrap().clone()
        }

        pub fn last(&self) -> FakeSurface {
            self.surfaces().last().cloned().expect("no surface created")
        }
    }

    impl SurfaceFactory for FakeFactory {
        type Surface = FakeSurface;

        fn create(&mut self, id: SurfaceId) -> FakeSurface {
            let surface = FakeSurface {
                id,
                alive: Arc::new(AtomicBool::new(true)),
                calls: Arc::default(),
            };
            self.created.lock().unwrap().push(surface.clone());
            surface
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> CapturedContent {
        CapturedContent::Text(s.into())
    }

    #[test]
    fn first_capture_creates_surface_and_waits_for_ready() {
        let mut dispatcher = Dispatcher::new(FakeFactory::default());
        dispatcher.on_capture(text("one"));

        let surface = dispatcher.factory().last();
        assert!(surface.calls().is_empty());

        dispatcher.on_surface_ready(surface.id());
        assert_eq!(
            surface.calls(),
            vec![
                SurfaceCall::Send(HostMessage::ClipboardContent(text("one"))),
                SurfaceCall::Focus
            ]
        );
    }

    #[test]
    fn capture_before_ready_sends_latest_once() {
        let mut dispatcher = Dispatcher::new(FakeFactory::default());
        dispatcher.on_capture(text("one"));
        dispatcher.on_capture(text("two"));

        assert_eq!(dispatcher.factory().surfaces().len(), 1);
        let surface = dispatcher.factory().last();
        dispatcher.on_surface_ready(surface.id());
        assert_eq!(
            surface.sent(),
            vec![HostMessage::ClipboardContent(text("two"))]
        );
    }

    #[test]
    fn repeated_hotkey_reuses_open_surface() {
        let mut dispatcher = Dispatcher::new(FakeFactory::default());
        dispatcher.on_capture(text("one"));
        let surface = dispatcher.factory().last();
        dispatcher.on_surface_ready(surface.id());

        dispatcher.on_capture(text("two"));

        assert_eq!(dispatcher.factory().surfaces().len(), 1);
        let calls = surface.calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[
                SurfaceCall::Send(HostMessage::ClipboardContent(text("two"))),
                SurfaceCall::Focus
            ]
        );
        assert_eq!(dispatcher.captured(), Some(&text("two")));
    }

    #[test]
    fn destroyed_surface_is_replaced() {
        let mut dispatcher = Dispatcher::new(FakeFactory::default());
        dispatcher.on_capture(text("one"));
        let first = dispatcher.factory().last();
        dispatcher.on_surface_ready(first.id());
        first.destroy();

        dispatcher.on_capture(text("two"));

        let surfaces = dispatcher.factory().surfaces();
        assert_eq!(surfaces.len(), 2);
        assert_ne!(surfaces[0].id(), surfaces[1].id());
        assert!(dispatcher.live_surface(first.id()).is_none());
        assert!(dispatcher.live_surface(surfaces[1].id()).is_some());
    }

    #[test]
    fn close_clears_slot_and_ignores_stale_ids() {
        let mut dispatcher = Dispatcher::new(FakeFactory::default());
        dispatcher.on_capture(text("one"));
        let surface = dispatcher.factory().last();

        dispatcher.on_surface_closed(SurfaceId(999));
        assert!(dispatcher.captured().is_some());

        dispatcher.on_surface_closed(surface.id());
        assert!(dispatcher.captured().is_none());
        assert!(dispatcher.live_surface(surface.id()).is_none());
    }
}
