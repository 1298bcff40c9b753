//! The host event loop.
//!
//! [`Host`] owns all mutable application state and processes one
//! [`HostEvent`] at a time on a dedicated thread. Only the HTTP call leaves
//! that thread: it runs on the tokio runtime and reports back with
//! [`HostEvent::ApiFinished`], so delivery and the liveness check happen
//! here as well.

use crate::capture::{self, ClipboardAccess};
use crate::config::{ConfigPatch, ConfigStore, Configuration};
use crate::dispatcher::{Dispatcher, PromptSurface, SurfaceFactory, SurfaceId};
use crate::error::Result;
use crate::gateway::{ApiResult, LlmClient};
use crate::hotkey::HotkeyRegistrar;
use crate::ipc::{ConfigReply, HostMessage, ResponseChunk, SurfaceMessage, LLM_STREAM_END};
use crate::content::PromptSelection;
use std::sync::mpsc::{Receiver, Sender};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Everything the host reacts to.
#[derive(Debug)]
pub enum HostEvent {
    HotkeyPressed,
    Surface {
        surface: SurfaceId,
        message: SurfaceMessage,
    },
    ApiFinished {
        surface: SurfaceId,
        /// Capture generation the request was built from.
        capture: u64,
        result: ApiResult,
    },
    Shutdown,
}

pub struct Host<F, C, H>
where
    F: SurfaceFactory,
    C: ClipboardAccess,
    H: HotkeyRegistrar,
{
    dispatcher: Dispatcher<F>,
    clipboard: C,
    hotkeys: H,
    store: ConfigStore,
    gateway: LlmClient,
    runtime: Handle,
    events: Sender<HostEvent>,
    capture_seq: u64,
}

impl<F, C, H> Host<F, C, H>
where
    F: SurfaceFactory,
    C: ClipboardAccess,
    H: HotkeyRegistrar,
{
    /// `events` must feed the receiver later passed to [`Host::run`].
    pub fn new(
        factory: F,
        clipboard: C,
        hotkeys: H,
        store: ConfigStore,
        gateway: LlmClient,
        runtime: Handle,
        events: Sender<HostEvent>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(factory),
            clipboard,
            hotkeys,
            store,
            gateway,
            runtime,
            events,
            capture_seq: 0,
        }
    }

    /// Registers the configured hotkey. Failure is logged, not fatal.
    pub fn init(&mut self) {
        let config = self.store.get();
        if let Err(e) = self.register_hotkey(&config) {
            error!("Failed to register global shortcut: {}", e);
        }
    }

    fn register_hotkey(&mut self, config: &Configuration) -> Result<()> {
        let hotkey = config.hotkey()?;
        self.hotkeys.register(&hotkey)?;
        info!("Global shortcut registered: {}", hotkey);
        Ok(())
    }

    /// Processes events until `Shutdown` arrives.
    pub fn run(mut self, events: Receiver<HostEvent>) {
        self.init();
        for event in events.iter() {
            if matches!(event, HostEvent::Shutdown) {
                break;
            }
            self.handle(event);
        }
        self.hotkeys.unregister();
        info!("Host stopped, shortcuts unregistered");
    }

    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::HotkeyPressed => self.on_hotkey(),
            HostEvent::Surface { surface, message } => self.on_surface_message(surface, message),
            HostEvent::ApiFinished {
                surface,
                capture,
                result,
            } => self.on_api_finished(surface, capture, result),
            HostEvent::Shutdown => {}
        }
    }

    fn on_hotkey(&mut self) {
        let snapshot = self.clipboard.snapshot();
        match capture::capture(&snapshot) {
            Some(content) => {
                self.capture_seq += 1;
                self.dispatcher.on_capture(content);
            }
            None => debug!("Hotkey pressed with nothing to capture"),
        }
    }

    fn on_surface_message(&mut self, id: SurfaceId, message: SurfaceMessage) {
        debug!("{} -> host: {}", id, message.channel());
        match message {
            SurfaceMessage::Ready => self.dispatcher.on_surface_ready(id),
            SurfaceMessage::Closed => self.dispatcher.on_surface_closed(id),
            SurfaceMessage::PromptSelected(selection) => self.on_prompt_selected(id, selection),
            SurfaceMessage::CopyAndClose(text) => {
                if !text.is_empty() {
                    match self.clipboard.set_text(&text) {
                        Ok(()) => debug!("Copied {} bytes to clipboard", text.len()),
                        Err(e) => warn!("{}", e),
                    }
                }
                self.dispatcher.close_surface(id);
            }
            SurfaceMessage::ClosePromptWindow => self.dispatcher.close_surface(id),
            SurfaceMessage::GetConfig { reply } => {
                let _ = reply.send(self.store.get());
            }
            SurfaceMessage::SetConfig { patch, reply } => {
                let outcome = self.apply_config(patch);
                let _ = reply.send(outcome);
            }
        }
    }

    fn on_prompt_selected(&mut self, id: SurfaceId, selection: PromptSelection) {
        let Some(surface) = self.dispatcher.live_surface(id) else {
            warn!("Prompt submitted from {} which is no longer open", id);
            self.dispatcher.clear_captured();
            return;
        };

        let config = self.store.get();
        let image = self.dispatcher.captured().filter(|c| c.is_image());
        let prepared = self.gateway.prepare(
            &config,
            selection.input_text(),
            image,
            &selection.prompt_text,
        );

        match prepared {
            Err(err) => {
                warn!("Request rejected: {}", err);
                deliver(surface, &Err(err));
                self.dispatcher.clear_captured();
            }
            Ok(request) => {
                info!("Submitting {:?} prompt from {}", selection.source, id);
                let gateway = self.gateway.clone();
                let events = self.events.clone();
                let capture = self.capture_seq;
                self.runtime.spawn(async move {
                    let result = gateway.execute(request).await;
                    let _ = events.send(HostEvent::ApiFinished {
                        surface: id,
                        capture,
                        result,
                    });
                });
            }
        }
    }

    fn on_api_finished(&mut self, id: SurfaceId, capture: u64, result: ApiResult) {
        match self.dispatcher.live_surface(id) {
            Some(surface) => deliver(surface, &result),
            None => debug!("Dropping response for closed {}", id),
        }
        if capture == self.capture_seq {
            self.dispatcher.clear_captured();
        }
    }

    /// Persists a settings change and re-registers the hotkey if it changed.
    pub fn apply_config(&mut self, patch: ConfigPatch) -> ConfigReply {
        let update = match self.store.set(patch) {
            Ok(update) => update,
            Err(e) => {
                error!("Failed to set config: {}", e);
                return ConfigReply::failed(e.to_string());
            }
        };

        if update.hotkey_changed {
            info!("Hotkey changed, re-registering");
            self.hotkeys.unregister();
            if let Err(e) = self.register_hotkey(&update.config) {
                error!("Failed to register global shortcut: {}", e);
                return ConfigReply::failed(format!("Settings saved, but {}", e));
            }
        }
        ConfigReply::ok()
    }

    pub fn dispatcher(&self) -> &Dispatcher<F> {
        &self.dispatcher
    }
}

/// Sends exactly one text message followed by exactly one end sentinel.
fn deliver(surface: &impl PromptSurface, result: &ApiResult) {
    let chunk = match result {
        Ok(answer) if answer.text.is_empty() => {
            ResponseChunk::Error("Error: Received empty response from API.".to_string())
        }
        Ok(answer) => ResponseChunk::Text(answer.text.clone()),
        Err(err) => ResponseChunk::Error(err.user_message()),
    };
    surface.send(HostMessage::LlmResponse(chunk));
    surface.send(HostMessage::LlmResponse(ResponseChunk::End));
    debug!("Delivered response to {} followed by {}", surface.id(), LLM_STREAM_END);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ClipboardSnapshot;
    use crate::content::CapturedContent;
    use crate::dispatcher::fakes::{FakeFactory, FakeSurface, SurfaceCall};
    use crate::error::GatewayError;
    use crate::gateway::test_server;
    use crate::hotkey::Hotkey;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc::{self, channel};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeClipboard {
        snapshot: Arc<Mutex<ClipboardSnapshot>>,
        copied: Arc<Mutex<Vec<String>>>,
    }

    impl FakeClipboard {
        fn set_snapshot_text(&self, text: &str) {
            *self.snapshot.lock().unwrap() = ClipboardSnapshot {
                text: Some(text.into()),
                ..Default::default()
            };
        }
    }

    impl ClipboardAccess for FakeClipboard {
        fn snapshot(&mut self) -> ClipboardSnapshot {
            self.snapshot.lock().unwrap().clone()
        }

        fn set_text(&mut self, text: &str) -> Result<()> {
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeHotkeys {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeHotkeys {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl HotkeyRegistrar for FakeHotkeys {
        fn register(&mut self, hotkey: &Hotkey) -> Result<()> {
            self.log.lock().unwrap().push(format!("register {}", hotkey));
            Ok(())
        }

        fn unregister(&mut self) {
            self.log.lock().unwrap().push("unregister".into());
        }
    }

    struct Harness {
        host: Host<FakeFactory, FakeClipboard, FakeHotkeys>,
        factory: FakeFactory,
        clipboard: FakeClipboard,
        hotkeys: FakeHotkeys,
        rx: mpsc::Receiver<HostEvent>,
        runtime: tokio::runtime::Runtime,
        _dir: TempDir,
    }

    impl Harness {
        fn new(api_key: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let store = ConfigStore::at(dir.path().join("config.json"));
            if !api_key.is_empty() {
                store
                    .set(ConfigPatch {
                        api_key: Some(api_key.into()),
                        ..Default::default()
                    })
                    .unwrap();
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            let (tx, rx) = channel();
            let factory = FakeFactory::default();
            let clipboard = FakeClipboard::default();
            let hotkeys = FakeHotkeys::default();
            let host = Host::new(
                factory.clone(),
                clipboard.clone(),
                hotkeys.clone(),
                store,
                LlmClient::new().unwrap(),
                runtime.handle().clone(),
                tx,
            );
            Self {
                host,
                factory,
                clipboard,
                hotkeys,
                rx,
                runtime,
                _dir: dir,
            }
        }

        /// Presses the hotkey with `text` on the clipboard and readies the popup.
        fn open_with_text(&mut self, text: &str) -> FakeSurface {
            self.clipboard.set_snapshot_text(text);
            self.host.handle(HostEvent::HotkeyPressed);
            let surface = self.factory.last();
            self.surface_says(&surface, SurfaceMessage::Ready);
            surface
        }

        fn surface_says(&mut self, surface: &FakeSurface, message: SurfaceMessage) {
            self.host.handle(HostEvent::Surface {
                surface: surface.id(),
                message,
            });
        }

        fn pump_one(&mut self) {
            let event = self
                .rx
                .recv_timeout(Duration::from_secs(10))
                .expect("no event from background task");
            self.host.handle(event);
        }
    }

    fn responses(surface: &FakeSurface) -> Vec<ResponseChunk> {
        surface
            .sent()
            .into_iter()
            .filter_map(|m| match m {
                HostMessage::LlmResponse(chunk) => Some(chunk),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn init_registers_configured_hotkey() {
        let mut h = Harness::new("");
        h.host.init();
        assert_eq!(h.hotkeys.log(), vec!["register CommandOrControl+Shift+V"]);
    }

    #[test]
    fn repeated_hotkey_updates_single_surface() {
        let mut h = Harness::new("");
        let surface = h.open_with_text("first");

        h.clipboard.set_snapshot_text("second");
        h.host.handle(HostEvent::HotkeyPressed);

        assert_eq!(h.factory.surfaces().len(), 1);
        assert_eq!(
            surface.sent(),
            vec![
                HostMessage::ClipboardContent(CapturedContent::Text("first".into())),
                HostMessage::ClipboardContent(CapturedContent::Text("second".into())),
            ]
        );
        assert_eq!(surface.calls().last(), Some(&SurfaceCall::Focus));
    }

    #[test]
    fn empty_clipboard_opens_nothing() {
        let mut h = Harness::new("");
        h.host.handle(HostEvent::HotkeyPressed);
        assert!(h.factory.surfaces().is_empty());
    }

    #[test]
    fn missing_api_key_short_circuits() {
        let mut h = Harness::new("");
        let surface = h.open_with_text("hello");

        h.surface_says(
            &surface,
            SurfaceMessage::PromptSelected(PromptSelection::custom("Summarize", Some("hello".into()))),
        );

        assert_eq!(
            responses(&surface),
            vec![
                ResponseChunk::Error(GatewayError::ConfigMissing.user_message()),
                ResponseChunk::End
            ]
        );
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn no_content_short_circuits() {
        let mut h = Harness::new("sk-test");
        let surface = h.open_with_text("hello");

        h.surface_says(
            &surface,
            SurfaceMessage::PromptSelected(PromptSelection::custom("Summarize", None)),
        );

        assert_eq!(
            responses(&surface),
            vec![
                ResponseChunk::Error(GatewayError::NoContent.user_message()),
                ResponseChunk::End
            ]
        );
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn timeout_yields_one_error_then_one_end() {
        let mut h = Harness::new("sk-test");
        let url = h.runtime.block_on(test_server::serve_silent());
        h.host.gateway = LlmClient::new()
            .unwrap()
            .with_endpoint(url)
            .with_timeout(Duration::from_millis(200));
        let surface = h.open_with_text("hello");

        h.surface_says(
            &surface,
            SurfaceMessage::PromptSelected(PromptSelection::preset("Summarize", Some("hello".into()))),
        );
        assert!(responses(&surface).is_empty());
        h.pump_one();

        assert_eq!(
            responses(&surface),
            vec![
                ResponseChunk::Error(GatewayError::Timeout.user_message()),
                ResponseChunk::End
            ]
        );
    }

    #[test]
    fn successful_answer_is_delivered() {
        let mut h = Harness::new("sk-test");
        let body = r#"{"choices":[{"message":{"content":"Short summary"}}]}"#;
        let (url, _server) = h.runtime.block_on(test_server::serve_once(
            test_server::http_response("200 OK", body),
        ));
        h.host.gateway = LlmClient::new().unwrap().with_endpoint(url);
        let surface = h.open_with_text("hello");

        h.surface_says(
            &surface,
            SurfaceMessage::PromptSelected(PromptSelection::custom("Summarize", Some("hello".into()))),
        );
        h.pump_one();

        assert_eq!(
            responses(&surface),
            vec![ResponseChunk::Text("Short summary".into()), ResponseChunk::End]
        );
        assert!(h.host.dispatcher().captured().is_none());
    }

    #[test]
    fn answer_that_looks_like_an_error_stays_an_answer() {
        let mut h = Harness::new("sk-test");
        let body = r#"{"choices":[{"message":{"content":"Error: disk full"}}]}"#;
        let (url, _server) = h.runtime.block_on(test_server::serve_once(
            test_server::http_response("200 OK", body),
        ));
        h.host.gateway = LlmClient::new().unwrap().with_endpoint(url);
        let surface = h.open_with_text("df -h output");

        h.surface_says(
            &surface,
            SurfaceMessage::PromptSelected(PromptSelection::custom(
                "Explain",
                Some("df -h output".into()),
            )),
        );
        h.pump_one();

        assert_eq!(
            responses(&surface),
            vec![ResponseChunk::Text("Error: disk full".into()), ResponseChunk::End]
        );
    }

    #[test]
    fn empty_answer_is_reported_as_error() {
        let mut h = Harness::new("sk-test");
        let surface = h.open_with_text("hello");
        h.host.handle(HostEvent::ApiFinished {
            surface: surface.id(),
            capture: 1,
            result: Ok(crate::gateway::ApiAnswer {
                text: String::new(),
                degraded: false,
            }),
        });
        assert_eq!(
            responses(&surface),
            vec![
                ResponseChunk::Error("Error: Received empty response from API.".into()),
                ResponseChunk::End
            ]
        );
    }

    #[test]
    fn result_for_closed_surface_is_dropped() {
        let mut h = Harness::new("sk-test");
        let surface = h.open_with_text("hello");
        h.surface_says(&surface, SurfaceMessage::ClosePromptWindow);
        h.surface_says(&surface, SurfaceMessage::Closed);

        h.host.handle(HostEvent::ApiFinished {
            surface: surface.id(),
            capture: 1,
            result: Err(GatewayError::Timeout),
        });

        assert!(responses(&surface).is_empty());
        assert_eq!(surface.calls().last(), Some(&SurfaceCall::Close));
    }

    #[test]
    fn newer_capture_survives_older_completion() {
        let mut h = Harness::new("sk-test");
        let surface = h.open_with_text("first");
        h.clipboard.set_snapshot_text("second");
        h.host.handle(HostEvent::HotkeyPressed);

        h.host.handle(HostEvent::ApiFinished {
            surface: surface.id(),
            capture: 1,
            result: Err(GatewayError::Timeout),
        });

        assert_eq!(
            h.host.dispatcher().captured(),
            Some(&CapturedContent::Text("second".into()))
        );
    }

    #[test]
    fn copy_and_close_writes_clipboard_then_closes() {
        let mut h = Harness::new("");
        let surface = h.open_with_text("hello");

        h.surface_says(&surface, SurfaceMessage::CopyAndClose("answer".into()));

        assert_eq!(*h.clipboard.copied.lock().unwrap(), vec!["answer".to_string()]);
        assert_eq!(surface.calls().last(), Some(&SurfaceCall::Close));
        assert!(!surface.is_alive());
    }

    #[test]
    fn copy_and_close_with_empty_text_only_closes() {
        let mut h = Harness::new("");
        let surface = h.open_with_text("hello");
        h.surface_says(&surface, SurfaceMessage::CopyAndClose(String::new()));
        assert!(h.clipboard.copied.lock().unwrap().is_empty());
        assert!(!surface.is_alive());
    }

    #[test]
    fn hotkey_change_reregisters_exactly_once() {
        let mut h = Harness::new("");
        let reply = h.host.apply_config(ConfigPatch {
            hotkey_modifier: Some("Alt".into()),
            hotkey_key: Some("K".into()),
            ..Default::default()
        });
        assert_eq!(reply, ConfigReply::ok());
        assert_eq!(
            h.hotkeys.log(),
            vec!["unregister", "register CommandOrControl+Alt+K"]
        );
    }

    #[test]
    fn api_key_change_does_not_reregister() {
        let mut h = Harness::new("");
        let reply = h.host.apply_config(ConfigPatch {
            api_key: Some("sk-new".into()),
            ..Default::default()
        });
        assert_eq!(reply, ConfigReply::ok());
        assert!(h.hotkeys.log().is_empty());
    }

    #[test]
    fn invalid_settings_reply_with_error() {
        let mut h = Harness::new("");
        let reply = h.host.apply_config(ConfigPatch {
            hotkey_key: Some("??".into()),
            ..Default::default()
        });
        assert!(!reply.success);
        assert!(reply.error.is_some());
        assert!(h.hotkeys.log().is_empty());
    }

    #[test]
    fn config_requests_are_answered() {
        let mut h = Harness::new("sk-test");
        let surface = h.open_with_text("hello");

        let (reply_tx, reply_rx) = channel();
        h.surface_says(&surface, SurfaceMessage::GetConfig { reply: reply_tx });
        assert_eq!(reply_rx.recv().unwrap().api_key, "sk-test");

        let (reply_tx, reply_rx) = channel();
        h.surface_says(
            &surface,
            SurfaceMessage::SetConfig {
                patch: ConfigPatch {
                    model: Some("other/model".into()),
                    ..Default::default()
                },
                reply: reply_tx,
            },
        );
        assert!(reply_rx.recv().unwrap().success);
    }

    #[test]
    fn run_stops_on_shutdown_and_unregisters() {
        let h = Harness::new("");
        let (tx, rx) = channel();
        tx.send(HostEvent::Shutdown).unwrap();
        h.host.run(rx);
        assert_eq!(
            h.hotkeys.log(),
            vec!["register CommandOrControl+Shift+V", "unregister"]
        );
    }
}
