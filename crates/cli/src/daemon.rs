//! Long-running mode: hotkey listener, host thread and popup window.

use crate::hotkey::{self, Binding, RdevHotkeys};
use crate::instance::InstanceGuard;
use anyhow::{anyhow, Context, Result};
use paste_helper_core::ui::{self, EguiSurfaceFactory, QuitHandle};
use paste_helper_core::{ArboardClipboard, ConfigStore, Host, HostEvent, LlmClient};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

/// Runs until the popup event loop exits, either from the popup's Quit
/// button or Ctrl-C.
///
/// Must be called from the main thread inside a multi-threaded tokio
/// runtime: the window needs the main thread, the HTTP calls need the
/// runtime.
pub fn run(store: ConfigStore) -> Result<()> {
    let _instance = InstanceGuard::acquire()?;
    let gateway = LlmClient::new().context("Failed to create API client")?;
    let runtime = Handle::current();

    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    let binding = Binding::default();
    hotkey::spawn_listener(binding.clone(), event_tx.clone())
        .context("Failed to start hotkey listener")?;

    if let Some(path) = store.path() {
        info!("Using config at {}", path.display());
    }

    let host_thread: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::default();
    let host_slot = host_thread.clone();
    let host_events = event_tx.clone();
    let shutdown_tx = event_tx.clone();

    let ui_result = tokio::task::block_in_place(move || {
        ui::run_popup(command_rx, event_tx, move |ctx| {
            let factory = EguiSurfaceFactory::new(command_tx, ctx);
            quit_on_ctrl_c(&runtime, factory.quit_handle());
            let host = Host::new(
                factory,
                ArboardClipboard,
                RdevHotkeys::new(binding),
                store,
                gateway,
                runtime,
                host_events,
            );
            match thread::Builder::new()
                .name("host".into())
                .spawn(move || host.run(event_rx))
            {
                Ok(handle) => {
                    if let Ok(mut slot) = host_slot.lock() {
                        *slot = Some(handle);
                    }
                }
                Err(e) => error!("Failed to spawn host thread: {}", e),
            }
        })
    });

    let handle = host_thread
        .lock()
        .map_err(|_| anyhow!("Host thread handle lock poisoned"))?
        .take();
    if let Some(handle) = handle {
        let _ = shutdown_tx.send(HostEvent::Shutdown);
        if handle.join().is_err() {
            error!("Host thread panicked");
        }
    }

    ui_result.context("Popup window failed")?;
    info!("Daemon stopped");
    Ok(())
}

fn quit_on_ctrl_c(runtime: &Handle, quit: QuitHandle) {
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                quit.quit();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
}
