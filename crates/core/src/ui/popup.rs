//! The prompt popup window.
//!
//! One native window is reused for every popup instance: "closing" hides
//! it and tells the host, "opening" resets it under a new [`SurfaceId`].

use super::settings::{SettingsForm, Status};
use super::state::{PopupModel, UiCommand, UiState};
use crate::config::{Configuration, PresetPrompt};
use crate::content::{CapturedContent, PromptSource};
use crate::dispatcher::SurfaceId;
use crate::host::HostEvent;
use crate::image_processing::ImageProcessor;
use crate::ipc::{ConfigReply, HostMessage, SurfaceMessage};
use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct OpenSurface {
    id: SurfaceId,
    alive: Arc<AtomicBool>,
    ready_sent: bool,
}

pub struct PromptPopup {
    commands: Receiver<UiCommand>,
    events: Sender<HostEvent>,
    surface: Option<OpenSurface>,

    model: PopupModel,
    presets: Vec<PresetPrompt>,

    // Image preview
    image_texture: Option<egui::TextureHandle>,
    image_failed: bool,

    // Settings
    settings: Option<SettingsForm>,
    show_settings: bool,
    config_request: Option<Receiver<Configuration>>,
    save_request: Option<Receiver<ConfigReply>>,

    markdown_cache: CommonMarkCache,

    /// Set once the user asked to exit; close requests are then honored.
    quitting: bool,
}

impl PromptPopup {
    pub fn new(commands: Receiver<UiCommand>, events: Sender<HostEvent>) -> Self {
        Self {
            commands,
            events,
            surface: None,
            model: PopupModel::default(),
            presets: Vec::new(),
            image_texture: None,
            image_failed: false,
            settings: None,
            show_settings: false,
            config_request: None,
            save_request: None,
            markdown_cache: CommonMarkCache::default(),
            quitting: false,
        }
    }

    fn send(&self, message: SurfaceMessage) {
        if let Some(surface) = &self.surface {
            let _ = self.events.send(HostEvent::Surface {
                surface: surface.id,
                message,
            });
        }
    }

    fn process_commands(&mut self, ctx: &egui::Context) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                UiCommand::Open { surface, alive } => {
                    debug!("Opening popup as {}", surface);
                    self.reset();
                    self.surface = Some(OpenSurface {
                        id: surface,
                        alive,
                        ready_sent: false,
                    });
                    self.request_config();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                UiCommand::Deliver(message) => {
                    if matches!(message, HostMessage::ClipboardContent(_)) {
                        self.image_texture = None;
                        self.image_failed = false;
                    }
                    self.model.apply(message);
                }
                UiCommand::Focus => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                UiCommand::Close => self.hide(ctx),
                UiCommand::Quit => self.quit(ctx),
            }
        }
    }

    fn reset(&mut self) {
        self.model = PopupModel::default();
        self.image_texture = None;
        self.image_failed = false;
        self.show_settings = false;
        self.save_request = None;
    }

    /// Hides the window and reports the surface as closed.
    fn hide(&mut self, ctx: &egui::Context) {
        if let Some(surface) = &self.surface {
            surface.alive.store(false, Ordering::SeqCst);
        }
        self.send(SurfaceMessage::Closed);
        self.surface = None;
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
    }

    fn quit(&mut self, ctx: &egui::Context) {
        info!("Quit requested");
        if self.surface.is_some() {
            self.hide(ctx);
        }
        self.quitting = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn request_config(&mut self) {
        let (tx, rx) = channel();
        self.send(SurfaceMessage::GetConfig { reply: tx });
        self.config_request = Some(rx);
    }

    fn poll_replies(&mut self) {
        if let Some(rx) = &self.config_request {
            if let Ok(config) = rx.try_recv() {
                self.presets = config.preset_prompts.clone();
                let status = self.settings.as_ref().and_then(|s| s.status.clone());
                let mut form = SettingsForm::from_config(&config);
                form.status = status;
                self.settings = Some(form);
                self.config_request = None;
            }
        }

        if let Some(rx) = &self.save_request {
            if let Ok(reply) = rx.try_recv() {
                self.save_request = None;
                let status = if reply.success {
                    Status::Info("Settings saved successfully!".to_string())
                } else {
                    Status::Error(format!(
                        "Error saving settings: {}",
                        reply.error.unwrap_or_else(|| "Unknown error".to_string())
                    ))
                };
                if let Some(form) = &mut self.settings {
                    form.status = Some(status);
                }
                self.request_config();
            }
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.image_texture.is_some() || self.image_failed {
            return;
        }
        let Some(CapturedContent::Image(url)) = &self.model.content else {
            return;
        };
        match ImageProcessor::decode_data_url(url) {
            Ok(image) => {
                let rgba = image.to_rgba8();
                let size = [image.width() as usize, image.height() as usize];
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice());
                self.image_texture = Some(ctx.load_texture(
                    "clipboard-image",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
            Err(e) => {
                warn!("Cannot preview captured image: {}", e);
                self.image_failed = true;
            }
        }
    }

    fn submit(&mut self, source: PromptSource, prompt: String) {
        if let Some(selection) = self.model.submit(source, prompt) {
            self.send(SurfaceMessage::PromptSelected(selection));
        }
    }

    fn save_settings(&mut self) {
        let Some(form) = &mut self.settings else {
            return;
        };
        match form.to_patch() {
            Ok(patch) => {
                form.status = Some(Status::Info("Saving...".to_string()));
                let (tx, rx) = channel();
                self.send(SurfaceMessage::SetConfig { patch, reply: tx });
                self.save_request = Some(rx);
            }
            Err(msg) => form.status = Some(Status::Error(format!("Error: {}", msg))),
        }
    }

    /// Renders the captured content section.
    fn render_content(&mut self, ui: &mut egui::Ui) {
        match &self.model.content {
            Some(CapturedContent::Text(_)) => {
                egui::ScrollArea::vertical()
                    .max_height(100.0)
                    .id_salt("input_scroll")
                    .show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut self.model.input_text)
                                .desired_rows(4)
                                .desired_width(f32::INFINITY),
                        );
                    });
            }
            Some(CapturedContent::Image(_)) => match &self.image_texture {
                Some(texture) => {
                    ui.add(
                        egui::Image::new(egui::load::SizedTexture::from_handle(texture))
                            .max_height(120.0),
                    );
                }
                None => {
                    ui.label("(image preview unavailable)");
                }
            },
            None => {
                ui.label("Nothing captured.");
            }
        }
    }

    /// Renders presets and the free-text prompt.
    fn render_prompt_ui(&mut self, ui: &mut egui::Ui) {
        let enabled = self.model.can_submit();
        let mut chosen = None;

        if self.model.needs_recapture() {
            ui.label(
                egui::RichText::new("Press the hotkey again to ask about this image.")
                    .italics(),
            );
        }

        ui.horizontal_wrapped(|ui| {
            for preset in &self.presets {
                let button = ui
                    .add_enabled(enabled, egui::Button::new(preset.name.as_str()))
                    .on_hover_text(preset.prompt.as_str());
                if button.clicked() {
                    chosen = Some((PromptSource::Preset, preset.prompt.clone()));
                }
            }
        });

        ui.horizontal(|ui| {
            let response = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.model.custom_prompt)
                    .desired_width(ui.available_width() - 40.0)
                    .hint_text("Custom prompt..."),
            );
            let enter_pressed =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.add_enabled(enabled, egui::Button::new("➤")).clicked() || enter_pressed {
                chosen = Some((PromptSource::Custom, self.model.custom_prompt.clone()));
            }
        });

        if let Some((source, prompt)) = chosen {
            self.submit(source, prompt);
        }
    }

    /// Renders the answer area and the copy/close actions.
    fn render_response_ui(&mut self, ui: &mut egui::Ui) {
        let state = self.model.state.clone();
        match &state {
            UiState::Idle => {}
            UiState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Waiting for response...");
                });
            }
            UiState::Response(text) => {
                egui::ScrollArea::vertical()
                    .max_height(180.0)
                    .id_salt("response_scroll")
                    .show(ui, |ui| {
                        CommonMarkViewer::new().show(ui, &mut self.markdown_cache, text);
                    });
            }
            UiState::Error(err) => {
                ui.label(egui::RichText::new(err.as_str()).color(egui::Color32::RED));
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            let answer = self.model.answer().map(str::to_string);
            if ui
                .add_enabled(answer.is_some(), egui::Button::new("Copy & Close"))
                .clicked()
            {
                if let Some(text) = answer {
                    self.send(SurfaceMessage::CopyAndClose(text));
                }
            }
            if ui.button("Close").clicked() {
                self.send(SurfaceMessage::ClosePromptWindow);
            }
        });
    }
}

impl eframe::App for PromptPopup {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        self.process_commands(ctx);
        self.poll_replies();

        if self.quitting {
            return;
        }

        // The window only closes through the host.
        if ctx.input(|i| i.viewport().close_requested()) {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.send(SurfaceMessage::ClosePromptWindow);
        }

        let Some(surface) = &self.surface else {
            return;
        };
        if !surface.alive.load(Ordering::SeqCst) {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.send(SurfaceMessage::ClosePromptWindow);
        }

        self.ensure_texture(ctx);

        let mut quit = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Paste Helper");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕").clicked() {
                        self.send(SurfaceMessage::ClosePromptWindow);
                    }
                    if ui.button("⚙").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    if ui.button("Quit").on_hover_text("Stop paste-helper").clicked() {
                        quit = true;
                    }
                });
            });
            ui.separator();

            self.render_content(ui);
            ui.add_space(6.0);
            self.render_prompt_ui(ui);
            ui.add_space(6.0);
            self.render_response_ui(ui);

            if self.show_settings {
                let saving = self.save_request.is_some();
                let clicked = match &mut self.settings {
                    Some(form) => form.show(ui, saving),
                    None => {
                        ui.spinner();
                        false
                    }
                };
                if clicked {
                    self.save_settings();
                }
            }
        });

        if quit {
            self.quit(ctx);
            return;
        }

        if let Some(surface) = &mut self.surface {
            if !surface.ready_sent {
                surface.ready_sent = true;
                let id = surface.id;
                let _ = self.events.send(HostEvent::Surface {
                    surface: id,
                    message: SurfaceMessage::Ready,
                });
            }
        }

        if self.model.in_flight() || self.config_request.is_some() || self.save_request.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
