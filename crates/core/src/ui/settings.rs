//! Inline settings panel.
//!
//! The form edits a draft of the configuration; saving turns it into a
//! [`ConfigPatch`] that the host validates and persists.

use crate::config::{ConfigPatch, Configuration};
use crate::hotkey::{self, Modifier, AVAILABLE_MODIFIERS};
use eframe::egui;

/// Draft of the editable settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsForm {
    pub api_key: String,
    pub modifier: Modifier,
    pub key: String,
    pub model: String,
    /// Comma-separated provider names.
    pub providers: String,
    pub status: Option<Status>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

impl SettingsForm {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            api_key: config.api_key.clone(),
            modifier: config.hotkey_modifier.parse().unwrap_or(Modifier::Shift),
            key: config.hotkey_key.clone(),
            model: config.model.clone(),
            providers: config.provider_order.join(", "),
            status: None,
        }
    }

    /// Validates the draft and builds the patch to send.
    pub fn to_patch(&self) -> Result<ConfigPatch, String> {
        let key = hotkey::normalize_key(&self.key)
            .map_err(|_| "Hotkey Key must be a single letter or number.".to_string())?;
        if self.model.trim().is_empty() {
            return Err("Model must not be empty.".to_string());
        }

        Ok(ConfigPatch {
            api_key: Some(self.api_key.trim().to_string()),
            hotkey_modifier: Some(self.modifier.to_string()),
            hotkey_key: Some(key.to_string()),
            model: Some(self.model.trim().to_string()),
            provider_order: Some(
                self.providers
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            preset_prompts: None,
        })
    }

    /// Renders the panel. Returns true when Save was clicked.
    pub fn show(&mut self, ui: &mut egui::Ui, saving: bool) -> bool {
        ui.separator();
        ui.label("Settings");

        ui.label("API Key:");
        ui.add(
            egui::TextEdit::singleline(&mut self.api_key)
                .password(true)
                .hint_text("Paste OpenRouter API Key"),
        );

        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("hotkey_modifier")
                .selected_text(self.modifier.as_str())
                .show_ui(ui, |ui| {
                    for m in AVAILABLE_MODIFIERS {
                        ui.selectable_value(&mut self.modifier, *m, m.as_str());
                    }
                });
            ui.add(egui::TextEdit::singleline(&mut self.key).desired_width(24.0));
            ui.label("Hotkey (with Ctrl)");
        });

        ui.label("Model:");
        ui.text_edit_singleline(&mut self.model);

        ui.label("Provider order:");
        ui.add(egui::TextEdit::singleline(&mut self.providers).hint_text("Google, Vertex"));

        let clicked = ui.add_enabled(!saving, egui::Button::new("Save")).clicked();

        match &self.status {
            Some(Status::Info(msg)) => {
                ui.label(msg.as_str());
            }
            Some(Status::Error(msg)) => {
                ui.label(egui::RichText::new(msg.as_str()).color(egui::Color32::RED));
            }
            None => {}
        }
        clicked
    }
}
