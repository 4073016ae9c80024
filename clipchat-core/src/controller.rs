//! State behind the main window: what gets sent, what came back, and what the status line says.
//!
//! The UI owns one [`Controller`] on its thread. Request tasks never touch it directly; they send
//! [`StreamEvent`]s tagged with a request id and the UI feeds them to [`Controller::apply_event`].

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ChatRequest, StreamEvent};
use crate::credentials::{KeySource, KeyState, ResolvedKey, SecretVault, VaultError, looks_like_api_key};
use crate::preset::{Preset, PresetBook, PresetError};
use crate::settings::{SUGGESTED_MODELS, Settings, SettingsError};

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard does not contain text")]
    NoText,
}

/// Synchronous access to the OS clipboard.
pub trait ClipboardAccess {
    fn read_text(&mut self) -> Result<String, ClipboardError>;
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Persistence for [`Settings`]. Loading never fails; saving reports why it did not happen.
pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending { request_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteTrigger {
    Manual,
    Launch,
}

/// The request/response pair of the latest send. Replaced by the next send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    pub input_text: String,
    pub system_prompt: String,
    pub output_text: String,
}

/// Everything a request task needs, detached from the controller.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub request_id: u64,
    pub api_key: String,
    pub api_base_url: String,
    pub request: ChatRequest,
}

#[derive(Debug, Error, PartialEq)]
pub enum SendRejected {
    #[error("a request is already running; wait for it or cancel it first")]
    Busy,
    #[error("enter your OpenAI API key (or set OPENAI_API_KEY) before sending")]
    MissingApiKey,
    #[error("input text is empty")]
    EmptyInput,
    #[error(transparent)]
    InvalidSettings(SettingsError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(SettingsError),
    #[error("could not write settings: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),
    #[error("settings saved, but the API key could not be stored: {0}")]
    Vault(VaultError),
}

pub struct Controller {
    settings: Settings,
    presets: PresetBook,
    selected_preset: Option<String>,
    system_prompt: String,
    input: String,
    output: String,
    api_key: String,
    key_state: KeyState,
    phase: Phase,
    turn: Option<Turn>,
    notice: Option<Notice>,
    next_request_id: u64,
    models: Vec<String>,
}

impl Controller {
    pub fn new(settings: Settings, key: Option<ResolvedKey>) -> Self {
        let presets = PresetBook::with_custom(&settings.custom_presets);
        let selected_preset = settings
            .selected_preset
            .as_deref()
            .and_then(|name| presets.get(name))
            .map(|preset| preset.name.clone());
        let (api_key, key_state) = match key {
            Some(resolved) => (resolved.api_key, KeyState::Saved(resolved.source)),
            None => (String::new(), KeyState::Missing),
        };

        let mut controller = Self {
            system_prompt: settings.system_prompt.clone(),
            settings,
            presets,
            selected_preset,
            input: String::new(),
            output: String::new(),
            api_key,
            key_state,
            phase: Phase::Idle,
            turn: None,
            notice: None,
            next_request_id: 1,
            models: Vec::new(),
        };
        controller.set_models(Vec::new());

        if controller.key_state == KeyState::Missing {
            controller.notify(
                NoticeLevel::Warning,
                "No API key configured. Enter one under Settings.",
            );
        } else {
            controller.notify(NoticeLevel::Info, "Ready");
        }
        controller
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Staged settings edits; they are persisted by [`Controller::save`].
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn system_prompt_mut(&mut self) -> &mut String {
        &mut self.system_prompt
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_key_mut(&mut self) -> &mut String {
        &mut self.api_key
    }

    pub fn key_state(&self) -> KeyState {
        self.key_state
    }

    /// Called when the user edits the key field.
    pub fn mark_key_edited(&mut self) {
        self.key_state = if self.api_key.trim().is_empty() {
            KeyState::Missing
        } else {
            KeyState::Entered
        };
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.phase, Phase::Sending { .. })
    }

    pub fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
        });
    }

    pub fn presets(&self) -> &PresetBook {
        &self.presets
    }

    pub fn selected_preset(&self) -> Option<&str> {
        self.selected_preset.as_deref()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Replaces the model list offered in the picker. The suggested models and the configured
    /// model stay available.
    pub fn set_models(&mut self, fetched: Vec<String>) {
        let mut models = fetched;
        for suggested in SUGGESTED_MODELS {
            if !models.iter().any(|m| m == suggested) {
                models.push((*suggested).to_owned());
            }
        }
        if !models.iter().any(|m| *m == self.settings.model) {
            models.insert(0, self.settings.model.clone());
        }
        self.models = models;
    }

    /// Makes the preset's prompt the current system prompt. In-flight requests and past output
    /// are unaffected.
    pub fn select_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let preset = self
            .presets
            .get(name)
            .ok_or_else(|| PresetError::NotFound(name.trim().to_owned()))?;
        self.system_prompt = preset.system_prompt.clone();
        self.selected_preset = Some(preset.name.clone());
        Ok(())
    }

    /// Stores the current system prompt as a new custom preset and selects it.
    pub fn save_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let result = self
            .presets
            .add(Preset::new(name, self.system_prompt.clone()));
        match &result {
            Ok(()) => {
                self.selected_preset = Some(name.trim().to_owned());
                self.notify(
                    NoticeLevel::Success,
                    format!("Preset \"{}\" added", name.trim()),
                );
            }
            Err(err) => self.notify(NoticeLevel::Warning, err.to_string()),
        }
        result
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<(), PresetError> {
        match self.presets.remove(name) {
            Ok(removed) => {
                if self
                    .selected_preset
                    .as_deref()
                    .is_some_and(|selected| selected == removed.name)
                {
                    self.selected_preset = None;
                }
                self.notify(
                    NoticeLevel::Info,
                    format!("Preset \"{}\" removed", removed.name),
                );
                Ok(())
            }
            Err(err) => {
                self.notify(NoticeLevel::Warning, err.to_string());
                Err(err)
            }
        }
    }

    /// Starts a send. Only one request runs at a time; a second attempt is rejected with a
    /// notice and the running request continues.
    pub fn begin_send(&mut self) -> Result<OutgoingRequest, SendRejected> {
        let result = self.prepare_send();
        match &result {
            Ok(outgoing) => {
                info!(request_id = outgoing.request_id, "send started");
                self.notify(NoticeLevel::Info, "Sending request...");
            }
            Err(rejected) => {
                let level = match rejected {
                    SendRejected::Busy => NoticeLevel::Warning,
                    _ => NoticeLevel::Error,
                };
                self.notify(level, rejected.to_string());
            }
        }
        result
    }

    fn prepare_send(&mut self) -> Result<OutgoingRequest, SendRejected> {
        if self.is_sending() {
            return Err(SendRejected::Busy);
        }
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(SendRejected::MissingApiKey);
        }
        let prompt = self.input.trim();
        if prompt.is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        let settings = self.settings.clone().normalized();
        settings
            .validate()
            .map_err(SendRejected::InvalidSettings)?;

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = ChatRequest {
            prompt: prompt.to_owned(),
            system_prompt: self.system_prompt.clone(),
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };
        let outgoing = OutgoingRequest {
            request_id,
            api_key: api_key.to_owned(),
            api_base_url: settings.api_base_url,
            request,
        };

        self.output.clear();
        self.turn = Some(Turn {
            input_text: outgoing.request.prompt.clone(),
            system_prompt: outgoing.request.system_prompt.clone(),
            output_text: String::new(),
        });
        self.phase = Phase::Sending { request_id };
        Ok(outgoing)
    }

    /// Applies one event from a request task. Events for anything but the running request are
    /// dropped; returns whether the event was applied.
    pub fn apply_event(&mut self, request_id: u64, event: StreamEvent) -> bool {
        if self.phase != (Phase::Sending { request_id }) {
            return false;
        }

        match event {
            StreamEvent::Chunk(text) => {
                self.output.push_str(&text);
                if let Some(turn) = self.turn.as_mut() {
                    turn.output_text.push_str(&text);
                }
            }
            StreamEvent::Finished => {
                self.phase = Phase::Idle;
                self.notify(NoticeLevel::Success, "Done");
            }
            StreamEvent::Failed(err) => {
                self.phase = Phase::Idle;
                warn!(request_id, "request failed: {err}");
                if self.output.is_empty() {
                    self.output = format!("Error: {err}");
                } else {
                    self.output.push_str(&format!("\n\n[Error: {err}]"));
                }
                self.notify(NoticeLevel::Error, format!("Error: {err}"));
            }
        }
        true
    }

    /// Abandons the running request. Already streamed text stays in the output.
    pub fn cancel(&mut self) -> bool {
        let Phase::Sending { request_id } = self.phase else {
            return false;
        };
        info!(request_id, "send cancelled");
        self.phase = Phase::Idle;
        self.notify(NoticeLevel::Warning, "Cancelled");
        true
    }

    pub fn paste_from_clipboard(
        &mut self,
        clipboard: &mut dyn ClipboardAccess,
        trigger: PasteTrigger,
    ) -> bool {
        let text = match clipboard.read_text() {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(ClipboardError::NoText) => {
                if trigger == PasteTrigger::Manual {
                    self.notify(NoticeLevel::Warning, "Clipboard has no text");
                }
                return false;
            }
            Err(err) => {
                warn!("clipboard read failed: {err}");
                self.notify(NoticeLevel::Warning, err.to_string());
                return false;
            }
        };

        if looks_like_api_key(&text) {
            let message = match trigger {
                PasteTrigger::Launch => "Clipboard looks like an API key; skipped auto paste",
                PasteTrigger::Manual => "Clipboard looks like an API key; not pasted",
            };
            self.notify(NoticeLevel::Warning, message);
            return false;
        }

        self.input = text;
        self.notify(NoticeLevel::Success, "Pasted from clipboard");
        true
    }

    pub fn copy_output(&mut self, clipboard: &mut dyn ClipboardAccess) -> bool {
        if self.output.is_empty() {
            self.notify(NoticeLevel::Warning, "Nothing to copy");
            return false;
        }
        match clipboard.write_text(&self.output) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Copied to clipboard");
                true
            }
            Err(err) => {
                warn!("clipboard write failed: {err}");
                self.notify(NoticeLevel::Error, err.to_string());
                false
            }
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// The settings record as it would be persisted right now.
    pub fn settings_snapshot(&self) -> Settings {
        Settings {
            system_prompt: self.system_prompt.clone(),
            selected_preset: self.selected_preset.clone(),
            custom_presets: self.presets.custom().to_vec(),
            ..self.settings.clone()
        }
        .normalized()
    }

    /// Persists settings and, if the user entered one, the API key. An empty key field never
    /// removes a stored key.
    pub fn save(
        &mut self,
        store: &dyn SettingsStore,
        vault: &dyn SecretVault,
    ) -> Result<(), SaveError> {
        let result = self.save_inner(store, vault);
        match &result {
            Ok(()) => self.notify(NoticeLevel::Success, "Settings saved"),
            Err(err) => {
                warn!("saving settings failed: {err}");
                self.notify(NoticeLevel::Error, err.to_string());
            }
        }
        result
    }

    fn save_inner(
        &mut self,
        store: &dyn SettingsStore,
        vault: &dyn SecretVault,
    ) -> Result<(), SaveError> {
        let snapshot = self.settings_snapshot();
        snapshot.validate().map_err(SaveError::Invalid)?;
        store.save(&snapshot).map_err(SaveError::Store)?;
        self.settings.model = snapshot.model;
        self.settings.api_base_url = snapshot.api_base_url;

        let key = self.api_key.trim();
        if self.key_state == KeyState::Entered && !key.is_empty() {
            vault.write_api_key(key).map_err(SaveError::Vault)?;
            self.key_state = KeyState::Saved(KeySource::Vault);
            info!("API key stored in credential vault");
        }
        Ok(())
    }
}
