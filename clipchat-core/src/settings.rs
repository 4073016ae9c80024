use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::preset::{Preset, TRANSLATE_PROMPT};

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const MIN_MAX_TOKENS: u32 = 1;
pub const MAX_MAX_TOKENS: u32 = 16_384;
pub const MAX_MODEL_LEN: usize = 128;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Models offered in the model picker before the list is refreshed from the API.
pub const SUGGESTED_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Non-secret settings persisted to `config.json`.
///
/// Every field falls back to its default when absent, so partial or older files still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub always_on_top: bool,
    #[serde(alias = "auto_paste")]
    pub auto_paste_on_launch: bool,
    pub system_prompt: String,
    pub selected_preset: Option<String>,
    pub custom_presets: Vec<Preset>,
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            always_on_top: true,
            auto_paste_on_launch: true,
            system_prompt: TRANSLATE_PROMPT.to_owned(),
            selected_preset: Some("Translate".to_owned()),
            custom_presets: Vec::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("temperature must be between 0 and 2 (got {0})")]
    TemperatureOutOfRange(f32),
    #[error("max tokens must be between 1 and 16384 (got {0})")]
    MaxTokensOutOfRange(u32),
    #[error("model name is required")]
    EmptyModel,
    #[error("model name is too long ({0} > 128 chars)")]
    ModelTooLong(usize),
    #[error("{0} has leading or trailing whitespace")]
    Untrimmed(&'static str),
    #[error("API base URL is invalid: {0}")]
    InvalidBaseUrl(String),
}

impl Settings {
    /// Checks every field range. Used before saving; invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.temperature.is_finite()
            || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature)
        {
            return Err(SettingsError::TemperatureOutOfRange(self.temperature));
        }
        if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&self.max_tokens) {
            return Err(SettingsError::MaxTokensOutOfRange(self.max_tokens));
        }

        let model = self.model.trim();
        if model.is_empty() {
            return Err(SettingsError::EmptyModel);
        }
        if model.len() > MAX_MODEL_LEN {
            return Err(SettingsError::ModelTooLong(model.len()));
        }
        // Loading trims, so only trimmed values survive a save/load cycle unchanged.
        if model != self.model {
            return Err(SettingsError::Untrimmed("model name"));
        }
        if self.api_base_url.trim() != self.api_base_url {
            return Err(SettingsError::Untrimmed("API base URL"));
        }

        parse_base_url(&self.api_base_url)?;
        Ok(())
    }

    /// Trims the free-text fields the UI edits directly.
    pub fn normalized(mut self) -> Self {
        self.model = self.model.trim().to_owned();
        self.api_base_url = self.api_base_url.trim().to_owned();
        self
    }

    /// Pulls loaded values back into range. Loading never fails, so bad numbers are clamped
    /// and bad strings replaced by their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();

        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
        } else {
            defaults.temperature
        };
        self.max_tokens = self.max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);

        let model = self.model.trim();
        self.model = if model.is_empty() || model.len() > MAX_MODEL_LEN {
            defaults.model
        } else {
            model.to_owned()
        };

        self.api_base_url = match parse_base_url(&self.api_base_url) {
            Ok(_) => self.api_base_url.trim().to_owned(),
            Err(_) => defaults.api_base_url,
        };

        self
    }
}

/// Parses an API base URL, accepting only absolute `http`/`https` URLs.
pub fn parse_base_url(raw: &str) -> Result<Url, SettingsError> {
    let url = Url::parse(raw.trim()).map_err(|err| SettingsError::InvalidBaseUrl(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SettingsError::InvalidBaseUrl(format!(
            "unsupported scheme `{other}`"
        ))),
    }
}
