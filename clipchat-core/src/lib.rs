pub mod api;
pub mod controller;
pub mod credentials;
pub mod preset;
pub mod settings;
pub mod sse;

pub use api::{ApiError, ChatClient, ChatRequest, ForwardOutcome, StreamEvent, forward_completion};
pub use controller::{
    ClipboardAccess, ClipboardError, Controller, Notice, NoticeLevel, OutgoingRequest,
    PasteTrigger, Phase, SaveError, SendRejected, SettingsStore, Turn,
};
pub use credentials::{
    API_KEY_ENV_VAR, KeySource, KeyState, ResolvedKey, SecretVault, VaultError,
    looks_like_api_key, resolve_api_key,
};
pub use preset::{Preset, PresetBook, PresetError};
pub use settings::{Settings, SettingsError};
