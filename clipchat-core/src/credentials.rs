use thiserror::Error;
use tracing::warn;

/// Environment variable consulted when the vault holds no key.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

const API_KEY_PREFIX: &str = "sk-";
const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("credential vault is not available on this platform")]
    Unsupported,
    #[error("credential read failed: {0}")]
    Read(String),
    #[error("credential write failed: {0}")]
    Write(String),
}

/// Storage for the API key in an OS-managed secret store.
pub trait SecretVault {
    fn read_api_key(&self) -> Result<Option<String>, VaultError>;
    fn write_api_key(&self, api_key: &str) -> Result<(), VaultError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Vault,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub api_key: String,
    pub source: KeySource,
}

/// Where the key shown in the UI stands.
///
/// `Missing -> Entered -> Saved`; a key resolved at startup begins as `Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Missing,
    Entered,
    Saved(KeySource),
}

/// Resolves the API key: a stored key wins, the environment value is only a fallback.
///
/// Vault failures are logged and treated as "no stored key".
pub fn resolve_api_key(vault: &dyn SecretVault, env_value: Option<String>) -> Option<ResolvedKey> {
    match vault.read_api_key() {
        Ok(Some(key)) if !key.trim().is_empty() => {
            return Some(ResolvedKey {
                api_key: key.trim().to_owned(),
                source: KeySource::Vault,
            });
        }
        Ok(_) => {}
        Err(err) => warn!("reading stored API key failed: {err}"),
    }

    env_value
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty())
        .map(|api_key| ResolvedKey {
            api_key,
            source: KeySource::Environment,
        })
}

/// Heuristic for text that looks like an OpenAI secret key.
pub fn looks_like_api_key(text: &str) -> bool {
    let text = text.trim();
    text.starts_with(API_KEY_PREFIX) && text.len() >= MIN_API_KEY_LEN
}
