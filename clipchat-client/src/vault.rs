//! API key persistence in the per-user OS credential store.

use clipchat_core::{SecretVault, VaultError};

/// Target name of the generic credential holding the API key.
pub const DEFAULT_CREDENTIAL_TARGET: &str = "ClipChat/openai_api_key";

/// Windows Credential Manager entry for a single secret.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    target: String,
}

impl CredentialVault {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for CredentialVault {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_TARGET)
    }
}

impl SecretVault for CredentialVault {
    fn read_api_key(&self) -> Result<Option<String>, VaultError> {
        platform::read_secret(&self.target)
    }

    fn write_api_key(&self, api_key: &str) -> Result<(), VaultError> {
        platform::write_secret(&self.target, api_key)
    }
}

/// Credential blobs hold UTF-16LE text without a terminator.
pub fn encode_secret(secret: &str) -> Vec<u8> {
    secret.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn decode_secret(blob: &[u8]) -> Result<String, VaultError> {
    if blob.len() % 2 != 0 {
        return Err(VaultError::Read(format!(
            "credential blob has odd length {}",
            blob.len()
        )));
    }
    let mut utf16: Vec<u16> = blob
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if let Some(0) = utf16.last().copied() {
        utf16.pop();
    }
    String::from_utf16(&utf16).map_err(|e| VaultError::Read(format!("invalid UTF-16 secret: {e}")))
}

#[cfg(target_os = "windows")]
mod platform {
    use clipchat_core::VaultError;
    use windows_sys::Win32::Foundation::{ERROR_NOT_FOUND, GetLastError};
    use windows_sys::Win32::Security::Credentials::{
        CRED_PERSIST_LOCAL_MACHINE, CRED_TYPE_GENERIC, CREDENTIALW, CredFree, CredReadW,
        CredWriteW,
    };

    use super::{decode_secret, encode_secret};

    // CRED_MAX_CREDENTIAL_BLOB_SIZE
    const MAX_BLOB_BYTES: usize = 5 * 512;

    pub(super) fn read_secret(target: &str) -> Result<Option<String>, VaultError> {
        let target_w = wide_null(target);
        let mut credential: *mut CREDENTIALW = std::ptr::null_mut();

        let ok = unsafe { CredReadW(target_w.as_ptr(), CRED_TYPE_GENERIC, 0, &mut credential) };
        if ok == 0 {
            let status = unsafe { GetLastError() };
            if status == ERROR_NOT_FOUND {
                return Ok(None);
            }
            return Err(VaultError::Read(format!("CredReadW failed: {status}")));
        }

        let blob = unsafe {
            let size = (*credential).CredentialBlobSize as usize;
            let data = (*credential).CredentialBlob;
            if size == 0 || data.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(data, size).to_vec()
            }
        };
        unsafe { CredFree(credential as *const _) };

        let secret = decode_secret(&blob)?;
        if secret.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(secret))
    }

    pub(super) fn write_secret(target: &str, secret: &str) -> Result<(), VaultError> {
        let mut target_w = wide_null(target);
        let mut user_w = wide_null("ClipChat");
        let mut blob = encode_secret(secret);
        if blob.len() > MAX_BLOB_BYTES {
            return Err(VaultError::Write("secret too large".to_owned()));
        }

        let mut credential: CREDENTIALW = unsafe { std::mem::zeroed() };
        credential.Type = CRED_TYPE_GENERIC;
        credential.TargetName = target_w.as_mut_ptr();
        credential.UserName = user_w.as_mut_ptr();
        credential.CredentialBlobSize = blob.len() as u32;
        credential.CredentialBlob = blob.as_mut_ptr();
        credential.Persist = CRED_PERSIST_LOCAL_MACHINE;

        let ok = unsafe { CredWriteW(&credential, 0) };
        if ok == 0 {
            let status = unsafe { GetLastError() };
            return Err(VaultError::Write(format!("CredWriteW failed: {status}")));
        }
        Ok(())
    }

    /// Test cleanup only; the app never removes a stored key.
    #[cfg(test)]
    pub(super) fn delete_secret(target: &str) -> Result<(), VaultError> {
        use windows_sys::Win32::Security::Credentials::CredDeleteW;

        let target_w = wide_null(target);
        let ok = unsafe { CredDeleteW(target_w.as_ptr(), CRED_TYPE_GENERIC, 0) };
        if ok == 0 {
            let status = unsafe { GetLastError() };
            if status == ERROR_NOT_FOUND {
                return Ok(());
            }
            return Err(VaultError::Write(format!("CredDeleteW failed: {status}")));
        }
        Ok(())
    }

    fn wide_null(s: &str) -> Vec<u16> {
        let mut v: Vec<u16> = s.encode_utf16().collect();
        v.push(0);
        v
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use clipchat_core::VaultError;

    pub(super) fn read_secret(_target: &str) -> Result<Option<String>, VaultError> {
        Ok(None)
    }

    pub(super) fn write_secret(_target: &str, _secret: &str) -> Result<(), VaultError> {
        Err(VaultError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_stored_as_utf16le() {
        assert_eq!(encode_secret("sk-Ω"), vec![b's', 0, b'k', 0, b'-', 0, 0xA9, 0x03]);
    }

    #[test]
    fn decode_accepts_trailing_terminator() {
        let mut blob = encode_secret("sk-abc");
        blob.extend_from_slice(&[0, 0]);
        assert_eq!(decode_secret(&blob).expect("decode"), "sk-abc");
    }

    #[test]
    fn decode_rejects_odd_length_blob() {
        assert!(matches!(decode_secret(&[b'a']), Err(VaultError::Read(_))));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn stored_key_reads_back_and_overwrites() {
        let vault = CredentialVault::new(format!("ClipChat/test-{}", std::process::id()));
        platform::delete_secret(vault.target()).expect("reset leftovers");
        assert_eq!(vault.read_api_key().expect("read empty"), None);

        vault
            .write_api_key("sk-test-0123456789abcdef")
            .expect("write");
        assert_eq!(
            vault.read_api_key().expect("read").as_deref(),
            Some("sk-test-0123456789abcdef")
        );

        vault.write_api_key("sk-test-replaced-0000000").expect("overwrite");
        assert_eq!(
            vault.read_api_key().expect("read").as_deref(),
            Some("sk-test-replaced-0000000")
        );

        platform::delete_secret(vault.target()).expect("cleanup");
        assert_eq!(vault.read_api_key().expect("read cleared"), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn non_windows_vault_is_empty_and_read_only() {
        let vault = CredentialVault::default();
        assert_eq!(vault.read_api_key().expect("read"), None);
        assert!(matches!(
            vault.write_api_key("sk-test"),
            Err(VaultError::Unsupported)
        ));
    }
}
