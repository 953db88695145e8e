//! API key resolution and key-file management.
//!
//! Resolution order: explicit argument, then the `FIRMWARE_API_KEY`
//! environment variable, then the key file under the config directory.
//! The key file holds `KEY=VALUE` lines with `#` comments and is written
//! atomically with owner-only permissions.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::core::auth::extract_token;
use crate::error::{FwqError, Result};
use crate::storage::paths::AppPaths;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "FIRMWARE_API_KEY";

/// A resolved credential pair: the full key plus the prefix-stripped token.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub token: String,
}

impl Credentials {
    /// Build credentials from a raw API key.
    #[must_use]
    pub fn from_key(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            token: extract_token(api_key).to_string(),
        }
    }
}

/// Resolve credentials from an explicit argument, the environment, or the
/// key file. Returns `None` when nothing is configured; the engine turns
/// that into a `CredentialMissing` failure without a network call.
#[must_use]
pub fn resolve(explicit: Option<&str>) -> Option<Credentials> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Some(Credentials::from_key(key));
    }

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            return Some(Credentials::from_key(&key));
        }
    }

    let paths = AppPaths::new();
    read_key_file(&paths.key_file())
        .ok()
        .flatten()
        .map(|key| Credentials::from_key(&key))
}

/// Read the API key from a `KEY=VALUE` style key file.
///
/// # Errors
///
/// Returns an I/O error when the file exists but cannot be read.
pub fn read_key_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key == API_KEY_ENV && !value.is_empty() {
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

/// Write the API key to the key file atomically (tmp + rename), mode 0600.
///
/// # Errors
///
/// Returns an I/O error when the directory cannot be created or the file
/// cannot be written.
pub fn write_key_file(path: &Path, api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(FwqError::Config("refusing to store an empty key".into()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        writeln!(file, "# Managed by fwq. Plaintext key file, keep mode 600.")?;
        writeln!(file, "{API_KEY_ENV}={api_key}")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Delete the key file if present.
///
/// # Errors
///
/// Returns an I/O error when the file exists but cannot be removed.
pub fn delete_key_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}
