//! Per-provider API key storage.
//!
//! The orchestration core only sees [`CredentialStore`]; whether a key lives
//! in the OS keyring, an obfuscated file or memory is the caller's choice.

use crate::core::builtin_providers::Provider;
use crate::core::config::io::{write_atomically, ConfigError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub const KEYRING_SERVICE: &str = "parley";

/// Failure talking to the platform keyring. Recoverable errors mean the
/// backend was unavailable (locked, no session bus) rather than broken.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

#[derive(Debug, Clone)]
pub enum CredentialError {
    Keyring(Arc<KeyringAccessError>),
    /// The credentials file could not be read, decoded or written.
    File(String),
    Codec(String),
    /// No key in the store and none in the provider's environment variable.
    Missing {
        provider_id: String,
        env_var: Option<String>,
    },
}

impl CredentialError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CredentialError::Keyring(err) if err.is_recoverable())
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Keyring(err) => write!(f, "Keyring error: {err}"),
            CredentialError::File(msg) => write!(f, "Credentials file error: {msg}"),
            CredentialError::Codec(msg) => write!(f, "Stored credential is unreadable: {msg}"),
            CredentialError::Missing {
                provider_id,
                env_var: Some(var),
            } => write!(f, "No API key for '{provider_id}' (run `parley auth {provider_id}` or set {var})"),
            CredentialError::Missing {
                provider_id,
                env_var: None,
            } => write!(f, "No API key for '{provider_id}' (run `parley auth {provider_id}`)"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Keyring(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<keyring::Error> for CredentialError {
    fn from(err: keyring::Error) -> Self {
        CredentialError::Keyring(Arc::new(KeyringAccessError::from(err)))
    }
}

impl From<ConfigError> for CredentialError {
    fn from(err: ConfigError) -> Self {
        CredentialError::File(err.to_string())
    }
}

/// Opaque per-provider secret storage.
pub trait CredentialStore: Send + Sync {
    fn save(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError>;

    /// `Ok(None)` when nothing is stored for the provider.
    fn load(&self, provider_id: &str) -> Result<Option<String>, CredentialError>;

    fn clear(&self, provider_id: &str) -> Result<(), CredentialError>;
}

fn normalize(provider_id: &str) -> String {
    provider_id.trim().to_lowercase()
}

/// Find the key for `provider`: the store first, then the provider's
/// environment variable. Providers that need no key resolve to `None`.
pub fn resolve_api_key(
    store: &dyn CredentialStore,
    provider: &Provider,
) -> Result<Option<String>, CredentialError> {
    let stored = match store.load(&provider.id) {
        Ok(secret) => secret,
        Err(err) if err.is_recoverable() => {
            warn!(provider = %provider.id, error = %err, "Keyring unavailable; trying environment");
            None
        }
        Err(err) => return Err(err),
    };
    if let Some(secret) = stored.filter(|s| !s.trim().is_empty()) {
        return Ok(Some(secret));
    }

    if let Some(var) = &provider.api_key_env {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                debug!(provider = %provider.id, env = %var, "Using API key from environment");
                return Ok(Some(value.trim().to_string()));
            }
        }
    }

    if provider.requires_key {
        Err(CredentialError::Missing {
            provider_id: provider.id.clone(),
            env_var: provider.api_key_env.clone(),
        })
    } else {
        Ok(None)
    }
}

#[derive(Clone, Debug)]
enum KeyringCacheEntry {
    Present(String),
    Missing,
}

/// OS keyring backed store. Lookups are cached for the life of the store so
/// a locked keychain is only prompted once.
#[derive(Default)]
pub struct KeyringCredentialStore {
    cache: Mutex<HashMap<String, KeyringCacheEntry>>,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, KeyringCacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
        let key = normalize(provider_id);
        let entry = keyring::Entry::new(KEYRING_SERVICE, &key)?;
        entry.set_password(secret)?;
        self.cache()
            .insert(key, KeyringCacheEntry::Present(secret.to_string()));
        Ok(())
    }

    fn load(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
        let key = normalize(provider_id);
        if let Some(cached) = self.cache().get(&key) {
            return Ok(match cached {
                KeyringCacheEntry::Present(secret) => Some(secret.clone()),
                KeyringCacheEntry::Missing => None,
            });
        }

        debug!(provider = %key, "Keyring lookup");
        let entry = keyring::Entry::new(KEYRING_SERVICE, &key)?;
        let found = match entry.get_password() {
            Ok(secret) => Some(secret),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => return Err(err.into()),
        };
        let cached = match &found {
            Some(secret) => KeyringCacheEntry::Present(secret.clone()),
            None => KeyringCacheEntry::Missing,
        };
        self.cache().insert(key, cached);
        Ok(found)
    }

    fn clear(&self, provider_id: &str) -> Result<(), CredentialError> {
        let key = normalize(provider_id);
        let entry = keyring::Entry::new(KEYRING_SERVICE, &key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(err) => return Err(err.into()),
        }
        self.cache().insert(key, KeyringCacheEntry::Missing);
        Ok(())
    }
}

/// Reversible encoding applied to secrets at rest. This is obfuscation so keys
/// are not readable at a glance, not encryption.
pub trait SecretCodec: Send + Sync {
    fn encode(&self, secret: &str) -> String;
    fn decode(&self, stored: &str) -> Result<String, CredentialError>;
}

/// XOR against a fixed pad, then base64.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorBase64Codec;

impl XorBase64Codec {
    const PAD: &'static [u8] = b"parley-credential-pad";

    fn xor(bytes: &mut [u8]) {
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte ^= Self::PAD[i % Self::PAD.len()];
        }
    }
}

impl SecretCodec for XorBase64Codec {
    fn encode(&self, secret: &str) -> String {
        let mut bytes = secret.as_bytes().to_vec();
        Self::xor(&mut bytes);
        BASE64.encode(bytes)
    }

    fn decode(&self, stored: &str) -> Result<String, CredentialError> {
        let mut bytes = BASE64
            .decode(stored.trim())
            .map_err(|err| CredentialError::Codec(err.to_string()))?;
        Self::xor(&mut bytes);
        String::from_utf8(bytes).map_err(|err| CredentialError::Codec(err.to_string()))
    }
}

/// Secrets in a TOML table (`provider = "<encoded>"`) next to the config file.
pub struct FileCredentialStore {
    path: PathBuf,
    codec: Box<dyn SecretCodec>,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub const FILE_NAME: &'static str = "credentials.toml";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, Box::new(XorBase64Codec))
    }

    pub fn with_codec(path: impl Into<PathBuf>, codec: Box<dyn SecretCodec>) -> Self {
        Self {
            path: path.into(),
            codec,
            lock: Mutex::new(()),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|err| CredentialError::File(format!("{}: {err}", self.path.display())))?;
        toml::from_str(&contents)
            .map_err(|err| CredentialError::File(format!("{}: {err}", self.path.display())))
    }

    fn write_table(&self, table: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        let contents =
            toml::to_string(table).map_err(|err| CredentialError::File(err.to_string()))?;
        write_atomically(&self.path, &contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
        let _guard = self.guard();
        let mut table = self.read_table()?;
        table.insert(normalize(provider_id), self.codec.encode(secret));
        self.write_table(&table)
    }

    fn load(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
        let _guard = self.guard();
        let table = self.read_table()?;
        table
            .get(&normalize(provider_id))
            .map(|stored| self.codec.decode(stored))
            .transpose()
    }

    fn clear(&self, provider_id: &str) -> Result<(), CredentialError> {
        let _guard = self.guard();
        let mut table = self.read_table()?;
        if table.remove(&normalize(provider_id)).is_some() {
            self.write_table(&table)?;
        }
        Ok(())
    }
}

/// Process-local store, used for `--env-only` sessions and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn secrets(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.secrets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
        self.secrets()
            .insert(normalize(provider_id), secret.to_string());
        Ok(())
    }

    fn load(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.secrets().get(&normalize(provider_id)).cloned())
    }

    fn clear(&self, provider_id: &str) -> Result<(), CredentialError> {
        self.secrets().remove(&normalize(provider_id));
        Ok(())
    }
}
