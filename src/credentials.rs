// 🔑 Credential Resolver - Platform API key lookup
// Maps a platform account id to the secret key used to act on its
// connected accounts. Loaded once before the batch runs, read-only after.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Immutable table of platform API keys, keyed by platform account id.
///
/// Constructed once at process start and passed by reference into the
/// remediation engine, so tests can fabricate their own credential sets.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, String>,
}

impl ApiKeyStore {
    /// Load the key table from a flat JSON object file:
    /// `{ "acct_P1": "sk_live_...", "acct_P2": "rk_live_..." }`
    ///
    /// Failure here is fatal to the run - there is no per-record recovery
    /// for a missing or malformed key file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read API key file: {}", path.display()))?;

        let keys: HashMap<String, String> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse API key file: {}", path.display()))?;

        Ok(ApiKeyStore { keys })
    }

    /// Build a store from an in-memory map (used by tests)
    pub fn from_map(keys: HashMap<String, String>) -> Self {
        ApiKeyStore { keys }
    }

    /// Resolve a platform account id to its API key.
    ///
    /// Pure lookup over the loaded table - no network or disk access.
    /// An absent key is a valid outcome, signaled to the caller as `None`;
    /// the engine turns it into a terminal classification.
    pub fn resolve(&self, platform_account_id: &str) -> Option<&str> {
        self.keys.get(platform_account_id).map(String::as_str)
    }

    /// Number of tenants in the table
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
