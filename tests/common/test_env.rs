//! Live vault settings for opt-in tests.
//!
//! Tests that talk to a real Key Vault read their coordinates from
//! `KEYVAULT_SIGNER_TEST_*` variables. A repository-root `.env` is merged
//! into the process environment first, without overriding variables that
//! are already set.

use std::env;
use std::fs;
use std::path::Path;

use keyvault_signer::SignCommandArgs;

const PREFIX: &str = "KEYVAULT_SIGNER_TEST_";

/// Coordinates of a vault and certificate usable for live signing.
#[derive(Debug, Clone)]
pub struct LiveVault {
    pub vault_url: String,
    pub certificate: String,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timestamp_url: Option<String>,
}

impl LiveVault {
    /// Read the live settings, or `None` when no vault is configured.
    pub fn from_env() -> Option<Self> {
        load_dotenv_if_present();

        let live = Self {
            vault_url: var("VAULT_URL")?,
            certificate: var("CERTIFICATE")?,
            access_token: var("ACCESS_TOKEN"),
            client_id: var("CLIENT_ID"),
            client_secret: var("CLIENT_SECRET"),
            timestamp_url: var("TIMESTAMP_URL"),
        };
        let has_credentials =
            live.access_token.is_some() || (live.client_id.is_some() && live.client_secret.is_some());
        has_credentials.then_some(live)
    }

    /// `sign` options pointing at this vault.
    pub fn sign_args(&self, file: &Path) -> SignCommandArgs {
        SignCommandArgs {
            file: file.to_path_buf(),
            vault_url: Some(self.vault_url.clone()),
            certificate: Some(self.certificate.clone()),
            access_token: self.access_token.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            timestamp_url: self.timestamp_url.clone(),
            ..SignCommandArgs::default()
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(format!("{PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Merge `<repo>/.env` into the environment. Missing or unreadable files are ignored.
pub fn load_dotenv_if_present() {
    let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let Ok(content) = fs::read_to_string(&env_path) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }

        let value = raw_value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        env::set_var(key, value);
    }
}
