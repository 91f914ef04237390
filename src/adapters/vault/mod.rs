//! Azure Key Vault as the remote signing authority.

pub mod client;
pub mod protocol;

pub use client::{KeyVaultClient, KeyVaultConfig};
pub use protocol::{parse_bearer_challenge, BearerChallenge};
