//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Azure Key Vault as the remote signing authority
//! - HTTP timestamp authority communication with retry logic
//! - PowerShell scripts as signable packages
//! - The backend seam the command layer resolves identities through

pub mod backend;
pub mod package;
pub mod timestamp_http_client;
pub mod vault;
