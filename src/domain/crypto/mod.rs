//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for cryptographic artifacts including:
//! - Hash algorithms and digest values with size validation
//! - The signing certificate and its local RSA verification
//!
//! Private key material never appears here; only public halves are held
//! locally.

mod cert;
mod digest_bytes;
mod hash;

pub use cert::SigningCertificate;
pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::HashAlgorithm;
