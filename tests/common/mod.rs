//! Shared fixtures for integration tests.
//!
//! The remote authority is replaced by an in-process client that signs with
//! a throwaway RSA key, so every test runs offline.

#![allow(dead_code)]

pub mod test_env;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use keyvault_signer::adapters::backend::{SigningBackend, VaultAccess};
use keyvault_signer::domain::types::KeyHandle;
use keyvault_signer::services::signing_context::RemoteKey;
use keyvault_signer::{
    HashAlgorithm, RemoteSigningClient, SigningCertificate, SigningError, SigningIdentity,
    SigningResult, TimestampAuthority, TimestampToken, TimestampUrl, WireAlgorithmId,
};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::md::Md;
use openssl::pkey::{PKey, Private};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::{Padding, Rsa};
use openssl::x509::{X509Builder, X509NameBuilder};
use tempfile::TempDir;

pub const KEY_ID: &str = "https://unit-test.vault.azure.net/keys/release/0123456789abcdef";

/// RSA key pair plus a self-signed certificate for it.
pub struct TestKey {
    pub pkey: PKey<Private>,
    pub cert_der: Vec<u8>,
}

impl TestKey {
    pub fn certificate(&self) -> SigningCertificate {
        SigningCertificate::from_der(self.cert_der.clone()).unwrap()
    }
}

fn generate(common_name: &str) -> TestKey {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();

    TestKey {
        pkey,
        cert_der: builder.build().to_der().unwrap(),
    }
}

/// Key used by the fake vault.
pub fn signing_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| generate("Test Code Signing"))
}

/// Unrelated key, for identities whose certificate does not match the vault key.
pub fn foreign_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| generate("Someone Else"))
}

/// In-process stand-in for Key Vault.
#[derive(Default)]
pub struct FakeVault {
    sign_calls: AtomicUsize,
    close_calls: AtomicUsize,
    fail_with: Mutex<Option<String>>,
    algorithms: Mutex<Vec<WireAlgorithmId>>,
}

impl FakeVault {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let vault = Self::default();
        *vault.fail_with.lock().unwrap() = Some(message.to_string());
        Arc::new(vault)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn algorithms(&self) -> Vec<WireAlgorithmId> {
        self.algorithms.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSigningClient for FakeVault {
    async fn sign(
        &self,
        _key: &KeyHandle,
        algorithm: WireAlgorithmId,
        digest: &[u8],
    ) -> SigningResult<Vec<u8>> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.algorithms.lock().unwrap().push(algorithm);
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(SigningError::RemoteSigningError(message));
        }

        let mut ctx = PkeyCtx::new(&signing_key().pkey)?;
        ctx.sign_init()?;
        ctx.set_rsa_padding(Padding::PKCS1)?;
        // RSNULL signs the caller's DigestInfo as is
        if algorithm == WireAlgorithmId::RS256 {
            ctx.set_signature_md(Md::sha256())?;
        } else if algorithm == WireAlgorithmId::RS384 {
            ctx.set_signature_md(Md::sha384())?;
        } else if algorithm == WireAlgorithmId::RS512 {
            ctx.set_signature_md(Md::sha512())?;
        }

        let mut signature = Vec::new();
        ctx.sign_to_vec(digest, &mut signature)?;
        Ok(signature)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Identity whose certificate matches the fake vault's key.
pub fn identity(vault: Arc<FakeVault>, digest: HashAlgorithm) -> SigningIdentity {
    SigningIdentity::new(
        signing_key().certificate(),
        RemoteKey::new(KeyHandle::new(KEY_ID), vault),
        digest,
    )
}

/// Identity whose certificate belongs to a different key than the vault signs with.
pub fn mismatched_identity(vault: Arc<FakeVault>) -> SigningIdentity {
    SigningIdentity::new(
        foreign_key().certificate(),
        RemoteKey::new(KeyHandle::new(KEY_ID), vault),
        HashAlgorithm::Sha256,
    )
}

/// Timestamp authority returning a canned result.
pub struct ScriptedTsa {
    grant: bool,
    calls: AtomicUsize,
}

impl ScriptedTsa {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            grant: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            grant: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimestampAuthority for ScriptedTsa {
    async fn timestamp(
        &self,
        signature: &[u8],
        digest_algorithm: HashAlgorithm,
    ) -> SigningResult<TimestampToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.grant {
            return Err(SigningError::TimestampError(
                "Timestamp authority rejected the request (PKIStatus 2)".to_string(),
            ));
        }
        // token body only needs to carry the imprint for these tests
        let mut token = vec![0x30, 0x00];
        token.extend(digest_algorithm.digest(signature));
        Ok(TimestampToken {
            token,
            authority: self.authority().to_string(),
            digest_algorithm,
        })
    }

    fn authority(&self) -> &str {
        "tsa.test"
    }
}

/// Backend handing out fake vault identities and the scripted TSA.
pub struct FakeBackend {
    pub vault: Arc<FakeVault>,
    pub tsa: Arc<ScriptedTsa>,
    materialize_calls: AtomicUsize,
    last_access: Mutex<Option<VaultAccess>>,
    last_digests: Mutex<Option<(HashAlgorithm, HashAlgorithm)>>,
}

impl FakeBackend {
    pub fn new(vault: Arc<FakeVault>, tsa: Arc<ScriptedTsa>) -> Arc<Self> {
        Arc::new(Self {
            vault,
            tsa,
            materialize_calls: AtomicUsize::new(0),
            last_access: Mutex::new(None),
            last_digests: Mutex::new(None),
        })
    }

    pub fn materialize_calls(&self) -> usize {
        self.materialize_calls.load(Ordering::SeqCst)
    }

    pub fn last_access(&self) -> Option<VaultAccess> {
        self.last_access.lock().unwrap().clone()
    }

    pub fn last_digests(&self) -> Option<(HashAlgorithm, HashAlgorithm)> {
        *self.last_digests.lock().unwrap()
    }
}

#[async_trait]
impl SigningBackend for FakeBackend {
    async fn materialize(
        &self,
        access: &VaultAccess,
        file_digest: HashAlgorithm,
        pkcs_digest: HashAlgorithm,
    ) -> SigningResult<SigningIdentity> {
        self.materialize_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_access.lock().unwrap() = Some(access.clone());
        *self.last_digests.lock().unwrap() = Some((file_digest, pkcs_digest));
        Ok(identity(self.vault.clone(), file_digest).with_pkcs_digest(pkcs_digest))
    }

    fn timestamp_authority(
        &self,
        _url: &TimestampUrl,
    ) -> SigningResult<Arc<dyn TimestampAuthority>> {
        Ok(self.tsa.clone())
    }
}

pub const SCRIPT: &str = "param([string]$Name = 'world')\n\nWrite-Host \"Hello, $Name\"\n";

/// Write `content` to `name` inside `dir`.
pub fn write_script(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}
