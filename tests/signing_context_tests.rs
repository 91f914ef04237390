//! Signing context tests against the in-process vault.

mod common;

use common::{foreign_key, identity, mismatched_identity, FakeVault};
use keyvault_signer::{HashAlgorithm, SigningContext, SigningError, WireAlgorithmId};

#[tokio::test]
async fn sign_then_verify_round_trips_for_every_digest() {
    for algorithm in HashAlgorithm::ALL {
        let vault = FakeVault::new();
        let context = SigningContext::new(identity(vault.clone(), algorithm));
        let digest = algorithm.digest(b"content to sign");

        let signature = context.sign_digest(&digest).await.unwrap();
        assert_eq!(signature.len(), 256, "{algorithm}");
        assert!(context.verify_digest(&digest, &signature).unwrap(), "{algorithm}");
        assert_eq!(vault.sign_calls(), 1);
    }
}

#[tokio::test]
async fn wire_ids_follow_the_pkcs_digest() {
    let expected = [
        (HashAlgorithm::Sha1, WireAlgorithmId::RSNULL),
        (HashAlgorithm::Sha256, WireAlgorithmId::RS256),
        (HashAlgorithm::Sha384, WireAlgorithmId::RS384),
        (HashAlgorithm::Sha512, WireAlgorithmId::RS512),
    ];
    for (algorithm, wire) in expected {
        let vault = FakeVault::new();
        let context = SigningContext::new(identity(vault.clone(), algorithm));
        context
            .sign_digest(&algorithm.digest(b"x"))
            .await
            .unwrap();
        assert_eq!(vault.algorithms(), vec![wire]);
    }
}

#[tokio::test]
async fn signature_over_other_digest_does_not_verify() {
    let context = SigningContext::new(identity(FakeVault::new(), HashAlgorithm::Sha256));
    let d1 = HashAlgorithm::Sha256.digest(b"first");
    let d2 = HashAlgorithm::Sha256.digest(b"second");

    let signature = context.sign_digest(&d2).await.unwrap();
    assert!(!context.verify_digest(&d1, &signature).unwrap());
}

#[tokio::test]
async fn garbage_signature_is_false_not_error() {
    let context = SigningContext::new(identity(FakeVault::new(), HashAlgorithm::Sha256));
    let digest = HashAlgorithm::Sha256.digest(b"x");

    assert!(!context.verify_digest(&digest, &[0u8; 256]).unwrap());
    assert!(!context.verify_digest(&digest, &[1, 2, 3]).unwrap());
}

#[tokio::test]
async fn certificate_of_another_key_rejects_the_signature() {
    let context = SigningContext::new(mismatched_identity(FakeVault::new()));
    assert_eq!(
        context.certificate().subject(),
        foreign_key().certificate().subject()
    );

    let digest = HashAlgorithm::Sha256.digest(b"x");
    let signature = context.sign_digest(&digest).await.unwrap();
    assert!(!context.verify_digest(&digest, &signature).unwrap());
}

#[tokio::test]
async fn remote_failure_surfaces_as_remote_signing_error() {
    let vault = FakeVault::failing("HTTP 503: service unavailable");
    let context = SigningContext::new(identity(vault.clone(), HashAlgorithm::Sha256));

    let err = context
        .sign_digest(&HashAlgorithm::Sha256.digest(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::RemoteSigningError(_)));
    assert_eq!(vault.sign_calls(), 1);
}

#[tokio::test]
async fn digest_of_wrong_length_never_reaches_the_vault() {
    let vault = FakeVault::new();
    let context = SigningContext::new(identity(vault.clone(), HashAlgorithm::Sha384));

    let err = context
        .sign_digest(&HashAlgorithm::Sha256.digest(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::CryptographicError(_)));
    assert_eq!(vault.sign_calls(), 0);
}

#[tokio::test]
async fn close_is_idempotent_and_blocks_further_signing() {
    let vault = FakeVault::new();
    let context = SigningContext::new(identity(vault.clone(), HashAlgorithm::Sha256));
    let digest = HashAlgorithm::Sha256.digest(b"x");
    let signature = context.sign_digest(&digest).await.unwrap();

    context.close();
    context.close();
    assert_eq!(vault.close_calls(), 1);

    assert!(context.sign_digest(&digest).await.is_err());
    // verification stays local and still works
    assert!(context.verify_digest(&digest, &signature).unwrap());

    drop(context);
    assert_eq!(vault.close_calls(), 1);
}

#[test]
fn exposes_identity_attributes() {
    let context = SigningContext::new(
        identity(FakeVault::new(), HashAlgorithm::Sha512).with_pkcs_digest(HashAlgorithm::Sha256),
    );
    assert_eq!(context.file_digest_algorithm(), HashAlgorithm::Sha512);
    assert_eq!(context.pkcs_digest_algorithm(), HashAlgorithm::Sha256);
    assert_eq!(context.key_handle().as_str(), common::KEY_ID);
    assert_eq!(context.signature_algorithm().to_string(), "RSA");
    assert!(context.created_at() <= std::time::SystemTime::now());
}
