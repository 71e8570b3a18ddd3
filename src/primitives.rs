//! Thin wrappers around the four cryptographic primitives the engine
//! uses: X25519 agreement, Ed25519 signatures, ChaCha20-Poly1305 AEAD,
//! and SHA-256. Nothing above this module touches a primitive crate
//! directly.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Error, Result};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const SALT_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// X25519 Diffie-Hellman, returning the raw shared secret.
///
/// The secret is not a key on its own — callers must run it through
/// [`sha256`] (or another KDF step) before using it as an AEAD key.
#[must_use]
pub fn agree(secret: &StaticSecret, public: &PublicKey) -> [u8; KEY_SIZE] {
    secret.diffie_hellman(public).to_bytes()
}

/// Hash the concatenation of `parts`, in order.
#[must_use]
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Encrypt `plaintext` under `key`/`nonce`, binding `aad`.
///
/// # Errors
///
/// Returns [`Error::PrimitiveFailure`] if the underlying AEAD
/// implementation rejects the call (in practice unreachable for
/// correctly sized inputs; surfaced rather than panicking).
pub fn aead_encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| Error::PrimitiveFailure("AEAD encryption failed".to_string()))
}

/// Decrypt `ciphertext` (including its trailing tag) under
/// `key`/`nonce`, checking it was produced with the same `aad`.
///
/// # Errors
///
/// Returns [`Error::AuthenticationFailure`] if the tag does not
/// verify, which also covers a wrong key, wrong nonce, or tampered
/// `aad`/ciphertext — the failure is intentionally opaque.
pub fn aead_decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| Error::AuthenticationFailure)
}

/// Sign `message` with an Ed25519 signing key.
#[must_use]
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
    signing_key.sign(message).to_bytes()
}

/// Verify an Ed25519 signature over `message`.
///
/// # Errors
///
/// Returns [`Error::SenderMismatch`] if the signature does not
/// verify under `verifying_key`.
pub fn verify(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<()> {
    let signature = Signature::from_bytes(signature);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::SenderMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn agree_is_symmetric() {
        let a_sk = StaticSecret::random_from_rng(OsRng);
        let b_sk = StaticSecret::random_from_rng(OsRng);
        let a_pk = PublicKey::from(&a_sk);
        let b_pk = PublicKey::from(&b_sk);

        assert_eq!(agree(&a_sk, &b_pk), agree(&b_sk, &a_pk));
    }

    #[test]
    fn aead_roundtrip() {
        let key = [7u8; KEY_SIZE];
        let nonce = [9u8; NONCE_SIZE];
        let aad = b"header-binding";
        let plaintext = b"hello, world!";

        let ciphertext = aead_encrypt(&key, &nonce, aad, plaintext).unwrap();
        let decrypted = aead_decrypt(&key, &nonce, aad, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn aead_decrypt_fails_on_tampered_aad() {
        let key = [1u8; KEY_SIZE];
        let nonce = [2u8; NONCE_SIZE];
        let ciphertext = aead_encrypt(&key, &nonce, b"real-aad", b"secret").unwrap();

        let err = aead_decrypt(&key, &nonce, b"wrong-aad", &ciphertext).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailure);
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let signature = sign(&signing_key, b"message");

        verify(&verifying_key, b"message", &signature).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let signature = sign(&signing_key, b"message");

        let err = verify(&verifying_key, b"tampered", &signature).unwrap_err();
        assert_eq!(err, Error::SenderMismatch);
    }
}
