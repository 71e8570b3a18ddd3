//! Per-recipient key wrapping.
//!
//! The data key is never sent directly to a recipient. Instead, for
//! each recipient the encryptor derives a one-time wrap key from the
//! X25519 agreement between the envelope's ephemeral keypair and the
//! recipient's public key, and uses it to encrypt the data key. A
//! fixed all-zero nonce is safe here because the wrap key is unique
//! per `(envelope, recipient)` — it is bound to the ephemeral public
//! key, which is fresh every envelope.
//!
//! Wrapped keys carry no recipient identifier: a reader tries every
//! entry until one authenticates (trial decryption).

use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::Result;
use crate::primitives::{self, KEY_SIZE, NONCE_SIZE};

const ZERO_NONCE: [u8; NONCE_SIZE] = [0u8; NONCE_SIZE];
pub const WRAPPED_KEY_LEN: usize = KEY_SIZE + primitives::TAG_SIZE;

/// The ciphertext of one recipient's wrapped data key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WrappedKey(pub Vec<u8>);

fn derive_wrap_key(shared_secret: &[u8; KEY_SIZE], ephemeral_pk: &PublicKey, recipient_pk: &PublicKey) -> [u8; KEY_SIZE] {
    primitives::sha256(&[
        shared_secret,
        ephemeral_pk.as_bytes(),
        recipient_pk.as_bytes(),
        b"wrap",
    ])
}

/// Derive the wrap key a reader would use against `ephemeral_pk`,
/// given their own agreement private key. Computed once per
/// decryption attempt and reused across every candidate wrapped key.
#[must_use]
pub fn wrap_key_for_reader(recipient_sk: &StaticSecret, ephemeral_pk: &PublicKey) -> [u8; KEY_SIZE] {
    let recipient_pk = PublicKey::from(recipient_sk);
    let shared_secret = primitives::agree(recipient_sk, ephemeral_pk);
    derive_wrap_key(&shared_secret, ephemeral_pk, &recipient_pk)
}

/// Encrypt `data_key` for one recipient.
///
/// # Errors
///
/// Propagates [`crate::error::Error::PrimitiveFailure`] from the
/// underlying AEAD call.
pub fn wrap(
    data_key: &[u8; KEY_SIZE],
    ephemeral_sk: &StaticSecret,
    ephemeral_pk: &PublicKey,
    recipient_pk: &PublicKey,
) -> Result<WrappedKey> {
    let shared_secret = primitives::agree(ephemeral_sk, recipient_pk);
    let wrap_key = derive_wrap_key(&shared_secret, ephemeral_pk, recipient_pk);
    let ciphertext = primitives::aead_encrypt(&wrap_key, &ZERO_NONCE, b"", data_key)?;
    Ok(WrappedKey(ciphertext))
}

/// Try to unwrap `wrapped` with an already-derived reader wrap key.
///
/// Returns `None` rather than an error on failure, so the caller can
/// move on to the next candidate without constructing an error value
/// per failed attempt.
#[must_use]
pub fn try_unwrap(wrapped: &WrappedKey, wrap_key: &[u8; KEY_SIZE]) -> Option<[u8; KEY_SIZE]> {
    let plaintext = primitives::aead_decrypt(wrap_key, &ZERO_NONCE, b"", &wrapped.0).ok()?;
    plaintext.try_into().ok()
}
