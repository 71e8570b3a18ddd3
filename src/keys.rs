//! Long-term identity keys: one X25519 pair for agreement, one
//! Ed25519 pair for signing. The envelope engine only ever sees the
//! raw key types from `x25519_dalek`/`ed25519_dalek` — this module
//! just bundles them for generation and base64 round-tripping, which
//! is all an external collaborator (a CLI, a config file) needs.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::base64::{DecodeBase64, EncodeBase64};
use crate::error::{Error, Result};

const PRIVATE_BUNDLE_LEN: usize = 32 + 32;
const PUBLIC_BUNDLE_LEN: usize = 32 + 32;

/// A full identity: one keypair for key agreement, one for signing.
pub struct Keypair {
    pub agreement: StaticSecret,
    pub signing: SigningKey,
}

/// The public half of a [`Keypair`], shared with counterparties.
#[derive(Clone)]
pub struct PublicKeys {
    pub agreement: PublicKey,
    pub verifying: VerifyingKey,
}

impl Keypair {
    /// Generate a fresh identity from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut rand::rngs::OsRng)
    }

    /// Generate a fresh identity from a caller-supplied CSPRNG.
    ///
    /// Lets tests inject a deterministic RNG for reproducible keys.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            agreement: StaticSecret::random_from_rng(&mut *rng),
            signing: SigningKey::generate(&mut *rng),
        }
    }

    #[must_use]
    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            agreement: PublicKey::from(&self.agreement),
            verifying: self.signing.verifying_key(),
        }
    }

    /// Raw 64-byte bundle: agreement scalar || signing seed.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PRIVATE_BUNDLE_LEN] {
        let mut out = [0u8; PRIVATE_BUNDLE_LEN];
        out[..32].copy_from_slice(&self.agreement.to_bytes());
        out[32..].copy_from_slice(self.signing.as_bytes());
        out
    }

    /// Parse a 64-byte bundle produced by [`Keypair::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `bytes` is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; PRIVATE_BUNDLE_LEN] =
            bytes.try_into().map_err(|_| Error::InvalidKey)?;
        let mut agreement_bytes = [0u8; 32];
        agreement_bytes.copy_from_slice(&bytes[..32]);
        let mut signing_bytes = [0u8; 32];
        signing_bytes.copy_from_slice(&bytes[32..]);
        Ok(Self {
            agreement: StaticSecret::from(agreement_bytes),
            signing: SigningKey::from_bytes(&signing_bytes),
        })
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        self.to_bytes().encode_base64()
    }

    /// # Errors
    ///
    /// Errors if `text` is not valid base64, or does not decode to a
    /// 64-byte bundle.
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(&text.decode_base64()?)
    }
}

impl PublicKeys {
    /// Raw 64-byte bundle: agreement point || verifying point.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_BUNDLE_LEN] {
        let mut out = [0u8; PUBLIC_BUNDLE_LEN];
        out[..32].copy_from_slice(self.agreement.as_bytes());
        out[32..].copy_from_slice(self.verifying.as_bytes());
        out
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `bytes` is not 64 bytes, or
    /// does not encode a valid Ed25519 verifying key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; PUBLIC_BUNDLE_LEN] =
            bytes.try_into().map_err(|_| Error::InvalidKey)?;
        let mut agreement_bytes = [0u8; 32];
        agreement_bytes.copy_from_slice(&bytes[..32]);
        let mut verifying_bytes = [0u8; 32];
        verifying_bytes.copy_from_slice(&bytes[32..]);
        let verifying = VerifyingKey::from_bytes(&verifying_bytes).map_err(|_| Error::InvalidKey)?;
        Ok(Self {
            agreement: PublicKey::from(agreement_bytes),
            verifying,
        })
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        self.to_bytes().encode_base64()
    }

    /// # Errors
    ///
    /// Errors if `text` is not valid base64, or does not decode to a
    /// valid 64-byte public bundle.
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(&text.decode_base64()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_bytes_roundtrip() {
        let keypair = Keypair::generate();
        let bytes = keypair.to_bytes();
        let restored = Keypair::from_bytes(&bytes).unwrap();

        assert_eq!(keypair.agreement.to_bytes(), restored.agreement.to_bytes());
        assert_eq!(keypair.signing.to_bytes(), restored.signing.to_bytes());
    }

    #[test]
    fn public_keys_base64_roundtrip() {
        let keypair = Keypair::generate();
        let public = keypair.public_keys();
        let text = public.to_base64();
        let restored = PublicKeys::from_base64(&text).unwrap();

        assert_eq!(public.agreement.as_bytes(), restored.agreement.as_bytes());
        assert_eq!(public.verifying.as_bytes(), restored.verifying.as_bytes());
    }

    #[test]
    fn keypair_from_bytes_rejects_wrong_length() {
        assert_eq!(Keypair::from_bytes(&[0u8; 10]).unwrap_err(), Error::InvalidKey);
    }

    #[test]
    fn public_keys_from_bytes_rejects_wrong_length() {
        assert_eq!(PublicKeys::from_bytes(&[0u8; 63]).unwrap_err(), Error::InvalidKey);
    }
}
