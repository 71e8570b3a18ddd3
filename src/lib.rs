//! Hybrid public-key streaming authenticated encryption.
//!
//! An [`Encryptor`] seals a byte stream for one or more recipients,
//! identified only by their X25519 agreement public key, optionally
//! signing the envelope with an Ed25519 sender identity. A
//! [`Decryptor`] on the other end parses the envelope, tries the
//! reader's private key against every wrapped recipient entry, and
//! streams back authenticated plaintext.

pub mod base64;
pub mod chunk;
pub mod decryptor;
pub mod encryptor;
pub mod error;
pub mod header;
pub mod keys;
pub mod keywrap;
pub mod primitives;

pub use base64::{DecodeBase64, EncodeBase64};
pub use decryptor::{Decryptor, StreamReader};
pub use encryptor::{Encryptor, StreamWriter};
pub use error::{Error, Result};
pub use keys::{Keypair, PublicKeys};
