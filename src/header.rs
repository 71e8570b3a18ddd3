//! Envelope header: codec for the length-prefixed, tagged (TLV)
//! record that precedes the chunk stream.
//!
//! ```text
//! header_len : u32 BE
//! header     : repeated { tag: u8, len: u16 BE, value: [u8; len] }
//! ```
//!
//! Field tags: `1` chunk_size, `2` salt, `3` ephemeral_pk, `4`
//! sender_sig, `5` wrapped_keys (repeated), `6` sender_pk.

use std::io::{Read, Write};

use ed25519_dalek::VerifyingKey;
use x25519_dalek::PublicKey;

use crate::error::{Error, Result};
use crate::keywrap::{WRAPPED_KEY_LEN, WrappedKey};
use crate::primitives::{SALT_SIZE, SIGNATURE_SIZE, sha256};

pub const MIN_CHUNK_SIZE: u32 = 1 << 10;
pub const MAX_CHUNK_SIZE: u32 = 1 << 20;
pub const MAX_HEADER_LEN: u32 = 1 << 16;

/// Optional on-disk magic, written/checked only when the caller opts
/// into file-storage framing (see `Encryptor::write_file_magic`).
pub const MAGIC: [u8; 4] = *b"HSE1";

const TAG_CHUNK_SIZE: u8 = 1;
const TAG_SALT: u8 = 2;
const TAG_EPHEMERAL_PK: u8 = 3;
const TAG_SENDER_SIG: u8 = 4;
const TAG_WRAPPED_KEY: u8 = 5;
const TAG_SENDER_PK: u8 = 6;

#[derive(Clone)]
pub struct Header {
    pub chunk_size: u32,
    pub salt: [u8; SALT_SIZE],
    pub ephemeral_pk: PublicKey,
    pub sender_sig: Option<[u8; SIGNATURE_SIZE]>,
    pub sender_pk: Option<VerifyingKey>,
    pub wrapped_keys: Vec<WrappedKey>,
}

fn push_tlv(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    buf.push(tag);
    #[allow(clippy::cast_possible_truncation)]
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

impl Header {
    /// The bit-for-bit concatenation of each wrapped key's serialized
    /// TLV record, in header order. This is what the sender signature
    /// binds, so recipients can never be silently reordered after
    /// signing without invalidating the signature.
    #[must_use]
    pub fn wrapped_keys_digest(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for wrapped_key in &self.wrapped_keys {
            push_tlv(&mut buf, TAG_WRAPPED_KEY, &wrapped_key.0);
        }
        buf
    }

    /// The digest a sender signs and a reader verifies. Requires the
    /// sender's verifying key explicitly, since it is only embedded in
    /// `self.sender_pk` once the header already carries a signature.
    #[must_use]
    pub fn signing_digest(&self, sender_pk: &VerifyingKey) -> [u8; 32] {
        sha256(&[
            &self.chunk_size.to_be_bytes(),
            &self.salt,
            self.ephemeral_pk.as_bytes(),
            sender_pk.as_bytes(),
            &self.wrapped_keys_digest(),
        ])
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(Error::InvalidChunkSize);
        }
        if self.wrapped_keys.is_empty() {
            return Err(Error::MalformedHeader("no wrapped keys".to_string()));
        }
        if self.sender_sig.is_some() != self.sender_pk.is_some() {
            return Err(Error::MalformedHeader(
                "sender_sig and sender_pk must both be present or both absent".to_string(),
            ));
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = Vec::new();
        push_tlv(&mut buf, TAG_CHUNK_SIZE, &self.chunk_size.to_be_bytes());
        push_tlv(&mut buf, TAG_SALT, &self.salt);
        push_tlv(&mut buf, TAG_EPHEMERAL_PK, self.ephemeral_pk.as_bytes());
        for wrapped_key in &self.wrapped_keys {
            push_tlv(&mut buf, TAG_WRAPPED_KEY, &wrapped_key.0);
        }
        if let Some(sender_pk) = &self.sender_pk {
            push_tlv(&mut buf, TAG_SENDER_PK, sender_pk.as_bytes());
        }
        if let Some(sender_sig) = &self.sender_sig {
            push_tlv(&mut buf, TAG_SENDER_SIG, sender_sig);
        }
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut chunk_size = None;
        let mut salt = None;
        let mut ephemeral_pk = None;
        let mut sender_sig = None;
        let mut sender_pk = None;
        let mut wrapped_keys = Vec::new();

        let mut cursor = 0usize;
        while cursor < bytes.len() {
            if cursor + 3 > bytes.len() {
                return Err(Error::MalformedHeader("truncated field".to_string()));
            }
            let tag = bytes[cursor];
            let len = u16::from_be_bytes([bytes[cursor + 1], bytes[cursor + 2]]) as usize;
            cursor += 3;
            if cursor + len > bytes.len() {
                return Err(Error::MalformedHeader("field overruns header".to_string()));
            }
            let value = &bytes[cursor..cursor + len];
            cursor += len;

            match tag {
                TAG_CHUNK_SIZE => {
                    let bytes: [u8; 4] = value
                        .try_into()
                        .map_err(|_| Error::MalformedHeader("chunk_size wrong length".to_string()))?;
                    chunk_size = Some(u32::from_be_bytes(bytes));
                }
                TAG_SALT => {
                    let bytes: [u8; SALT_SIZE] = value
                        .try_into()
                        .map_err(|_| Error::MalformedHeader("salt wrong length".to_string()))?;
                    salt = Some(bytes);
                }
                TAG_EPHEMERAL_PK => {
                    let bytes: [u8; 32] = value
                        .try_into()
                        .map_err(|_| Error::MalformedHeader("ephemeral_pk wrong length".to_string()))?;
                    ephemeral_pk = Some(PublicKey::from(bytes));
                }
                TAG_SENDER_SIG => {
                    let bytes: [u8; SIGNATURE_SIZE] = value
                        .try_into()
                        .map_err(|_| Error::MalformedHeader("sender_sig wrong length".to_string()))?;
                    sender_sig = Some(bytes);
                }
                TAG_SENDER_PK => {
                    let bytes: [u8; 32] = value
                        .try_into()
                        .map_err(|_| Error::MalformedHeader("sender_pk wrong length".to_string()))?;
                    sender_pk = Some(
                        VerifyingKey::from_bytes(&bytes)
                            .map_err(|_| Error::MalformedHeader("invalid sender_pk".to_string()))?,
                    );
                }
                TAG_WRAPPED_KEY => {
                    if value.len() != WRAPPED_KEY_LEN {
                        return Err(Error::MalformedHeader("wrapped key wrong length".to_string()));
                    }
                    wrapped_keys.push(WrappedKey(value.to_vec()));
                }
                unknown => {
                    return Err(Error::MalformedHeader(format!("unknown field tag {unknown}")));
                }
            }
        }

        let header = Self {
            chunk_size: chunk_size.ok_or_else(|| Error::MalformedHeader("missing chunk_size".to_string()))?,
            salt: salt.ok_or_else(|| Error::MalformedHeader("missing salt".to_string()))?,
            ephemeral_pk: ephemeral_pk
                .ok_or_else(|| Error::MalformedHeader("missing ephemeral_pk".to_string()))?,
            sender_sig,
            sender_pk,
            wrapped_keys,
        };
        header.validate()?;
        Ok(header)
    }
}

/// Write the length-prefixed header to `writer`.
///
/// # Errors
///
/// Returns [`Error::InvalidChunkSize`]/[`Error::MalformedHeader`] if
/// `header` fails validation, or [`Error::Io`] on a write failure.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<()> {
    let encoded = header.encode()?;
    let len = u32::try_from(encoded.len())
        .map_err(|_| Error::MalformedHeader("header too large".to_string()))?;
    if len > MAX_HEADER_LEN {
        return Err(Error::MalformedHeader("header exceeds maximum length".to_string()));
    }
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&encoded)?;
    Ok(())
}

/// Read and parse the length-prefixed header from `reader`.
///
/// # Errors
///
/// Returns [`Error::MalformedHeader`] if the length exceeds
/// [`MAX_HEADER_LEN`] or the bytes do not decode to a valid header,
/// [`Error::UnexpectedEof`] if the stream ends early, or
/// [`Error::Io`] on another read failure.
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut len_bytes = [0u8; 4];
    read_exact_or_eof(reader, &mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_HEADER_LEN {
        return Err(Error::MalformedHeader("header exceeds maximum length".to_string()));
    }
    let mut bytes = vec![0u8; len as usize];
    read_exact_or_eof(reader, &mut bytes)?;
    Header::decode(&bytes)
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        Header {
            chunk_size: 4096,
            salt: [1u8; SALT_SIZE],
            ephemeral_pk: PublicKey::from([2u8; 32]),
            sender_sig: None,
            sender_pk: None,
            wrapped_keys: vec![WrappedKey(vec![3u8; WRAPPED_KEY_LEN])],
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();

        let decoded = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.chunk_size, header.chunk_size);
        assert_eq!(decoded.salt, header.salt);
        assert_eq!(decoded.wrapped_keys, header.wrapped_keys);
    }

    #[test]
    fn rejects_chunk_size_out_of_range() {
        let mut header = sample_header();
        header.chunk_size = 4;
        assert_eq!(header.encode().unwrap_err(), Error::InvalidChunkSize);
    }

    #[test]
    fn rejects_empty_wrapped_keys() {
        let mut header = sample_header();
        header.wrapped_keys.clear();
        assert!(matches!(header.encode().unwrap_err(), Error::MalformedHeader(_)));
    }

    #[test]
    fn rejects_sig_without_sender_pk() {
        let mut header = sample_header();
        header.sender_sig = Some([0u8; SIGNATURE_SIZE]);
        assert!(matches!(header.encode().unwrap_err(), Error::MalformedHeader(_)));
    }

    #[test]
    fn rejects_header_over_max_length() {
        let mut header = sample_header();
        header.wrapped_keys = (0..2000).map(|_| WrappedKey(vec![0u8; WRAPPED_KEY_LEN])).collect();
        let mut buf = Vec::new();
        assert!(matches!(
            write_header(&mut buf, &header).unwrap_err(),
            Error::MalformedHeader(_)
        ));
    }

    #[test]
    fn rejects_unknown_tag() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();

        // Corrupt the first field's tag byte (just after the 4-byte length prefix).
        buf[4] = 200;
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[test]
    fn truncated_length_prefix_is_unexpected_eof() {
        let buf = vec![0u8, 0u8];
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err, Error::UnexpectedEof);
    }

    #[test]
    fn signing_digest_changes_with_wrapped_key_order() {
        let mut header = sample_header();
        header.wrapped_keys = vec![
            WrappedKey(vec![1u8; WRAPPED_KEY_LEN]),
            WrappedKey(vec![2u8; WRAPPED_KEY_LEN]),
        ];
        let sender_pk = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        let digest_a = header.signing_digest(&sender_pk);

        header.wrapped_keys.reverse();
        let digest_b = header.signing_digest(&sender_pk);

        assert_ne!(digest_a, digest_b);
    }
}
