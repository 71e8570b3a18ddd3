//! Chunk engine: per-chunk nonce/AAD derivation and the length-
//! prefixed chunk framing used by both the one-shot and streaming
//! encryptor/decryptor paths.
//!
//! Frame layout:
//!
//! ```text
//! frame_header : u32 BE — bit 31 is the terminal flag, bits 0..30 are the ciphertext length
//! ciphertext   : frame_header & 0x7fff_ffff bytes (AEAD ciphertext, tag included)
//! ```

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::primitives::{self, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

const TAG_SIZE_U32: u32 = TAG_SIZE as u32;
const TERMINAL_BIT: u32 = 1 << 31;
const LENGTH_MASK: u32 = TERMINAL_BIT - 1;

/// Derive the nonce for chunk `index`. `(salt, index, terminal)`
/// uniquely determines the nonce; reusing `salt` with the same index
/// and terminal flag would reuse a nonce, which the engine prevents
/// by minting a fresh random salt per envelope.
#[must_use]
pub fn nonce_for(salt: &[u8; SALT_SIZE], index: u64, terminal: bool) -> [u8; NONCE_SIZE] {
    let flag = u8::from(terminal);
    let digest = primitives::sha256(&[salt, &index.to_be_bytes(), &[flag]]);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Build the additional authenticated data for chunk `index`,
/// binding its position and terminal status into the AEAD tag so
/// truncation, reordering, and flag forgery are all detectable.
#[must_use]
pub fn aad_for(salt: &[u8; SALT_SIZE], index: u64, terminal: bool) -> Vec<u8> {
    let flag = u8::from(terminal);
    let mut aad = Vec::with_capacity(SALT_SIZE + 8 + 1);
    aad.extend_from_slice(salt);
    aad.extend_from_slice(&index.to_be_bytes());
    aad.push(flag);
    aad
}

/// Encrypt one chunk of `plaintext` and write its framed ciphertext.
///
/// # Errors
///
/// Returns [`Error::MalformedChunk`] if `plaintext` is too large to
/// frame, or propagates an I/O failure.
pub fn write_chunk<W: Write>(
    writer: &mut W,
    data_key: &[u8; KEY_SIZE],
    salt: &[u8; SALT_SIZE],
    index: u64,
    terminal: bool,
    plaintext: &[u8],
) -> Result<()> {
    let nonce = nonce_for(salt, index, terminal);
    let aad = aad_for(salt, index, terminal);
    let ciphertext = primitives::aead_encrypt(data_key, &nonce, &aad, plaintext)?;

    let len = u32::try_from(ciphertext.len())
        .map_err(|_| Error::MalformedChunk("chunk too large to frame".to_string()))?;
    if len > LENGTH_MASK {
        return Err(Error::MalformedChunk("chunk too large to frame".to_string()));
    }
    let frame_header = len | if terminal { TERMINAL_BIT } else { 0 };
    writer.write_all(&frame_header.to_be_bytes())?;
    writer.write_all(&ciphertext)?;
    Ok(())
}

/// A decrypted chunk, with whether it was the stream's terminal chunk.
pub struct ReadChunk {
    pub plaintext: Vec<u8>,
    pub terminal: bool,
}

/// Read, frame-validate, and decrypt the next chunk.
///
/// # Errors
///
/// Returns [`Error::UnexpectedEof`] if the stream ends mid-frame,
/// [`Error::MalformedChunk`] if the frame's declared length is
/// inconsistent with `chunk_size`, or [`Error::AuthenticationFailure`]
/// if the AEAD tag does not verify.
pub fn read_chunk<R: Read>(
    reader: &mut R,
    data_key: &[u8; KEY_SIZE],
    salt: &[u8; SALT_SIZE],
    index: u64,
    chunk_size: u32,
) -> Result<ReadChunk> {
    let mut frame_header = [0u8; 4];
    read_exact_or_eof(reader, &mut frame_header)?;
    let frame_header = u32::from_be_bytes(frame_header);
    let terminal = frame_header & TERMINAL_BIT != 0;
    let ciphertext_len = frame_header & LENGTH_MASK;

    let max_len = chunk_size + TAG_SIZE_U32;
    if ciphertext_len > max_len {
        return Err(Error::MalformedChunk("chunk exceeds configured chunk size".to_string()));
    }
    if ciphertext_len < TAG_SIZE_U32 {
        return Err(Error::MalformedChunk("chunk shorter than an AEAD tag".to_string()));
    }
    if !terminal && ciphertext_len != max_len {
        return Err(Error::MalformedChunk(
            "non-terminal chunk is not full-sized".to_string(),
        ));
    }

    let mut ciphertext = vec![0u8; ciphertext_len as usize];
    read_exact_or_eof(reader, &mut ciphertext)?;

    let nonce = nonce_for(salt, index, terminal);
    let aad = aad_for(salt, index, terminal);
    let plaintext = primitives::aead_decrypt(data_key, &nonce, &aad, &ciphertext)?;

    Ok(ReadChunk { plaintext, terminal })
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

    const KEY: [u8; KEY_SIZE] = [5u8; KEY_SIZE];
    const SALT: [u8; SALT_SIZE] = [9u8; SALT_SIZE];

    #[test]
    fn nonce_differs_by_index_and_terminal_flag() {
        let a = nonce_for(&SALT, 0, false);
        let b = nonce_for(&SALT, 1, false);
        let c = nonce_for(&SALT, 0, true);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn chunk_roundtrip_non_terminal_then_terminal() {
        let chunk_size = 16u32;
        let full = vec![1u8; chunk_size as usize];
        let mut buf = Vec::new();
        write_chunk(&mut buf, &KEY, &SALT, 0, false, &full).unwrap();
        write_chunk(&mut buf, &KEY, &SALT, 1, true, b"tail").unwrap();

        let mut cursor = Cursor::new(buf);
        let first = read_chunk(&mut cursor, &KEY, &SALT, 0, chunk_size).unwrap();
        assert_eq!(first.plaintext, full);
        assert!(!first.terminal);

        let second = read_chunk(&mut cursor, &KEY, &SALT, 1, chunk_size).unwrap();
        assert_eq!(second.plaintext, b"tail");
        assert!(second.terminal);
    }

    #[test]
    fn terminal_chunk_may_be_empty() {
        let chunk_size = 16u32;
        let mut buf = Vec::new();
        write_chunk(&mut buf, &KEY, &SALT, 0, true, b"").unwrap();

        let chunk = read_chunk(&mut Cursor::new(buf), &KEY, &SALT, 0, chunk_size).unwrap();
        assert!(chunk.plaintext.is_empty());
        assert!(chunk.terminal);
    }

    #[test]
    fn rejects_undersized_non_terminal_chunk() {
        let chunk_size = 16u32;
        let mut buf = Vec::new();
        // Only 4 bytes of plaintext in a non-terminal chunk: still "valid" framing-wise
        // would need ciphertext_len == chunk_size + TAG, so shrink it by hand.
        write_chunk(&mut buf, &KEY, &SALT, 0, false, &[1u8; 4]).unwrap();

        let err = read_chunk(&mut Cursor::new(buf), &KEY, &SALT, 0, chunk_size).unwrap_err();
        assert!(matches!(err, Error::MalformedChunk(_)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let chunk_size = 16u32;
        let mut buf = Vec::new();
        write_chunk(&mut buf, &KEY, &SALT, 0, true, b"secret!").unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let err = read_chunk(&mut Cursor::new(buf), &KEY, &SALT, 0, chunk_size).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailure);
    }

    #[test]
    fn truncated_frame_is_unexpected_eof() {
        let chunk_size = 16u32;
        let mut buf = Vec::new();
        write_chunk(&mut buf, &KEY, &SALT, 0, true, b"secret!").unwrap();
        buf.truncate(buf.len() - 2);

        let err = read_chunk(&mut Cursor::new(buf), &KEY, &SALT, 0, chunk_size).unwrap_err();
        assert_eq!(err, Error::UnexpectedEof);
    }

    #[test]
    fn wrong_index_fails_authentication() {
        let chunk_size = 16u32;
        let mut buf = Vec::new();
        write_chunk(&mut buf, &KEY, &SALT, 0, true, b"secret!").unwrap();

        let err = read_chunk(&mut Cursor::new(buf), &KEY, &SALT, 1, chunk_size).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailure);
    }
}
