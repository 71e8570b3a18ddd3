//! Decryptor: parses the header, unwraps the data key via trial
//! decryption, optionally verifies sender authentication, then drives
//! the chunk engine forward.

use std::io::{self, Read, Write};

use ed25519_dalek::VerifyingKey;
use secrecy::{ExposeSecret, SecretBox};
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, Zeroizing};

use crate::chunk;
use crate::error::{Error, Result};
use crate::header::{self, Header, MAGIC};
use crate::keywrap;
use crate::primitives::KEY_SIZE;

enum DecryptorState {
    AwaitingKey,
    Streaming,
    Done,
    Failed(Error),
}

/// Parses a header eagerly on construction; streams chunks once a
/// matching private key has been supplied via `set_private_key`.
pub struct Decryptor<R: Read> {
    reader: R,
    header: Header,
    data_key: Option<SecretBox<[u8; KEY_SIZE]>>,
    index: u64,
    state: DecryptorState,
}

impl<R: Read> Decryptor<R> {
    /// Parse a header with no leading on-disk magic.
    ///
    /// # Errors
    ///
    /// Propagates header parsing errors from [`header::read_header`].
    pub fn new(reader: R) -> Result<Self> {
        Self::build(reader, false)
    }

    /// Like [`Decryptor::new`], but first expects and checks the
    /// 4-byte `HSE1` file magic written by
    /// `Encryptor::write_file_magic`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedHeader`] if the magic does not match,
    /// in addition to the errors [`Decryptor::new`] can return.
    pub fn new_expecting_file_magic(reader: R) -> Result<Self> {
        Self::build(reader, true)
    }

    fn build(mut reader: R, expect_magic: bool) -> Result<Self> {
        if expect_magic {
            let mut magic = [0u8; 4];
            read_exact_or_eof(&mut reader, &mut magic)?;
            if magic != MAGIC {
                return Err(Error::MalformedHeader("missing or incorrect file magic".to_string()));
            }
        }
        let header = header::read_header(&mut reader)?;
        Ok(Self {
            reader,
            header,
            data_key: None,
            index: 0,
            state: DecryptorState::AwaitingKey,
        })
    }

    /// The embedded sender verifying key, if the envelope is signed.
    #[must_use]
    pub fn sender_public_key(&self) -> Option<&VerifyingKey> {
        self.header.sender_pk.as_ref()
    }

    /// Supply the reader's agreement private key, optionally checking
    /// the envelope was signed by a specific sender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if called more than once,
    /// [`Error::SenderMismatch`] if `expected_sender` is given and
    /// does not match the embedded (or does not verify against the
    /// embedded) signature, [`Error::UnauthenticatedSender`] if
    /// `expected_sender` is given but the envelope carries no
    /// signature, or [`Error::NoMatchingRecipient`] if no wrapped key
    /// unwraps under this private key.
    pub fn set_private_key(
        &mut self,
        recipient_sk: &StaticSecret,
        expected_sender: Option<&VerifyingKey>,
    ) -> Result<()> {
        match &self.state {
            DecryptorState::AwaitingKey => {}
            DecryptorState::Failed(err) => return Err(err.clone()),
            DecryptorState::Streaming | DecryptorState::Done => return Err(Error::AlreadyStarted),
        }

        if let Err(err) = self.verify_sender(expected_sender) {
            self.state = DecryptorState::Failed(err.clone());
            return Err(err);
        }

        let wrap_key = keywrap::wrap_key_for_reader(recipient_sk, &self.header.ephemeral_pk);
        let data_key = self
            .header
            .wrapped_keys
            .iter()
            .find_map(|wrapped| keywrap::try_unwrap(wrapped, &wrap_key));

        match data_key {
            Some(data_key) => {
                self.data_key = Some(SecretBox::new(Box::new(data_key)));
                self.state = DecryptorState::Streaming;
                Ok(())
            }
            None => {
                self.state = DecryptorState::Failed(Error::NoMatchingRecipient);
                Err(Error::NoMatchingRecipient)
            }
        }
    }

    fn verify_sender(&self, expected_sender: Option<&VerifyingKey>) -> Result<()> {
        match (&self.header.sender_sig, &self.header.sender_pk, expected_sender) {
            (Some(signature), Some(embedded_pk), Some(expected_pk)) => {
                if embedded_pk.as_bytes() != expected_pk.as_bytes() {
                    return Err(Error::SenderMismatch);
                }
                let digest = self.header.signing_digest(embedded_pk);
                crate::primitives::verify(embedded_pk, &digest, signature)
            }
            (None, _, Some(_)) => Err(Error::UnauthenticatedSender),
            _ => Ok(()),
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match &self.state {
            DecryptorState::Streaming => {}
            DecryptorState::Done => return Ok(None),
            DecryptorState::Failed(err) => return Err(err.clone()),
            DecryptorState::AwaitingKey => return Err(Error::InvalidKey),
        }

        let data_key = self
            .data_key
            .as_ref()
            .expect("state Streaming implies a data key is set");
        let result = chunk::read_chunk(
            &mut self.reader,
            data_key.expose_secret(),
            &self.header.salt,
            self.index,
            self.header.chunk_size,
        );

        match result {
            Ok(chunk::ReadChunk { plaintext, terminal }) => {
                self.index += 1;
                if terminal {
                    if let Err(err) = self.reject_trailing_bytes() {
                        self.state = DecryptorState::Failed(err.clone());
                        return Err(err);
                    }
                    self.state = DecryptorState::Done;
                }
                Ok(Some(plaintext))
            }
            Err(err) => {
                self.state = DecryptorState::Failed(err.clone());
                Err(err)
            }
        }
    }

    fn reject_trailing_bytes(&mut self) -> Result<()> {
        let mut probe = [0u8; 1];
        match self.reader.read(&mut probe) {
            Ok(0) => Ok(()),
            Ok(_) => Err(Error::TrailingGarbage),
            Err(err) => Err(err.into()),
        }
    }

    /// Decrypt every remaining chunk to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `set_private_key` was not
    /// called first, or any chunk-framing/authentication error.
    pub fn decrypt_to_end<W: Write>(mut self, sink: &mut W) -> Result<()> {
        while let Some(plaintext) = self.next_chunk()? {
            sink.write_all(&plaintext)?;
        }
        Ok(())
    }

    /// Turn this decryptor into a streaming `Read` adapter.
    #[must_use]
    pub fn into_stream_reader(self) -> StreamReader<R> {
        StreamReader {
            decryptor: self,
            pending: Zeroizing::new(Vec::new()),
            pending_pos: 0,
            finished: false,
        }
    }
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
        Err(err) => Err(err.into()),
    }
}

/// A `std::io::Read` adapter yielding decrypted, authenticated
/// plaintext incrementally. `read` returns `Ok(0)` only once the
/// terminal chunk has been fully delivered and consumed.
pub struct StreamReader<R: Read> {
    decryptor: Decryptor<R>,
    pending: Zeroizing<Vec<u8>>,
    pending_pos: usize,
    finished: bool,
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_pos >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match self.decryptor.next_chunk() {
                Ok(Some(plaintext)) => {
                    self.pending.zeroize();
                    *self.pending = plaintext;
                    self.pending_pos = 0;
                }
                Ok(None) => {
                    self.finished = true;
                    return Ok(0);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}
