//! Encryptor: orchestrates ephemeral key generation, recipient key
//! wrapping, optional sender signing, header emission, and the
//! chunked AEAD stream that follows it.

use std::io::{self, Read, Write};

use ed25519_dalek::SigningKey;
use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::chunk;
use crate::error::{Error, Result};
use crate::header::{self, Header, MAGIC, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::keywrap;
use crate::primitives::{self, KEY_SIZE, SALT_SIZE};

/// Builder for one envelope. Configure recipients (and optionally a
/// sender identity) while in this state; `into_stream_writer`/
/// `encrypt` consume it and begin the chunk stream.
pub struct Encryptor {
    chunk_size: u32,
    sender: Option<SigningKey>,
    recipients: Vec<PublicKey>,
    rng: Box<dyn RngCore>,
    write_magic: bool,
}

impl Encryptor {
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] if `chunk_size` is outside
    /// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub fn new(chunk_size: u32) -> Result<Self> {
        Self::new_with_rng(chunk_size, rand::rngs::OsRng)
    }

    /// Like [`Encryptor::new`], but draws ephemeral keys, salt, and
    /// the data key from a caller-supplied CSPRNG — lets tests build
    /// reproducible envelopes with a seeded `rand_chacha::ChaCha20Rng`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] if `chunk_size` is outside
    /// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub fn new_with_rng<R>(chunk_size: u32, rng: R) -> Result<Self>
    where
        R: RngCore + CryptoRng + 'static,
    {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(Error::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            sender: None,
            recipients: Vec::new(),
            rng: Box::new(rng),
            write_magic: false,
        })
    }

    /// Like [`Encryptor::new`], additionally signing the header with
    /// `sender`'s Ed25519 key so recipients can authenticate its origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] under the same condition as
    /// [`Encryptor::new`].
    pub fn with_sender(chunk_size: u32, sender: SigningKey) -> Result<Self> {
        let mut encryptor = Self::new(chunk_size)?;
        encryptor.sender = Some(sender);
        Ok(encryptor)
    }

    /// Combines [`Encryptor::with_sender`] and [`Encryptor::new_with_rng`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] under the same condition as
    /// [`Encryptor::new`].
    pub fn with_sender_and_rng<R>(chunk_size: u32, sender: SigningKey, rng: R) -> Result<Self>
    where
        R: RngCore + CryptoRng + 'static,
    {
        let mut encryptor = Self::new_with_rng(chunk_size, rng)?;
        encryptor.sender = Some(sender);
        Ok(encryptor)
    }

    /// Append a recipient. An envelope needs at least one before it
    /// can be started.
    pub fn add_recipient(&mut self, recipient: &PublicKey) -> &mut Self {
        self.recipients.push(*recipient);
        self
    }

    /// Opt into the 4-byte on-disk magic (`HSE1`) ahead of the header,
    /// for envelopes that will be stored as files rather than piped
    /// through a transport that already frames messages.
    #[must_use]
    pub fn write_file_magic(mut self, on: bool) -> Self {
        self.write_magic = on;
        self
    }

    fn build_header(&mut self) -> Result<(Header, [u8; KEY_SIZE])> {
        if self.recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let ephemeral_sk = StaticSecret::random_from_rng(&mut self.rng);
        let ephemeral_pk = PublicKey::from(&ephemeral_sk);

        let mut salt = [0u8; SALT_SIZE];
        self.rng.fill_bytes(&mut salt);

        let mut data_key = [0u8; KEY_SIZE];
        self.rng.fill_bytes(&mut data_key);

        let mut wrapped_keys = Vec::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            wrapped_keys.push(keywrap::wrap(&data_key, &ephemeral_sk, &ephemeral_pk, recipient)?);
        }

        let mut header = Header {
            chunk_size: self.chunk_size,
            salt,
            ephemeral_pk,
            sender_sig: None,
            sender_pk: None,
            wrapped_keys,
        };

        if let Some(sender) = &self.sender {
            let sender_pk = sender.verifying_key();
            let digest = header.signing_digest(&sender_pk);
            let signature = primitives::sign(sender, &digest);
            header.sender_pk = Some(sender_pk);
            header.sender_sig = Some(signature);
        }

        Ok((header, data_key))
    }

    /// Build the header and return a streaming `Write` adapter that
    /// frames and encrypts whatever bytes are written to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] if no recipient was added, or
    /// an error from key wrapping, header serialization, or the
    /// initial write to `sink`.
    pub fn into_stream_writer<W: Write>(mut self, mut sink: W) -> Result<StreamWriter<W>> {
        let (built_header, data_key) = self.build_header()?;
        if self.write_magic {
            sink.write_all(&MAGIC)?;
        }
        header::write_header(&mut sink, &built_header)?;

        Ok(StreamWriter {
            sink,
            data_key: SecretBox::new(Box::new(data_key)),
            salt: built_header.salt,
            chunk_size: self.chunk_size,
            buffer: Zeroizing::new(Vec::with_capacity(self.chunk_size as usize)),
            index: 0,
            state: WriterState::Streaming,
        })
    }

    /// Encrypt `source` to completion, writing the full envelope
    /// (header, every chunk, the terminal chunk) to `sink`.
    ///
    /// # Errors
    ///
    /// See [`Encryptor::into_stream_writer`]; also propagates any
    /// read failure from `source`.
    pub fn encrypt<R: Read, W: Write>(self, source: &mut R, sink: W) -> Result<()> {
        let chunk_size = self.chunk_size as usize;
        let mut writer = self.into_stream_writer(sink)?;
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.push(&buf[..n])?;
        }
        writer.finish()?;
        Ok(())
    }
}

enum WriterState {
    Streaming,
    Done,
    Failed(Error),
}

/// A `std::io::Write` adapter that buffers plaintext up to the
/// envelope's chunk size, encrypting and framing a chunk each time the
/// buffer fills. Dropping without calling `finish` leaves the output
/// truncated — no terminal chunk is ever emitted implicitly.
pub struct StreamWriter<W: Write> {
    sink: W,
    data_key: SecretBox<[u8; KEY_SIZE]>,
    salt: [u8; SALT_SIZE],
    chunk_size: u32,
    buffer: Zeroizing<Vec<u8>>,
    index: u64,
    state: WriterState,
}

impl<W: Write> StreamWriter<W> {
    fn check_streaming(&self) -> Result<()> {
        match &self.state {
            WriterState::Streaming => Ok(()),
            WriterState::Failed(err) => Err(err.clone()),
            WriterState::Done => Err(Error::AlreadyClosed),
        }
    }

    fn flush_chunk(&mut self, terminal: bool) -> Result<()> {
        let result = chunk::write_chunk(
            &mut self.sink,
            self.data_key.expose_secret(),
            &self.salt,
            self.index,
            terminal,
            &self.buffer,
        );
        self.buffer.zeroize();
        match result {
            Ok(()) => {
                self.index += 1;
                Ok(())
            }
            Err(err) => {
                self.state = WriterState::Failed(err.clone());
                Err(err)
            }
        }
    }

    pub(crate) fn push(&mut self, mut data: &[u8]) -> Result<()> {
        self.check_streaming()?;
        while !data.is_empty() {
            let space = self.chunk_size as usize - self.buffer.len();
            let take = space.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == self.chunk_size as usize {
                self.flush_chunk(false)?;
            }
        }
        Ok(())
    }

    /// Flush any buffered plaintext as the terminal chunk and return
    /// the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if already finished, or the
    /// sticky error from a previous failed write.
    pub fn finish(mut self) -> Result<W> {
        self.check_streaming()?;
        self.flush_chunk(true)?;
        self.state = WriterState::Done;
        Ok(self.sink)
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryptor::Decryptor;
    use std::io::Cursor;

    #[test]
    fn encrypt_rejects_no_recipients() {
        let encryptor = Encryptor::new(4096).unwrap();
        let mut sink = Vec::new();
        let err = encryptor.encrypt(&mut Cursor::new(b"hi"), &mut sink).unwrap_err();
        assert_eq!(err, Error::NoRecipients);
    }

    #[test]
    fn encrypt_rejects_chunk_size_out_of_range() {
        assert_eq!(Encryptor::new(4).unwrap_err(), Error::InvalidChunkSize);
        assert_eq!(Encryptor::new(1 << 21).unwrap_err(), Error::InvalidChunkSize);
    }

    #[test]
    fn stream_writer_rejects_write_after_finish_error() {
        let recipient_sk = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let recipient_pk = PublicKey::from(&recipient_sk);
        let mut encryptor = Encryptor::new(16).unwrap();
        encryptor.add_recipient(&recipient_pk);
        let mut writer = encryptor.into_stream_writer(Vec::new()).unwrap();
        writer.push(b"hello").unwrap();
        let _sink = writer.finish().unwrap();
    }

    #[test]
    fn one_shot_roundtrip_smoke() {
        let recipient_sk = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let recipient_pk = PublicKey::from(&recipient_sk);
        let mut encryptor = Encryptor::new(16).unwrap();
        encryptor.add_recipient(&recipient_pk);

        let mut ciphertext = Vec::new();
        encryptor
            .encrypt(&mut Cursor::new(b"a longer message than one chunk"), &mut ciphertext)
            .unwrap();

        let mut decryptor = Decryptor::new(Cursor::new(ciphertext)).unwrap();
        decryptor.set_private_key(&recipient_sk, None).unwrap();
        let mut plaintext = Vec::new();
        decryptor.decrypt_to_end(&mut plaintext).unwrap();

        assert_eq!(plaintext, b"a longer message than one chunk");
    }
}
