//! Human-readable encoding for keys and CLI ergonomics.

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{Error, Result};

pub trait EncodeBase64 {
    /// Encode `self` in a base64 string.
    #[must_use]
    fn encode_base64(&self) -> String;
}

pub trait DecodeBase64 {
    /// Decode base64-encoded `self` to bytes.
    ///
    /// # Errors
    ///
    /// Errors if `self` does not contain valid base64.
    fn decode_base64(&self) -> Result<Vec<u8>>;
}

impl EncodeBase64 for &[u8] {
    fn encode_base64(&self) -> String {
        BASE64_STANDARD.encode(self)
    }
}

impl<const N: usize> EncodeBase64 for [u8; N] {
    fn encode_base64(&self) -> String {
        self.as_slice().encode_base64()
    }
}

impl EncodeBase64 for Vec<u8> {
    fn encode_base64(&self) -> String {
        self.as_slice().encode_base64()
    }
}

impl DecodeBase64 for &str {
    fn decode_base64(&self) -> Result<Vec<u8>> {
        BASE64_STANDARD
            .decode(self)
            .map_err(|reason| Error::MalformedHeader(format!("invalid base64: {reason}")))
    }
}

impl DecodeBase64 for String {
    fn decode_base64(&self) -> Result<Vec<u8>> {
        self.as_str().decode_base64()
    }
}
