//! Authenticated encryption for chunk payloads.
//!
//! # Frame format
//!
//! ```text
//! [12 bytes: random nonce]
//! [N bytes:  ChaCha20 ciphertext, N == plaintext length]
//! [16 bytes: Poly1305 tag]
//! ```
//!
//! Associated data is always empty. A disabled codec passes bytes through
//! unchanged in both directions.

use std::fmt;

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

/// Key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes a frame adds on top of the plaintext (nonce + tag).
pub const FRAME_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Name reported to clients for the enabled scheme.
pub const ENCRYPTION_TYPE: &str = "ChaCha20-Poly1305";

/// Errors produced by the chunk codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("frame too short: {0} bytes (minimum {FRAME_OVERHEAD})")]
    FrameTooShort(usize),

    #[error("decryption failed")]
    DecryptionFailed,
}

/// Encrypts and decrypts chunk payloads.
///
/// Cloning is cheap enough to hand one copy to every request; the cipher
/// only holds the expanded key.
#[derive(Clone, Default)]
pub struct ChunkCodec {
    cipher: Option<ChaCha20Poly1305>,
}

impl ChunkCodec {
    /// A pass-through codec.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// An encrypting codec. The key must be exactly [`KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CodecError> {
        if key.len() != KEY_SIZE {
            return Err(CodecError::InvalidKeyLength(key.len()));
        }
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CodecError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// Builds a codec from the startup flags.
    ///
    /// Requesting encryption without a usable key is an error, never a
    /// silent downgrade to plaintext.
    pub fn configure(enabled: bool, key: Option<&[u8]>) -> Result<Self, CodecError> {
        if !enabled {
            return Ok(Self::disabled());
        }
        match key {
            Some(key) => Self::new(key),
            None => Err(CodecError::InvalidKeyLength(0)),
        }
    }

    /// Whether payloads are framed and encrypted.
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Extra bytes a request body may carry beyond the chunk size.
    pub fn overhead(&self) -> usize {
        if self.is_enabled() { FRAME_OVERHEAD } else { 0 }
    }

    /// Seals `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_vec());
        };

        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CodecError::EncryptionFailed)?;

        let mut frame = Vec::with_capacity(NONCE_SIZE + sealed.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    /// Verifies and opens a frame produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = &self.cipher else {
            return Ok(frame.to_vec());
        };

        if frame.len() < FRAME_OVERHEAD {
            return Err(CodecError::FrameTooShort(frame.len()));
        }

        let (nonce, sealed) = frame.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::DecryptionFailed)
    }
}

impl fmt::Debug for ChunkCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCodec")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
