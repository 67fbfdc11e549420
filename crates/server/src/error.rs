//! Error types for the chunk server.

use axum::http::StatusCode;
use filechunk_codec::CodecError;

/// Errors that prevent a server instance from starting.
///
/// None of these are fatal to the embedding app; [`crate::ChunkService`]
/// reports them as `ready = false`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no port could be bound after {attempts} attempts")]
    Bind { attempts: u32 },

    #[error("encryption configuration rejected: {0}")]
    EncryptionConfig(#[from] CodecError),

    #[error("invalid encryption key encoding: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    #[error("invalid port: {0}")]
    InvalidPort(u32),
}

/// Per-request failures, each mapped to an HTTP status at the handler
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("missing or invalid auth token")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("body of {len} bytes exceeds limit of {max} bytes")]
    Oversize { len: u64, max: u64 },

    #[error("chunk decryption failed: {0}")]
    Decrypt(CodecError),

    #[error("chunk encryption failed: {0}")]
    Encrypt(CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChunkError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_)
            | Self::Oversize { .. }
            | Self::Decrypt(_)
            | Self::Encrypt(_)
            | Self::Io(_) => StatusCode::BAD_REQUEST,
        }
    }
}
