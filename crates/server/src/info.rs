//! Startup payload returned to the embedding app.

use filechunk_codec::{ChunkCodec, ENCRYPTION_TYPE};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;
use crate::server::ServerHandle;

/// Chunk payload protection in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionType {
    #[serde(rename = "ChaCha20-Poly1305")]
    ChaCha20Poly1305,
    #[serde(rename = "none")]
    None,
}

impl EncryptionType {
    pub fn of(codec: &ChunkCodec) -> Self {
        if codec.is_enabled() {
            Self::ChaCha20Poly1305
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChaCha20Poly1305 => ENCRYPTION_TYPE,
            Self::None => "none",
        }
    }
}

/// Result of a start request.
///
/// `ready == false` means no usable server exists; the other fields are
/// then empty or zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupInfo {
    pub version: u32,
    pub platform: String,
    pub base_url: String,
    pub auth_token: String,
    pub chunk_size: u32,
    pub encryption_type: EncryptionType,
    pub ready: bool,
}

impl StartupInfo {
    /// Describes a running instance.
    pub fn ready(server: &ServerHandle) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            platform: platform().into(),
            base_url: server.base_url(),
            auth_token: server.auth_token().to_string(),
            chunk_size: server.chunk_size(),
            encryption_type: server.encryption(),
            ready: true,
        }
    }

    /// Reported when no instance could be started.
    pub fn not_ready() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            platform: platform().into(),
            base_url: String::new(),
            auth_token: String::new(),
            chunk_size: 0,
            encryption_type: EncryptionType::None,
            ready: false,
        }
    }
}

/// Host platform identifier.
pub fn platform() -> &'static str {
    std::env::consts::OS
}
