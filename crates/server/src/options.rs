//! Start options as supplied by the embedding app.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_BIND_RETRIES, DEFAULT_CHUNK_SIZE, DEFAULT_PORT_MAX, DEFAULT_PORT_MIN, ServerConfig,
};
use crate::error::ServerError;

/// Start request, camelCase on the wire.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// Base64 (standard alphabet) encryption key.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub encryption: bool,

    /// Fixed port to try first (0 = none).
    #[serde(default)]
    pub port: u32,

    #[serde(default = "default_port_min")]
    pub port_min: u32,

    #[serde(default = "default_port_max")]
    pub port_max: u32,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

fn default_port_min() -> u32 {
    DEFAULT_PORT_MIN
}

fn default_port_max() -> u32 {
    DEFAULT_PORT_MAX
}

fn default_retries() -> u32 {
    DEFAULT_BIND_RETRIES
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            key: None,
            encryption: false,
            port: 0,
            port_min: default_port_min(),
            port_max: default_port_max(),
            retries: default_retries(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl StartOptions {
    /// Converts to a typed configuration, decoding the key.
    ///
    /// The key is only decoded when encryption is requested.
    pub fn to_config(&self) -> Result<ServerConfig, ServerError> {
        let fixed_port = match self.port {
            0 => None,
            p => Some(u16::try_from(p).map_err(|_| ServerError::InvalidPort(p))?),
        };

        let encryption_key = match (&self.key, self.encryption) {
            (Some(key), true) if !key.is_empty() => Some(STANDARD.decode(key.trim())?),
            _ => None,
        };

        Ok(ServerConfig {
            fixed_port,
            port_min: self.port_min,
            port_max: self.port_max,
            max_bind_retries: self.retries,
            chunk_size: self.chunk_size,
            encryption_enabled: self.encryption,
            encryption_key,
        })
    }
}

impl std::fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("has_key", &self.key.is_some())
            .field("encryption", &self.encryption)
            .field("port", &self.port)
            .field("port_min", &self.port_min)
            .field("port_max", &self.port_max)
            .field("retries", &self.retries)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
