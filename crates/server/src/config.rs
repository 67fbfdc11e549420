//! Typed server configuration.

use filechunk_codec::ChunkCodec;

use crate::error::ServerError;

/// Lowest port in the default random search range.
pub const DEFAULT_PORT_MIN: u32 = 49151;

/// Exclusive upper bound of the default random search range.
pub const DEFAULT_PORT_MAX: u32 = 65536;

/// Default number of random bind attempts.
pub const DEFAULT_BIND_RETRIES: u32 = 5;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u32 = 10_024_000;

/// Configuration for one server instance.
#[derive(Clone)]
pub struct ServerConfig {
    /// Port tried first, before any random draws.
    pub fixed_port: Option<u16>,
    /// Inclusive lower bound of the random search range.
    pub port_min: u32,
    /// Exclusive upper bound of the random search range (clamped to 65536).
    pub port_max: u32,
    /// Number of random bind attempts.
    pub max_bind_retries: u32,
    /// Plaintext bytes per chunk.
    pub chunk_size: u32,
    pub encryption_enabled: bool,
    pub encryption_key: Option<Vec<u8>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fixed_port: None,
            port_min: DEFAULT_PORT_MIN,
            port_max: DEFAULT_PORT_MAX,
            max_bind_retries: DEFAULT_BIND_RETRIES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            encryption_enabled: false,
            encryption_key: None,
        }
    }
}

impl ServerConfig {
    /// Builds the codec described by the encryption fields.
    pub fn codec(&self) -> Result<ChunkCodec, ServerError> {
        let codec =
            ChunkCodec::configure(self.encryption_enabled, self.encryption_key.as_deref())?;
        Ok(codec)
    }

    /// Largest request body accepted for `codec`: one chunk plus framing.
    pub fn max_body_size(&self, codec: &ChunkCodec) -> u64 {
        u64::from(self.chunk_size) + codec.overhead() as u64
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("fixed_port", &self.fixed_port)
            .field("port_min", &self.port_min)
            .field("port_max", &self.port_max)
            .field("max_bind_retries", &self.max_bind_retries)
            .field("chunk_size", &self.chunk_size)
            .field("encryption_enabled", &self.encryption_enabled)
            .field("has_key", &self.encryption_key.is_some())
            .finish()
    }
}
