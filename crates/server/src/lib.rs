//! Loopback HTTP server for chunked file transfer.
//!
//! A browser-side client reads byte ranges of a host file with `GET` and
//! appends to a host file with `PUT`, one chunk per request. Every request
//! except the CORS preflight carries the per-instance auth token. When
//! encryption is enabled, chunk bodies are ChaCha20-Poly1305 frames (see
//! [`filechunk_codec`]).
//!
//! ```text
//! OPTIONS *                          -> 200 (CORS preflight, no token)
//! PUT /<absolute path>               -> 204 | 400 | 401
//! GET /<absolute path>?o=<off>&l=<n> -> 200 | 400 | 401
//! ```

mod cors;
pub mod config;
pub mod error;
mod handler;
pub mod info;
pub mod local;
pub mod options;
pub mod ports;
mod request;
pub mod server;
pub mod service;
pub mod token;

pub use config::ServerConfig;
pub use error::{ChunkError, ServerError};
pub use handler::router;
pub use info::{EncryptionType, StartupInfo};
pub use local::{LocalReadRequest, LocalReadResponse};
pub use options::StartOptions;
pub use ports::{PortSelector, RandomPorts};
pub use server::ServerHandle;
pub use service::ChunkService;

use std::time::Duration;

/// Intermediate buffer for streamed `PUT` bodies (512 KiB).
pub const STREAM_BUFFER_SIZE: usize = 512 * 1024;

/// How long [`ServerHandle::stop`] waits for the serve task before aborting it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Version of the startup payload reported to the embedding app.
pub const PROTOCOL_VERSION: u32 = 2;
