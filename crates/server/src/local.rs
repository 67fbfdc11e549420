//! Direct file range reads, shared by `GET` and the in-process helper.

use std::io::SeekFrom;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Reads up to `length` bytes starting at `offset`.
///
/// A range that runs past end-of-file returns the bytes that exist.
pub async fn read_range(path: &Path, offset: u64, length: u32) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = Vec::new();
    file.take(u64::from(length)).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Parameters of an in-process chunk read (no HTTP, no encryption).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalReadRequest {
    pub path: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub length: u32,
}

/// Result of an in-process chunk read. `data` is empty on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReadResponse {
    /// Base64 (standard alphabet, padded) chunk bytes.
    pub data: String,
}

impl LocalReadResponse {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(bytes),
        }
    }
}

/// Serves a [`LocalReadRequest`], mapping any failure to empty data.
pub async fn read_file_chunk(request: &LocalReadRequest) -> LocalReadResponse {
    match read_range(Path::new(&request.path), request.offset, request.length).await {
        Ok(bytes) => LocalReadResponse::from_bytes(&bytes),
        Err(e) => {
            tracing::debug!(path = %request.path, "local chunk read failed: {e}");
            LocalReadResponse::default()
        }
    }
}
