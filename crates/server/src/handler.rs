//! HTTP protocol engine: authorization, method dispatch and chunk I/O.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use filechunk_codec::ChunkCodec;
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::STREAM_BUFFER_SIZE;
use crate::cors;
use crate::error::ChunkError;
use crate::local::read_range;
use crate::request::{self, ChunkMethod, ReadRange};
use crate::token::validate_token;

/// Immutable per-instance state shared by every connection.
#[derive(Debug)]
pub(crate) struct ChunkState {
    pub auth_token: String,
    pub codec: ChunkCodec,
    pub max_body_size: u64,
}

/// Builds the router serving the chunk protocol.
///
/// Every path is a file path, so all requests go through one fallback.
pub fn router(auth_token: String, codec: ChunkCodec, max_body_size: u64) -> Router {
    let state = Arc::new(ChunkState {
        auth_token,
        codec,
        max_body_size,
    });
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<Arc<ChunkState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = ChunkMethod::from(&parts.method);

    if method == ChunkMethod::Options {
        return cors::empty(StatusCode::OK, &parts.headers);
    }

    let authorized = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|received| validate_token(received, &state.auth_token));
    if !authorized {
        debug!(method = %parts.method, "rejecting unauthorized request");
        return cors::empty(ChunkError::Unauthorized.status(), &parts.headers);
    }

    let result = match method {
        ChunkMethod::Put => handle_put(&state, &parts.uri, &parts.headers, body).await,
        ChunkMethod::Get => handle_get(&state, &parts.uri).await,
        ChunkMethod::Options | ChunkMethod::Unsupported => {
            Ok(StatusCode::METHOD_NOT_ALLOWED.into())
        }
    };

    match result {
        Ok(Reply::Empty(status)) => cors::empty(status, &parts.headers),
        Ok(Reply::Bytes(bytes)) => {
            let len = bytes.len();
            let mut response = Response::new(Body::from(bytes));
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            cors::apply(&parts.headers, &mut response);
            response
        }
        Err(e) => {
            warn!(method = %parts.method, path = parts.uri.path(), "chunk request failed: {e}");
            cors::empty(e.status(), &parts.headers)
        }
    }
}

/// Successful outcome of a chunk handler.
enum Reply {
    Empty(StatusCode),
    Bytes(Vec<u8>),
}

impl From<StatusCode> for Reply {
    fn from(status: StatusCode) -> Self {
        Self::Empty(status)
    }
}

/// Appends the request body to the target file.
async fn handle_put(
    state: &ChunkState,
    uri: &axum::http::Uri,
    headers: &HeaderMap,
    body: Body,
) -> Result<Reply, ChunkError> {
    let path = request::file_path(uri)?;
    let declared = request::content_length(headers)?;
    if declared > state.max_body_size {
        return Err(ChunkError::Oversize {
            len: declared,
            max: state.max_body_size,
        });
    }

    let written = if state.codec.is_enabled() {
        append_sealed(state, &path, body).await?
    } else {
        append_streamed(&path, body, declared).await?
    };

    debug!(path = %path.display(), bytes = written, "chunk appended");
    Ok(StatusCode::NO_CONTENT.into())
}

/// Buffers and decrypts the whole frame before touching the file.
async fn append_sealed(state: &ChunkState, path: &Path, body: Body) -> Result<u64, ChunkError> {
    let limit = usize::try_from(state.max_body_size).unwrap_or(usize::MAX);
    let frame = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ChunkError::BadRequest(format!("failed to read body: {e}")))?;

    let plaintext = state.codec.decrypt(&frame).map_err(ChunkError::Decrypt)?;
    if plaintext.is_empty() {
        return Err(ChunkError::BadRequest("decrypted chunk is empty".into()));
    }

    let mut file = open_append(path).await?;
    file.write_all(&plaintext).await?;
    file.flush().await?;
    Ok(plaintext.len() as u64)
}

/// Streams the body into the file through a fixed-size buffer.
///
/// The file is opened on the first data frame, so a body that fails before
/// any bytes arrive leaves nothing behind.
async fn append_streamed(path: &Path, body: Body, declared: u64) -> Result<u64, ChunkError> {
    let mut writer: Option<BufWriter<tokio::fs::File>> = None;
    let mut stream = body.into_data_stream();
    let mut total: u64 = 0;

    while let Some(frame) = stream.next().await {
        let data =
            frame.map_err(|e| ChunkError::BadRequest(format!("failed to read body: {e}")))?;
        if data.is_empty() {
            continue;
        }
        total += data.len() as u64;
        if total > declared {
            return Err(ChunkError::BadRequest(
                "body longer than content-length".into(),
            ));
        }
        if writer.is_none() {
            let file = open_append(path).await?;
            writer = Some(BufWriter::with_capacity(STREAM_BUFFER_SIZE, file));
        }
        if let Some(out) = writer.as_mut() {
            out.write_all(&data).await?;
        }
    }

    match writer {
        Some(mut out) => out.flush().await?,
        // An empty body still creates the target.
        None => drop(open_append(path).await?),
    }
    Ok(total)
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

/// Reads the requested range and seals it when encryption is on.
async fn handle_get(state: &ChunkState, uri: &axum::http::Uri) -> Result<Reply, ChunkError> {
    let path = request::file_path(uri)?;
    let range = ReadRange::from_uri(uri)?;

    let chunk = read_range(&path, range.offset, range.length).await?;
    let payload = state.codec.encrypt(&chunk).map_err(ChunkError::Encrypt)?;

    debug!(
        path = %path.display(),
        offset = range.offset,
        length = range.length,
        bytes = chunk.len(),
        "chunk read"
    );
    Ok(Reply::Bytes(payload))
}
