//! Request classification and parameter parsing.

use std::path::PathBuf;

use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri, header};

use crate::error::ChunkError;

/// The methods the chunk protocol understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkMethod {
    Get,
    Put,
    Options,
    Unsupported,
}

impl From<&Method> for ChunkMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Get,
            Method::PUT => Self::Put,
            Method::OPTIONS => Self::Options,
            _ => Self::Unsupported,
        }
    }
}

/// Byte range requested by a `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadRange {
    pub offset: u64,
    pub length: u32,
}

impl ReadRange {
    /// Parses `o` and `l`, each required exactly once.
    pub fn from_uri(uri: &Uri) -> Result<Self, ChunkError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|e| ChunkError::BadRequest(format!("malformed query: {e}")))?;

        let offset = single_param(&pairs, "o")?;
        let length = single_param(&pairs, "l")?;

        Ok(Self {
            offset: offset
                .parse()
                .map_err(|_| ChunkError::BadRequest(format!("invalid offset: {offset}")))?,
            length: length
                .parse()
                .map_err(|_| ChunkError::BadRequest(format!("invalid length: {length}")))?,
        })
    }
}

fn single_param<'a>(pairs: &'a [(String, String)], name: &str) -> Result<&'a str, ChunkError> {
    let mut values = pairs.iter().filter(|(k, _)| k == name).map(|(_, v)| v);
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value.as_str()),
        (None, _) => Err(ChunkError::BadRequest(format!("missing parameter '{name}'"))),
        (Some(_), Some(_)) => Err(ChunkError::BadRequest(format!(
            "duplicated parameter '{name}'"
        ))),
    }
}

/// Resolves the target file from the percent-decoded request path.
pub(crate) fn file_path(uri: &Uri) -> Result<PathBuf, ChunkError> {
    let decoded = urlencoding::decode(uri.path())
        .map_err(|e| ChunkError::BadRequest(format!("invalid path encoding: {e}")))?;
    if decoded.is_empty() || decoded == "/" {
        return Err(ChunkError::BadRequest("empty file path".into()));
    }
    Ok(PathBuf::from(decoded.into_owned()))
}

/// Parses the declared body length of a `PUT`.
pub(crate) fn content_length(headers: &HeaderMap) -> Result<u64, ChunkError> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or_else(|| ChunkError::BadRequest("missing content-length".into()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| ChunkError::BadRequest("invalid content-length".into()))
}
