//! tus protocol header names and parsing helpers.

use crate::error::{ApiError, ApiResult};
use axum::http::{HeaderMap, Method, header};

pub const TUS_RESUMABLE: &str = "Tus-Resumable";
pub const TUS_VERSION: &str = "Tus-Version";
pub const TUS_MAX_SIZE: &str = "Tus-Max-Size";
pub const TUS_EXTENSION: &str = "Tus-Extension";
pub const UPLOAD_LENGTH: &str = "Upload-Length";
pub const UPLOAD_OFFSET: &str = "Upload-Offset";
pub const UPLOAD_DEFER_LENGTH: &str = "Upload-Defer-Length";
pub const UPLOAD_METADATA: &str = "Upload-Metadata";
pub const METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";

/// Content type that marks a request body as upload bytes.
pub const OFFSET_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// Protocol versions this server accepts.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0.0"];

/// Extensions advertised on OPTIONS.
pub const SUPPORTED_EXTENSIONS: &str = "creation, creation-defer-length, creation-with-upload";

/// Resolve the effective method, honoring `X-HTTP-Method-Override`.
pub fn effective_method(headers: &HeaderMap, method: &Method) -> ApiResult<Method> {
    let Some(value) = headers.get(METHOD_OVERRIDE) else {
        return Ok(method.clone());
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("unreadable X-HTTP-Method-Override".into()))?;
    Method::from_bytes(value.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ApiError::BadRequest(format!("invalid X-HTTP-Method-Override: {value:?}")))
}

/// Require a supported `Tus-Resumable` value.
pub fn require_version(headers: &HeaderMap) -> ApiResult<()> {
    let version = headers
        .get(TUS_RESUMABLE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(ApiError::UnsupportedVersion(version.to_string()))
    }
}

/// Read an optional non-negative integer header. A malformed value is a
/// protocol violation.
pub fn u64_header(headers: &HeaderMap, name: &str) -> ApiResult<Option<u64>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("unreadable {name}")))?;
    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("invalid {name}: {value:?}")))
}

/// Read an optional string header, dropping unreadable values.
pub fn str_header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Whether the request body carries upload bytes.
pub fn carries_upload_bytes(headers: &HeaderMap) -> bool {
    str_header(headers, header::CONTENT_TYPE.as_str())
        .map(str::trim)
        .is_some_and(|v| v == OFFSET_CONTENT_TYPE)
}
