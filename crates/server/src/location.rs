//! Mapping between requests and upload identifiers.

use axum::http::Uri;
use hoist_core::UploadId;
use thiserror::Error;

/// The request does not encode an upload identifier.
///
/// The handler maps this to 404 on HEAD/PATCH and 400 on GET.
#[derive(Debug, Error)]
#[error("request does not address an upload: {0}")]
pub struct LocationError(pub String);

/// Bidirectional mapping between requests and upload identifiers.
///
/// Pluggable because URL layout belongs to the host's routing; the
/// handlers only depend on these two methods.
pub trait LocationProvider: Send + Sync {
    /// Derive the upload identifier a request addresses.
    fn upload_id(&self, uri: &Uri) -> Result<UploadId, LocationError>;

    /// Build the URL at which the upload can be addressed by subsequent
    /// requests. May be absolute or request-relative.
    fn location(&self, id: UploadId, uri: &Uri) -> String;
}

/// Default provider: the identifier is the final path segment under a
/// fixed base path.
pub struct PathLocationProvider {
    base_path: String,
}

impl PathLocationProvider {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl LocationProvider for PathLocationProvider {
    fn upload_id(&self, uri: &Uri) -> Result<UploadId, LocationError> {
        let path = uri.path();
        let rest = path
            .strip_prefix(&self.base_path)
            .ok_or_else(|| LocationError(path.to_string()))?;
        let id = rest.strip_prefix('/').unwrap_or(rest);
        if id.is_empty() || id.contains('/') {
            return Err(LocationError(path.to_string()));
        }
        UploadId::parse(id).map_err(|_| LocationError(path.to_string()))
    }

    fn location(&self, id: UploadId, _uri: &Uri) -> String {
        format!("{}/{}", self.base_path, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn roundtrips_through_location() {
        let provider = PathLocationProvider::new("/files");
        let id = UploadId::new();

        let location = provider.location(id, &uri("/files"));
        assert_eq!(location, format!("/files/{id}"));

        let derived = provider.upload_id(&uri(&location)).unwrap();
        assert_eq!(derived, id);
    }

    #[test]
    fn rejects_requests_without_an_identifier() {
        let provider = PathLocationProvider::new("/files");
        assert!(provider.upload_id(&uri("/files")).is_err());
        assert!(provider.upload_id(&uri("/files/")).is_err());
        assert!(provider.upload_id(&uri("/other/abc")).is_err());
        assert!(provider.upload_id(&uri("/files/not-hex")).is_err());
        assert!(provider.upload_id(&uri("/files/a/b")).is_err());
    }

    #[test]
    fn ignores_query_strings() {
        let provider = PathLocationProvider::new("/files");
        let id = UploadId::new();
        let derived = provider.upload_id(&uri(&format!("/files/{id}?sig=abc"))).unwrap();
        assert_eq!(derived, id);
    }
}
