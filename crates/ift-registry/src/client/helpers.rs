//! Pure helpers: registry URL construction and request body encoding
//! (no HTTP, no status logic).

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{RegistryError, RegistryResult};

/// Trailing path of the delete endpoint.
pub(crate) const CERTIFICATE_ATTACHMENT: [&str; 2] = ["attachments", "certificate"];

/// Append path segments to `base`, percent-encoding each segment.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> RegistryResult<String> {
    let mut url = Url::parse(base).map_err(|e| RegistryError::Config {
        message: format!("invalid registry URL {:?}: {}", base, e),
    })?;

    url.path_segments_mut()
        .map_err(|_| RegistryError::Config {
            message: format!("registry URL cannot be a base: {}", base),
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url.into())
}

/// `{base}/certifications`
pub(crate) fn certifications_url(base: &str) -> RegistryResult<String> {
    join_segments(base, &["certifications"])
}

/// `{base}/certifications/{id}`
pub(crate) fn certification_url(base: &str, id: &str) -> RegistryResult<String> {
    join_segments(base, &["certifications", id])
}

/// `{base}/certifications/{id}/attachments/certificate`
pub(crate) fn certificate_attachment_url(base: &str, id: &str) -> RegistryResult<String> {
    let [attachments, certificate] = CERTIFICATE_ATTACHMENT;
    join_segments(base, &["certifications", id, attachments, certificate])
}

/// Encode an outgoing document. Failure is a mapping error: nothing was sent.
pub(crate) fn encode_body<T: Serialize>(path: &str, document: &T) -> RegistryResult<Value> {
    serde_json::to_value(document)
        .map_err(|e| RegistryError::mapping(path, format!("cannot encode as JSON: {}", e)))
}
