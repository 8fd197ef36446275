//! Poller command decoding

use crate::errors::UploadError;
use crate::models::upload::UploadRequest;

/// Decode a raw command payload into an upload request.
///
/// Only the shape is checked here; field values are validated by the uploader.
pub fn decode(payload: &str) -> Result<UploadRequest, UploadError> {
    serde_json::from_str(payload).map_err(|e| UploadError::DecodeError(e.to_string()))
}
