//! Image encoder: turns an uploaded file into the wire payload sent to the
//! model and a data URL the page can show as a preview.
//!
//! No size limit or MIME whitelist is applied here. Whatever bytes arrive are
//! forwarded; the HTTP layer caps the upload size.

use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Used when neither the uploader nor the magic bytes name a type.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Inline image payload, as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// `data:<mime>;base64,<data>` for local display.
    pub preview: String,
    pub payload: ImagePayload,
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Detect an image type from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|t| t.mime_type())
}

pub fn to_data_url(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Encode raw bytes. A non-empty `declared_mime` wins over sniffing.
pub fn encode_image(bytes: &[u8], declared_mime: Option<&str>) -> EncodedImage {
    let mime_type = declared_mime
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| sniff_mime(bytes))
        .unwrap_or(FALLBACK_MIME)
        .to_string();

    let data = base64::engine::general_purpose::STANDARD.encode(bytes);

    tracing::debug!(mime_type = %mime_type, bytes = bytes.len(), "Encoded image");

    EncodedImage {
        preview: to_data_url(&mime_type, &data),
        payload: ImagePayload { data, mime_type },
    }
}

/// Read and encode a file from disk. The type is sniffed from its content.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<EncodedImage, EncodeError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| EncodeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(encode_image(&bytes, None))
}
