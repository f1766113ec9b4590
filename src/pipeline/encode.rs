//! Image encoding: raw bytes → base64 [`DataUri`].
//!
//! The multimodal APIs accept images as base64 data URIs embedded in the JSON
//! request body. The MIME type is sniffed from the magic bytes rather than
//! trusted from a file extension, so a mislabelled HEIC or PDF is rejected
//! here instead of failing opaquely inside the model call.

use crate::error::RevisioError;
use crate::types::DataUri;
use image::ImageFormat;
use tracing::debug;

/// Formats every supported vision provider accepts.
const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Encode image bytes as a data URI.
///
/// `source_name` only appears in error messages.
pub fn to_data_uri(
    source_name: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<DataUri, RevisioError> {
    if bytes.len() > max_bytes {
        return Err(RevisioError::ImageTooLarge {
            source_name: source_name.to_string(),
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let mime_type = sniff_mime_type(bytes).ok_or_else(|| RevisioError::NotAnImage {
        source_name: source_name.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })?;

    let uri = DataUri::from_bytes(mime_type, bytes);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        source_name,
        mime_type,
        uri.data().len()
    );
    Ok(uri)
}

/// MIME type of an accepted image format, from its magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    ACCEPTED_FORMATS
        .contains(&format)
        .then(|| format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn sniffs_png_and_jpeg() {
        assert_eq!(sniff_mime_type(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_mime_type(JPEG_MAGIC), Some("image/jpeg"));
    }

    #[test]
    fn encode_png_bytes() {
        let uri = to_data_uri("page.png", PNG_MAGIC, 1024).expect("encode should succeed");
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(uri.decode().unwrap(), PNG_MAGIC);
        assert!(uri.to_string().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn rejects_non_images() {
        let err = to_data_uri("notes.pdf", b"%PDF-1.7 ...", 1024).unwrap_err();
        match err {
            RevisioError::NotAnImage { source_name, magic } => {
                assert_eq!(source_name, "notes.pdf");
                assert_eq!(magic, b"%PDF".to_vec());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_oversized_images() {
        let err = to_data_uri("big.png", PNG_MAGIC, 4).unwrap_err();
        assert!(matches!(err, RevisioError::ImageTooLarge { size: 12, limit: 4, .. }));
    }
}
