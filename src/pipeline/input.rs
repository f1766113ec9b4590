//! Input resolution: turn user-supplied image paths or URLs into data URIs.
//!
//! Local files are read with `tokio::fs`; `http(s)` sources are downloaded
//! with `reqwest` under the configured download timeout. Both paths end in
//! [`super::encode::to_data_uri`], which sniffs the format and enforces the
//! size limit. Images keep the order they were given in, which becomes the
//! "Image N" numbering the model sees.

use crate::config::SheetConfig;
use crate::error::RevisioError;
use crate::pipeline::encode::to_data_uri;
use crate::types::DataUri;
use futures::future::try_join_all;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load one image from a local path or an `http(s)` URL.
pub async fn load_image(source: &str, config: &SheetConfig) -> Result<DataUri, RevisioError> {
    let bytes = if is_url(source) {
        download_url(source, config.download_timeout_secs).await?
    } else {
        read_local(source).await?
    };
    to_data_uri(source, &bytes, config.max_image_bytes)
}

/// Load every image concurrently. The output order matches `sources`; the
/// first failure aborts the whole batch.
pub async fn load_images<S: AsRef<str>>(
    sources: &[S],
    config: &SheetConfig,
) -> Result<Vec<DataUri>, RevisioError> {
    let images = try_join_all(sources.iter().map(|s| load_image(s.as_ref(), config))).await?;
    info!("Loaded {} image(s)", images.len());
    Ok(images)
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, RevisioError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RevisioError::ImageNotFound { path })
        }
        Err(source) => Err(RevisioError::ImageReadFailed { path, source }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, RevisioError> {
    info!("Downloading image from: {}", url);

    let failed = |reason: String| RevisioError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let from_reqwest = |e: reqwest::Error| {
        if e.is_timeout() {
            RevisioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(from_reqwest)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(from_reqwest)?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const GIF_MAGIC: &[u8] = b"GIF89a\x01\x00\x01\x00";

    fn temp_image(bytes: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/notes.png"));
        assert!(is_url("http://example.com/notes.png"));
        assert!(!is_url("/tmp/notes.png"));
        assert!(!is_url("notes.png"));
        assert!(!is_url("ftp://example.com/notes.png"));
    }

    #[tokio::test]
    async fn loads_local_images_in_order() {
        let png = temp_image(PNG_MAGIC);
        let gif = temp_image(GIF_MAGIC);
        let sources = [
            png.path().to_string_lossy().into_owned(),
            gif.path().to_string_lossy().into_owned(),
        ];

        let images = load_images(&sources, &SheetConfig::default()).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].mime_type(), "image/png");
        assert_eq!(images[1].mime_type(), "image/gif");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_image("/definitely/not/here.png", &SheetConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RevisioError::ImageNotFound { .. }));
    }

    #[tokio::test]
    async fn non_image_file_is_rejected() {
        let txt = temp_image(b"just some notes");
        let err = load_image(&txt.path().to_string_lossy(), &SheetConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RevisioError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn one_bad_source_fails_the_batch() {
        let png = temp_image(PNG_MAGIC);
        let sources = [
            png.path().to_string_lossy().into_owned(),
            "/definitely/not/here.png".to_string(),
        ];
        assert!(load_images(&sources, &SheetConfig::default()).await.is_err());
    }
}
