//! Turning camera frames and image files into the encoded payload the
//! library stores, and back again for display or export.
//!
//! Frames are re-encoded as JPEG and wrapped in a `data:` URL, the same form a
//! browser canvas produces. The library never looks inside the payload.

mod discovery;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::CaptureConfig;

pub use discovery::discover_images;

pub const JPEG_MIME: &str = "image/jpeg";

/// A payload taken back out of its `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// File extension matching the MIME type, `bin` if unknown.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

/// Read an image file and encode it as a JPEG data URL.
pub fn encode_image_file(path: &Path, config: &CaptureConfig) -> Result<String> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    encode_frame(img, config)
}

/// Encode a decoded frame, scaling it down to `max_dimension` first.
pub fn encode_frame(img: DynamicImage, config: &CaptureConfig) -> Result<String> {
    let max_dimension = config.max_dimension.max(1);
    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, config.jpeg_quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| anyhow!("Failed to encode image as JPEG: {}", e))?;

    Ok(data_url(JPEG_MIME, &buf.into_inner()))
}

pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Split a base64 `data:` URL into its MIME type and raw bytes.
pub fn decode_data_url(payload: &str) -> Result<DecodedImage> {
    let rest = payload
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("Payload is not a data URL"))?;
    let (meta, encoded) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URL has no payload section"))?;
    let Some(mime_type) = meta.strip_suffix(";base64") else {
        bail!("Data URL is not base64 encoded");
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .context("Data URL payload is not valid base64")?;

    Ok(DecodedImage {
        mime_type: mime_type.to_string(),
        bytes,
    })
}
