//! Preview generation with the `image` crate.

use std::io::Cursor;

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pixdrop_protocol::{FileSource, PreviewArtifact, PreviewBounds, SelectedFile};

use crate::{PreviewError, PreviewFuture, PreviewGenerator};

/// Encoding used for the preview payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    #[default]
    Png,
    Jpeg,
}

impl PreviewFormat {
    pub fn mime(self) -> &'static str {
        match self {
            PreviewFormat::Png => "image/png",
            PreviewFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Largest size that fits `bounds` while keeping the aspect ratio.
/// Images already inside the bounds keep their size.
pub fn fit_within(width: u32, height: u32, bounds: PreviewBounds) -> (u32, u32) {
    if width <= bounds.width && height <= bounds.height {
        return (width, height);
    }
    let scale = f64::min(
        f64::from(bounds.width) / f64::from(width),
        f64::from(bounds.height) / f64::from(height),
    );
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w.min(bounds.width), h.min(bounds.height))
}

/// Decodes selected images and downsizes them into data URLs.
#[derive(Debug, Clone)]
pub struct ImagePreviewGenerator {
    format: PreviewFormat,
    jpeg_quality: u8,
}

impl Default for ImagePreviewGenerator {
    fn default() -> Self {
        Self::new(PreviewFormat::default())
    }
}

impl ImagePreviewGenerator {
    pub fn new(format: PreviewFormat) -> Self {
        Self {
            format,
            jpeg_quality: 80,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

impl PreviewGenerator for ImagePreviewGenerator {
    fn generate<'a>(&'a self, file: &'a SelectedFile, bounds: PreviewBounds) -> PreviewFuture<'a> {
        Box::pin(async move {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(PreviewError::InvalidBounds(bounds));
            }

            // Phase 1: load and decode.
            let source = file.source().clone();
            let decoded = tokio::task::spawn_blocking(move || decode(&source))
                .await
                .map_err(|e| PreviewError::Task(e.to_string()))??;

            // Phase 2: resize to bounds and encode.
            let format = self.format;
            let quality = self.jpeg_quality;
            let encoded_preview =
                tokio::task::spawn_blocking(move || render(decoded, bounds, format, quality))
                    .await
                    .map_err(|e| PreviewError::Task(e.to_string()))??;

            debug!(item = %file.id(), name = %file.name(), "preview ready");
            Ok(PreviewArtifact {
                id: file.id(),
                name: file.name().to_string(),
                encoded_preview,
            })
        })
    }
}

fn decode(source: &FileSource) -> Result<DynamicImage, PreviewError> {
    let data = source.read_all_blocking()?;
    let reader = ImageReader::new(Cursor::new(&data[..])).with_guessed_format()?;
    reader
        .decode()
        .map_err(|e| PreviewError::Decode(e.to_string()))
}

/// Upper limit for the initial encode buffer.
const MAX_BUFFER_HINT: usize = 4 * 1024 * 1024;

/// Initial encode buffer size: one RGB frame, capped.
fn encode_buffer_hint(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(3)
        .min(MAX_BUFFER_HINT)
}

fn render(
    img: DynamicImage,
    bounds: PreviewBounds,
    format: PreviewFormat,
    jpeg_quality: u8,
) -> Result<String, PreviewError> {
    let (width, height) = img.dimensions();
    let (w, h) = fit_within(width, height, bounds);
    let img = if (w, h) == (width, height) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };

    let mut buf = Vec::with_capacity(encode_buffer_hint(w, h));
    match format {
        PreviewFormat::Png => img
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| PreviewError::Encode(e.to_string()))?,
        PreviewFormat::Jpeg => {
            // JPEG has no alpha channel.
            img.to_rgb8()
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, jpeg_quality))
                .map_err(|e| PreviewError::Encode(e.to_string()))?;
        }
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("data:{};base64,{encoded}", format.mime()))
}
