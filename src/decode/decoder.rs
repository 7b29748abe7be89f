//! Entry byte decoder
//!
//! Turns the compressed bytes of an archive entry into an RGBA8 raster.
//! Decoding is CPU-bound, so callers go through `decode_off_thread`, which
//! runs the decoder on tokio's blocking pool.

use std::sync::Arc;

use bytes::Bytes;
use image::{ImageError, ImageFormat, RgbaImage};
use tokio::task;
use tracing::{debug, warn};

use crate::archive::ArchiveEntryRef;
use crate::error::{DecodeError, DecodeErrorKind, PageError};

/// PNG files end with an empty IEND chunk (type + CRC)
const PNG_IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];
/// JPEG End Of Image marker
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
/// GIF trailer byte
const GIF_TRAILER: u8 = 0x3B;
/// How far from the end we look for an end marker (writers may pad)
const TAIL_SEARCH: usize = 1024;

/// Leading bytes of the containers we can recognise
const SIGNATURES: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    &[0xFF, 0xD8, 0xFF],
    b"GIF8",
    b"RIFF",
    b"II*\0",
    b"MM\0*",
];

/// A decoded page raster
///
/// Pixels are always RGBA8 and both dimensions are positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    /// Wrap an RGBA buffer; returns `None` for a zero-sized image
    pub fn new(pixels: RgbaImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Memory held by the pixel buffer
    pub fn byte_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// Decodes raw entry bytes into a raster
///
/// Implementations must be deterministic and must not retry; the page
/// decides what to do with a failure.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, entry: &ArchiveEntryRef, data: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// Decoder backed by the `image` crate
///
/// Supports every format enabled in `image` (JPEG, PNG, GIF, BMP, WebP,
/// TIFF, ...). The first frame of animated formats is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, entry: &ArchiveEntryRef, data: &[u8]) -> Result<DecodedImage, DecodeError> {
        let fail = |kind: DecodeErrorKind, message: String| {
            DecodeError::new(entry.name.clone(), data.len(), kind, message)
        };

        if data.is_empty() {
            return Err(fail(DecodeErrorKind::Truncated, "no data".to_string()));
        }

        let format = image::guess_format(data).map_err(|e| {
            let kind = if is_signature_prefix(data) {
                DecodeErrorKind::Truncated
            } else {
                DecodeErrorKind::Unsupported
            };
            fail(kind, e.to_string())
        })?;

        // The jpeg decoder fills missing scanlines instead of failing
        if has_end_marker(format, data) == Some(false) {
            warn!(entry = %entry.name, len = data.len(), ?format, "end marker missing");
            return Err(fail(
                DecodeErrorKind::Truncated,
                format!("{format:?} data ends before its end marker"),
            ));
        }

        let img = image::load_from_memory_with_format(data, format).map_err(|e| {
            let kind = classify(&e);
            warn!(entry = %entry.name, len = data.len(), %kind, "decode failed");
            fail(kind, e.to_string())
        })?;

        let (width, height) = (img.width(), img.height());
        debug!(entry = %entry.name, ?format, width, height, "decoded page");

        DecodedImage::new(img.into_rgba8()).ok_or_else(|| {
            fail(
                DecodeErrorKind::Malformed,
                format!("image has zero size ({width}x{height})"),
            )
        })
    }
}

/// Sort a decoder failure into truncated / unsupported / malformed
fn classify(error: &ImageError) -> DecodeErrorKind {
    match error {
        ImageError::Unsupported(_) | ImageError::Limits(_) => DecodeErrorKind::Unsupported,
        ImageError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            DecodeErrorKind::Truncated
        }
        _ => DecodeErrorKind::Malformed,
    }
}

/// True when `data` stops partway through a known signature
fn is_signature_prefix(data: &[u8]) -> bool {
    SIGNATURES
        .iter()
        .any(|magic| data.len() < magic.len() && magic.starts_with(data))
}

/// Check the container's end marker
///
/// Returns `None` for formats without a reliable trailer.
fn has_end_marker(format: ImageFormat, data: &[u8]) -> Option<bool> {
    match format {
        ImageFormat::Png => Some(tail(data).windows(PNG_IEND.len()).any(|w| w == PNG_IEND)),
        ImageFormat::Jpeg => Some(tail(data).windows(JPEG_EOI.len()).any(|w| w == JPEG_EOI)),
        ImageFormat::Gif => {
            let last = data.iter().rposition(|&b| b != 0).map(|i| data[i]);
            Some(last == Some(GIF_TRAILER))
        }
        _ => None,
    }
}

fn tail(data: &[u8]) -> &[u8] {
    &data[data.len().saturating_sub(TAIL_SEARCH)..]
}

/// Decode entry bytes on the blocking pool
///
/// # Arguments
/// * `decoder` - Decoder to run
/// * `entry` - Entry the bytes belong to (for diagnostics)
/// * `data` - Raw entry bytes
///
/// # Returns
/// * `Ok(DecodedImage)` - The decoded raster
/// * `Err(PageError::Decode)` - The decoder rejected the data
/// * `Err(PageError::Worker)` - The blocking task panicked or was cancelled
pub async fn decode_off_thread(
    decoder: Arc<dyn ImageDecoder>,
    entry: ArchiveEntryRef,
    data: Bytes,
) -> Result<DecodedImage, PageError> {
    let name = entry.name.clone();
    // Spawn blocking because image decoding is CPU-intensive
    task::spawn_blocking(move || decoder.decode(&entry, &data))
        .await
        .map_err(|e| PageError::Worker {
            entry: name,
            message: format!("decode task join error: {e}"),
        })?
        .map_err(PageError::from)
}
