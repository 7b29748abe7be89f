/// Page image decoding module
///
/// This module handles:
/// - Decoding compressed entry bytes into RGBA rasters
/// - Classifying failures (truncated vs unsupported vs malformed)
/// - Generating thumbnails
pub mod decoder;
pub mod thumbnail;

pub use decoder::{DecodedImage, ImageCrateDecoder, ImageDecoder};
pub use thumbnail::{make_thumbnail, thumbnail_dimensions};
