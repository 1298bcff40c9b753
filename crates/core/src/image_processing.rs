//! Image encoding utilities.
//!
//! Everything sent to the API or pushed to the popup travels as a base64
//! data URL. This module converts raw clipboard pixels and image files into
//! that form, and back into pixels for display.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Image processing utilities for captured content.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Encodes raw RGBA pixels as a PNG data URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageProcessing`] if the buffer does not match the
    /// dimensions or PNG encoding fails.
    pub fn rgba_to_data_url(width: u32, height: u32, rgba: Vec<u8>) -> Result<String> {
        if width == 0 || height == 0 {
            return Err(AppError::image("image has zero area"));
        }
        let buffer = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| AppError::image("pixel buffer does not match dimensions"))?;

        let mut bytes: Vec<u8> = Vec::new();
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;

        Ok(Self::bytes_to_data_url("image/png", &bytes))
    }

    /// Wraps already-encoded bytes in a data URL.
    pub fn bytes_to_data_url(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, BASE64.encode(bytes))
    }

    /// Decodes a base64 data URL into an image for display.
    pub fn decode_data_url(data_url: &str) -> Result<DynamicImage> {
        let (header, payload) = data_url
            .split_once(',')
            .ok_or_else(|| AppError::image("malformed data URL"))?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(AppError::image("data URL is not base64 encoded"));
        }
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AppError::image(format!("invalid base64 payload: {}", e)))?;
        image::load_from_memory(&bytes)
            .map_err(|e| AppError::image(format!("Failed to decode image: {}", e)))
    }
}
