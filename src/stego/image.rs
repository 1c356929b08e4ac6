//! LSB (Least Significant Bit) bit codec for images.
//!
//! Bits are written in order into the least significant bit of the red,
//! green and blue channels of each pixel, row by row. The alpha channel is
//! never touched, so a pixel carries exactly [`BITS_PER_PIXEL`] bits.
//!
//! Only lossless formats survive the round trip; stego images are always
//! written back out as PNG.

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

use super::StegoError;

/// Usable bits per pixel (one per color channel, alpha skipped).
pub const BITS_PER_PIXEL: usize = 3;

/// Color channels carrying payload bits, in write order (R, G, B).
const COLOR_CHANNELS: usize = 3;

/// A cover (or stego) image normalized to 8-bit RGBA.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverImage {
    pixels: RgbaImage,
}

impl CoverImage {
    /// Loads an image from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StegoError> {
        let image = image::open(path).map_err(|e| StegoError::ImageLoadError(e.to_string()))?;
        Ok(Self::from_image(image))
    }

    /// Decodes an image from encoded bytes (PNG, BMP).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StegoError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| StegoError::ImageLoadError(e.to_string()))?;
        Ok(Self::from_image(image))
    }

    /// Wraps a decoded image, converting it to RGBA.
    ///
    /// Images without an alpha channel get a fully opaque one.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            pixels: image.to_rgba8(),
        }
    }

    /// Wraps an RGBA buffer as-is.
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Returns `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Number of pixels in the image.
    pub fn pixel_count(&self) -> usize {
        let (width, height) = self.dimensions();
        (width as usize) * (height as usize)
    }

    /// Number of bits that can be embedded (3 per pixel).
    pub fn capacity_bits(&self) -> usize {
        self.pixel_count() * BITS_PER_PIXEL
    }

    /// Writes `bits` into the LSBs of a copy of this image.
    ///
    /// Channels past the end of `bits` keep their original values.
    /// Fails with [`StegoError::CapacityExceeded`] instead of truncating.
    pub fn embed(&self, bits: &[bool]) -> Result<CoverImage, StegoError> {
        let capacity = self.capacity_bits();
        if bits.len() > capacity {
            return Err(StegoError::CapacityExceeded {
                needed: bits.len(),
                capacity,
            });
        }

        let mut output = self.pixels.clone();
        let mut remaining = bits.iter();

        'pixels: for pixel in output.pixels_mut() {
            for channel in 0..COLOR_CHANNELS {
                let Some(&bit) = remaining.next() else {
                    break 'pixels;
                };
                // Clear LSB and set new bit
                pixel.0[channel] = (pixel.0[channel] & 0xFE) | u8::from(bit);
            }
        }

        Ok(CoverImage { pixels: output })
    }

    /// Reads the LSB of every color channel, producing exactly
    /// `3 * pixel_count` bits. Any image yields some bitstream; validating it
    /// is the framer's job.
    pub fn extract(&self) -> Vec<bool> {
        let mut bits = Vec::with_capacity(self.capacity_bits());
        for pixel in self.pixels.pixels() {
            bits.extend(pixel.0[..COLOR_CHANNELS].iter().map(|c| c & 1 == 1));
        }
        bits
    }

    /// Encodes the image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, StegoError> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| StegoError::ImageSaveError(e.to_string()))?;
        Ok(bytes)
    }

    /// Returns a reference to the underlying RGBA buffer.
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl From<DynamicImage> for CoverImage {
    fn from(image: DynamicImage) -> Self {
        Self::from_image(image)
    }
}
