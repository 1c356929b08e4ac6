//! Steganography layer: hides an opaque payload inside a cover image.
//!
//! - [`image`]: pixel-level LSB bit codec (R, G, B channels; alpha untouched)
//! - [`frame`]: length-prefixed payload framing with a sanity ceiling
//!
//! The two layers are combined by [`embed_payload`] and [`extract_payload`].

pub mod frame;
pub mod image;

#[cfg(test)]
mod proptests;

pub use frame::{
    bits_to_bytes, bytes_to_bits, frame, framed_bit_len, max_payload_for_bits, unframe,
    DEFAULT_MAX_PAYLOAD_BYTES, LENGTH_PREFIX_BITS,
};
pub use self::image::{CoverImage, BITS_PER_PIXEL};

use thiserror::Error;

/// Errors that can occur while embedding or extracting a payload.
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("Image too small to hide payload: need {needed} bits, have capacity for {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("Payload too large: {size} bytes exceeds the limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Truncated payload: need {needed} bits, only {available} available")]
    TruncatedPayload { needed: usize, available: usize },

    #[error("Implausible payload length {length} (limit {max})")]
    ImplausibleLength { length: u32, max: usize },

    #[error("Image load error: {0}")]
    ImageLoadError(String),

    #[error("Image save error: {0}")]
    ImageSaveError(String),
}

/// Frames `ciphertext` and writes it into a copy of `cover`.
pub fn embed_payload(
    cover: &CoverImage,
    ciphertext: &[u8],
    max_payload: usize,
) -> Result<CoverImage, StegoError> {
    let bits = frame(ciphertext, max_payload)?;
    tracing::debug!(
        payload_bytes = ciphertext.len(),
        bits = bits.len(),
        capacity = cover.capacity_bits(),
        "embedding payload"
    );
    cover.embed(&bits)
}

/// Reads the framed payload back out of a stego image.
pub fn extract_payload(stego: &CoverImage, max_payload: usize) -> Result<Vec<u8>, StegoError> {
    unframe(&stego.extract(), max_payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{ImageBuffer, Rgb};

    fn gradient(width: u32, height: u32) -> CoverImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 13) % 256) as u8,
                ((y * 29) % 256) as u8,
                (((x + y) * 7) % 256) as u8,
            ])
        });
        CoverImage::from_image(::image::DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_payload_roundtrip_through_png() {
        let cover = gradient(64, 64);
        let payload = b"sealed bytes standing in for ciphertext";

        let stego = embed_payload(&cover, payload, DEFAULT_MAX_PAYLOAD_BYTES).unwrap();
        let png = stego.to_png_bytes().unwrap();
        let reloaded = CoverImage::from_bytes(&png).unwrap();

        let extracted = extract_payload(&reloaded, DEFAULT_MAX_PAYLOAD_BYTES).unwrap();
        assert_eq!(extracted, payload);
    }

    #[test]
    fn test_capacity_boundary_10x10() {
        // 100 pixels, 300 bits: 32 + 33 * 8 = 296 fits, 32 + 34 * 8 = 304 does not
        let cover = gradient(10, 10);

        let fits = vec![0xA5u8; 33];
        let stego = embed_payload(&cover, &fits, DEFAULT_MAX_PAYLOAD_BYTES).unwrap();
        assert_eq!(
            extract_payload(&stego, DEFAULT_MAX_PAYLOAD_BYTES).unwrap(),
            fits
        );

        let too_big = vec![0xA5u8; 34];
        let result = embed_payload(&cover, &too_big, DEFAULT_MAX_PAYLOAD_BYTES);
        assert!(matches!(
            result,
            Err(StegoError::CapacityExceeded {
                needed: 304,
                capacity: 300
            })
        ));
    }

    #[test]
    fn test_payload_ceiling_checked_before_capacity() {
        let cover = gradient(4, 4);
        let result = embed_payload(&cover, &[1u8; 64], 32);
        assert!(matches!(
            result,
            Err(StegoError::PayloadTooLarge { size: 64, max: 32 })
        ));
    }
}
