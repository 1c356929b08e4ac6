//! Property-based tests for the bit codec and framer.

use proptest::prelude::*;

use ::image::{ImageBuffer, Rgba};

use super::{embed_payload, extract_payload, CoverImage, StegoError, LENGTH_PREFIX_BITS};

/// Builds an RGBA cover whose channel values come from a seed.
fn seeded_cover(width: u32, height: u32, seed: u8) -> CoverImage {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let v = (x as u8).wrapping_mul(31) ^ (y as u8).wrapping_mul(17) ^ seed;
        Rgba([v, v.wrapping_add(85), v.wrapping_add(170), 255 - seed])
    });
    CoverImage::from_rgba(img)
}

proptest! {
    /// Anything that fits comes back out byte-for-byte.
    #[test]
    fn roundtrip_when_payload_fits(
        width in 4u32..40,
        height in 4u32..40,
        seed in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 1..200),
    ) {
        let cover = seeded_cover(width, height, seed);
        let needed = LENGTH_PREFIX_BITS + payload.len() * 8;

        let result = embed_payload(&cover, &payload, 20_000);
        if needed <= cover.capacity_bits() {
            let stego = result.unwrap();
            prop_assert_eq!(extract_payload(&stego, 20_000).unwrap(), payload);
        } else {
            let is_capacity_error = matches!(result, Err(StegoError::CapacityExceeded { .. }));
            prop_assert!(is_capacity_error);
        }
    }

    /// Random LSB noise never yields a payload.
    #[test]
    fn noise_is_rejected(
        noise in prop::collection::vec(any::<[u8; 4]>(), 64..1024),
    ) {
        let width = noise.len() as u32;
        let img = ImageBuffer::from_fn(width, 1, |x, _| Rgba(noise[x as usize]));
        let cover = CoverImage::from_rgba(img);

        let result = extract_payload(&cover, 20_000);
        let rejected = matches!(
            result,
            Err(StegoError::ImplausibleLength { .. }) | Err(StegoError::TruncatedPayload { .. })
        );
        prop_assert!(rejected);
    }

    /// Embedding only ever touches the lowest bit of R, G and B.
    #[test]
    fn embed_changes_only_lsbs(
        seed in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 1..60),
    ) {
        let cover = seeded_cover(24, 24, seed);
        let stego = embed_payload(&cover, &payload, 20_000).unwrap();

        for (before, after) in cover.as_rgba().pixels().zip(stego.as_rgba().pixels()) {
            prop_assert_eq!(before.0[3], after.0[3]);
            for channel in 0..3 {
                prop_assert_eq!(before.0[channel] | 1, after.0[channel] | 1);
            }
        }
    }
}
