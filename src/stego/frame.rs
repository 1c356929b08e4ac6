//! Payload framing.
//!
//! Format: `[4 bytes big-endian length] + [payload bytes]`, converted to a
//! bitstream MSB-first per byte. The length is checked against a sanity
//! ceiling on both sides so that noise extracted from an image that never
//! carried a payload is rejected instead of being returned as data.

use super::StegoError;

/// Bits used by the length prefix.
pub const LENGTH_PREFIX_BITS: usize = 32;

/// Default sanity ceiling for a framed payload, in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 20_000;

/// Converts bytes to bits, most significant bit first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Packs bits (MSB first) into bytes. A trailing partial byte is dropped.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
        .collect()
}

/// Number of bits a payload of `payload_len` bytes occupies once framed.
pub fn framed_bit_len(payload_len: usize) -> usize {
    LENGTH_PREFIX_BITS + payload_len * 8
}

/// Largest payload (in bytes) that fits into `capacity_bits`.
pub fn max_payload_for_bits(capacity_bits: usize) -> usize {
    capacity_bits.saturating_sub(LENGTH_PREFIX_BITS) / 8
}

/// Prepends the length prefix and converts to a bitstream.
pub fn frame(payload: &[u8], max_len: usize) -> Result<Vec<bool>, StegoError> {
    let too_large = || StegoError::PayloadTooLarge {
        size: payload.len(),
        max: max_len,
    };
    if payload.len() > max_len {
        return Err(too_large());
    }
    let length = u32::try_from(payload.len()).map_err(|_| too_large())?;

    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(payload);

    Ok(bytes_to_bits(&framed))
}

/// Parses a framed bitstream back into the payload bytes.
///
/// Bits after the declared payload are ignored.
pub fn unframe(bits: &[bool], max_len: usize) -> Result<Vec<u8>, StegoError> {
    if bits.len() < LENGTH_PREFIX_BITS {
        return Err(StegoError::TruncatedPayload {
            needed: LENGTH_PREFIX_BITS,
            available: bits.len(),
        });
    }

    let prefix = bits_to_bytes(&bits[..LENGTH_PREFIX_BITS]);
    let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

    if length == 0 || length as usize > max_len {
        return Err(StegoError::ImplausibleLength {
            length,
            max: max_len,
        });
    }

    let needed = framed_bit_len(length as usize);
    if needed > bits.len() {
        return Err(StegoError::TruncatedPayload {
            needed,
            available: bits.len(),
        });
    }

    Ok(bits_to_bytes(&bits[LENGTH_PREFIX_BITS..needed]))
}
