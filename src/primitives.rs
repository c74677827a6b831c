//! Byte-level primitives the handshake and frame codec are built on.
//!
//! SHA-1 and Base64 are security-adjacent, well-specified primitives with mature crates behind
//! them — `sha1` and `base64` do the actual digest/encoding work here rather than a hand-rolled
//! reimplementation. The mask and endian helpers below are not primitives any crate exists for,
//! so they're a few lines of bit-twiddling each.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// SHA-1 digest of `input`, per RFC 3174.
pub fn sha1(input: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Standard-alphabet, `=`-padded Base64 encoding.
pub fn base64_encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

/// Applies (or removes — the operation is its own inverse) a repeating 4-byte XOR mask over
/// `payload`, starting at `offset` bytes into the logical masked region. `offset` lets a frame's
/// payload be unmasked correctly even when it arrives split across several reads: each call
/// continues the `i mod 4` cycle where the previous call left off.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4], offset: usize) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[(offset + i) % 4];
    }
}

pub fn swap_u16(value: u16) -> u16 {
    value.swap_bytes()
}

pub fn swap_u32(value: u32) -> u32 {
    value.swap_bytes()
}

pub fn swap_u64(value: u64) -> u64 {
    value.swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn sha1_empty_string() {
        assert_eq!(hex(&sha1(b"")), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn sha1_abc() {
        assert_eq!(
            hex(&sha1(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89b"
        );
    }

    #[test]
    fn base64_vectors() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn mask_is_involutive() {
        let key = [0x12, 0x34, 0x56, 0x78];
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();

        let mut masked = original.clone();
        apply_mask(&mut masked, key, 0);
        assert_ne!(masked, original);

        apply_mask(&mut masked, key, 0);
        assert_eq!(masked, original);
    }

    #[test]
    fn mask_continues_correctly_across_a_split_payload() {
        let key = [0xAA, 0xBB, 0xCC, 0xDD];
        let original: Vec<u8> = (0u8..=255).collect();

        let mut whole = original.clone();
        apply_mask(&mut whole, key, 0);

        let (first, second) = original.split_at(37);
        let mut first = first.to_vec();
        let mut second = second.to_vec();
        apply_mask(&mut first, key, 0);
        apply_mask(&mut second, key, 37);

        let mut rejoined = first;
        rejoined.extend_from_slice(&second);
        assert_eq!(rejoined, whole);
    }

    #[test]
    fn endian_swap_round_trips() {
        assert_eq!(swap_u16(swap_u16(0xABCD)), 0xABCD);
        assert_eq!(swap_u32(swap_u32(0xDEAD_BEEF)), 0xDEAD_BEEF);
        assert_eq!(swap_u64(swap_u64(0x0123_4567_89AB_CDEF)), 0x0123_4567_89AB_CDEF);
        assert_eq!(swap_u16(0x0102), 0x0201);
    }
}
