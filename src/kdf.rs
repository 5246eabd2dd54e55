//! AES-MP16: the Miyaguchi–Preneel one-way compression KDF (§4.A).

use crate::error::SheError;
use crate::primitives::aes128_encrypt_block;

/// Computes `AES-MP16(input)`.
///
/// `input` must be a nonzero, whole multiple of 16 bytes — every call site
/// in this crate concatenates fixed-length fields that already sum to a
/// whole number of blocks (§4.A), so a mismatched length here indicates a
/// caller bug and is rejected rather than silently zero-padded.
pub fn aes_mp16(input: &[u8]) -> Result<[u8; 16], SheError> {
    if input.is_empty() || input.len() % 16 != 0 {
        return Err(SheError::BadArgs);
    }

    let mut h = [0u8; 16];
    for block in input.chunks_exact(16) {
        let mut m = [0u8; 16];
        m.copy_from_slice(block);

        let e = aes128_encrypt_block(&h, &m);

        let mut next = [0u8; 16];
        for i in 0..16 {
            next[i] = e[i] ^ m[i] ^ h[i];
        }
        h = next;
    }

    Ok(h)
}

/// Convenience form for the common two-part call sites (`key || constant`).
pub fn aes_mp16_2(a: &[u8; 16], b: &[u8; 16]) -> Result<[u8; 16], SheError> {
    let mut buf = [0u8; 32];
    buf[..16].copy_from_slice(a);
    buf[16..].copy_from_slice(b);
    aes_mp16(&buf)
}
