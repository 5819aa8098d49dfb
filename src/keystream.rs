//! Positional XOR keystream.
//!
//! Derives a keystream byte for any absolute vault offset by modular
//! indexing into the fixed-length vault key. XOR is self-inverse, so the
//! same transform both encrypts and decrypts, and the result is independent
//! of how a byte range is chunked across multiple calls.
//!
//! This is deliberately not cryptographically secure; it is a reproducible,
//! reversible transform and nothing more.

use crate::vault::VaultKey;

/// Length of a vault key in bytes
pub const KEY_SIZE: usize = 10;

/// Keystream byte at an absolute vault offset.
///
/// Indexes the full declared key length; trailing NUL bytes in the key are
/// ordinary key material, never a length signal.
#[must_use]
pub fn keystream_byte(key: &VaultKey, absolute_offset: u64) -> u8 {
    key.as_bytes()[(absolute_offset % KEY_SIZE as u64) as usize]
}

/// Encrypt or decrypt a buffer in place.
///
/// `offset` is the absolute vault offset of `buffer[0]`; byte `i` is XORed
/// with the keystream byte at `offset + i`.
pub fn xor_buffer(buffer: &mut [u8], offset: u64, key: &VaultKey) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte ^= keystream_byte(key, offset + i as u64);
    }
}
