//! Stable 32-bit fingerprints.
//!
//! Used for the credential digest carried in session tokens and for the
//! rule hash that identifies a `(method, route)` pair. Both are persisted,
//! so the function must never change.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash of `input`, rendered in decimal.
#[must_use]
pub fn sum32(input: &str) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash.to_string()
}
