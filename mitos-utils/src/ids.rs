//! Opaque entity ids and the deterministic per-player color.

use uuid::Uuid;

/// Returns a fresh 32-character lowercase hex id.
///
/// Players, cells and food pellets all share this id space; the only
/// structure callers may rely on is uniqueness.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Derives an RGB triple from an id.
///
/// The same id always maps to the same color, on every platform and in every
/// process, so clients and tests can recompute it locally. The fold is the
/// classic Java-style `31 * h + b` string hash truncated to 24 bits.
#[must_use]
pub fn color_for_id(id: &str) -> [u8; 3] {
    let mut hash: u64 = 0;
    for byte in id.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u64::from(byte));
    }
    let rgb = hash & 0x00FF_FFFF;
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
}
