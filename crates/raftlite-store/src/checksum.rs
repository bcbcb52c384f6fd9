//! WAL checksum: the stock pairwise Fletcher-like chained checksum.
//!
//! Every WAL header and frame header carries a running two-word checksum
//! seeded from the previous one. Byte order for the checksum is fixed by
//! the low bit of the WAL magic at the start of the file, independent of
//! the page-content byte order, so a WAL produced on one architecture can
//! be checked on another.

/// Fold `bytes` (a whole number of 8-byte words) into the running
/// checksum `(s1, s2)`. `native` selects whether 32-bit words are
/// interpreted as native-endian (`true`) or always big-endian (`false`).
#[must_use]
pub fn checksum(bytes: &[u8], seed: (u32, u32), native: bool) -> (u32, u32) {
    debug_assert_eq!(bytes.len() % 8, 0, "checksum input must be a multiple of 8 bytes");
    let (mut s1, mut s2) = seed;
    for word in bytes.chunks_exact(8) {
        let (a, b) = if native {
            (
                u32::from_ne_bytes(word[0..4].try_into().expect("4 bytes")),
                u32::from_ne_bytes(word[4..8].try_into().expect("4 bytes")),
            )
        } else {
            (
                u32::from_be_bytes(word[0..4].try_into().expect("4 bytes")),
                u32::from_be_bytes(word[4..8].try_into().expect("4 bytes")),
            )
        };
        s1 = s1.wrapping_add(a).wrapping_add(s2);
        s2 = s2.wrapping_add(b).wrapping_add(s1);
    }
    (s1, s2)
}

/// The WAL magic's low bit records whether checksums on this file are
/// native-endian (`1`) or big-endian (`0`).
#[must_use]
pub const fn is_native_checksum(magic: u32) -> bool {
    magic & 1 != 0
}
