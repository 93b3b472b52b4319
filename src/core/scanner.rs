// SWAR byte utilities.
//
// 64-bit word tricks used by the portable scanner path: broadcast a byte
// into every lane, then locate matches with the classic
// `(x - 0x0101..) & !x & 0x8080..` zero-byte test. Words are loaded with
// `from_le_bytes` so bit order tracks byte order on every target.

const LO: u64 = 0x0101_0101_0101_0101;
const HI: u64 = 0x8080_8080_8080_8080;

/// Fill all eight lanes of a word with `byte`.
#[inline]
pub const fn broadcast(byte: u8) -> u64 {
    LO.wrapping_mul(byte as u64)
}

/// Mask with the high bit set in every lane whose byte equals `byte`.
#[inline]
pub const fn match_mask(word: u64, byte: u8) -> u64 {
    let x = word ^ broadcast(byte);
    x.wrapping_sub(LO) & !x & HI
}

/// Index (0..8) of the first lane set in a match mask, or None.
#[inline]
pub fn first_match_index(mask: u64) -> Option<usize> {
    if mask == 0 {
        None
    } else {
        Some((mask.trailing_zeros() / 8) as usize)
    }
}

/// Load 8 bytes starting at `offset` (caller guarantees the range).
#[inline]
pub fn load_word(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Match mask for any of the four structural bytes: `delim`, `"`, CR, LF.
#[inline]
pub fn structural_mask(word: u64, delim: u8) -> u64 {
    match_mask(word, delim) | match_mask(word, b'"') | match_mask(word, b'\r')
        | match_mask(word, b'\n')
}

/// Number of lanes equal to `byte` in `word`.
#[inline]
pub fn count_matches(word: u64, byte: u8) -> u32 {
    match_mask(word, byte).count_ones()
}
