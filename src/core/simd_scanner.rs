// Structural scanner.
//
// CSV's grammar reduces structural scanning to "find one of four bytes":
// the quote, the configured delimiter, CR, LF. Every operation here has two
// implementations that yield identical offsets:
//
// - a wide-vector path (64-byte stride) via std::simd, compiled under the
//   `nightly-simd` feature using only the stabilization-safe subset:
//   `Simd::from_slice`, `splat`, `simd_eq`, `to_bitmask`, bitwise ops;
// - a SWAR path over 64-bit words (see core/scanner.rs) with a scalar tail,
//   used everywhere else.
//
// A stride with no match is processed in full before moving on; matches are
// reported by first set bit of the combined compare mask.

#[cfg(feature = "nightly-simd")]
use std::simd::prelude::*;

use super::scanner::{
    count_matches, first_match_index, load_word, match_mask, structural_mask,
};

/// Wide-vector stride in bytes.
#[cfg(feature = "nightly-simd")]
const STRIDE: usize = 64;

const WORD: usize = 8;

/// Quote byte of the dialect. The delimiter is configurable; the quote is not.
pub const QUOTE: u8 = b'"';

#[inline]
fn is_structural(b: u8, delim: u8) -> bool {
    b == delim || b == QUOTE || b == b'\r' || b == b'\n'
}

/// Offset of the next structural byte (delimiter, quote, CR, LF) in `buf`,
/// or `buf.len()` when none occurs.
pub fn find_next_structural(buf: &[u8], delim: u8) -> usize {
    let mut pos = 0;

    #[cfg(feature = "nightly-simd")]
    {
        let delim_splat = Simd::<u8, STRIDE>::splat(delim);
        let quote_splat = Simd::<u8, STRIDE>::splat(QUOTE);
        let cr_splat = Simd::<u8, STRIDE>::splat(b'\r');
        let lf_splat = Simd::<u8, STRIDE>::splat(b'\n');

        while pos + STRIDE <= buf.len() {
            let chunk = Simd::<u8, STRIDE>::from_slice(&buf[pos..pos + STRIDE]);
            let hits = chunk.simd_eq(delim_splat)
                | chunk.simd_eq(quote_splat)
                | chunk.simd_eq(cr_splat)
                | chunk.simd_eq(lf_splat);
            let mask = hits.to_bitmask();
            if mask != 0 {
                return pos + mask.trailing_zeros() as usize;
            }
            pos += STRIDE;
        }
    }

    while pos + WORD <= buf.len() {
        let word = load_word(buf, pos);
        if let Some(i) = first_match_index(structural_mask(word, delim)) {
            return pos + i;
        }
        pos += WORD;
    }

    while pos < buf.len() {
        if is_structural(buf[pos], delim) {
            return pos;
        }
        pos += 1;
    }
    buf.len()
}

/// Offset of the next quote byte, or `buf.len()`.
pub fn find_next_quote(buf: &[u8]) -> usize {
    let mut pos = 0;

    #[cfg(feature = "nightly-simd")]
    {
        let quote_splat = Simd::<u8, STRIDE>::splat(QUOTE);
        while pos + STRIDE <= buf.len() {
            let chunk = Simd::<u8, STRIDE>::from_slice(&buf[pos..pos + STRIDE]);
            let mask = chunk.simd_eq(quote_splat).to_bitmask();
            if mask != 0 {
                return pos + mask.trailing_zeros() as usize;
            }
            pos += STRIDE;
        }
    }

    while pos + WORD <= buf.len() {
        let word = load_word(buf, pos);
        if let Some(i) = first_match_index(match_mask(word, QUOTE)) {
            return pos + i;
        }
        pos += WORD;
    }

    memchr::memchr(QUOTE, &buf[pos..]).map_or(buf.len(), |i| pos + i)
}

/// True iff the field contains a quote, the delimiter, CR, or LF, i.e. it
/// must be quoted by the encoder.
pub fn needs_quoting(field: &[u8], delim: u8) -> bool {
    let mut pos = 0;

    #[cfg(feature = "nightly-simd")]
    {
        let delim_splat = Simd::<u8, STRIDE>::splat(delim);
        let quote_splat = Simd::<u8, STRIDE>::splat(QUOTE);
        let cr_splat = Simd::<u8, STRIDE>::splat(b'\r');
        let lf_splat = Simd::<u8, STRIDE>::splat(b'\n');

        while pos + STRIDE <= field.len() {
            let chunk = Simd::<u8, STRIDE>::from_slice(&field[pos..pos + STRIDE]);
            let hits = chunk.simd_eq(delim_splat)
                | chunk.simd_eq(quote_splat)
                | chunk.simd_eq(cr_splat)
                | chunk.simd_eq(lf_splat);
            if hits.any() {
                return true;
            }
            pos += STRIDE;
        }
    }

    while pos + WORD <= field.len() {
        if structural_mask(load_word(field, pos), delim) != 0 {
            return true;
        }
        pos += WORD;
    }

    field[pos..].iter().any(|&b| is_structural(b, delim))
}

/// Count LF bytes ignoring quote context. Only used for chunk sizing.
pub fn count_newlines_approx(buf: &[u8]) -> usize {
    count_byte(buf, b'\n')
}

/// Count occurrences of `byte`. Quote-parity tracking in the chunker counts
/// quotes with this.
pub fn count_byte(buf: &[u8], byte: u8) -> usize {
    let mut pos = 0;
    let mut total = 0usize;

    #[cfg(feature = "nightly-simd")]
    {
        let splat = Simd::<u8, STRIDE>::splat(byte);
        while pos + STRIDE <= buf.len() {
            let chunk = Simd::<u8, STRIDE>::from_slice(&buf[pos..pos + STRIDE]);
            total += chunk.simd_eq(splat).to_bitmask().count_ones() as usize;
            pos += STRIDE;
        }
    }

    while pos + WORD <= buf.len() {
        total += count_matches(load_word(buf, pos), byte) as usize;
        pos += WORD;
    }

    total + buf[pos..].iter().filter(|&&b| b == byte).count()
}

/// Iterator over every structural position in order, as `(offset, byte)`.
/// The chunker drives this to find row boundaries with quote parity.
pub fn scan_structural(buf: &[u8], delim: u8) -> StructuralIter<'_> {
    StructuralIter { buf, delim, pos: 0 }
}

pub struct StructuralIter<'a> {
    buf: &'a [u8],
    delim: u8,
    pos: usize,
}

impl Iterator for StructuralIter<'_> {
    type Item = (usize, u8);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let rel = find_next_structural(&self.buf[self.pos..], self.delim);
        let abs = self.pos + rel;
        if abs >= self.buf.len() {
            self.pos = self.buf.len();
            return None;
        }
        self.pos = abs + 1;
        Some((abs, self.buf[abs]))
    }
}
