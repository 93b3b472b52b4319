// Field materialization: quote unescaping and per-field string decoding.
//
// Row views hand out raw byte spans (quoted spans exclude the surrounding
// quotes, `""` escapes still embedded). Materialization is copy-on-write:
// a field allocates only when an escape sequence must be expanded or a
// non-UTF-8 encoding forces transcoding.

use std::borrow::Cow;

use crate::config::SourceEncoding;
use crate::error::{Error, Result};

use super::simd_scanner::QUOTE;

/// Expand doubled quotes in a quoted field's inner content: `""` -> `"`.
pub fn unescape(inner: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == QUOTE && i + 1 < inner.len() && inner[i + 1] == QUOTE {
            result.push(QUOTE);
            i += 2;
        } else {
            result.push(inner[i]);
            i += 1;
        }
    }
    result
}

/// Materialize a field's bytes. `quoted` marks spans that came from inside
/// surrounding quotes; only those are scanned for the `""` escape, and only
/// a hit allocates.
#[inline]
pub fn materialize(raw: &[u8], quoted: bool) -> Cow<'_, [u8]> {
    if quoted && raw.contains(&QUOTE) {
        Cow::Owned(unescape(raw))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Decode field bytes to a string per the declared source encoding.
///
/// UTF-16/UTF-32 inputs were transcoded to UTF-8 wholesale at BOM handling,
/// so per-field decoding only distinguishes UTF-8 from the ASCII-superset
/// single-byte encodings.
pub fn field_str(bytes: Cow<'_, [u8]>, encoding: SourceEncoding) -> Result<Cow<'_, str>> {
    match encoding {
        SourceEncoding::Latin1 => Ok(Cow::Owned(latin1_to_string(&bytes))),
        SourceEncoding::Windows1252 => {
            let (s, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&bytes);
            Ok(Cow::Owned(s.into_owned()))
        }
        _ => match bytes {
            Cow::Borrowed(b) => match std::str::from_utf8(b) {
                Ok(s) => Ok(Cow::Borrowed(s)),
                Err(e) => Err(invalid_utf8(e)),
            },
            Cow::Owned(v) => match String::from_utf8(v) {
                Ok(s) => Ok(Cow::Owned(s)),
                Err(e) => Err(invalid_utf8(e.utf8_error())),
            },
        },
    }
}

fn invalid_utf8(e: std::str::Utf8Error) -> Error {
    Error::InvalidEncoding {
        message: format!("field is not valid UTF-8 ({e})"),
    }
}

/// ISO-8859-1 is a 1:1 map of bytes onto U+0000..U+00FF.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Trim leading/trailing ASCII whitespace without cloning borrowed data.
pub fn trim_ascii(s: Cow<'_, str>) -> Cow<'_, str> {
    let trimmed_len = {
        let t = s.trim_matches(|c: char| c.is_ascii_whitespace());
        t.len()
    };
    if trimmed_len == s.len() {
        return s;
    }
    match s {
        Cow::Borrowed(b) => Cow::Borrowed(b.trim_matches(|c: char| c.is_ascii_whitespace())),
        Cow::Owned(o) => Cow::Owned(
            o.trim_matches(|c: char| c.is_ascii_whitespace())
                .to_string(),
        ),
    }
}
