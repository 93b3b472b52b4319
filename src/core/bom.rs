// BOM sniffing and input normalization.
//
// A leading UTF-8 BOM is skipped; UTF-16/UTF-32 BOMs (or a declared UTF-16/
// UTF-32 encoding) trigger transcoding of the whole input to UTF-8 before
// parsing. ASCII-superset encodings pass through byte-wise and are decoded
// per field. BOMs are never emitted on output.

use std::borrow::Cow;

use crate::config::SourceEncoding;
use crate::error::{Error, Result};

/// Byte-order mark at the start of the input. UTF-32 patterns are checked
/// before UTF-16 because `FF FE 00 00` begins with `FF FE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

/// Detect a BOM, returning its kind and byte length.
pub fn sniff(bytes: &[u8]) -> Option<(Bom, usize)> {
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Some((Bom::Utf32Le, 4));
    }
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return Some((Bom::Utf32Be, 4));
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some((Bom::Utf16Le, 2));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some((Bom::Utf16Be, 2));
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some((Bom::Utf8, 3));
    }
    None
}

/// Normalize input for the byte parser: skip a UTF-8 BOM, transcode UTF-16/
/// UTF-32 input (BOM-detected or declared) to UTF-8. Returns borrowed bytes
/// whenever no transcoding is needed.
pub fn normalize_input<'a>(bytes: &'a [u8], encoding: SourceEncoding) -> Result<Cow<'a, [u8]>> {
    if let Some((bom, len)) = sniff(bytes) {
        let rest = &bytes[len..];
        return match bom {
            Bom::Utf8 => Ok(Cow::Borrowed(rest)),
            Bom::Utf16Le => utf16_to_utf8(rest, false).map(Cow::Owned),
            Bom::Utf16Be => utf16_to_utf8(rest, true).map(Cow::Owned),
            Bom::Utf32Le => utf32_to_utf8(rest, false).map(Cow::Owned),
            Bom::Utf32Be => utf32_to_utf8(rest, true).map(Cow::Owned),
        };
    }

    match encoding {
        SourceEncoding::Utf16Le => utf16_to_utf8(bytes, false).map(Cow::Owned),
        SourceEncoding::Utf16Be => utf16_to_utf8(bytes, true).map(Cow::Owned),
        SourceEncoding::Utf32Le => utf32_to_utf8(bytes, false).map(Cow::Owned),
        SourceEncoding::Utf32Be => utf32_to_utf8(bytes, true).map(Cow::Owned),
        _ => Ok(Cow::Borrowed(bytes)),
    }
}

fn utf16_to_utf8(bytes: &[u8], big_endian: bool) -> Result<Vec<u8>> {
    let encoding = if big_endian {
        encoding_rs::UTF_16BE
    } else {
        encoding_rs::UTF_16LE
    };
    let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(Error::InvalidEncoding {
            message: format!(
                "input is not valid UTF-16{}",
                if big_endian { "BE" } else { "LE" }
            ),
        });
    }
    Ok(decoded.into_owned().into_bytes())
}

fn utf32_to_utf8(bytes: &[u8], big_endian: bool) -> Result<Vec<u8>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidEncoding {
            message: "UTF-32 input length is not a multiple of 4".to_string(),
        });
    }
    let mut out = String::with_capacity(bytes.len() / 4);
    for unit in bytes.chunks_exact(4) {
        let cp = if big_endian {
            u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
        } else {
            u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
        };
        match char::from_u32(cp) {
            Some(c) => out.push(c),
            None => {
                return Err(Error::InvalidEncoding {
                    message: format!("invalid UTF-32 code point U+{cp:X}"),
                })
            }
        }
    }
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_priority() {
        assert_eq!(
            sniff(&[0xFF, 0xFE, 0x00, 0x00, 0x41]),
            Some((Bom::Utf32Le, 4))
        );
        assert_eq!(sniff(&[0xFF, 0xFE, 0x41, 0x00]), Some((Bom::Utf16Le, 2)));
        assert_eq!(sniff(&[0xFE, 0xFF, 0x00, 0x41]), Some((Bom::Utf16Be, 2)));
        assert_eq!(sniff(&[0xEF, 0xBB, 0xBF, b'a']), Some((Bom::Utf8, 3)));
        assert_eq!(sniff(b"a,b\n"), None);
        assert_eq!(sniff(&[]), None);
    }

    #[test]
    fn test_utf8_bom_skipped() {
        let input = b"\xEF\xBB\xBFa,b\n";
        let out = normalize_input(input, SourceEncoding::Utf8).unwrap();
        assert_eq!(out.as_ref(), b"a,b\n");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_utf16le_bom_transcoded() {
        // BOM + "a,b"
        let input = [0xFF, 0xFE, 0x61, 0x00, 0x2C, 0x00, 0x62, 0x00];
        let out = normalize_input(&input, SourceEncoding::Utf8).unwrap();
        assert_eq!(out.as_ref(), b"a,b");
    }

    #[test]
    fn test_utf16be_declared_without_bom() {
        let input = [0x00, 0x61, 0x00, 0x2C, 0x00, 0x62];
        let out = normalize_input(&input, SourceEncoding::Utf16Be).unwrap();
        assert_eq!(out.as_ref(), b"a,b");
    }

    #[test]
    fn test_utf32_roundtrip_and_errors() {
        let input = [0xFF, 0xFE, 0x00, 0x00, 0x61, 0x00, 0x00, 0x00];
        let out = normalize_input(&input, SourceEncoding::Utf8).unwrap();
        assert_eq!(out.as_ref(), b"a");

        // Truncated code unit.
        let bad = [0xFF, 0xFE, 0x00, 0x00, 0x61, 0x00];
        assert!(matches!(
            normalize_input(&bad, SourceEncoding::Utf8),
            Err(Error::InvalidEncoding { .. })
        ));

        // Surrogate half is not a valid code point.
        let surrogate = [0x00, 0x00, 0xFE, 0xFF, 0x00, 0x00, 0xD8, 0x00];
        assert!(matches!(
            normalize_input(&surrogate, SourceEncoding::Utf8),
            Err(Error::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_no_bom_passthrough() {
        let out = normalize_input(b"x,y\n", SourceEncoding::Latin1).unwrap();
        assert_eq!(out.as_ref(), b"x,y\n");
        assert!(matches!(out, Cow::Borrowed(_)));
    }
}
