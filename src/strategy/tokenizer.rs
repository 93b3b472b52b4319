// Byte parser: row tokenizer.
//
// Iterates rows over a byte buffer, producing non-owning row views. Per
// field, the state machine inspects the first byte: a quote enters
// quoted-field mode (doubled quotes are embedded escapes, the span excludes
// the surrounding quotes); anything else scans to the next structural byte
// with the SIMD/SWAR scanner. LF, CRLF and lone CR all terminate a row;
// CRLF is consumed atomically.
//
// Violations are recorded on the view as flags with byte offsets and turned
// into errors by `validate_row` - strict mode rejects, lenient mode keeps
// the best-effort parse.

use std::borrow::Cow;

use crate::config::Config;
use crate::core::field::{field_str, materialize, trim_ascii};
use crate::core::simd_scanner::{
    count_newlines_approx, find_next_quote, find_next_structural, QUOTE,
};
use crate::error::{Error, Result};

/// One field inside a row view. Offsets are absolute into the source
/// buffer; quoted spans reference the content between the quotes with `""`
/// escapes not yet expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub start: usize,
    pub len: usize,
    pub quoted: bool,
}

/// Non-owning description of one row. Valid only while the source buffer
/// lives.
#[derive(Debug)]
pub struct RowView<'a> {
    buf: &'a [u8],
    /// Byte offset of the row's first byte.
    pub row_start: usize,
    spans: Vec<FieldSpan>,
    pub has_unterminated_quote: bool,
    pub has_quote_in_unquoted_field: bool,
    /// Offset of the opening quote of an unterminated quoted field.
    pub unterminated_quote_offset: Option<usize>,
    /// Offset of the first illegal quote inside an unquoted field.
    pub stray_quote_offset: Option<usize>,
    /// Offset of the first unexpected byte after a closing quote.
    pub stray_byte_after_quote: Option<usize>,
}

impl<'a> RowView<'a> {
    pub fn field_count(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &[FieldSpan] {
        &self.spans
    }

    /// Raw span bytes: no quote stripping left to do (spans already exclude
    /// quotes), `""` escapes still embedded.
    pub fn raw_field(&self, i: usize) -> &'a [u8] {
        let span = &self.spans[i];
        &self.buf[span.start..span.start + span.len]
    }

    /// Materialized field bytes; allocates only to expand `""`.
    pub fn field_bytes(&self, i: usize) -> Cow<'a, [u8]> {
        materialize(self.raw_field(i), self.spans[i].quoted)
    }

    /// Field as a string: materialize, decode per the source encoding,
    /// trim if configured.
    pub fn field_string(&self, i: usize, config: &Config) -> Result<Cow<'a, str>> {
        let s = field_str(self.field_bytes(i), config.encoding)?;
        if config.trim_whitespace {
            Ok(trim_ascii(s))
        } else {
            Ok(s)
        }
    }
}

/// Row iterator over a byte buffer, optionally bounded to a sub-range so
/// chunk workers keep file-absolute offsets for error positions.
pub struct Tokenizer<'a> {
    buf: &'a [u8],
    delim: u8,
    pos: usize,
    end: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(buf: &'a [u8], delim: u8) -> Self {
        Tokenizer {
            buf,
            delim,
            pos: 0,
            end: buf.len(),
        }
    }

    /// Tokenize `buf[start..end]` only. Both bounds must lie at row
    /// boundaries outside quoted regions.
    pub fn with_range(buf: &'a [u8], delim: u8, start: usize, end: usize) -> Self {
        Tokenizer {
            buf,
            delim,
            pos: start,
            end: end.min(buf.len()),
        }
    }

    /// Bytes consumed so far (absolute offset).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Parse the next row. A lone terminator at EOF does not emit a row.
    pub fn next_row(&mut self) -> Option<RowView<'a>> {
        if self.pos >= self.end {
            return None;
        }

        let buf = self.buf;
        let len = self.end;
        let row_start = self.pos;
        let mut spans = Vec::with_capacity(8);
        let mut has_unterminated_quote = false;
        let mut has_quote_in_unquoted_field = false;
        let mut unterminated_quote_offset = None;
        let mut stray_quote_offset = None;
        let mut stray_byte_after_quote = None;

        'row: loop {
            if self.pos < len && buf[self.pos] == QUOTE {
                // Quoted field.
                let open = self.pos;
                let content_start = open + 1;
                let mut scan = content_start;
                loop {
                    let q = scan + find_next_quote(&buf[scan.min(len)..len]);
                    if q >= len {
                        spans.push(FieldSpan {
                            start: content_start,
                            len: len - content_start,
                            quoted: true,
                        });
                        has_unterminated_quote = true;
                        unterminated_quote_offset = Some(open);
                        self.pos = len;
                        break 'row;
                    }
                    if q + 1 < len && buf[q + 1] == QUOTE {
                        // Embedded escape, consume both.
                        scan = q + 2;
                        continue;
                    }
                    spans.push(FieldSpan {
                        start: content_start,
                        len: q - content_start,
                        quoted: true,
                    });
                    self.pos = q + 1;
                    break;
                }

                // The byte after the closing quote must be a delimiter,
                // CR, LF, or EOF. Anything else ends the field here and the
                // junk is skipped up to the next boundary.
                if self.pos < len
                    && buf[self.pos] != self.delim
                    && buf[self.pos] != b'\r'
                    && buf[self.pos] != b'\n'
                {
                    stray_byte_after_quote.get_or_insert(self.pos);
                    while self.pos < len
                        && buf[self.pos] != self.delim
                        && buf[self.pos] != b'\r'
                        && buf[self.pos] != b'\n'
                    {
                        self.pos += 1;
                    }
                }
            } else {
                // Unquoted field.
                let field_start = self.pos;
                loop {
                    let hit = self.pos + find_next_structural(&buf[self.pos..len], self.delim);
                    if hit >= len {
                        spans.push(FieldSpan {
                            start: field_start,
                            len: len - field_start,
                            quoted: false,
                        });
                        self.pos = len;
                        break 'row;
                    }
                    if buf[hit] == QUOTE {
                        // Illegal per RFC 4180; tolerated as a literal byte.
                        has_quote_in_unquoted_field = true;
                        stray_quote_offset.get_or_insert(hit);
                        self.pos = hit + 1;
                        continue;
                    }
                    spans.push(FieldSpan {
                        start: field_start,
                        len: hit - field_start,
                        quoted: false,
                    });
                    self.pos = hit;
                    break;
                }
            }

            // Field boundary byte: delimiter continues the row, a
            // terminator ends it.
            if self.pos >= len {
                break 'row;
            }
            match buf[self.pos] {
                b if b == self.delim => {
                    self.pos += 1;
                    // A delimiter at EOF means a trailing empty field.
                    if self.pos >= len {
                        spans.push(FieldSpan {
                            start: len,
                            len: 0,
                            quoted: false,
                        });
                        break 'row;
                    }
                }
                b'\n' => {
                    self.pos += 1;
                    break 'row;
                }
                b'\r' => {
                    self.pos += 1;
                    if self.pos < len && buf[self.pos] == b'\n' {
                        self.pos += 1;
                    }
                    break 'row;
                }
                _ => unreachable!("field loop stops only on structural bytes"),
            }
        }

        // A trailing empty row (the input ends with a bare terminator)
        // parses as a single empty unquoted field; that is not a row. Only
        // true end-of-input qualifies: a range-bounded tokenizer must emit
        // an empty row sitting at its chunk boundary, since the rows
        // continue in the next chunk.
        if self.pos >= len
            && len == buf.len()
            && spans.len() == 1
            && spans[0].len == 0
            && !spans[0].quoted
            && matches!(buf[row_start], b'\n' | b'\r')
        {
            return None;
        }

        Some(RowView {
            buf,
            row_start,
            spans,
            has_unterminated_quote,
            has_quote_in_unquoted_field,
            unterminated_quote_offset,
            stray_quote_offset,
            stray_byte_after_quote,
        })
    }
}

/// 1-based (line, column) for a byte offset.
pub fn line_col(buf: &[u8], offset: usize) -> (usize, usize) {
    let offset = offset.min(buf.len());
    let line = 1 + count_newlines_approx(&buf[..offset]);
    let line_start = memchr::memrchr(b'\n', &buf[..offset]).map_or(0, |p| p + 1);
    (line, offset - line_start + 1)
}

/// Strict-mode validations, applied after row parse and before field
/// decode. `header_width` is the resolved column count; an explicit
/// `expected_field_count` takes precedence over it.
pub fn validate_row(
    view: &RowView<'_>,
    buf: &[u8],
    config: &Config,
    header_width: Option<usize>,
) -> Result<()> {
    if !config.strict() {
        return Ok(());
    }

    if view.has_unterminated_quote {
        let offset = view.unterminated_quote_offset.unwrap_or(view.row_start);
        let (line, column) = line_col(buf, offset);
        return Err(Error::parse_at("unterminated quoted field", line, column));
    }
    if let Some(offset) = view.stray_quote_offset {
        let (line, column) = line_col(buf, offset);
        return Err(Error::parse_at(
            "quote inside unquoted field",
            line,
            column,
        ));
    }
    if let Some(offset) = view.stray_byte_after_quote {
        let (line, column) = line_col(buf, offset);
        return Err(Error::parse_at(
            "unexpected byte after closing quote",
            line,
            column,
        ));
    }

    let expected = config.expected_field_count.or(header_width);
    if let Some(expected) = expected {
        if view.field_count() != expected {
            let (line, column) = line_col(buf, view.row_start);
            return Err(Error::parse_at(
                format!(
                    "expected {expected} fields but found {}",
                    view.field_count()
                ),
                line,
                column,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingMode;

    fn rows_as_strings(input: &[u8]) -> Vec<Vec<String>> {
        let config = Config::new();
        let mut tok = Tokenizer::new(input, b',');
        let mut out = Vec::new();
        while let Some(view) = tok.next_row() {
            let row = (0..view.field_count())
                .map(|i| view.field_string(i, &config).unwrap().into_owned())
                .collect();
            out.push(row);
        }
        out
    }

    #[test]
    fn test_simple_rows() {
        assert_eq!(
            rows_as_strings(b"a,b,c\n1,2,3\n"),
            vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]
        );
    }

    #[test]
    fn test_no_trailing_newline() {
        assert_eq!(
            rows_as_strings(b"a,b\nc,d"),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn test_quoted_field_with_delimiter() {
        assert_eq!(rows_as_strings(b"a,\"b,c\",d\n"), vec![vec!["a", "b,c", "d"]]);
    }

    #[test]
    fn test_quoted_crlf_inside_field() {

        assert_eq!(
            rows_as_strings(b"name,value\r\nTest,\"Line1\r\nLine2\"\r\n"),
            vec![vec!["name", "value"], vec!["Test", "Line1\r\nLine2"]]
        );
    }

    #[test]
    fn test_doubled_quote_escape() {

        assert_eq!(
            rows_as_strings(b"name,value\nA,\"Say \"\"hi\"\"\"\n"),
            vec![vec!["name", "value"], vec!["A", "Say \"hi\""]]
        );
    }

    #[test]
    fn test_empty_and_consecutive_delimiters() {
        assert_eq!(
            rows_as_strings(b"a,b,c\n1,,3\n,,\n"),
            vec![
                vec!["a", "b", "c"],
                vec!["1", "", "3"],
                vec!["", "", ""],
            ]
        );
    }

    #[test]
    fn test_trailing_delimiter_yields_empty_field() {
        assert_eq!(rows_as_strings(b"a,\n"), vec![vec!["a", ""]]);
        assert_eq!(rows_as_strings(b"a,"), vec![vec!["a", ""]]);
    }

    #[test]
    fn test_line_ending_mix() {
        assert_eq!(
            rows_as_strings(b"a\nb\r\nc\rd"),
            vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]],
            "LF, CRLF and lone CR all terminate rows"
        );
    }

    #[test]
    fn test_interior_empty_row_kept_trailing_dropped() {
        assert_eq!(
            rows_as_strings(b"a\n\nb\n"),
            vec![vec!["a"], vec![""], vec!["b"]]
        );
        // The final bare terminator's empty row is dropped.
        assert_eq!(rows_as_strings(b"a\n\n"), vec![vec!["a"]]);
        assert_eq!(rows_as_strings(b"a\n\r\n"), vec![vec!["a"]]);
        assert_eq!(rows_as_strings(b"a\n"), vec![vec!["a"]]);
        assert_eq!(rows_as_strings(b""), Vec::<Vec<String>>::new());
    }

    #[test]
    fn test_unterminated_quote_flags() {
        let input = b"name,value\nTest,\"Unterminated";
        let mut tok = Tokenizer::new(input, b',');
        let _header = tok.next_row().unwrap();
        let row = tok.next_row().unwrap();
        assert!(row.has_unterminated_quote);
        assert_eq!(row.field_count(), 2);

        // Strict mode reports the line of the offending row.
        let config = Config::new().parsing_mode(ParsingMode::Strict);
        match validate_row(&row, input, &config, None) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_quote_lenient_is_literal() {
        let input = b"ab\"cd,x\n";
        let mut tok = Tokenizer::new(input, b',');
        let row = tok.next_row().unwrap();
        assert!(row.has_quote_in_unquoted_field);
        let config = Config::new();
        assert_eq!(row.field_string(0, &config).unwrap(), "ab\"cd");
        assert_eq!(row.field_string(1, &config).unwrap(), "x");
        assert!(validate_row(&row, input, &config, None).is_ok());

        let strict = Config::new().parsing_mode(ParsingMode::Strict);
        match validate_row(&row, input, &strict, None) {
            Err(Error::Parse { line, column, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(column, 3);
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_byte_after_closing_quote() {
        let input = b"\"abc\"junk,x\n";
        let mut tok = Tokenizer::new(input, b',');
        let row = tok.next_row().unwrap();
        // Lenient: field ends at the closing quote, junk dropped.
        let config = Config::new();
        assert_eq!(row.field_string(0, &config).unwrap(), "abc");
        assert_eq!(row.field_string(1, &config).unwrap(), "x");

        let strict = Config::new().parsing_mode(ParsingMode::Strict);
        assert!(matches!(
            validate_row(&row, input, &strict, None),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_field_count_validation() {
        let input = b"a,b\nc\n";
        let mut tok = Tokenizer::new(input, b',');
        let _first = tok.next_row().unwrap();
        let short = tok.next_row().unwrap();

        let strict = Config::new().parsing_mode(ParsingMode::Strict);
        match validate_row(&short, input, &strict, Some(2)) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Parse error, got {other:?}"),
        }

        // Lenient tolerates the mismatch.
        let lenient = Config::new();
        assert!(validate_row(&short, input, &lenient, Some(2)).is_ok());

        // expected_field_count takes precedence over header width.
        let strict_expected = Config::new()
            .parsing_mode(ParsingMode::Strict)
            .expected_field_count(1);
        assert!(validate_row(&short, input, &strict_expected, Some(2)).is_ok());
    }

    #[test]
    fn test_line_col() {
        let buf = b"ab\ncd\nef";
        assert_eq!(line_col(buf, 0), (1, 1));
        assert_eq!(line_col(buf, 1), (1, 2));
        assert_eq!(line_col(buf, 3), (2, 1));
        assert_eq!(line_col(buf, 7), (3, 2));
    }

    #[test]
    fn test_quoted_empty_field() {
        assert_eq!(rows_as_strings(b"a,\"\",c\n"), vec![vec!["a", "", "c"]]);
    }

    #[test]
    fn test_trim_whitespace() {
        let config = Config::new().trim_whitespace(true);
        let mut tok = Tokenizer::new(b"  a  , b \n", b',');
        let row = tok.next_row().unwrap();
        assert_eq!(row.field_string(0, &config).unwrap(), "a");
        assert_eq!(row.field_string(1, &config).unwrap(), "b");
    }

    #[test]
    fn test_position_tracks_consumption() {
        let mut tok = Tokenizer::new(b"a,b\nc,d\n", b',');
        assert_eq!(tok.position(), 0);
        tok.next_row();
        assert_eq!(tok.position(), 4);
        tok.next_row();
        assert_eq!(tok.position(), 8);
    }
}
