// Error taxonomy and localization.
//
// Every decode/encode failure maps to one of the variants below. Line and
// column numbers are 1-based; locations inside record decoding carry the row
// number, the column name, and the nested decoding path (for flattened
// sub-records). Key-lookup failures attach a "did you mean" suggestion when
// an available header is close enough.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Where in the input a record-level failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// 1-based data row number (the header row is not counted).
    pub row: usize,
    /// Column name, when the failure is tied to a single field.
    pub column: Option<String>,
    /// Nested decoding path, outermost first (e.g. ["addr", "street"]).
    pub path: Vec<String>,
}

impl Location {
    pub fn row(row: usize) -> Self {
        Location {
            row,
            column: None,
            path: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn push_path(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.row)?;
        if let Some(col) = &self.column {
            write!(f, ", column \"{col}\"")?;
        }
        if !self.path.is_empty() {
            write!(f, " (path: {})", self.path.join("."))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Source bytes are not valid in the declared encoding.
    #[error("invalid encoding: {message}")]
    InvalidEncoding { message: String },

    /// Structural CSV violation (unterminated quote, stray quote, field
    /// count mismatch). Line and column are 1-based byte-derived positions.
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// A required field is absent from the record.
    #[error("key \"{key}\" not found at {location}{}", format_key_hint(.available, .key))]
    KeyNotFound {
        key: String,
        location: Location,
        available: Vec<String>,
    },

    /// A field value cannot be parsed as the requested type under the
    /// active strategy.
    #[error("expected {expected} but found \"{actual}\" at {location}{}", format_type_hint(.expected, .actual))]
    TypeMismatch {
        expected: &'static str,
        actual: String,
        location: Location,
    },

    /// Structural contract violation (top-level unkeyed sequence, nested
    /// container without an enabling strategy, mismatched encode key sets).
    #[error("unsupported: {message}")]
    UnsupportedType { message: String },

    /// A value the encoder refuses (NaN/Infinity) or a custom strategy
    /// rejection.
    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    /// I/O failure from the buffered writer or the byte source.
    /// `bytes_written` preserves how far the write got.
    #[error("i/o error after {bytes_written} bytes: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        bytes_written: u64,
    },

    /// The streaming or parallel pipeline was cancelled by its consumer.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            source,
            bytes_written: 0,
        }
    }
}

impl Error {
    pub(crate) fn parse_at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Error::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn type_mismatch(
        expected: &'static str,
        actual: impl Into<String>,
        location: Location,
    ) -> Self {
        Error::TypeMismatch {
            expected,
            actual: actual.into(),
            location,
        }
    }

    pub(crate) fn invalid_value(message: impl Into<String>) -> Self {
        Error::InvalidValue {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedType {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// Suggest the closest available key, or report a case-only difference.
/// A candidate qualifies when its edit distance is <= max(3, len(key)/2).
pub fn suggest_key(key: &str, available: &[String]) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for cand in available {
        if cand.eq_ignore_ascii_case(key) {
            return Some(format!("\"{cand}\" differs only in case"));
        }
        let d = levenshtein(key, cand);
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, cand));
        }
    }
    let (d, cand) = best?;
    let bound = 3.max(key.chars().count() / 2);
    if d <= bound {
        Some(format!("did you mean \"{cand}\"?"))
    } else {
        None
    }
}

fn format_key_hint(available: &[String], key: &str) -> String {
    match suggest_key(key, available) {
        Some(hint) => format!(" ({hint})"),
        None => String::new(),
    }
}

fn format_type_hint(expected: &str, actual: &str) -> String {
    let looks_numeric = expected.contains("number")
        || expected.contains("integer")
        || expected.contains("float");
    if looks_numeric
        && actual
            .chars()
            .any(|c| matches!(c, '$' | '\u{20ac}' | '\u{a3}' | '\u{a5}'))
    {
        return " (value contains a currency symbol - consider the flexible number strategy)"
            .to_string();
    }
    String::new()
}

/// Classic two-row Levenshtein over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
