// Shared decode/encode configuration.
//
// One immutable `Config` is passed explicitly to every operation; there are
// no process-wide defaults. Strategy closures are stored behind `Arc` so a
// config can be cloned into parallel workers and the streaming producer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::value::locale::{DateStyle, DefaultLocaleOps, LocaleOps};
use crate::value::nested::NestedCodec;

/// Strict rejects RFC 4180 violations; lenient parses best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsingMode {
    Strict,
    #[default]
    Lenient,
}

/// Row terminator emitted by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

/// Declared source text encoding. BOM detection can override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1, decoded byte-wise per field.
    Latin1,
    Windows1252,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

// ---------------------------------------------------------------------------
// Field strategies
// ---------------------------------------------------------------------------

pub type DateParseFn = Arc<dyn Fn(&str) -> Option<DateTime<Utc>> + Send + Sync>;
pub type KeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone, Default)]
pub enum DateDecodingStrategy {
    /// Fractional Unix-epoch seconds (the crate's native date wire form).
    #[default]
    Deferred,
    SecondsSinceEpoch,
    MillisSinceEpoch,
    Iso8601,
    Formatted(String),
    Custom(DateParseFn),
    /// Tries the ordered built-in pattern table (specific before general).
    Flexible,
    /// Tries the hint pattern first, then the flexible table.
    FlexibleWithHint(String),
    LocaleAware { locale: String, style: DateStyle },
}

impl fmt::Debug for DateDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deferred => write!(f, "Deferred"),
            Self::SecondsSinceEpoch => write!(f, "SecondsSinceEpoch"),
            Self::MillisSinceEpoch => write!(f, "MillisSinceEpoch"),
            Self::Iso8601 => write!(f, "Iso8601"),
            Self::Formatted(p) => write!(f, "Formatted({p:?})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
            Self::Flexible => write!(f, "Flexible"),
            Self::FlexibleWithHint(p) => write!(f, "FlexibleWithHint({p:?})"),
            Self::LocaleAware { locale, style } => {
                write!(f, "LocaleAware({locale:?}, {style:?})")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum DateEncodingStrategy {
    #[default]
    Deferred,
    SecondsSinceEpoch,
    MillisSinceEpoch,
    Iso8601,
    Formatted(String),
}

#[derive(Debug, Clone, Default)]
pub enum NumberDecodingStrategy {
    /// C-locale parse, nothing stripped.
    #[default]
    Standard,
    /// Auto-detects US `1,234.56` vs EU `1.234,56`, strips currency/units.
    Flexible,
    Locale(String),
    /// Routes through `LocaleOps::parse_number` (the platform-parse seam).
    ParseStrategy(String),
    Currency {
        code: Option<String>,
        locale: Option<String>,
    },
}

#[derive(Clone, Default)]
pub enum BoolDecodingStrategy {
    /// true/yes/1 and false/no/0, case-insensitive.
    #[default]
    Standard,
    /// Adds oui/non, ja/nein, si/no, да/нет, 是/否 and friends.
    Flexible,
    Custom {
        true_values: Arc<[String]>,
        false_values: Arc<[String]>,
    },
}

impl fmt::Debug for BoolDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "Standard"),
            Self::Flexible => write!(f, "Flexible"),
            Self::Custom { true_values, false_values } => write!(
                f,
                "Custom({} true / {} false)",
                true_values.len(),
                false_values.len()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolEncodingStrategy {
    #[default]
    TrueFalse,
    OneZero,
}

/// Header-to-field-name mapping. Each variant converts the named header
/// convention into snake_case Rust field names.
#[derive(Clone, Default)]
pub enum KeyDecodingStrategy {
    #[default]
    Identity,
    FromSnakeCase,
    FromKebabCase,
    FromScreamingSnake,
    FromPascalCase,
    Custom(KeyFn),
}

impl fmt::Debug for KeyDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "Identity"),
            Self::FromSnakeCase => write!(f, "FromSnakeCase"),
            Self::FromKebabCase => write!(f, "FromKebabCase"),
            Self::FromScreamingSnake => write!(f, "FromScreamingSnake"),
            Self::FromPascalCase => write!(f, "FromPascalCase"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[derive(Clone, Default)]
pub enum NilDecodingStrategy {
    /// Only the empty string is nil.
    #[default]
    EmptyString,
    /// Empty string, `null`, or `NULL`.
    NullLiteral,
    Custom(Arc<[String]>),
}

impl fmt::Debug for NilDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyString => write!(f, "EmptyString"),
            Self::NullLiteral => write!(f, "NullLiteral"),
            Self::Custom(set) => write!(f, "Custom({} values)", set.len()),
        }
    }
}

impl NilDecodingStrategy {
    pub fn is_nil(&self, raw: &str) -> bool {
        match self {
            Self::EmptyString => raw.is_empty(),
            Self::NullLiteral => raw.is_empty() || raw == "null" || raw == "NULL",
            Self::Custom(set) => set.iter().any(|v| v == raw),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum NilEncodingStrategy {
    #[default]
    Empty,
    NullLiteral,
    Custom(String),
}

impl NilEncodingStrategy {
    pub fn render(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::NullLiteral => "null",
            Self::Custom(s) => s,
        }
    }
}

/// How nested record fields are sourced from flat CSV columns.
#[derive(Clone, Default)]
pub enum NestedDecodingStrategy {
    /// Reject nested types.
    #[default]
    Error,
    /// Header `addr.street` populates field `street` of `addr`.
    Flatten { separator: String },
    /// The field value is an embedded JSON document.
    Json,
    /// Like `Json` but through a pluggable codec.
    Codable(Arc<dyn NestedCodec>),
}

impl fmt::Debug for NestedDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Flatten { separator } => write!(f, "Flatten({separator:?})"),
            Self::Json => write!(f, "Json"),
            Self::Codable(_) => write!(f, "Codable(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory budget
// ---------------------------------------------------------------------------

/// Memory ceiling for the streaming pipeline.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    /// Total bytes the pipeline may hold in its row buffer.
    pub budget_bytes: usize,
    /// Estimated decoded size of one row, used to derive the row cap.
    pub estimated_row_size: usize,
    /// Rows per yielded batch.
    pub batch_size: usize,
    /// Producer suspends at `max_buffered_rows * high_water`.
    pub high_water: f64,
    /// Producer resumes at `max_buffered_rows * low_water`.
    pub low_water: f64,
}

impl Default for MemoryBudget {
    fn default() -> Self {
        MemoryBudget {
            budget_bytes: 64 * 1024 * 1024,
            estimated_row_size: 512,
            batch_size: 1024,
            high_water: 0.9,
            low_water: 0.5,
        }
    }
}

impl MemoryBudget {
    pub fn max_buffered_rows(&self) -> usize {
        (self.budget_bytes / self.estimated_row_size.max(1)).max(1)
    }

    pub fn high_water_rows(&self) -> usize {
        ((self.max_buffered_rows() as f64 * self.high_water) as usize).max(1)
    }

    pub fn low_water_rows(&self) -> usize {
        let low = (self.max_buffered_rows() as f64 * self.low_water) as usize;
        low.min(self.high_water_rows().saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Config {
    pub delimiter: u8,
    pub has_headers: bool,
    pub encoding: SourceEncoding,
    pub trim_whitespace: bool,
    pub parsing_mode: ParsingMode,
    pub expected_field_count: Option<usize>,

    pub line_ending: LineEnding,
    pub include_headers: bool,

    pub date_decoding: DateDecodingStrategy,
    pub date_encoding: DateEncodingStrategy,
    pub number_decoding: NumberDecodingStrategy,
    pub bool_decoding: BoolDecodingStrategy,
    pub bool_encoding: BoolEncodingStrategy,
    pub key_decoding: KeyDecodingStrategy,
    pub nil_decoding: NilDecodingStrategy,
    pub nil_encoding: NilEncodingStrategy,
    pub nested_decoding: NestedDecodingStrategy,

    /// Explicit header -> field-name mapping; wins over `key_decoding`.
    pub column_mapping: Option<HashMap<String, String>>,
    /// Column-index -> field-name mapping for headerless/positional input;
    /// wins over headers and `OrderedKeys`.
    pub index_mapping: Option<HashMap<usize, String>>,

    /// Parallel decode: reassemble results in input order.
    pub preserve_order: bool,
    /// Chunker lookahead cap as a multiple of the expected chunk size.
    pub max_boundary_lookahead_factor: usize,

    pub budget: MemoryBudget,
    pub locale_ops: Arc<dyn LocaleOps>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            delimiter: b',',
            has_headers: true,
            encoding: SourceEncoding::Utf8,
            trim_whitespace: false,
            parsing_mode: ParsingMode::Lenient,
            expected_field_count: None,
            line_ending: LineEnding::Lf,
            include_headers: true,
            date_decoding: DateDecodingStrategy::default(),
            date_encoding: DateEncodingStrategy::default(),
            number_decoding: NumberDecodingStrategy::default(),
            bool_decoding: BoolDecodingStrategy::default(),
            bool_encoding: BoolEncodingStrategy::default(),
            key_decoding: KeyDecodingStrategy::default(),
            nil_decoding: NilDecodingStrategy::default(),
            nil_encoding: NilEncodingStrategy::default(),
            nested_decoding: NestedDecodingStrategy::default(),
            column_mapping: None,
            index_mapping: None,
            preserve_order: true,
            max_boundary_lookahead_factor: 2,
            budget: MemoryBudget::default(),
            locale_ops: Arc::new(DefaultLocaleOps),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("delimiter", &(self.delimiter as char))
            .field("has_headers", &self.has_headers)
            .field("encoding", &self.encoding)
            .field("trim_whitespace", &self.trim_whitespace)
            .field("parsing_mode", &self.parsing_mode)
            .field("expected_field_count", &self.expected_field_count)
            .field("line_ending", &self.line_ending)
            .field("include_headers", &self.include_headers)
            .field("date_decoding", &self.date_decoding)
            .field("number_decoding", &self.number_decoding)
            .field("bool_decoding", &self.bool_decoding)
            .field("key_decoding", &self.key_decoding)
            .field("nil_decoding", &self.nil_decoding)
            .field("nested_decoding", &self.nested_decoding)
            .field("preserve_order", &self.preserve_order)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    #[must_use]
    pub fn encoding(mut self, encoding: SourceEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn trim_whitespace(mut self, yes: bool) -> Self {
        self.trim_whitespace = yes;
        self
    }

    #[must_use]
    pub fn parsing_mode(mut self, mode: ParsingMode) -> Self {
        self.parsing_mode = mode;
        self
    }

    #[must_use]
    pub fn expected_field_count(mut self, count: usize) -> Self {
        self.expected_field_count = Some(count);
        self
    }

    #[must_use]
    pub fn line_ending(mut self, ending: LineEnding) -> Self {
        self.line_ending = ending;
        self
    }

    #[must_use]
    pub fn include_headers(mut self, yes: bool) -> Self {
        self.include_headers = yes;
        self
    }

    #[must_use]
    pub fn date_decoding(mut self, s: DateDecodingStrategy) -> Self {
        self.date_decoding = s;
        self
    }

    #[must_use]
    pub fn date_encoding(mut self, s: DateEncodingStrategy) -> Self {
        self.date_encoding = s;
        self
    }

    #[must_use]
    pub fn number_decoding(mut self, s: NumberDecodingStrategy) -> Self {
        self.number_decoding = s;
        self
    }

    #[must_use]
    pub fn bool_decoding(mut self, s: BoolDecodingStrategy) -> Self {
        self.bool_decoding = s;
        self
    }

    #[must_use]
    pub fn bool_encoding(mut self, s: BoolEncodingStrategy) -> Self {
        self.bool_encoding = s;
        self
    }

    #[must_use]
    pub fn key_decoding(mut self, s: KeyDecodingStrategy) -> Self {
        self.key_decoding = s;
        self
    }

    #[must_use]
    pub fn nil_decoding(mut self, s: NilDecodingStrategy) -> Self {
        self.nil_decoding = s;
        self
    }

    #[must_use]
    pub fn nil_encoding(mut self, s: NilEncodingStrategy) -> Self {
        self.nil_encoding = s;
        self
    }

    #[must_use]
    pub fn nested_decoding(mut self, s: NestedDecodingStrategy) -> Self {
        self.nested_decoding = s;
        self
    }

    #[must_use]
    pub fn column_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    #[must_use]
    pub fn index_mapping(mut self, mapping: HashMap<usize, String>) -> Self {
        self.index_mapping = Some(mapping);
        self
    }

    #[must_use]
    pub fn preserve_order(mut self, yes: bool) -> Self {
        self.preserve_order = yes;
        self
    }

    #[must_use]
    pub fn memory_budget(mut self, budget: MemoryBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn locale_ops(mut self, ops: Arc<dyn LocaleOps>) -> Self {
        self.locale_ops = ops;
        self
    }

    pub fn strict(&self) -> bool {
        self.parsing_mode == ParsingMode::Strict
    }
}
