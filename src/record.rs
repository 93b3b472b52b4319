// The view-to-typed bridge.
//
// Decoding materializes each row into a `RowMap` (ordered header -> field,
// nil already applied), then user types pull fields out through a
// `RecordView`. Encoding runs the other way: `ToRecord` produces a `RowMap`
// the encoder serializes. The reflection mechanism stays outside the core;
// these traits are the whole contract.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::config::{Config, NestedDecodingStrategy};
use crate::error::{Error, Location, Result};
use crate::value::nested::{flatten_sub_map, JsonCodec, NestedCodec};
use crate::value::{boolean, date, key, number};

// ---------------------------------------------------------------------------
// RowMap
// ---------------------------------------------------------------------------

/// Ordered column-name -> field mapping for one record. `None` is a nil
/// field per the active nil strategy. Ordering is header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowMap {
    inner: IndexMap<String, Option<String>>,
}

impl RowMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        RowMap {
            inner: IndexMap::with_capacity(n),
        }
    }

    pub fn insert(&mut self, key: String, value: Option<String>) {
        self.inner.insert(key, value);
    }

    /// Encode-side helper: insert a typed value under `key`.
    pub fn set<T: FieldEncode + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
        config: &Config,
    ) -> Result<()> {
        let rendered = value.encode_field(config)?;
        self.inner.insert(key.into(), rendered);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for RowMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        RowMap {
            inner: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// User-type traits
// ---------------------------------------------------------------------------

/// Decode a user type from one record.
pub trait FromRecord: Sized {
    fn from_record(record: &RecordView<'_>) -> Result<Self>;
}

/// Encode a user type into one record.
pub trait ToRecord {
    fn to_record(&self, config: &Config) -> Result<RowMap>;
}

/// Capability for positional decoding: an ordered key list used when the
/// input has no header row.
pub trait OrderedKeys {
    fn ordered_keys() -> &'static [&'static str];
}

impl FromRecord for RowMap {
    fn from_record(record: &RecordView<'_>) -> Result<Self> {
        Ok(record.map.clone().into_owned())
    }
}

impl ToRecord for RowMap {
    fn to_record(&self, _config: &Config) -> Result<RowMap> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordView
// ---------------------------------------------------------------------------

/// Accessor over one decoded record. Lives only for the duration of that
/// record's decoding.
pub struct RecordView<'a> {
    map: Cow<'a, RowMap>,
    config: &'a Config,
    row: usize,
    path: Vec<String>,
}

impl<'a> RecordView<'a> {
    pub fn new(map: &'a RowMap, config: &'a Config, row: usize) -> Self {
        RecordView {
            map: Cow::Borrowed(map),
            config,
            row,
            path: Vec::new(),
        }
    }

    /// 1-based data row number.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    pub fn location(&self, column: &str) -> Location {
        Location {
            row: self.row,
            column: Some(column.to_string()),
            path: self.path.clone(),
        }
    }

    fn available_keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    /// Raw field lookup; `Ok(None)` is a nil field.
    pub fn raw(&self, key: &str) -> Result<Option<&str>> {
        match self.map.get(key) {
            Some(value) => Ok(value.as_deref()),
            None => Err(Error::KeyNotFound {
                key: key.to_string(),
                location: self.location(key),
                available: self.available_keys(),
            }),
        }
    }

    /// Decode a required field as `T`.
    pub fn field<T: FieldDecode>(&self, key: &str) -> Result<T> {
        match self.raw(key)? {
            Some(raw) => T::decode_field(raw, &self.field_context(key)),
            None => T::decode_nil().ok_or_else(|| {
                Error::type_mismatch(T::EXPECTED, "nil", self.location(key))
            }),
        }
    }

    /// Decode an optional field; nil becomes `None`.
    pub fn opt_field<T: FieldDecode>(&self, key: &str) -> Result<Option<T>> {
        match self.raw(key)? {
            Some(raw) => T::decode_field(raw, &self.field_context(key)).map(Some),
            None => Ok(None),
        }
    }

    /// Enter a nested record under `key` per the nested strategy.
    pub fn nested(&self, key: &str) -> Result<RecordView<'a>> {
        let sub = match &self.config.nested_decoding {
            NestedDecodingStrategy::Error => {
                return Err(Error::unsupported(format!(
                    "nested value under \"{key}\" requires a nested decoding strategy"
                )))
            }
            NestedDecodingStrategy::Flatten { separator } => {
                let sub = flatten_sub_map(&self.map, key, separator);
                if sub.is_empty() {
                    return Err(Error::KeyNotFound {
                        key: format!("{key}{separator}*"),
                        location: self.location(key),
                        available: self.available_keys(),
                    });
                }
                sub
            }
            NestedDecodingStrategy::Json => self.json_sub_map(key, &JsonCodec)?,
            NestedDecodingStrategy::Codable(codec) => self.json_sub_map(key, codec.as_ref())?,
        };

        let mut path = self.path.clone();
        path.push(key.to_string());
        Ok(RecordView {
            map: Cow::Owned(sub),
            config: self.config,
            row: self.row,
            path,
        })
    }

    /// Deserialize an embedded JSON field directly into `T`.
    pub fn nested_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match &self.config.nested_decoding {
            NestedDecodingStrategy::Json | NestedDecodingStrategy::Codable(_) => {}
            _ => {
                return Err(Error::unsupported(format!(
                    "field \"{key}\" holds an embedded document but the json strategy is not enabled"
                )))
            }
        }
        let raw = self.raw(key)?.ok_or_else(|| {
            Error::type_mismatch("json document", "nil", self.location(key))
        })?;
        serde_json::from_str(raw).map_err(|e| Error::TypeMismatch {
            expected: "json document",
            actual: format!("{raw} ({e})"),
            location: self.location(key),
        })
    }

    fn json_sub_map(&self, key: &str, codec: &dyn NestedCodec) -> Result<RowMap> {
        let raw = self.raw(key)?.ok_or_else(|| {
            Error::type_mismatch("json object", "nil", self.location(key))
        })?;
        let value = codec.decode_value(raw)?;
        let serde_json::Value::Object(obj) = value else {
            return Err(Error::type_mismatch("json object", raw, self.location(key)));
        };

        let mut sub = RowMap::with_capacity(obj.len());
        for (k, v) in obj {
            let cell = match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            };
            sub.insert(k, cell);
        }
        Ok(sub)
    }

    fn field_context(&self, key: &str) -> FieldContext<'_> {
        FieldContext {
            config: self.config,
            location: self.location(key),
        }
    }
}

/// Context handed to `FieldDecode` implementations.
pub struct FieldContext<'a> {
    pub config: &'a Config,
    pub location: Location,
}

// ---------------------------------------------------------------------------
// FieldDecode
// ---------------------------------------------------------------------------

/// Convert one field string into a typed value using the strategies in the
/// context's config.
pub trait FieldDecode: Sized {
    const EXPECTED: &'static str;

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self>;

    /// Value to produce for a nil field, when the type has one.
    fn decode_nil() -> Option<Self> {
        None
    }
}

impl FieldDecode for String {
    const EXPECTED: &'static str = "string";

    fn decode_field(raw: &str, _cx: &FieldContext<'_>) -> Result<Self> {
        Ok(raw.to_string())
    }

    fn decode_nil() -> Option<Self> {
        Some(String::new())
    }
}

impl FieldDecode for bool {
    const EXPECTED: &'static str = "bool";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        boolean::decode_bool(raw, cx.config, &cx.location)
    }
}

impl FieldDecode for f64 {
    const EXPECTED: &'static str = "number";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        number::decode_f64(raw, cx.config, &cx.location)
    }
}

impl FieldDecode for f32 {
    const EXPECTED: &'static str = "number";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        number::decode_f64(raw, cx.config, &cx.location).map(|v| v as f32)
    }
}

macro_rules! impl_field_decode_int {
    ($($ty:ty),*) => {
        $(
            impl FieldDecode for $ty {
                const EXPECTED: &'static str = "integer";

                fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
                    number::decode_int(raw, cx.config, &cx.location)
                }
            }
        )*
    };
}

impl_field_decode_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize);

impl FieldDecode for DateTime<Utc> {
    const EXPECTED: &'static str = "date";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        date::decode_datetime(raw, cx.config, &cx.location)
    }
}

impl FieldDecode for NaiveDateTime {
    const EXPECTED: &'static str = "date";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        date::decode_datetime(raw, cx.config, &cx.location).map(|dt| dt.naive_utc())
    }
}

impl FieldDecode for NaiveDate {
    const EXPECTED: &'static str = "date";

    fn decode_field(raw: &str, cx: &FieldContext<'_>) -> Result<Self> {
        date::decode_datetime(raw, cx.config, &cx.location).map(|dt| dt.date_naive())
    }
}

// ---------------------------------------------------------------------------
// FieldEncode
// ---------------------------------------------------------------------------

/// Render a typed value to one field string; `None` is a nil field.
pub trait FieldEncode {
    fn encode_field(&self, config: &Config) -> Result<Option<String>>;
}

impl FieldEncode for str {
    fn encode_field(&self, _config: &Config) -> Result<Option<String>> {
        Ok(Some(self.to_string()))
    }
}

impl FieldEncode for String {
    fn encode_field(&self, _config: &Config) -> Result<Option<String>> {
        Ok(Some(self.clone()))
    }
}

impl FieldEncode for bool {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        use crate::config::BoolEncodingStrategy;
        let rendered = match (config.bool_encoding, *self) {
            (BoolEncodingStrategy::TrueFalse, true) => "true",
            (BoolEncodingStrategy::TrueFalse, false) => "false",
            (BoolEncodingStrategy::OneZero, true) => "1",
            (BoolEncodingStrategy::OneZero, false) => "0",
        };
        Ok(Some(rendered.to_string()))
    }
}

macro_rules! impl_field_encode_int {
    ($($ty:ty),*) => {
        $(
            impl FieldEncode for $ty {
                fn encode_field(&self, _config: &Config) -> Result<Option<String>> {
                    Ok(Some(self.to_string()))
                }
            }
        )*
    };
}

impl_field_encode_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize);

impl FieldEncode for f64 {
    fn encode_field(&self, _config: &Config) -> Result<Option<String>> {
        if !self.is_finite() {
            return Err(Error::invalid_value(format!(
                "cannot encode non-finite number {self}"
            )));
        }
        Ok(Some(self.to_string()))
    }
}

impl FieldEncode for f32 {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        (*self as f64).encode_field(config)
    }
}

impl FieldEncode for DateTime<Utc> {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        Ok(Some(date::encode_datetime(self, config)))
    }
}

impl FieldEncode for NaiveDateTime {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        Ok(Some(date::encode_datetime(&self.and_utc(), config)))
    }
}

impl FieldEncode for NaiveDate {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        let midnight = self.and_hms_opt(0, 0, 0).ok_or_else(|| {
            Error::invalid_value(format!("date {self} has no midnight"))
        })?;
        Ok(Some(date::encode_datetime(&midnight.and_utc(), config)))
    }
}

impl<T: FieldEncode> FieldEncode for Option<T> {
    fn encode_field(&self, config: &Config) -> Result<Option<String>> {
        match self {
            Some(v) => v.encode_field(config),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Resolved column names, shared immutably with parallel workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    /// Field names after index/column mapping and the key strategy.
    pub names: Vec<String>,
}

impl Headers {
    /// Resolve names from a header row. Precedence per column:
    /// `index_mapping`, then `column_mapping`, then the key strategy.
    pub fn resolve(cells: &[String], config: &Config) -> Headers {
        let names = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| Self::name_for(i, Some(cell), config))
            .collect();
        Headers { names }
    }

    /// Synthesize names for headerless input of the given width:
    /// `index_mapping` wins, then the positional key list, then `columnN`.
    pub fn synthesized(width: usize, positional: Option<&[&str]>, config: &Config) -> Headers {
        let names = (0..width)
            .map(|i| {
                if let Some(mapped) = config.index_mapping.as_ref().and_then(|m| m.get(&i)) {
                    mapped.clone()
                } else if let Some(name) = positional.and_then(|keys| keys.get(i)) {
                    (*name).to_string()
                } else {
                    format!("column{i}")
                }
            })
            .collect();
        Headers { names }
    }

    fn name_for(index: usize, cell: Option<&String>, config: &Config) -> String {
        if let Some(mapped) = config.index_mapping.as_ref().and_then(|m| m.get(&index)) {
            return mapped.clone();
        }
        if let Some(cell) = cell {
            if let Some(mapped) = config.column_mapping.as_ref().and_then(|m| m.get(cell)) {
                return mapped.clone();
            }
            return key::resolve_key(cell, &config.key_decoding);
        }
        format!("column{index}")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
