// Decode/encode strategies: sequential tokenizer, chunk-parallel decoder,
// bounded streaming pipeline, encoder. The shared driver below resolves
// headers and bridges row views into record maps; every strategy goes
// through it so they cannot disagree on semantics.

pub mod encode;
pub mod parallel;
pub mod streaming;
pub mod tokenizer;

use crate::config::Config;
use crate::error::Result;
use crate::record::{FromRecord, Headers, RecordView, RowMap};

use tokenizer::{validate_row, RowView, Tokenizer};

/// Resolve headers and return a tokenizer positioned at the first data row.
/// `positional` supplies field names for headerless input (the
/// `OrderedKeys` capability). Returns None for input with no rows at all.
pub(crate) fn prepare<'a>(
    data: &'a [u8],
    config: &Config,
    positional: Option<&[&str]>,
) -> Result<Option<(Headers, Tokenizer<'a>)>> {
    let mut tok = Tokenizer::new(data, config.delimiter);

    if config.has_headers {
        let Some(view) = tok.next_row() else {
            return Ok(None);
        };
        validate_row(&view, data, config, None)?;
        let cells = (0..view.field_count())
            .map(|i| view.field_string(i, config).map(|c| c.into_owned()))
            .collect::<Result<Vec<String>>>()?;
        Ok(Some((Headers::resolve(&cells, config), tok)))
    } else {
        // Width comes from the first row; the tokenizer itself stays at 0.
        let mut peek = Tokenizer::new(data, config.delimiter);
        let Some(view) = peek.next_row() else {
            return Ok(None);
        };
        let width = view.field_count();
        Ok(Some((Headers::synthesized(width, positional, config), tok)))
    }
}

/// Materialize one row view into an ordered record map. Short rows fill
/// missing columns with nil; extra fields beyond the header are dropped
/// (strict mode already rejected the mismatch in `validate_row`).
pub(crate) fn row_to_map(
    view: &RowView<'_>,
    headers: &Headers,
    config: &Config,
) -> Result<RowMap> {
    let mut map = RowMap::with_capacity(headers.len());
    for (i, name) in headers.names.iter().enumerate() {
        let cell = if i < view.field_count() {
            let s = view.field_string(i, config)?;
            if config.nil_decoding.is_nil(&s) {
                None
            } else {
                Some(s.into_owned())
            }
        } else {
            None
        };
        map.insert(name.clone(), cell);
    }
    Ok(map)
}

/// Validate, map and decode one row into `T`. `row_number` is the 1-based
/// data row ordinal.
pub(crate) fn decode_row<T: FromRecord>(
    view: &RowView<'_>,
    data: &[u8],
    headers: &Headers,
    config: &Config,
    row_number: usize,
) -> Result<T> {
    validate_row(view, data, config, Some(headers.len()))?;
    let map = row_to_map(view, headers, config)?;
    let record = RecordView::new(&map, config, row_number);
    T::from_record(&record)
}

/// Drain a tokenizer sequentially into typed records.
pub(crate) fn decode_sequential_typed<T: FromRecord>(
    data: &[u8],
    mut tok: Tokenizer<'_>,
    headers: &Headers,
    config: &Config,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut row_number = 1;
    while let Some(view) = tok.next_row() {
        out.push(decode_row(&view, data, headers, config, row_number)?);
        row_number += 1;
    }
    Ok(out)
}
