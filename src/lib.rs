#![cfg_attr(feature = "nightly-simd", feature(portable_simd))]
// turbocsv - high-throughput RFC 4180 CSV engine
//
// No unwrap/expect in production code. Fallible paths propagate with `?`.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//
// Decode paths:
//   sequential: bytes -> [BOM normalize] -> tokenizer -> row view -> record
//   parallel:   chunker (quote-parity boundaries) -> N workers -> ordered merge
//   streaming:  producer thread -> bounded batches -> lazy iterator
// Encode paths: buffer, string, incremental writer, file, chunk-parallel.

pub mod config;
pub mod core;
pub mod error;
pub mod record;
pub mod strategy;
pub mod value;

use std::io::Write;
use std::path::Path;

use crate::core::bom;

pub use config::{
    BoolDecodingStrategy, BoolEncodingStrategy, Config, DateDecodingStrategy,
    DateEncodingStrategy, KeyDecodingStrategy, LineEnding, MemoryBudget,
    NestedDecodingStrategy, NilDecodingStrategy, NilEncodingStrategy, NumberDecodingStrategy,
    ParsingMode, SourceEncoding,
};
pub use crate::core::ByteSource;
pub use error::{Error, Location, Result};
pub use record::{
    FieldContext, FieldDecode, FieldEncode, FromRecord, OrderedKeys, RecordView, RowMap,
    ToRecord,
};
pub use strategy::encode::RowWriter;
pub use strategy::streaming::{Progress, ProgressFn, RecordBatches, RecordStream};
pub use value::{DateStyle, DefaultLocaleOps, JsonCodec, LocaleOps, NestedCodec};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Decoding
// ============================================================================

/// Decode the whole input sequentially into typed records.
pub fn decode<T: FromRecord>(input: impl AsRef<[u8]>, config: &Config) -> Result<Vec<T>> {
    let data = bom::normalize_input(input.as_ref(), config.encoding)?;
    let Some((headers, tok)) = strategy::prepare(&data, config, None)? else {
        return Ok(Vec::new());
    };
    strategy::decode_sequential_typed(&data, tok, &headers, config)
}

/// Decode headerless input using the type's ordered key list for field
/// names. `index_mapping` still takes precedence over the key list.
pub fn decode_positional<T>(input: impl AsRef<[u8]>, config: &Config) -> Result<Vec<T>>
where
    T: FromRecord + OrderedKeys,
{
    let data = bom::normalize_input(input.as_ref(), config.encoding)?;
    let Some((headers, tok)) = strategy::prepare(&data, config, Some(T::ordered_keys()))? else {
        return Ok(Vec::new());
    };
    strategy::decode_sequential_typed(&data, tok, &headers, config)
}

/// Decode into ordered record maps (untyped surface).
pub fn decode_records(input: impl AsRef<[u8]>, config: &Config) -> Result<Vec<RowMap>> {
    decode::<RowMap>(input, config)
}

/// Decode into raw field-string rows. Header row is consumed when
/// configured; nil and key strategies do not apply.
pub fn decode_rows(input: impl AsRef<[u8]>, config: &Config) -> Result<Vec<Vec<String>>> {
    let data = bom::normalize_input(input.as_ref(), config.encoding)?;
    let mut tok = strategy::tokenizer::Tokenizer::new(&data, config.delimiter);
    let mut rows = Vec::new();
    let mut skip_header = config.has_headers;
    while let Some(view) = tok.next_row() {
        strategy::tokenizer::validate_row(&view, &data, config, None)?;
        if skip_header {
            skip_header = false;
            continue;
        }
        let row = (0..view.field_count())
            .map(|i| view.field_string(i, config).map(|s| s.into_owned()))
            .collect::<Result<Vec<String>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Decode with chunk-parallel workers. Results arrive in input order when
/// `preserve_order` is set (the default), otherwise in completion order.
pub fn decode_parallel<T>(input: impl AsRef<[u8]>, config: &Config) -> Result<Vec<T>>
where
    T: FromRecord + Send,
{
    let data = bom::normalize_input(input.as_ref(), config.encoding)?;
    strategy::parallel::decode_parallel_impl(&data, config, None)
}

/// Memory-map a file and decode it sequentially.
pub fn decode_path<T: FromRecord>(path: impl AsRef<Path>, config: &Config) -> Result<Vec<T>> {
    let source = ByteSource::open(path)?;
    decode(source.as_bytes(), config)
}

/// Memory-map a file and decode it with parallel workers.
pub fn decode_path_parallel<T>(path: impl AsRef<Path>, config: &Config) -> Result<Vec<T>>
where
    T: FromRecord + Send,
{
    let source = ByteSource::open(path)?;
    decode_parallel(source.as_bytes(), config)
}

// ============================================================================
// Streaming
// ============================================================================

/// Lazy, cancellable record stream over a source, under the configured
/// memory budget. Dropping the stream finalizes the producer.
pub fn stream<T>(source: ByteSource, config: &Config) -> RecordStream<T>
where
    T: FromRecord + Send + 'static,
{
    strategy::streaming::stream_records(source, config.clone(), None, None)
}

/// Streaming with a progress callback, invoked at least once per batch
/// with bytes consumed and rows emitted.
pub fn stream_with_progress<T>(
    source: ByteSource,
    config: &Config,
    progress: ProgressFn,
) -> RecordStream<T>
where
    T: FromRecord + Send + 'static,
{
    strategy::streaming::stream_records(source, config.clone(), None, Some(progress))
}

/// Batched streaming: yields vectors of up to `batch_size` records.
pub fn stream_batches<T>(source: ByteSource, config: &Config) -> RecordBatches<T>
where
    T: FromRecord + Send + 'static,
{
    strategy::streaming::stream_batches(source, config.clone(), None, None)
}

/// Memory-map a file and stream it.
pub fn stream_path<T>(path: impl AsRef<Path>, config: &Config) -> Result<RecordStream<T>>
where
    T: FromRecord + Send + 'static,
{
    let source = ByteSource::open(path)?;
    Ok(stream(source, config))
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode records into CSV bytes.
pub fn encode<T: ToRecord>(records: &[T], config: &Config) -> Result<Vec<u8>> {
    strategy::encode::encode_records(records, config)
}

/// Encode records into a CSV string.
pub fn encode_to_string<T: ToRecord>(records: &[T], config: &Config) -> Result<String> {
    strategy::encode::encode_records_to_string(records, config)
}

/// Encode with chunk-parallel workers; output byte order always matches
/// record order.
pub fn encode_parallel<T>(records: &[T], config: &Config) -> Result<Vec<u8>>
where
    T: ToRecord + Sync,
{
    strategy::encode::encode_records_parallel(records, config)
}

/// Encode through a 64 KiB buffered writer. Returns bytes written.
pub fn encode_to_writer<T, W>(records: &[T], config: &Config, writer: W) -> Result<u64>
where
    T: ToRecord,
    W: Write,
{
    strategy::encode::encode_records_to_writer(records, config, writer)
}

/// Encode to a file, creating or truncating it. Returns bytes written.
pub fn encode_to_path<T>(records: &[T], config: &Config, path: impl AsRef<Path>) -> Result<u64>
where
    T: ToRecord,
{
    strategy::encode::encode_records_to_path(records, config, path)
}
