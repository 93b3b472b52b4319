// Encoder: records to CSV bytes, strings, writers, files.
//
// Per field: scan with the SIMD/SWAR needs-quoting check; if the field
// contains a quote, the delimiter, CR or LF, wrap it in quotes doubling
// every internal quote, otherwise emit the bytes verbatim. The header row
// comes from the first record's key order; later records must expose the
// same key set (missing keys emit empty fields, unknown keys are an
// error). Output always ends with the configured line ending - N records
// produce exactly N terminators, plus one for the header.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::config::Config;
use crate::core::simd_scanner::{needs_quoting, QUOTE};
use crate::error::{Error, Result};
use crate::record::{RowMap, ToRecord};

use super::parallel::recommended_threads;

/// Buffered-writer capacity for file output.
const WRITER_BUFFER: usize = 64 * 1024;

/// Write a field that needs quoting: quote + content with doubled quotes +
/// quote.
#[inline]
pub fn write_quoted_field(out: &mut Vec<u8>, field: &[u8]) {
    out.push(QUOTE);
    for &b in field {
        out.push(b);
        if b == QUOTE {
            out.push(QUOTE);
        }
    }
    out.push(QUOTE);
}

/// Write one field, quoting only when required.
#[inline]
pub fn write_field(out: &mut Vec<u8>, field: &str, delim: u8) {
    let bytes = field.as_bytes();
    if needs_quoting(bytes, delim) {
        write_quoted_field(out, bytes);
    } else {
        out.extend_from_slice(bytes);
    }
}

/// Serialize one record map against the header key order.
fn write_row(out: &mut Vec<u8>, keys: &[String], map: &RowMap, config: &Config) -> Result<()> {
    // Every key of the record must be in the header set.
    if map.len() > keys.len() || !map.keys().all(|k| keys.contains(k)) {
        let offender = map
            .keys()
            .find(|k| !keys.contains(*k))
            .cloned()
            .unwrap_or_default();
        return Err(Error::unsupported(format!(
            "record key \"{offender}\" is not part of the header derived from the first record"
        )));
    }

    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(config.delimiter);
        }
        match map.get(key) {
            Some(Some(value)) => write_field(out, value, config.delimiter),
            // Nil fields render per the nil encoding strategy.
            Some(None) => write_field(out, config.nil_encoding.render(), config.delimiter),
            // Missing keys emit empty fields.
            None => {}
        }
    }
    out.extend_from_slice(config.line_ending.as_bytes());
    Ok(())
}

fn write_header(out: &mut Vec<u8>, keys: &[String], config: &Config) {
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(config.delimiter);
        }
        write_field(out, key, config.delimiter);
    }
    out.extend_from_slice(config.line_ending.as_bytes());
}

/// Encode records into a byte buffer.
pub fn encode_records<T: ToRecord>(records: &[T], config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(WRITER_BUFFER.min(records.len() * 64 + 128));
    let mut keys: Option<Vec<String>> = None;

    for record in records {
        let map = record.to_record(config)?;
        let keys = keys.get_or_insert_with(|| {
            let first_keys: Vec<String> = map.keys().cloned().collect();
            if config.include_headers {
                write_header(&mut out, &first_keys, config);
            }
            first_keys
        });
        write_row(&mut out, keys, &map, config)?;
    }
    Ok(out)
}

/// Encode records into a string.
pub fn encode_records_to_string<T: ToRecord>(records: &[T], config: &Config) -> Result<String> {
    String::from_utf8(encode_records(records, config)?).map_err(|_| {
        Error::invalid_value("encoded output is not valid UTF-8")
    })
}

/// Chunk-parallel encode: chunks are encoded concurrently and concatenated
/// in original record order.
pub fn encode_records_parallel<T>(records: &[T], config: &Config) -> Result<Vec<u8>>
where
    T: ToRecord + Sync,
{
    let chunk_size = (records.len() / recommended_threads()).max(256);
    if records.len() <= chunk_size {
        return encode_records(records, config);
    }

    let keys: Vec<String> = records[0].to_record(config)?.keys().cloned().collect();

    let chunks: Vec<Result<Vec<u8>>> = records
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let mut out = Vec::with_capacity(chunk.len() * 64 + 128);
            if i == 0 && config.include_headers {
                write_header(&mut out, &keys, config);
            }
            for record in chunk {
                let map = record.to_record(config)?;
                write_row(&mut out, &keys, &map, config)?;
            }
            Ok(out)
        })
        .collect();

    let mut merged = Vec::new();
    for chunk in chunks {
        merged.extend_from_slice(&chunk?);
    }
    Ok(merged)
}

/// Incremental row-by-row encoder over any writer. Single-owner: the
/// writer and its buffer belong to this value until `finish`.
pub struct RowWriter<W: Write> {
    writer: W,
    config: Config,
    keys: Option<Vec<String>>,
    scratch: Vec<u8>,
    bytes_written: u64,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, config: &Config) -> Self {
        RowWriter {
            writer,
            config: config.clone(),
            keys: None,
            scratch: Vec::with_capacity(256),
            bytes_written: 0,
        }
    }

    /// Bytes successfully handed to the writer so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn write_record<T: ToRecord>(&mut self, record: &T) -> Result<()> {
        let map = record.to_record(&self.config)?;
        self.scratch.clear();

        if self.keys.is_none() {
            let first_keys: Vec<String> = map.keys().cloned().collect();
            if self.config.include_headers {
                write_header(&mut self.scratch, &first_keys, &self.config);
            }
            self.keys = Some(first_keys);
        }
        if let Some(keys) = self.keys.as_ref() {
            write_row(&mut self.scratch, keys, &map, &self.config)?;
        }

        self.writer
            .write_all(&self.scratch)
            .map_err(|source| Error::Io {
                source,
                bytes_written: self.bytes_written,
            })?;
        self.bytes_written += self.scratch.len() as u64;
        Ok(())
    }

    /// Flush and hand the writer back.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().map_err(|source| Error::Io {
            source,
            bytes_written: self.bytes_written,
        })?;
        Ok(self.writer)
    }
}

/// Encode to any writer through a buffered row writer.
pub fn encode_records_to_writer<T, W>(records: &[T], config: &Config, writer: W) -> Result<u64>
where
    T: ToRecord,
    W: Write,
{
    let buffered = BufWriter::with_capacity(WRITER_BUFFER, writer);
    let mut row_writer = RowWriter::new(buffered, config);
    for record in records {
        row_writer.write_record(record)?;
    }
    let bytes = row_writer.bytes_written();
    row_writer.finish()?;
    Ok(bytes)
}

/// Encode to a file, creating or truncating it.
pub fn encode_records_to_path<T>(
    records: &[T],
    config: &Config,
    path: impl AsRef<Path>,
) -> Result<u64>
where
    T: ToRecord,
{
    let file = File::create(path)?;
    encode_records_to_writer(records, config, file)
}
