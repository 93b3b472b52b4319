// Chunk-parallel decoder using rayon.
//
// CSV is not naturally parallel: quote context crosses chunk boundaries.
// The chunker splits speculatively at newline positions whose quote parity
// (count of quote bytes from the start of the data region) is even, which
// proves the position is outside any quoted field. When no such boundary
// exists within the lookahead cap (ill-formed input with very long quoted
// fields), the decode degrades to sequential rather than risking a wrong
// split.
//
// Phases:
// 1. Plan chunks (single-threaded; quote counting is vectorized).
// 2. Count rows per chunk in parallel, prefix-sum into row-number bases.
// 3. Decode chunks in parallel; the first error cancels remaining workers.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use crate::config::Config;
use crate::core::simd_scanner::{count_byte, scan_structural, QUOTE};
use crate::error::{Error, Result};
use crate::record::FromRecord;

use super::tokenizer::Tokenizer;
use super::{decode_row, decode_sequential_typed, prepare};

/// Inputs smaller than this decode sequentially; chunking overhead would
/// dominate.
const MIN_PARALLEL_BYTES: usize = 64 * 1024;

/// Worker count: available parallelism, capped at 8.
pub fn recommended_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get().min(8))
        .unwrap_or(4)
}

/// An aligned chunk. Both endpoints lie at row boundaries with even quote
/// parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

/// Split `data[start..]` into up to `workers` chunks at safe row
/// boundaries. Returns None when the input is too small or a boundary
/// cannot be found within the lookahead cap.
pub(crate) fn plan_chunks(
    data: &[u8],
    start: usize,
    delim: u8,
    workers: usize,
    lookahead_factor: usize,
) -> Option<Vec<Chunk>> {
    let span = data.len().saturating_sub(start);
    if workers < 2 || span < MIN_PARALLEL_BYTES {
        return None;
    }

    let chunk_size = span / workers;
    let max_lookahead = chunk_size.saturating_mul(lookahead_factor.max(1));

    let mut chunks: Vec<Chunk> = Vec::with_capacity(workers);
    let mut chunk_start = start;
    // Quote parity from `start`. The data region begins at a row boundary,
    // so even parity relative to `start` means "outside any quoted field".
    let mut parity = 0usize;
    let mut counted_to = start;

    for i in 1..workers {
        let midpoint = start + i * chunk_size;
        if midpoint <= chunk_start {
            continue;
        }

        parity = (parity + count_byte(&data[counted_to..midpoint], QUOTE)) & 1;
        counted_to = midpoint;

        let mut boundary = None;
        for (off, byte) in scan_structural(&data[midpoint..], delim) {
            if off >= max_lookahead {
                break;
            }
            let abs = midpoint + off;
            match byte {
                QUOTE => parity ^= 1,
                b'\n' if parity == 0 => {
                    boundary = Some(abs + 1);
                    break;
                }
                b'\r' if parity == 0 => {
                    // Lone CR terminates a row; CRLF splits after the LF.
                    let after = if data.get(abs + 1) == Some(&b'\n') {
                        abs + 2
                    } else {
                        abs + 1
                    };
                    boundary = Some(after);
                    break;
                }
                _ => {}
            }
        }

        match boundary {
            Some(b) => {
                // Quotes in [midpoint, b) were folded into parity above;
                // resume counting from the boundary.
                counted_to = b;
                if b > chunk_start && b < data.len() {
                    chunks.push(Chunk {
                        start: chunk_start,
                        end: b,
                        index: chunks.len(),
                    });
                    chunk_start = b;
                }
            }
            None => {
                debug!(
                    "no safe chunk boundary within {max_lookahead} bytes of offset {midpoint}; \
                     falling back to sequential decode"
                );
                return None;
            }
        }
    }

    if chunk_start < data.len() {
        chunks.push(Chunk {
            start: chunk_start,
            end: data.len(),
            index: chunks.len(),
        });
    }
    if chunks.len() < 2 {
        return None;
    }
    Some(chunks)
}

/// Exact row count of a chunk whose start is at even quote parity.
/// Terminators inside quoted fields are skipped; the LF of a CRLF is not
/// double-counted; a trailing row without terminator counts once.
pub(crate) fn count_rows(data: &[u8], start: usize, end: usize, delim: u8) -> usize {
    let mut parity = 0usize;
    let mut rows = 0usize;
    let mut last_boundary = start;

    for (off, byte) in scan_structural(&data[start..end], delim) {
        let abs = start + off;
        match byte {
            QUOTE => parity ^= 1,
            b'\r' if parity == 0 => {
                rows += 1;
                last_boundary = if data.get(abs + 1) == Some(&b'\n') {
                    abs + 2
                } else {
                    abs + 1
                };
            }
            b'\n' if parity == 0 => {
                // Skip the LF of a CRLF already counted via its CR.
                if abs == start || data[abs - 1] != b'\r' {
                    rows += 1;
                    last_boundary = abs + 1;
                }
            }
            _ => {}
        }
    }
    if last_boundary < end {
        rows += 1;
    }
    rows
}

/// Decode the whole input in parallel. Falls back to sequential when the
/// chunker cannot find safe boundaries.
pub fn decode_parallel_impl<T>(
    data: &[u8],
    config: &Config,
    positional: Option<&[&str]>,
) -> Result<Vec<T>>
where
    T: FromRecord + Send,
{
    let Some((headers, tok)) = prepare(data, config, positional)? else {
        return Ok(Vec::new());
    };
    let data_start = tok.position();

    let workers = recommended_threads();
    let Some(chunks) = plan_chunks(
        data,
        data_start,
        config.delimiter,
        workers,
        config.max_boundary_lookahead_factor,
    ) else {
        return decode_sequential_typed(data, tok, &headers, config);
    };
    debug!("parallel decode over {} chunks", chunks.len());

    // Row-number bases per chunk, exact, from a parallel counting pass.
    let counts: Vec<usize> = chunks
        .par_iter()
        .map(|c| count_rows(data, c.start, c.end, config.delimiter))
        .collect();
    let mut bases = Vec::with_capacity(chunks.len());
    let mut acc = 0usize;
    for count in &counts {
        bases.push(acc);
        acc += count;
    }

    let cancelled = AtomicBool::new(false);
    let decode_chunk = |chunk: &Chunk| -> Result<Vec<T>> {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        let mut tok = Tokenizer::with_range(data, config.delimiter, chunk.start, chunk.end);
        let mut out = Vec::new();
        let mut row_number = bases[chunk.index] + 1;
        while let Some(view) = tok.next_row() {
            if cancelled.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            match decode_row::<T>(&view, data, &headers, config, row_number) {
                Ok(record) => out.push(record),
                Err(e) => {
                    cancelled.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
            row_number += 1;
        }
        Ok(out)
    };

    if config.preserve_order {
        let results: Vec<Result<Vec<T>>> = chunks.par_iter().map(decode_chunk).collect();
        merge_ordered(results, acc)
    } else {
        // Completion order: workers hand finished chunks to a channel.
        let (tx, rx) = crossbeam_channel::unbounded();
        chunks.par_iter().for_each_with(tx, |tx, chunk| {
            // A disconnected receiver just means an earlier error won.
            let _ = tx.send(decode_chunk(chunk));
        });
        let mut merged = Vec::with_capacity(acc);
        let mut first_error = None;
        for result in rx.iter() {
            match result {
                Ok(records) => merged.extend(records),
                Err(Error::Cancelled) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            };
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    }
}

fn merge_ordered<T>(results: Vec<Result<Vec<T>>>, capacity: usize) -> Result<Vec<T>> {
    // Surface the first real error in chunk order; Cancelled markers are
    // discarded worker output.
    let mut merged = Vec::with_capacity(capacity);
    let mut first_error = None;
    for result in results {
        match result {
            Ok(records) => {
                if first_error.is_none() {
                    merged.extend(records);
                }
            }
            Err(Error::Cancelled) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(merged),
    }
}
