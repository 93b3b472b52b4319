// Bounded streaming pipeline.
//
// Single-producer / single-consumer: a producer thread tokenizes and
// decodes rows into batches, the consumer pulls them through a lazy
// iterator. The memory budget is enforced with watermark hysteresis: the
// producer suspends once buffered rows reach the high-water mark and
// resumes only when the consumer has drained them to the low-water mark.
//
// Batches travel over an unbounded channel; the row-count gate is the only
// thing that blocks, so a cancelled consumer can always drain the channel
// and wake the producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use crate::config::Config;
use crate::core::{bom, ByteSource};
use crate::error::{Error, Result};
use crate::record::FromRecord;

use super::prepare;

/// Snapshot handed to the progress callback, at least once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_consumed: usize,
    pub rows_emitted: usize,
}

pub type ProgressFn = Box<dyn FnMut(Progress) + Send>;

/// Shared producer/consumer accounting.
struct Gate {
    buffered_rows: Mutex<usize>,
    space: Condvar,
    cancelled: AtomicBool,
}

impl Gate {
    fn lock(&self) -> MutexGuard<'_, usize> {
        // A poisoned lock only means the peer panicked; the count is a
        // plain usize and stays usable.
        self.buffered_rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Batched streaming decoder: yields vectors of up to `batch_size` records.
pub struct RecordBatches<T> {
    rx: Receiver<Result<Vec<T>>>,
    gate: Arc<Gate>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

/// Record-at-a-time streaming decoder.
pub struct RecordStream<T> {
    batches: RecordBatches<T>,
    current: std::vec::IntoIter<T>,
}

/// Spawn the producer and return the batched stream.
pub fn stream_batches<T>(
    source: ByteSource,
    config: Config,
    positional: Option<&'static [&'static str]>,
    progress: Option<ProgressFn>,
) -> RecordBatches<T>
where
    T: FromRecord + Send + 'static,
{
    let gate = Arc::new(Gate {
        buffered_rows: Mutex::new(0),
        space: Condvar::new(),
        cancelled: AtomicBool::new(false),
    });
    let (tx, rx) = unbounded();

    let producer_gate = Arc::clone(&gate);
    let handle = std::thread::spawn(move || {
        produce(source, config, positional, progress, tx, producer_gate);
    });

    RecordBatches {
        rx,
        gate,
        handle: Some(handle),
        finished: false,
    }
}

/// Spawn the producer and return a record-at-a-time stream.
pub fn stream_records<T>(
    source: ByteSource,
    config: Config,
    positional: Option<&'static [&'static str]>,
    progress: Option<ProgressFn>,
) -> RecordStream<T>
where
    T: FromRecord + Send + 'static,
{
    RecordStream {
        batches: stream_batches(source, config, positional, progress),
        current: Vec::new().into_iter(),
    }
}

/// Producer body. Owns the source; dropping it on return closes the
/// underlying mapping or buffer on every exit path.
fn produce<T>(
    source: ByteSource,
    config: Config,
    positional: Option<&'static [&'static str]>,
    mut progress: Option<ProgressFn>,
    tx: Sender<Result<Vec<T>>>,
    gate: Arc<Gate>,
) where
    T: FromRecord + Send + 'static,
{
    let data = match bom::normalize_input(source.as_bytes(), config.encoding) {
        Ok(data) => data,
        Err(e) => {
            let _ = tx.send(Err(e));
            return;
        }
    };

    let (headers, mut tok) = match prepare(&data, &config, positional) {
        Ok(Some(prepared)) => prepared,
        Ok(None) => return,
        Err(e) => {
            let _ = tx.send(Err(e));
            return;
        }
    };

    let batch_size = config.budget.batch_size.max(1);
    let high = config.budget.high_water_rows();
    let low = config.budget.low_water_rows();
    debug!(
        "streaming pipeline: batch={batch_size}, high={high} rows, low={low} rows"
    );

    let mut batch: Vec<T> = Vec::with_capacity(batch_size);
    let mut rows_emitted = 0usize;
    let mut row_number = 1usize;

    loop {
        if gate.cancelled.load(Ordering::Relaxed) {
            return;
        }
        let view = match tok.next_row() {
            Some(view) => view,
            None => break,
        };
        match super::decode_row::<T>(&view, &data, &headers, &config, row_number) {
            Ok(record) => batch.push(record),
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
        row_number += 1;

        if batch.len() >= batch_size {
            rows_emitted += batch.len();
            if !ship(&tx, &gate, std::mem::take(&mut batch), high, low) {
                return;
            }
            batch.reserve(batch_size);
            if let Some(cb) = progress.as_mut() {
                cb(Progress {
                    bytes_consumed: tok.position(),
                    rows_emitted,
                });
            }
        }
    }

    if !batch.is_empty() {
        rows_emitted += batch.len();
        if !ship(&tx, &gate, batch, high, low) {
            return;
        }
    }
    if let Some(cb) = progress.as_mut() {
        cb(Progress {
            bytes_consumed: tok.position(),
            rows_emitted,
        });
    }
}

/// Send one batch, then hold at the high-water mark until the consumer
/// drains to the low-water mark. Returns false when the stream was
/// cancelled or the consumer is gone.
fn ship<T>(
    tx: &Sender<Result<Vec<T>>>,
    gate: &Gate,
    batch: Vec<T>,
    high: usize,
    low: usize,
) -> bool {
    let n = batch.len();
    if tx.send(Ok(batch)).is_err() {
        return false;
    }
    let mut buffered = gate.lock();
    *buffered += n;
    if *buffered >= high {
        // Hysteresis: once the high-water mark is hit, stay suspended
        // until the consumer drains to the low-water mark.
        while *buffered > low && !gate.cancelled.load(Ordering::Relaxed) {
            buffered = gate
                .space
                .wait(buffered)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
    !gate.cancelled.load(Ordering::Relaxed)
}

impl<T> RecordBatches<T> {
    /// Next batch of records, or the first error, then end-of-stream.
    pub fn next_batch(&mut self) -> Option<Result<Vec<T>>> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(Ok(batch)) => {
                {
                    let mut buffered = self.gate.lock();
                    *buffered = buffered.saturating_sub(batch.len());
                }
                // Wake a producer parked at the high-water mark; it
                // re-checks the level itself.
                self.gate.space.notify_all();
                Some(Ok(batch))
            }
            Ok(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl<T> Iterator for RecordBatches<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

impl<T> Drop for RecordBatches<T> {
    fn drop(&mut self) {
        self.gate.cancelled.store(true, Ordering::Relaxed);
        // Take the gate lock before notifying: a producer between its
        // cancellation check and `wait` still holds the lock, so this
        // serializes with it and the wakeup cannot be lost.
        drop(self.gate.lock());
        self.gate.space.notify_all();
        // Drain so a producer blocked on the gate observes cancellation.
        while self.rx.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<T> Iterator for RecordStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            match self.batches.next_batch()? {
                Ok(batch) => self.current = batch.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
