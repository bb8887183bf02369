//! Chunked accumulation over a snapshot source
//!
//! Snapshots are pulled `chunk_size` at a time, folded into a
//! [`StatAccumulator`] and dropped, so peak memory is bounded by the chunk and
//! not by the number of timesteps. An optional abort flag is checked between
//! chunks.

use super::welford::{StatAccumulator, StatProfiles};
use crate::data_source::SnapshotSource;
use crate::errors::{FieldIoError, Result};
use ndarray::Array2;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Options for a streaming pass
#[derive(Debug, Clone, Copy)]
pub struct StreamingOptions<'a> {
    /// Snapshots per chunk, at least 1
    pub chunk_size: usize,
    /// Raised by the caller to stop between chunks
    pub abort: Option<&'a AtomicBool>,
}

impl Default for StreamingOptions<'_> {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            abort: None,
        }
    }
}

impl<'a> StreamingOptions<'a> {
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            abort: None,
        }
    }

    #[must_use]
    pub fn with_abort(mut self, abort: &'a AtomicBool) -> Self {
        self.abort = Some(abort);
        self
    }

    fn aborted(&self) -> bool {
        self.abort.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Folds snapshots `range` of `source` into a fresh accumulator.
///
/// # Errors
///
/// [`FieldIoError::Aborted`] if the abort flag is raised before a chunk;
/// any read error of the source.
pub fn accumulate_range<S>(
    source: &S,
    range: Range<usize>,
    options: &StreamingOptions<'_>,
) -> Result<Option<StatAccumulator>>
where
    S: SnapshotSource + ?Sized,
{
    if options.chunk_size == 0 {
        return Err(FieldIoError::config("Chunk size must be at least 1"));
    }

    let mut accumulator: Option<StatAccumulator> = None;
    let mut chunk_start = range.start;
    while chunk_start < range.end {
        if options.aborted() {
            return Err(FieldIoError::Aborted);
        }
        let chunk_end = (chunk_start + options.chunk_size).min(range.end);
        let chunk = source.read_chunk(chunk_start, chunk_end)?;

        let state = accumulator.get_or_insert_with(|| {
            let (_, ny, nz) = chunk.dim();
            StatAccumulator::new(ny, nz)
        });
        state.update_chunk(&chunk.view())?;

        debug!(source = %source.label(), chunk_start, chunk_end, "processed chunk");
        chunk_start = chunk_end;
    }

    Ok(accumulator)
}

/// Mean and RMS profiles over every snapshot of `source`
pub fn compute_statistics_streaming<S>(source: &S, options: &StreamingOptions<'_>) -> Result<StatProfiles>
where
    S: SnapshotSource + ?Sized,
{
    let count = source.timestep_count()?;
    info!(
        source = %source.label(),
        timesteps = count,
        chunk_size = options.chunk_size,
        "computing streaming statistics"
    );

    accumulate_range(source, 0..count, options)?
        .ok_or_else(|| FieldIoError::Statistics(format!("Source '{}' has no snapshots", source.label())))?
        .finish()
}

/// Time-averaged field over the last `last_n` snapshots (fewer if the
/// source is shorter)
pub fn time_average_last<S>(source: &S, last_n: usize, options: &StreamingOptions<'_>) -> Result<Array2<f64>>
where
    S: SnapshotSource + ?Sized,
{
    let count = source.timestep_count()?;
    let n_avg = last_n.min(count);
    info!(source = %source.label(), n_avg, "time-averaging trailing snapshots");

    let accumulator = accumulate_range(source, count - n_avg..count, options)?
        .ok_or_else(|| FieldIoError::Statistics(format!("Source '{}' has no snapshots to average", source.label())))?;
    Ok(accumulator.mean().clone())
}
