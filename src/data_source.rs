//! Snapshot source abstraction for the streaming statistics
//!
//! The accumulator only needs something that can hand out contiguous chunks
//! of time-major (t, y, z) snapshots. Driver files are one such source; an
//! array already in memory is another.

use crate::errors::{FieldIoError, Result};
use crate::field::{FieldCode, FieldKind};
use crate::reader::FieldReader;
use ndarray::{s, Array3, Ix3};

/// Anything that yields time-major 2D snapshots in chunks
pub trait SnapshotSource {
    /// Number of snapshots available
    fn timestep_count(&self) -> Result<usize>;

    /// Snapshots `[start, end)` as a `(end - start, y, z)` array
    fn read_chunk(&self, start: usize, end: usize) -> Result<Array3<f64>>;

    /// Human-readable label for log output
    fn label(&self) -> String;
}

/// One plane field of a driver run
#[derive(Debug, Clone, Copy)]
pub struct DriverFieldSource<'a> {
    reader: &'a FieldReader,
    code: FieldCode,
}

impl<'a> DriverFieldSource<'a> {
    /// # Errors
    ///
    /// Multi-component fields have no single 2D snapshot and are rejected.
    pub fn new(reader: &'a FieldReader, code: FieldCode) -> Result<Self> {
        if let FieldKind::MultiComponent(_) = code.kind(reader.scalar_count()) {
            return Err(FieldIoError::config(format!(
                "Field '{code}' carries a component axis and cannot be streamed as 2D snapshots"
            )));
        }
        Ok(Self { reader, code })
    }
}

impl SnapshotSource for DriverFieldSource<'_> {
    fn timestep_count(&self) -> Result<usize> {
        Ok(self.reader.get_field_info(self.code)?.timestep_count)
    }

    fn read_chunk(&self, start: usize, end: usize) -> Result<Array3<f64>> {
        Ok(self
            .reader
            .read_range(self.code, start, end)?
            .into_dimensionality::<Ix3>()?)
    }

    fn label(&self) -> String {
        format!("{}driver.{:03}", self.code, self.reader.experiment())
    }
}

/// Snapshots already resident in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    data: Array3<f64>,
}

impl InMemorySource {
    #[must_use]
    pub fn new(data: Array3<f64>) -> Self {
        Self { data }
    }
}

impl SnapshotSource for InMemorySource {
    fn timestep_count(&self) -> Result<usize> {
        Ok(self.data.shape()[0])
    }

    fn read_chunk(&self, start: usize, end: usize) -> Result<Array3<f64>> {
        if start > end || end > self.data.shape()[0] {
            return Err(FieldIoError::config(format!(
                "Chunk {start}..{end} outside {} in-memory snapshots",
                self.data.shape()[0]
            )));
        }
        Ok(self.data.slice(s![start..end, .., ..]).to_owned())
    }

    fn label(&self) -> String {
        "in-memory".to_string()
    }
}
