//! Reader for multi-processor driver files
//!
//! A driver run writes one raw record file per y-rank and field code plus a
//! shared time file. The reader resolves the record layout once per call,
//! seeks every rank file to the requested record, and stitches the ranks back
//! into one global (y,z) array.
//!
//! Reads are all-or-nothing: a missing rank file or a short record fails the
//! whole call, no partially filled array is ever returned.

use crate::collate::StitchPlan;
use crate::decomposition::{Decomposition1d, GridShape};
use crate::errors::{FieldIoError, Result};
use crate::field::{driver_path, time_file_name, FieldCode, FieldKind};
use crate::record::{from_fortran_values, read_flat_values, RawRecordFile, VALUE_SIZE};
use ndarray::{ArrayD, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Record layout of one field in one rank file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub code: FieldCode,
    pub kind: FieldKind,
    /// `(local_y + 2*ghost_y, depth_z + 2*ghost_z, [components])`
    pub record_shape: Vec<usize>,
    /// Bytes per record
    pub record_size: usize,
}

impl FieldLayout {
    pub fn new(code: FieldCode, local_extent_y: usize, grid: &GridShape, scalar_count: usize) -> Result<Self> {
        let kind = code.kind(scalar_count);
        if kind.components() == Some(0) {
            return Err(FieldIoError::config(format!(
                "Field '{code}' needs a scalar count of at least 1"
            )));
        }
        let record_shape = kind.record_shape(&[local_extent_y + 2 * grid.ghost_y, grid.total_z()]);
        let record_size = record_shape.iter().product::<usize>() * VALUE_SIZE;
        Ok(Self {
            code,
            kind,
            record_shape,
            record_size,
        })
    }
}

/// Size information of one field, taken from its rank-0 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub record_size: usize,
    pub timestep_count: usize,
    pub file_size: u64,
}

/// Derives record size and timestep count of the file at `path`.
///
/// # Errors
///
/// Returns [`FieldIoError::FileNotFound`] if the file is absent.
pub fn field_info(path: &Path, layout: &FieldLayout) -> Result<FieldInfo> {
    let file = RawRecordFile::open(path, layout.record_size)?;
    Ok(FieldInfo {
        record_size: layout.record_size,
        timestep_count: file.record_count(),
        file_size: file.file_size(),
    })
}

/// Timestamps of a driver run, one per record slot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    times: Vec<f64>,
}

impl TimeSeries {
    #[must_use]
    pub fn new(times: Vec<f64>) -> Self {
        Self { times }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    /// First and last timestamp
    #[must_use]
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((*self.times.first()?, *self.times.last()?))
    }

    /// Sub-series for a timestep range
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        self.times
            .get(range.clone())
            .map(|s| Self::new(s.to_vec()))
            .ok_or_else(|| {
                FieldIoError::config(format!(
                    "Timestep range {range:?} outside time series of length {}",
                    self.times.len()
                ))
            })
    }
}

/// Which optional fields [`FieldReader::read_all_fields`] should load
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub temperature: bool,
    pub moisture: bool,
    pub scalars: bool,
    pub timestep_range: Option<Range<usize>>,
}

/// Collated fields of one run keyed by variable name
#[derive(Debug, Clone)]
pub struct DriverDataset {
    pub times: TimeSeries,
    pub fields: BTreeMap<&'static str, ArrayD<f64>>,
}

/// Reader bound to one directory, experiment and y-decomposition
#[derive(Debug, Clone)]
pub struct FieldReader {
    directory: PathBuf,
    experiment: u32,
    job: u32,
    grid: GridShape,
    decomposition: Decomposition1d,
    scalar_count: usize,
}

impl FieldReader {
    /// # Errors
    ///
    /// Returns [`FieldIoError::Configuration`] if `grid.width_y` is not
    /// divisible by `procy`; uneven splits are unsupported.
    pub fn new(directory: impl Into<PathBuf>, experiment: u32, grid: GridShape, procy: usize) -> Result<Self> {
        grid.validate()?;
        let decomposition = Decomposition1d::new(grid.width_y, procy, grid.ghost_y)?;
        Ok(Self {
            directory: directory.into(),
            experiment,
            job: experiment,
            grid,
            decomposition,
            scalar_count: 1,
        })
    }

    /// Use a different job number for the time file
    #[must_use]
    pub fn with_job(mut self, job: u32) -> Self {
        self.job = job;
        self
    }

    /// Number of components of the `s` field
    #[must_use]
    pub fn with_scalar_count(mut self, scalar_count: usize) -> Self {
        self.scalar_count = scalar_count;
        self
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub const fn experiment(&self) -> u32 {
        self.experiment
    }

    #[must_use]
    pub const fn grid(&self) -> &GridShape {
        &self.grid
    }

    #[must_use]
    pub const fn decomposition(&self) -> &Decomposition1d {
        &self.decomposition
    }

    #[must_use]
    pub const fn scalar_count(&self) -> usize {
        self.scalar_count
    }

    pub fn layout(&self, code: FieldCode) -> Result<FieldLayout> {
        FieldLayout::new(code, self.decomposition.local_extent(), &self.grid, self.scalar_count)
    }

    /// Path of the rank file for `code`
    #[must_use]
    pub fn rank_path(&self, code: FieldCode, rank: usize) -> PathBuf {
        driver_path(&self.directory, code, rank, self.experiment)
    }

    /// Record size and timestep count of `code`, from its rank-0 file
    pub fn get_field_info(&self, code: FieldCode) -> Result<FieldInfo> {
        let layout = self.layout(code)?;
        field_info(&self.rank_path(code, 0), &layout)
    }

    /// Shape of one stitched snapshot of `code`
    pub fn snapshot_shape(&self, code: FieldCode) -> Result<Vec<usize>> {
        let layout = self.layout(code)?;
        let mut shape = layout.record_shape;
        shape[0] = self.decomposition.padded_global_extent();
        Ok(shape)
    }

    /// Reads one timestep from every rank and stitches along y.
    ///
    /// # Errors
    ///
    /// [`FieldIoError::IncompleteRecord`] if any rank file is too short,
    /// including `timestep` one past the last record.
    pub fn read_single_timestep(&self, code: FieldCode, timestep: usize) -> Result<ArrayD<f64>> {
        let layout = self.layout(code)?;
        let plan = StitchPlan::for_decomposition(&self.decomposition)?;
        let mut files = self.open_rank_files(&layout)?;

        let mut output = ArrayD::<f64>::zeros(self.snapshot_shape(code)?);
        let parts = read_parts(&mut files, &layout, timestep)?;
        {
            let mut view = output.view_mut();
            for (rank, part) in parts.iter().enumerate() {
                plan.place(rank, &part.view(), &mut view, 0)?;
            }
        }
        Ok(output)
    }

    /// Reads timesteps `[start, end)` into a time-major array.
    ///
    /// The output is allocated once, sized for the requested range only;
    /// per-rank records are dropped as soon as they are placed.
    pub fn read_range(&self, code: FieldCode, start: usize, end: usize) -> Result<ArrayD<f64>> {
        if start > end {
            return Err(FieldIoError::config(format!(
                "Timestep range start {start} is after end {end}"
            )));
        }
        let layout = self.layout(code)?;
        let plan = StitchPlan::for_decomposition(&self.decomposition)?;
        let mut files = self.open_rank_files(&layout)?;
        // Size the output only after every rank file holds the whole range
        for file in &files {
            file.ensure_records(end)?;
        }

        info!(
            field = %code,
            ranks = files.len(),
            start,
            end,
            "reading driver field range"
        );

        let mut shape = vec![end - start];
        shape.extend(self.snapshot_shape(code)?);
        let mut output = ArrayD::<f64>::zeros(shape);

        for timestep in start..end {
            let parts = read_parts(&mut files, &layout, timestep)?;
            let mut slot = output.index_axis_mut(Axis(0), timestep - start);
            for (rank, part) in parts.iter().enumerate() {
                plan.place(rank, &part.view(), &mut slot, 0)?;
            }
        }

        debug!(field = %code, shape = ?output.shape(), "collated driver field");
        Ok(output)
    }

    /// Path of the companion time file
    #[must_use]
    pub fn time_path(&self) -> PathBuf {
        self.directory.join(time_file_name(self.job))
    }

    /// Reads the companion time file as a flat sequence of doubles
    pub fn read_time_file(&self) -> Result<TimeSeries> {
        let path = self.time_path();
        let times = read_flat_values(&path)?;
        info!(path = %path.display(), count = times.len(), "read time stamps");
        Ok(TimeSeries::new(times))
    }

    /// Reads the time file and the velocity fields, plus optional fields
    pub fn read_all_fields(&self, options: &ReadOptions) -> Result<DriverDataset> {
        let times = self.read_time_file()?;
        let range = options.timestep_range.clone().unwrap_or(0..times.len());

        let mut codes = vec![FieldCode::U, FieldCode::V, FieldCode::W];
        if options.temperature {
            codes.push(FieldCode::H);
        }
        if options.moisture {
            codes.push(FieldCode::Q);
        }
        if options.scalars && self.scalar_count > 0 {
            codes.push(FieldCode::S);
        }

        let mut fields = BTreeMap::new();
        for code in codes {
            let data = self.read_range(code, range.start, range.end)?;
            fields.insert(code.name(), data);
        }

        Ok(DriverDataset {
            times: times.slice(range)?,
            fields,
        })
    }

    fn open_rank_files(&self, layout: &FieldLayout) -> Result<Vec<RawRecordFile>> {
        self.decomposition
            .sub_domains()
            .iter()
            .map(|sub| RawRecordFile::open(&self.rank_path(layout.code, sub.rank), layout.record_size))
            .collect()
    }
}

/// One record per rank file, read in parallel and reshaped column-major
fn read_parts(files: &mut [RawRecordFile], layout: &FieldLayout, timestep: usize) -> Result<Vec<ArrayD<f64>>> {
    files
        .par_iter_mut()
        .map(|file| {
            let values = file.read_record(timestep)?;
            from_fortran_values(&layout.record_shape, values)
        })
        .collect()
}
