//! Restart-file writer
//!
//! Re-partitions global 3D fields over a `procx × procy` decomposition and
//! writes one `initd…` file per sub-domain holding bracketed records in the
//! solver's fixed field order:
//!
//! 1. `mindist` (no halo)
//! 2. `wall` (no halo, trailing component axis)
//! 3. `u0 v0 w0 pres0 thl0 e120 ekm qt0 ql0 ql0h` (with halo)
//! 4. `[timee, dt]`
//!
//! With scalars configured, a sibling `inits…` file holds `sv0` followed by a
//! single `[timee]` record.
//!
//! All validation happens before the first file is opened.

use crate::decomposition::{Decomposition2d, GridShape3, SubDomain2d};
use crate::errors::{FieldIoError, Result};
use crate::field::{restart_file_name, scalar_restart_file_name};
use crate::record::BracketedWriter;
use ndarray::{ArrayD, Axis, Slice};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Halo-carrying fields in file order
pub const HALO_FIELDS: [&str; 10] = [
    "u0", "v0", "w0", "pres0", "thl0", "e120", "ekm", "qt0", "ql0", "ql0h",
];

/// Minimum-wall-distance field (no halo)
pub const MINDIST: &str = "mindist";

/// Wall-function field (no halo, component axis)
pub const WALL: &str = "wall";

/// Scalar field of the `inits…` file
pub const SCALARS: &str = "sv0";

/// Components of the `wall` field written by the solver
pub const DEFAULT_WALL_COMPONENTS: usize = 5;

/// What to do about mandatory fields the caller did not supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Fail with [`FieldIoError::MissingField`]
    #[default]
    Strict,
    /// Write zeros
    Zeros,
    /// Write the solver's customary initial constants
    Defaults,
}

impl FillPolicy {
    fn fill_value(self, field: &str) -> Option<f64> {
        match self {
            Self::Strict => None,
            Self::Zeros => Some(0.0),
            Self::Defaults => Some(default_value(field)),
        }
    }
}

/// Customary initial value of a restart field
#[must_use]
pub fn default_value(field: &str) -> f64 {
    match field {
        "thl0" => 288.0,
        "qt0" | "e120" => 0.01,
        "ekm" => 1e-5,
        _ => 0.0,
    }
}

/// Named global arrays plus the time trailer
#[derive(Debug, Clone, Default)]
pub struct RestartFields {
    arrays: BTreeMap<String, ArrayD<f64>>,
    pub timee: Option<f64>,
    pub dt: Option<f64>,
}

impl RestartFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set simulation time and timestep size
    #[must_use]
    pub fn with_time(mut self, timee: f64, dt: f64) -> Self {
        self.timee = Some(timee);
        self.dt = Some(dt);
        self
    }

    /// Add or replace a field
    pub fn insert(&mut self, name: impl Into<String>, array: ArrayD<f64>) -> &mut Self {
        self.arrays.insert(name.into(), array);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.arrays.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }
}

/// Copy of `fields` with every NaN and infinity replaced by zero
#[must_use]
pub fn sanitize_fields(fields: &RestartFields) -> RestartFields {
    let arrays = fields
        .arrays
        .iter()
        .map(|(name, array)| {
            let cleaned = array.mapv(|x| if x.is_finite() { x } else { 0.0 });
            (name.clone(), cleaned)
        })
        .collect();

    RestartFields {
        arrays,
        timee: fields.timee,
        dt: fields.dt,
    }
}

/// Files produced by one [`RestartWriter::write`] call, in rank order
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Given(&'a ArrayD<f64>),
    Constant(f64),
}

/// Fields resolved against the layout, ready to slice
#[derive(Debug)]
struct ResolvedFields<'a> {
    mindist: Source<'a>,
    wall: Source<'a>,
    halo: Vec<Source<'a>>,
    scalars: Option<Source<'a>>,
    timee: f64,
    dt: f64,
}

/// Writer of restart files for one grid and decomposition
#[derive(Debug, Clone)]
pub struct RestartWriter {
    grid: GridShape3,
    decomposition: Decomposition2d,
    wall_components: usize,
    scalar_count: usize,
    fill: FillPolicy,
}

impl RestartWriter {
    /// # Errors
    ///
    /// [`FieldIoError::Configuration`] unless `nx % procx == 0` and
    /// `ny % procy == 0`.
    pub fn new(grid: GridShape3, procx: usize, procy: usize) -> Result<Self> {
        let decomposition = Decomposition2d::for_grid(&grid, procx, procy)?;
        Ok(Self {
            grid,
            decomposition,
            wall_components: DEFAULT_WALL_COMPONENTS,
            scalar_count: 0,
            fill: FillPolicy::Strict,
        })
    }

    #[must_use]
    pub fn with_scalar_count(mut self, scalar_count: usize) -> Self {
        self.scalar_count = scalar_count;
        self
    }

    #[must_use]
    pub fn with_wall_components(mut self, wall_components: usize) -> Self {
        self.wall_components = wall_components;
        self
    }

    #[must_use]
    pub fn with_fill_policy(mut self, fill: FillPolicy) -> Self {
        self.fill = fill;
        self
    }

    #[must_use]
    pub const fn decomposition(&self) -> &Decomposition2d {
        &self.decomposition
    }

    /// Global shape the writer expects for a field
    #[must_use]
    pub fn expected_shape(&self, field: &str) -> Option<Vec<usize>> {
        let [nx, ny, nz] = self.grid.interior();
        match field {
            MINDIST => Some(vec![nx, ny, nz]),
            WALL => Some(vec![nx, ny, nz, self.wall_components]),
            SCALARS => {
                let mut shape = self.grid.with_halo().to_vec();
                shape.push(self.scalar_count);
                Some(shape)
            }
            name if HALO_FIELDS.contains(&name) => Some(self.grid.with_halo().to_vec()),
            _ => None,
        }
    }

    /// Writes one restart file per sub-domain (plus scalar files).
    ///
    /// # Errors
    ///
    /// [`FieldIoError::MissingField`] for an absent mandatory field under
    /// [`FillPolicy::Strict`], or for absent `timee`/`dt` under any policy;
    /// [`FieldIoError::Configuration`] for a wrongly shaped field. Nothing is
    /// written in either case.
    pub fn write(
        &self,
        fields: &RestartFields,
        output_dir: &Path,
        run: u32,
        experiment: u32,
    ) -> Result<WriteReport> {
        let resolved = self.resolve(fields)?;

        fs::create_dir_all(output_dir)?;

        let per_rank: Vec<Vec<PathBuf>> = self
            .decomposition
            .sub_domains()
            .par_iter()
            .map(|sub| self.write_sub_domain(&resolved, sub, output_dir, run, experiment))
            .collect::<Result<_>>()?;

        let files: Vec<PathBuf> = per_rank.into_iter().flatten().collect();
        info!(
            count = files.len(),
            directory = %output_dir.display(),
            "wrote restart files"
        );
        Ok(WriteReport { files })
    }

    fn resolve<'a>(&self, fields: &'a RestartFields) -> Result<ResolvedFields<'a>> {
        let timee = fields.timee.ok_or_else(|| missing("timee"))?;
        let dt = fields.dt.ok_or_else(|| missing("dt"))?;

        let mindist = self.resolve_field(fields, MINDIST)?;
        let wall = self.resolve_field(fields, WALL)?;
        let halo = HALO_FIELDS
            .iter()
            .map(|name| self.resolve_field(fields, name))
            .collect::<Result<Vec<_>>>()?;
        let scalars = if self.scalar_count > 0 {
            Some(self.resolve_field(fields, SCALARS)?)
        } else {
            None
        };

        Ok(ResolvedFields {
            mindist,
            wall,
            halo,
            scalars,
            timee,
            dt,
        })
    }

    fn resolve_field<'a>(&self, fields: &'a RestartFields, name: &str) -> Result<Source<'a>> {
        let expected = self
            .expected_shape(name)
            .ok_or_else(|| FieldIoError::config(format!("'{name}' is not a restart field")))?;

        match fields.get(name) {
            Some(array) => {
                let fits = if name == SCALARS {
                    array.ndim() == 4
                        && array.shape()[..3] == expected[..3]
                        && array.shape()[3] >= self.scalar_count
                } else {
                    array.shape() == expected.as_slice()
                };
                if !fits {
                    return Err(FieldIoError::config(format!(
                        "Field '{name}' has shape {:?}, expected {expected:?}",
                        array.shape()
                    )));
                }
                Ok(Source::Given(array))
            }
            None => self
                .fill
                .fill_value(name)
                .map(Source::Constant)
                .ok_or_else(|| missing(name)),
        }
    }

    fn write_sub_domain(
        &self,
        fields: &ResolvedFields<'_>,
        sub: &SubDomain2d,
        output_dir: &Path,
        run: u32,
        experiment: u32,
    ) -> Result<Vec<PathBuf>> {
        let GridShape3 { nz, ih, jh, kh, .. } = self.grid;
        let (lx, ly) = (sub.local_extent_x, sub.local_extent_y);
        let interior = Block {
            x: sub.x_offset..sub.x_offset + lx,
            y: sub.y_offset..sub.y_offset + ly,
            shape: vec![lx, ly, nz],
        };
        let padded = Block {
            x: sub.x_offset..sub.x_offset + lx + 2 * ih,
            y: sub.y_offset..sub.y_offset + ly + 2 * jh,
            shape: vec![lx + 2 * ih, ly + 2 * jh, nz + kh],
        };

        let path = output_dir.join(restart_file_name(run, sub.rank_x, sub.rank_y, experiment));
        let mut out = BracketedWriter::create(&path)?;
        write_block(&mut out, fields.mindist, &interior, None)?;
        write_block(&mut out, fields.wall, &interior, Some(self.wall_components))?;
        for source in &fields.halo {
            write_block(&mut out, *source, &padded, None)?;
        }
        out.write_values(&[fields.timee, fields.dt])?;
        let mut written = vec![out.finish()?];
        debug!(path = %path.display(), "written restart file");

        if let Some(scalars) = fields.scalars {
            let path = output_dir.join(scalar_restart_file_name(run, sub.rank_x, sub.rank_y, experiment));
            let mut out = BracketedWriter::create(&path)?;
            write_block(&mut out, scalars, &padded, Some(self.scalar_count))?;
            out.write_values(&[fields.timee])?;
            written.push(out.finish()?);
            debug!(path = %path.display(), "written scalar restart file");
        }

        Ok(written)
    }
}

/// Index window of one sub-domain in the global (x,y) plane
struct Block {
    x: Range<usize>,
    y: Range<usize>,
    /// Local spatial shape
    shape: Vec<usize>,
}

fn write_block(
    out: &mut BracketedWriter,
    source: Source<'_>,
    block: &Block,
    components: Option<usize>,
) -> Result<()> {
    match source {
        Source::Given(array) => {
            let mut view = array.view();
            view.slice_axis_inplace(Axis(0), Slice::from(block.x.clone()));
            view.slice_axis_inplace(Axis(1), Slice::from(block.y.clone()));
            if let Some(n) = components {
                view.slice_axis_inplace(Axis(3), Slice::from(0..n));
            }
            out.write_array(&view)
        }
        Source::Constant(value) => {
            let len = block.shape.iter().product::<usize>() * components.unwrap_or(1);
            out.write_values(&vec![value; len])
        }
    }
}

fn missing(field: &str) -> FieldIoError {
    FieldIoError::MissingField {
        field: field.to_string(),
    }
}
