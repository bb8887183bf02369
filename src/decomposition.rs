//! Domain decomposition and ghost-halo model
//!
//! Pure data describing how a global (y,z) driver grid or (x,y,z) restart grid
//! is split into sub-domains. Every sub-domain owns a contiguous index range
//! along each decomposed axis and stores `halo` extra cells on both sides.
//! Nothing here touches the filesystem.

use crate::errors::{FieldIoError, Result};
use serde::{Deserialize, Serialize};

/// Shape of a 2D (y,z) driver-plane grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Logical number of cells along y (all ranks together)
    pub width_y: usize,
    /// Logical number of cells along z
    pub depth_z: usize,
    /// Ghost cells on each end of the y axis
    pub ghost_y: usize,
    /// Ghost cells on each end of the z axis
    pub ghost_z: usize,
}

impl GridShape {
    /// Create a grid shape, rejecting empty extents
    pub fn new(width_y: usize, depth_z: usize, ghost_y: usize, ghost_z: usize) -> Result<Self> {
        let shape = Self {
            width_y,
            depth_z,
            ghost_y,
            ghost_z,
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Grid with the solver's customary single-cell halo on both axes
    pub fn with_unit_halo(width_y: usize, depth_z: usize) -> Result<Self> {
        Self::new(width_y, depth_z, 1, 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width_y == 0 || self.depth_z == 0 {
            return Err(FieldIoError::config(format!(
                "Grid extents must be positive, got width_y={} depth_z={}",
                self.width_y, self.depth_z
            )));
        }
        Ok(())
    }

    /// Total y extent including both halos
    #[must_use]
    pub const fn total_y(&self) -> usize {
        self.width_y + 2 * self.ghost_y
    }

    /// Total z extent including both halos
    #[must_use]
    pub const fn total_z(&self) -> usize {
        self.depth_z + 2 * self.ghost_z
    }
}

/// Shape of a 3D (x,y,z) restart grid
///
/// Halo-carrying restart fields are `(nx + 2ih, ny + 2jh, nz + kh)`: the
/// vertical axis only carries a top halo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape3 {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub ih: usize,
    pub jh: usize,
    pub kh: usize,
}

impl GridShape3 {
    pub fn new(nx: usize, ny: usize, nz: usize, ih: usize, jh: usize, kh: usize) -> Result<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(FieldIoError::config(format!(
                "Grid extents must be positive, got ({nx}, {ny}, {nz})"
            )));
        }
        Ok(Self {
            nx,
            ny,
            nz,
            ih,
            jh,
            kh,
        })
    }

    /// Grid with unit halos on every axis
    pub fn with_unit_halo(nx: usize, ny: usize, nz: usize) -> Result<Self> {
        Self::new(nx, ny, nz, 1, 1, 1)
    }

    /// Logical extents without any halo
    #[must_use]
    pub const fn interior(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Extents of a halo-carrying global field
    #[must_use]
    pub const fn with_halo(&self) -> [usize; 3] {
        [
            self.nx + 2 * self.ih,
            self.ny + 2 * self.jh,
            self.nz + self.kh,
        ]
    }
}

/// Splits `global_extent` evenly over `count` sub-domains.
///
/// # Errors
///
/// Returns [`FieldIoError::Configuration`] if `count` is zero or does not
/// divide `global_extent` exactly.
pub fn local_extent(global_extent: usize, count: usize) -> Result<usize> {
    if count == 0 {
        return Err(FieldIoError::config("Sub-domain count must be at least 1"));
    }
    if global_extent % count != 0 {
        return Err(FieldIoError::config(format!(
            "Global extent {global_extent} is not divisible by sub-domain count {count}"
        )));
    }
    let local = global_extent / count;
    if local == 0 {
        return Err(FieldIoError::config(format!(
            "Global extent {global_extent} is too small for {count} sub-domains"
        )));
    }
    Ok(local)
}

/// One sub-domain of a 1D decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubDomain {
    pub rank: usize,
    /// First owned logical index (halo excluded)
    pub offset: usize,
    pub local_extent: usize,
}

impl SubDomain {
    /// Index range of this sub-domain inside a halo-padded global axis
    #[must_use]
    pub const fn padded_range(&self, halo: usize) -> std::ops::Range<usize> {
        self.offset..self.offset + self.local_extent + 2 * halo
    }
}

/// Uniform split of one axis (y for driver files)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition1d {
    global_extent: usize,
    halo: usize,
    sub_domains: Vec<SubDomain>,
}

impl Decomposition1d {
    pub fn new(global_extent: usize, count: usize, halo: usize) -> Result<Self> {
        let local = local_extent(global_extent, count)?;
        let sub_domains = (0..count)
            .map(|rank| SubDomain {
                rank,
                offset: rank * local,
                local_extent: local,
            })
            .collect();

        Ok(Self {
            global_extent,
            halo,
            sub_domains,
        })
    }

    #[must_use]
    pub const fn global_extent(&self) -> usize {
        self.global_extent
    }

    #[must_use]
    pub const fn halo(&self) -> usize {
        self.halo
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.sub_domains.len()
    }

    /// Owned extent per sub-domain (identical for every rank)
    #[must_use]
    pub fn local_extent(&self) -> usize {
        self.global_extent / self.sub_domains.len()
    }

    /// Extent stored per sub-domain, halos included
    #[must_use]
    pub fn padded_local_extent(&self) -> usize {
        self.local_extent() + 2 * self.halo
    }

    /// Extent of the reassembled global axis, outer halos included
    #[must_use]
    pub const fn padded_global_extent(&self) -> usize {
        self.global_extent + 2 * self.halo
    }

    #[must_use]
    pub fn sub_domains(&self) -> &[SubDomain] {
        &self.sub_domains
    }
}

/// One sub-domain of a 2D (x,y) decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubDomain2d {
    pub rank_x: usize,
    pub rank_y: usize,
    pub x_offset: usize,
    pub y_offset: usize,
    pub local_extent_x: usize,
    pub local_extent_y: usize,
}

/// Uniform split of the (x,y) plane, ranks assigned row-major over (x,y)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition2d {
    procx: usize,
    procy: usize,
    sub_domains: Vec<SubDomain2d>,
}

impl Decomposition2d {
    pub fn new(nx: usize, ny: usize, procx: usize, procy: usize) -> Result<Self> {
        let local_x = local_extent(nx, procx)?;
        let local_y = local_extent(ny, procy)?;

        let mut sub_domains = Vec::with_capacity(procx * procy);
        for rank_x in 0..procx {
            for rank_y in 0..procy {
                sub_domains.push(SubDomain2d {
                    rank_x,
                    rank_y,
                    x_offset: rank_x * local_x,
                    y_offset: rank_y * local_y,
                    local_extent_x: local_x,
                    local_extent_y: local_y,
                });
            }
        }

        Ok(Self {
            procx,
            procy,
            sub_domains,
        })
    }

    /// Decomposition of a restart grid
    pub fn for_grid(grid: &GridShape3, procx: usize, procy: usize) -> Result<Self> {
        Self::new(grid.nx, grid.ny, procx, procy)
    }

    #[must_use]
    pub const fn procx(&self) -> usize {
        self.procx
    }

    #[must_use]
    pub const fn procy(&self) -> usize {
        self.procy
    }

    #[must_use]
    pub const fn rank_of(&self, rank_x: usize, rank_y: usize) -> usize {
        rank_x * self.procy + rank_y
    }

    /// Sub-domains in rank order (x-rank outer, y-rank inner)
    #[must_use]
    pub fn sub_domains(&self) -> &[SubDomain2d] {
        &self.sub_domains
    }
}

/// Chooses a `(procx, procy)` processor grid for `n` ranks.
///
/// Perfect squares split evenly. Otherwise the powers of two below `n` that
/// divide it are collected and the middle one becomes `procx`.
pub fn factor_processors(n: usize) -> Result<(usize, usize)> {
    if n == 0 {
        return Err(FieldIoError::config("Processor count must be at least 1"));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let root = (n as f64).sqrt().round() as usize;
    if root * root == n {
        return Ok((root, root));
    }

    let mut factors = Vec::new();
    let mut power = 2_usize;
    while power < n {
        if n % power == 0 {
            factors.push(power);
        }
        power *= 2;
    }

    let procx = *factors.get(factors.len() / 2).ok_or_else(|| {
        FieldIoError::config(format!("{n} processors cannot be split into a power-of-two grid"))
    })?;
    Ok((procx, n / procx))
}

/// Picks the point count, a multiple of `divisor`, whose spacing over
/// `length` is closest to `target_delta`.
///
/// Candidates are the `search_range` multiples on either side of the ideal
/// count; the first candidate wins ties.
pub fn optimal_point_count(
    length: f64,
    target_delta: f64,
    divisor: usize,
    search_range: usize,
) -> Result<usize> {
    if divisor == 0 || !(target_delta > 0.0) || !(length > 0.0) {
        return Err(FieldIoError::config(format!(
            "Invalid point-count request: length={length}, delta={target_delta}, divisor={divisor}"
        )));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let base = ((length / target_delta) / divisor as f64).floor() as usize;
    let lower = base.saturating_sub(search_range).max(1);

    let mut best: Option<(usize, f64)> = None;
    for multiple in lower..=base + search_range {
        let candidate = multiple * divisor;
        #[allow(clippy::cast_precision_loss)]
        let error = (length / candidate as f64 - target_delta).abs();
        if best.map_or(true, |(_, best_error)| error < best_error) {
            best = Some((candidate, error));
        }
    }

    best.map(|(n, _)| n)
        .ok_or_else(|| FieldIoError::config("No candidate point count in search range"))
}

/// Rounds `value` to the nearest integer multiple of `multiple`
#[must_use]
pub fn round_to_multiple(value: f64, multiple: f64) -> f64 {
    multiple * (value / multiple).round()
}
