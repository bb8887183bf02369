//! Halo-aware splitting and stitching of sub-domain arrays
//!
//! Neighbouring sub-domains overlap by `2 * halo` cells along the decomposed
//! axis: the trailing halo of rank `r` holds the same cells as the first
//! owned cells of rank `r + 1`, and vice versa. Reassembly therefore keeps the
//! whole first sub-domain and drops the leading `2 * halo` cells of every
//! later one. The stitched axis is `global + 2 * halo` long and still carries
//! one halo layer at each outer end, exactly as a single-rank run would.

use crate::decomposition::Decomposition1d;
use crate::errors::{FieldIoError, Result};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, Slice};
use std::ops::Range;

/// Where one sub-domain's cells land in the stitched axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seam {
    /// Kept index range within the sub-domain (halo included)
    pub keep: Range<usize>,
    /// Destination index range within the stitched axis
    pub target: Range<usize>,
}

/// Precomputed seams for a uniform 1D decomposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchPlan {
    halo: usize,
    padded_local: usize,
    seams: Vec<Seam>,
}

impl StitchPlan {
    pub fn new(count: usize, local_extent: usize, halo: usize) -> Result<Self> {
        if count == 0 || local_extent == 0 {
            return Err(FieldIoError::config(format!(
                "Cannot stitch {count} sub-domains of extent {local_extent}"
            )));
        }
        let padded_local = local_extent + 2 * halo;
        let seams = (0..count)
            .map(|rank| {
                let skip = if rank == 0 { 0 } else { 2 * halo };
                let offset = rank * local_extent;
                Seam {
                    keep: skip..padded_local,
                    target: offset + skip..offset + padded_local,
                }
            })
            .collect();

        Ok(Self {
            halo,
            padded_local,
            seams,
        })
    }

    pub fn for_decomposition(decomposition: &Decomposition1d) -> Result<Self> {
        Self::new(
            decomposition.count(),
            decomposition.local_extent(),
            decomposition.halo(),
        )
    }

    #[must_use]
    pub fn seams(&self) -> &[Seam] {
        &self.seams
    }

    #[must_use]
    pub const fn halo(&self) -> usize {
        self.halo
    }

    /// Stored extent of every part along the stitched axis
    #[must_use]
    pub const fn padded_local(&self) -> usize {
        self.padded_local
    }

    /// Length of the stitched axis
    #[must_use]
    pub fn stitched_extent(&self) -> usize {
        self.seams.last().map_or(0, |seam| seam.target.end)
    }

    /// Copy the kept cells of part `rank` into `output` along `axis`.
    pub fn place(
        &self,
        rank: usize,
        part: &ArrayViewD<'_, f64>,
        output: &mut ArrayViewMutD<'_, f64>,
        axis: usize,
    ) -> Result<()> {
        let seam = self.seams.get(rank).ok_or_else(|| {
            FieldIoError::config(format!("Rank {rank} outside a {}-way plan", self.seams.len()))
        })?;
        check_axis(part.ndim(), axis)?;
        if part.len_of(Axis(axis)) != self.padded_local {
            return Err(FieldIoError::config(format!(
                "Part {rank} has extent {} along axis {axis}, expected {}",
                part.len_of(Axis(axis)),
                self.padded_local
            )));
        }

        let source = part.slice_axis(Axis(axis), Slice::from(seam.keep.clone()));
        let mut target = output.slice_axis_mut(Axis(axis), Slice::from(seam.target.clone()));
        if source.shape() != target.shape() {
            return Err(FieldIoError::config(format!(
                "Part {rank} shape {:?} does not fit output slot {:?}",
                source.shape(),
                target.shape()
            )));
        }
        target.assign(&source);
        Ok(())
    }
}

/// Stitches per-rank parts (in rank order) along `axis`.
///
/// Every part must have the same extent along `axis`, at least `2 * halo`
/// plus one cell.
pub fn stitch_along_axis(
    parts: &[ArrayViewD<'_, f64>],
    axis: usize,
    halo: usize,
) -> Result<ArrayD<f64>> {
    let first = parts
        .first()
        .ok_or_else(|| FieldIoError::config("No sub-domain parts to stitch"))?;
    check_axis(first.ndim(), axis)?;

    let padded_local = first.len_of(Axis(axis));
    let local_extent = padded_local.saturating_sub(2 * halo);
    let plan = StitchPlan::new(parts.len(), local_extent, halo)?;

    let mut shape = first.shape().to_vec();
    shape[axis] = plan.stitched_extent();
    let mut output = ArrayD::<f64>::zeros(shape);
    {
        let mut view = output.view_mut();
        for (rank, part) in parts.iter().enumerate() {
            plan.place(rank, part, &mut view, axis)?;
        }
    }
    Ok(output)
}

/// Slices a halo-padded global array into per-rank parts along `axis`.
///
/// This is the inverse of [`stitch_along_axis`] for consistent halos.
pub fn split_with_halo(
    global: &ArrayViewD<'_, f64>,
    axis: usize,
    decomposition: &Decomposition1d,
) -> Result<Vec<ArrayD<f64>>> {
    check_axis(global.ndim(), axis)?;
    let expected = decomposition.padded_global_extent();
    if global.len_of(Axis(axis)) != expected {
        return Err(FieldIoError::config(format!(
            "Global extent {} along axis {axis} does not match decomposition extent {expected}",
            global.len_of(Axis(axis))
        )));
    }

    Ok(decomposition
        .sub_domains()
        .iter()
        .map(|sub| {
            global
                .slice_axis(Axis(axis), Slice::from(sub.padded_range(decomposition.halo())))
                .to_owned()
        })
        .collect())
}

fn check_axis(ndim: usize, axis: usize) -> Result<()> {
    if axis >= ndim {
        return Err(FieldIoError::config(format!(
            "Axis {axis} is out of bounds for array with {ndim} dimensions"
        )));
    }
    Ok(())
}
