//! Per-cell running mean and variance (Welford's online update)
//!
//! Each (y,z) cell keeps its own state, so rounding error does not grow with
//! the number of snapshots the way a single-pass sum of squares does.

use crate::errors::{FieldIoError, Result};
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis, Zip};

/// Running state over a 2D (y,z) profile
#[derive(Debug, Clone, PartialEq)]
pub struct StatAccumulator {
    count: u64,
    mean: Array2<f64>,
    sum_sq_dev: Array2<f64>,
}

impl StatAccumulator {
    /// Empty state for `(ny, nz)` snapshots
    #[must_use]
    pub fn new(ny: usize, nz: usize) -> Self {
        Self {
            count: 0,
            mean: Array2::zeros((ny, nz)),
            sum_sq_dev: Array2::zeros((ny, nz)),
        }
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.mean.dim()
    }

    /// Running mean per cell
    #[must_use]
    pub fn mean(&self) -> &Array2<f64> {
        &self.mean
    }

    /// Population variance per cell, `None` before the first snapshot
    #[must_use]
    pub fn variance(&self) -> Option<Array2<f64>> {
        if self.count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        Some(self.sum_sq_dev.mapv(|m2| m2 / n))
    }

    /// Folds one snapshot into the state, every cell independently.
    pub fn update(&mut self, snapshot: &ArrayView2<'_, f64>) -> Result<()> {
        if snapshot.dim() != self.mean.dim() {
            return Err(FieldIoError::Statistics(format!(
                "Snapshot shape {:?} does not match accumulator shape {:?}",
                snapshot.dim(),
                self.mean.dim()
            )));
        }

        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;

        Zip::from(&mut self.mean)
            .and(&mut self.sum_sq_dev)
            .and(snapshot)
            .par_for_each(|mean, m2, &sample| {
                let delta = sample - *mean;
                *mean += delta / n;
                *m2 += delta * (sample - *mean);
            });
        Ok(())
    }

    /// Folds a time-major `(t, y, z)` chunk, snapshot by snapshot
    pub fn update_chunk(&mut self, chunk: &ArrayView3<'_, f64>) -> Result<()> {
        for snapshot in chunk.axis_iter(Axis(0)) {
            self.update(&snapshot)?;
        }
        Ok(())
    }

    /// Finalises with the span-wise (y) reduction
    pub fn finish(self) -> Result<StatProfiles> {
        self.finish_along(0)
    }

    /// Finalises, averaging the per-cell mean and variance along `axis`.
    ///
    /// The profile RMS is the square root of the averaged variance. Non-finite
    /// cells propagate into the profiles.
    pub fn finish_along(self, axis: usize) -> Result<StatProfiles> {
        let variance = self
            .variance()
            .ok_or_else(|| FieldIoError::Statistics("No snapshots were accumulated".to_string()))?;
        let rms = variance.mapv(f64::sqrt);

        let mean_profile = lane_mean(&self.mean, axis)?;
        let rms_profile = lane_mean(&variance, axis)?.mapv(f64::sqrt);

        Ok(StatProfiles {
            count: self.count,
            mean: self.mean,
            variance,
            rms,
            mean_profile,
            rms_profile,
        })
    }
}

/// Arithmetic mean of every lane along `axis`, one rayon task per lane
fn lane_mean(field: &Array2<f64>, axis: usize) -> Result<Array1<f64>> {
    if axis >= field.ndim() {
        return Err(FieldIoError::Statistics(format!(
            "Axis {axis} is out of bounds for a profile with {} dimensions",
            field.ndim()
        )));
    }
    let len = field.len_of(Axis(axis));
    if len == 0 {
        return Err(FieldIoError::Statistics(format!("Axis {axis} has no cells to average")));
    }
    #[allow(clippy::cast_precision_loss)]
    let n = len as f64;
    Ok(Zip::from(field.lanes(Axis(axis))).par_map_collect(|lane| lane.sum() / n))
}

/// Finalised statistics of one field
#[derive(Debug, Clone, PartialEq)]
pub struct StatProfiles {
    /// Number of snapshots folded in
    pub count: u64,
    /// Per-cell mean
    pub mean: Array2<f64>,
    /// Per-cell population variance
    pub variance: Array2<f64>,
    /// Per-cell RMS fluctuation
    pub rms: Array2<f64>,
    /// Mean averaged over the reduced axis
    pub mean_profile: Array1<f64>,
    /// Square root of the variance averaged over the reduced axis
    pub rms_profile: Array1<f64>,
}
