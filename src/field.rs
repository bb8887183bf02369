//! Field codes, field kinds and the on-disk naming convention
//!
//! Driver files are keyed by a one-letter field code. The code decides the
//! record layout through a static table, resolved once per read instead of
//! being re-checked inside the record loops.

use crate::errors::{FieldIoError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Layout class of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 2D (y,z) plane, one value per cell
    Plane,
    /// 3D (x,y,z) volume, one value per cell
    Volume,
    /// Trailing component axis of the given length
    MultiComponent(usize),
}

impl FieldKind {
    /// Length of the trailing component axis, if any
    #[must_use]
    pub const fn components(self) -> Option<usize> {
        match self {
            Self::MultiComponent(n) => Some(n),
            Self::Plane | Self::Volume => None,
        }
    }

    /// Full record shape given the spatial extents
    #[must_use]
    pub fn record_shape(self, spatial: &[usize]) -> Vec<usize> {
        let mut shape = spatial.to_vec();
        if let Some(n) = self.components() {
            shape.push(n);
        }
        shape
    }
}

/// Driver-file field codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCode {
    /// Streamwise velocity
    U,
    /// Spanwise velocity
    V,
    /// Vertical velocity
    W,
    /// Liquid-water potential temperature
    H,
    /// Total specific humidity
    Q,
    /// Passive scalars, one component per scalar
    S,
}

struct FieldEntry {
    code: FieldCode,
    letter: char,
    name: &'static str,
    multi_component: bool,
}

const FIELD_TABLE: [FieldEntry; 6] = [
    FieldEntry { code: FieldCode::U, letter: 'u', name: "u", multi_component: false },
    FieldEntry { code: FieldCode::V, letter: 'v', name: "v", multi_component: false },
    FieldEntry { code: FieldCode::W, letter: 'w', name: "w", multi_component: false },
    FieldEntry { code: FieldCode::H, letter: 'h', name: "thl", multi_component: false },
    FieldEntry { code: FieldCode::Q, letter: 'q', name: "qt", multi_component: false },
    FieldEntry { code: FieldCode::S, letter: 's', name: "sv", multi_component: true },
];

impl FieldCode {
    /// Every driver field code, in table order
    pub const ALL: [Self; 6] = [Self::U, Self::V, Self::W, Self::H, Self::Q, Self::S];

    fn entry(self) -> &'static FieldEntry {
        // The table holds one entry per variant in declaration order.
        &FIELD_TABLE[self as usize]
    }

    /// One-letter code used in file names
    #[must_use]
    pub fn letter(self) -> char {
        self.entry().letter
    }

    /// Conventional variable name of the field
    #[must_use]
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Resolve the record layout; `scalar_count` only matters for `s`
    #[must_use]
    pub fn kind(self, scalar_count: usize) -> FieldKind {
        if self.entry().multi_component {
            FieldKind::MultiComponent(scalar_count)
        } else {
            FieldKind::Plane
        }
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for FieldCode {
    type Err = FieldIoError;

    fn from_str(s: &str) -> Result<Self> {
        FIELD_TABLE
            .iter()
            .find(|e| (s.len() == 1 && s.starts_with(e.letter)) || s == e.name)
            .map(|e| e.code)
            .ok_or_else(|| FieldIoError::config(format!("Unknown field code '{s}'")))
    }
}

/// `<code>driver_<rank>.<exp>`
#[must_use]
pub fn driver_file_name(code: FieldCode, rank: usize, experiment: u32) -> String {
    format!("{}driver_{rank:03}.{experiment:03}", code.letter())
}

/// `tdriver_000.<job>`
#[must_use]
pub fn time_file_name(job: u32) -> String {
    format!("tdriver_000.{job:03}")
}

/// `initd<run>_<rankx>_<ranky>.<exp>`
#[must_use]
pub fn restart_file_name(run: u32, rank_x: usize, rank_y: usize, experiment: u32) -> String {
    format!("initd{run:08}_{rank_x:03}_{rank_y:03}.{experiment:03}")
}

/// `inits<run>_<rankx>_<ranky>.<exp>`
#[must_use]
pub fn scalar_restart_file_name(run: u32, rank_x: usize, rank_y: usize, experiment: u32) -> String {
    format!("inits{run:08}_{rank_x:03}_{rank_y:03}.{experiment:03}")
}

/// Full path of a driver file inside `directory`
#[must_use]
pub fn driver_path(directory: &Path, code: FieldCode, rank: usize, experiment: u32) -> PathBuf {
    directory.join(driver_file_name(code, rank, experiment))
}
