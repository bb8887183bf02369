//! ru_da_les: binary field I/O and collation for a domain-decomposed LES solver
//!
//! A structured-grid solver run on `procx × procy` processors writes one
//! binary file per processor, each holding its sub-domain plus a ring of ghost
//! cells. This library reconstructs the global grid from those files, streams
//! statistics over long time series without holding them in memory, and
//! writes global fields back out as per-processor restart files in the
//! solver's record framing.
//!
//! ## Key Features
//!
//! - **Halo-aware collation**: ghost cells shared by neighbouring ranks are
//!   stitched exactly once
//! - **Raw and bracketed records**: fixed-size records addressed by seeking,
//!   and length-marked sequential records
//! - **Streaming statistics**: per-cell Welford mean and variance, chunked
//! - **Restart writer**: re-partitions global fields with validation up front
//! - **Parallel processing**: Rayon across sub-domains, cells and experiments
//!
//! ## Module Organization
//!
//! - [`decomposition`]: grid shapes, 1D and 2D decompositions, processor factoring
//! - [`record`]: record framing and column-major array encoding
//! - [`field`]: field codes, field kinds and file naming
//! - [`collate`]: halo split and stitch primitives
//! - [`reader`]: multi-processor driver-file reader
//! - [`data_source`]: snapshot sources feeding the statistics
//! - [`statistics`]: Welford accumulator, streaming driver and axis reductions
//! - [`writer`]: restart-file writer
//! - [`metadata`]: dataset inspection
//! - [`batch`]: multi-experiment runs and JSON export
//! - [`config`], [`parallel`], [`logging`]: run configuration and runtime setup
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ru_da_les::prelude::*;
//!
//! let grid = GridShape::with_unit_halo(1008, 240).unwrap();
//! let reader = FieldReader::new("fields", 1, grid, 16).unwrap();
//!
//! // First ten timesteps of u, stitched to (t, y, z)
//! let u = reader.read_range(FieldCode::U, 0, 10).unwrap();
//!
//! // Mean and RMS profiles over every timestep, ten at a time
//! let source = DriverFieldSource::new(&reader, FieldCode::U).unwrap();
//! let profiles = compute_statistics_streaming(&source, &StreamingOptions::default()).unwrap();
//! ```

pub mod batch;
pub mod collate;
pub mod config;
pub mod data_source;
pub mod decomposition;
pub mod errors;
pub mod field;
pub mod logging;
pub mod metadata;
pub mod parallel;
pub mod reader;
pub mod record;
pub mod statistics;
pub mod writer;

pub use errors::{FieldIoError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::collate::{split_with_halo, stitch_along_axis, StitchPlan};
    pub use crate::config::RunConfig;
    pub use crate::data_source::{DriverFieldSource, InMemorySource, SnapshotSource};
    pub use crate::decomposition::{Decomposition1d, Decomposition2d, GridShape, GridShape3};
    pub use crate::errors::{FieldIoError, Result};
    pub use crate::field::{FieldCode, FieldKind};
    pub use crate::parallel::ParallelConfig;
    pub use crate::reader::{FieldReader, ReadOptions};
    pub use crate::record::Framing;
    pub use crate::statistics::{
        compute_statistics_streaming, time_average_last, StatAccumulator, StatProfiles, StreamingOptions,
    };
    pub use crate::writer::{FillPolicy, RestartFields, RestartWriter};
}
