//! Statistical computations over collated driver fields
//!
//! # Organization
//!
//! This module is organized into submodules:
//! - [`welford`]: per-cell running mean/variance state and its finalisation
//! - [`streaming`]: chunked accumulation over a [`SnapshotSource`](crate::data_source::SnapshotSource)

pub mod streaming;
pub mod welford;

// Re-export the main types and functions for convenience
pub use streaming::{accumulate_range, compute_statistics_streaming, time_average_last, StreamingOptions};
pub use welford::{StatAccumulator, StatProfiles};
