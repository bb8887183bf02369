//! Driver dataset inspection
//!
//! Lists which field files of a run exist, how many timesteps they hold and
//! the time range covered by the time file.

use crate::errors::Result;
use crate::field::{FieldCode, FieldKind};
use crate::reader::FieldReader;
use tracing::{debug, warn};

/// Per-field entry of a [`DatasetSummary`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    pub code: FieldCode,
    pub kind: FieldKind,
    pub record_size: usize,
    pub timestep_count: usize,
    /// Rank files present on disk
    pub file_count: usize,
    /// Rank files the decomposition expects
    pub expected_files: usize,
}

impl FieldSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.file_count == self.expected_files
    }
}

/// What a driver directory holds for one experiment
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub experiment: u32,
    pub fields: Vec<FieldSummary>,
    /// Number of stamps and first/last time, if the time file exists
    pub time_range: Option<(usize, f64, f64)>,
}

/// Inspects the fields in `codes` whose rank-0 file exists.
///
/// Missing fields are skipped, not reported as errors; a field whose layout
/// cannot be resolved (scalars with a zero scalar count) is skipped too.
pub fn describe_dataset(reader: &FieldReader, codes: &[FieldCode]) -> Result<DatasetSummary> {
    let expected_files = reader.decomposition().count();
    let mut fields = Vec::new();

    for &code in codes {
        if !reader.rank_path(code, 0).exists() {
            debug!(field = %code, "no rank-0 file, skipping");
            continue;
        }
        let Ok(layout) = reader.layout(code) else {
            warn!(field = %code, "field layout unavailable, skipping");
            continue;
        };
        let info = reader.get_field_info(code)?;
        let file_count = (0..expected_files)
            .filter(|&rank| reader.rank_path(code, rank).exists())
            .count();

        fields.push(FieldSummary {
            code,
            kind: layout.kind,
            record_size: info.record_size,
            timestep_count: info.timestep_count,
            file_count,
            expected_files,
        });
    }

    let time_range = if reader.time_path().exists() {
        let times = reader.read_time_file()?;
        times.span().map(|(first, last)| (times.len(), first, last))
    } else {
        None
    };

    Ok(DatasetSummary {
        experiment: reader.experiment(),
        fields,
        time_range,
    })
}

impl DatasetSummary {
    pub fn print(&self) {
        println!("\n Experiment {:03}", self.experiment);
        println!("================");

        if self.fields.is_empty() {
            println!("   (No field files found)");
        }
        for field in &self.fields {
            let components = match field.kind {
                FieldKind::MultiComponent(n) => format!(" x {n} components"),
                FieldKind::Plane | FieldKind::Volume => String::new(),
            };
            let completeness = if field.is_complete() { "" } else { " (incomplete)" };
            println!(
                "    {} ({}{}): {} timesteps, {} bytes/record, {}/{} files{}",
                field.code.letter(),
                field.code.name(),
                components,
                field.timestep_count,
                field.record_size,
                field.file_count,
                field.expected_files,
                completeness
            );
        }

        match self.time_range {
            Some((count, first, last)) => {
                println!("\n Time: {count} stamps from {first} to {last}");
            }
            None => println!("\n Time: no time file"),
        }
    }
}
