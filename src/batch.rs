//! Multi-experiment processing and result export
//!
//! Each experiment id runs as an independent rayon task with its own working
//! directory. Workers share nothing; every outcome is collected in input order
//! and summarised once all of them finished.

use crate::data_source::DriverFieldSource;
use crate::errors::{FieldIoError, Result};
use crate::field::FieldCode;
use crate::reader::FieldReader;
use crate::statistics::{time_average_last, StatProfiles, StreamingOptions};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of one experiment's job
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub experiment: u32,
    pub elapsed: Duration,
    /// Output path on success, failure reason otherwise
    pub result: std::result::Result<PathBuf, String>,
}

impl ExperimentOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate of a batch run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub outcomes: Vec<ExperimentOutcome>,
    pub elapsed: Duration,
}

impl BatchSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<&ExperimentOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded()).collect()
    }

    pub fn print(&self) {
        println!("\n Batch summary");
        println!("===============");
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(path) => println!(
                    "    {:03}: ok in {:.2?} -> {}",
                    outcome.experiment,
                    outcome.elapsed,
                    path.display()
                ),
                Err(reason) => println!(
                    "    {:03}: FAILED in {:.2?}: {reason}",
                    outcome.experiment, outcome.elapsed
                ),
            }
        }
        println!(
            "\n {} of {} experiments succeeded in {:.2?}",
            self.succeeded(),
            self.outcomes.len(),
            self.elapsed
        );
    }
}

/// Runs `job` once per experiment id, in parallel.
///
/// Each job receives its id and a working directory `<work_root>/<id:03>`,
/// created beforehand. Failures are recorded in the outcome and never stop
/// the other jobs.
pub fn run_experiments<F>(ids: &[u32], work_root: &Path, job: F) -> BatchSummary
where
    F: Fn(u32, &Path) -> Result<PathBuf> + Sync,
{
    let started = Instant::now();
    info!(count = ids.len(), root = %work_root.display(), "starting batch");

    let outcomes: Vec<ExperimentOutcome> = ids
        .par_iter()
        .map(|&experiment| {
            let job_started = Instant::now();
            let work_dir = work_root.join(format!("{experiment:03}"));
            let result = fs::create_dir_all(&work_dir)
                .map_err(FieldIoError::from)
                .and_then(|()| job(experiment, &work_dir))
                .map_err(|e| {
                    warn!(experiment, error = %e, "experiment failed");
                    e.to_string()
                });
            ExperimentOutcome {
                experiment,
                elapsed: job_started.elapsed(),
                result,
            }
        })
        .collect();

    let summary = BatchSummary {
        outcomes,
        elapsed: started.elapsed(),
    };
    info!(
        succeeded = summary.succeeded(),
        failed = summary.outcomes.len() - summary.succeeded(),
        "batch finished"
    );
    summary
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Mean and RMS profiles of one field, ready for JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileExport {
    pub experiment: u32,
    pub field: String,
    pub snapshots: u64,
    pub created: String,
    pub mean_profile: Vec<f64>,
    pub rms_profile: Vec<f64>,
}

impl ProfileExport {
    #[must_use]
    pub fn new(experiment: u32, code: FieldCode, profiles: &StatProfiles) -> Self {
        Self {
            experiment,
            field: code.name().to_string(),
            snapshots: profiles.count,
            created: timestamp(),
            mean_profile: profiles.mean_profile.to_vec(),
            rms_profile: profiles.rms_profile.to_vec(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "wrote profile export");
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Time-averaged (y,z) field of one experiment, rows along y
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAverageExport {
    pub experiment: u32,
    pub field: String,
    pub averaged_snapshots: usize,
    pub created: String,
    pub values: Vec<Vec<f64>>,
}

/// Averages the last `last_n` snapshots of `code` and writes
/// `<output_dir>/<name>_avg.<exp>.json`.
pub fn time_average_job(
    reader: &FieldReader,
    code: FieldCode,
    last_n: usize,
    options: &StreamingOptions<'_>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let source = DriverFieldSource::new(reader, code)?;
    let count = reader.get_field_info(code)?.timestep_count;
    let average = time_average_last(&source, last_n, options)?;

    let export = TimeAverageExport {
        experiment: reader.experiment(),
        field: code.name().to_string(),
        averaged_snapshots: last_n.min(count),
        created: timestamp(),
        values: average.outer_iter().map(|row| row.to_vec()).collect(),
    };

    let path = output_dir.join(format!("{}_avg.{:03}.json", code.name(), reader.experiment()));
    fs::write(&path, serde_json::to_string_pretty(&export)?)?;
    Ok(path)
}
