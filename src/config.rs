//! JSON run configuration
//!
//! Library calls take their parameters explicitly; a [`RunConfig`] is only a
//! convenient way for callers (the binary, batch jobs) to build them.

use crate::decomposition::GridShape;
use crate::errors::{FieldIoError, Result};
use crate::parallel::ParallelConfig;
use crate::reader::FieldReader;
use crate::statistics::StreamingOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_chunk_size() -> usize {
    10
}

/// Describes one dataset and how to process it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Experiment code of the driver files
    pub experiment: u32,
    /// Job code of the time file, defaults to `experiment`
    #[serde(default)]
    pub job: Option<u32>,
    /// Directory holding the driver files
    pub directory: PathBuf,
    pub grid: GridShape,
    /// Sub-domains along y
    pub procy: usize,
    #[serde(default)]
    pub scalar_count: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Worker threads, all cores when absent
    #[serde(default)]
    pub threads: Option<usize>,
}

impl RunConfig {
    /// Loads and validates a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FieldIoError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => FieldIoError::Io(e),
        })?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), experiment = config.experiment, "loaded run configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        if self.procy == 0 {
            return Err(FieldIoError::config("procy must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(FieldIoError::config("chunk_size must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(FieldIoError::config("threads must be at least 1 when given"));
        }
        Ok(())
    }

    /// Reader over `directory` for this configuration
    pub fn reader(&self) -> Result<FieldReader> {
        self.reader_in(&self.directory)
    }

    /// Reader for this configuration rooted at another directory
    pub fn reader_in(&self, directory: &Path) -> Result<FieldReader> {
        let reader = FieldReader::new(directory, self.experiment, self.grid, self.procy)?
            .with_job(self.job.unwrap_or(self.experiment))
            .with_scalar_count(self.scalar_count);
        Ok(reader)
    }

    #[must_use]
    pub fn streaming_options(&self) -> StreamingOptions<'static> {
        StreamingOptions::with_chunk_size(self.chunk_size)
    }

    #[must_use]
    pub fn parallel_config(&self) -> ParallelConfig {
        self.threads.map_or_else(ParallelConfig::all_cores, ParallelConfig::with_threads)
    }
}
