//! Defines command-line interface options using `clap` for the ru_da_les binary.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use ru_da_les::writer::FillPolicy;
use std::path::PathBuf;

/// Driver-file collation and restart-file tooling for a decomposed LES solver
#[derive(Parser, Debug)]
#[command(name = "ru_da_les", version, about = "Read, collate and write multi-processor field files")]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the field files, timestep counts and time range of a run
    Info(RunArgs),

    /// Collate one field over a timestep range and print a summary
    Read {
        #[command(flatten)]
        run: RunArgs,
        /// Field code (u, v, w, h, q, s) or name (thl, qt, sv)
        #[arg(short, long, default_value = "u")]
        field: String,
        /// First timestep
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// One past the last timestep, defaults to all
        #[arg(long)]
        end: Option<usize>,
    },

    /// Stream a field through the accumulator and print mean/RMS profiles
    Stats {
        #[command(flatten)]
        run: RunArgs,
        #[arg(short, long, default_value = "u")]
        field: String,
        /// Write the profiles as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Write restart files for a procx x procy decomposition
    Restart(RestartArgs),

    /// Time-average a field across several experiments in parallel
    Batch {
        #[command(flatten)]
        run: RunArgs,
        /// Experiment ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        experiments: Vec<u32>,
        #[arg(short, long, default_value = "u")]
        field: String,
        /// Trailing snapshots to average
        #[arg(long, default_value_t = 10)]
        last: usize,
        /// Root of the per-experiment output directories
        #[arg(short, long, default_value = "batch")]
        output: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Path to the JSON run configuration
    #[arg(short, long)]
    pub config: PathBuf,

    /// Number of threads to use. Defaults to the configuration, then all cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct RestartArgs {
    #[arg(long)]
    pub nx: usize,
    #[arg(long)]
    pub ny: usize,
    #[arg(long)]
    pub nz: usize,
    /// Sub-domains along x; derived from --nprocs when omitted
    #[arg(long)]
    pub procx: Option<usize>,
    /// Sub-domains along y; derived from --nprocs when omitted
    #[arg(long)]
    pub procy: Option<usize>,
    /// Total processor count to factor into procx x procy
    #[arg(long)]
    pub nprocs: Option<usize>,
    /// Passive scalars written to the inits files
    #[arg(long, default_value_t = 0)]
    pub scalars: usize,
    /// Components of the wall field
    #[arg(long, default_value_t = ru_da_les::writer::DEFAULT_WALL_COMPONENTS)]
    pub wall_components: usize,
    #[arg(long, value_enum, default_value_t = Fill::Defaults)]
    pub fill: Fill,
    #[arg(long, default_value_t = 0.0)]
    pub timee: f64,
    #[arg(long, default_value_t = 0.1)]
    pub dt: f64,
    #[arg(long, default_value_t = 1)]
    pub run: u32,
    #[arg(long, default_value_t = 1)]
    pub experiment: u32,
    #[arg(short, long, default_value = "restart")]
    pub output: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Fill {
    Zeros,
    Defaults,
}

impl From<Fill> for FillPolicy {
    fn from(fill: Fill) -> Self {
        match fill {
            Fill::Zeros => Self::Zeros,
            Fill::Defaults => Self::Defaults,
        }
    }
}
