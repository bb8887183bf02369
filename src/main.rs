//! Entry point for the ru_da_les binary.
//! Handles CLI parsing, configuration loading and dispatches to the library.

use clap::Parser;
use ru_da_les::batch::{run_experiments, time_average_job, ProfileExport};
use ru_da_les::config::RunConfig;
use ru_da_les::data_source::DriverFieldSource;
use ru_da_les::decomposition::{factor_processors, GridShape3};
use ru_da_les::field::FieldCode;
use ru_da_les::metadata::describe_dataset;
use ru_da_les::statistics::compute_statistics_streaming;
use ru_da_les::writer::{RestartFields, RestartWriter};
use ru_da_les::FieldIoError;

mod cli;

use cli::{Args, Command, RestartArgs, RunArgs};

fn load(run: &RunArgs) -> Result<RunConfig, FieldIoError> {
    let mut config = RunConfig::from_file(&run.config)?;
    if run.threads.is_some() {
        config.threads = run.threads;
    }
    config.parallel_config().setup_global_pool()?;
    Ok(config)
}

fn restart(args: &RestartArgs) -> Result<(), FieldIoError> {
    let (procx, procy) = match (args.procx, args.procy, args.nprocs) {
        (Some(px), Some(py), _) => (px, py),
        (_, _, Some(n)) => factor_processors(n)?,
        _ => (1, 1),
    };
    let grid = GridShape3::with_unit_halo(args.nx, args.ny, args.nz)?;
    let writer = RestartWriter::new(grid, procx, procy)?
        .with_scalar_count(args.scalars)
        .with_wall_components(args.wall_components)
        .with_fill_policy(args.fill.into());

    let fields = RestartFields::new().with_time(args.timee, args.dt);
    let report = writer.write(&fields, &args.output, args.run, args.experiment)?;
    println!(
        "Wrote {} restart files for a {procx} x {procy} decomposition to {}",
        report.files.len(),
        args.output.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    ru_da_les::logging::init(args.verbose);

    match args.command {
        Command::Info(run) => {
            let config = load(&run)?;
            let summary = describe_dataset(&config.reader()?, &FieldCode::ALL)?;
            summary.print();
        }
        Command::Read {
            run,
            field,
            start,
            end,
        } => {
            let config = load(&run)?;
            let reader = config.reader()?;
            let code: FieldCode = field.parse()?;
            let end = match end {
                Some(end) => end,
                None => reader.get_field_info(code)?.timestep_count,
            };
            let data = reader.read_range(code, start, end)?;
            let min = data.iter().copied().fold(f64::INFINITY, f64::min);
            let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            println!("Field {code} timesteps {start}..{end}: shape {:?}", data.shape());
            println!("   Min: {min}");
            println!("   Max: {max}");
        }
        Command::Stats { run, field, json } => {
            let config = load(&run)?;
            let reader = config.reader()?;
            let code: FieldCode = field.parse()?;
            let source = DriverFieldSource::new(&reader, code)?;
            let profiles = compute_statistics_streaming(&source, &config.streaming_options())?;

            println!("Field {code}: {} snapshots", profiles.count);
            for (k, (mean, rms)) in profiles
                .mean_profile
                .iter()
                .zip(profiles.rms_profile.iter())
                .enumerate()
            {
                println!("   z[{k:4}]  mean {mean:>14.6e}  rms {rms:>14.6e}");
            }
            if let Some(path) = json {
                ProfileExport::new(config.experiment, code, &profiles).write_json(&path)?;
                println!("Saved profiles to {}", path.display());
            }
        }
        Command::Restart(args) => restart(&args)?,
        Command::Batch {
            run,
            experiments,
            field,
            last,
            output,
        } => {
            let config = load(&run)?;
            let code: FieldCode = field.parse()?;
            let options = config.streaming_options();
            let summary = run_experiments(&experiments, &output, |experiment, work_dir| {
                let mut per_run = config.clone();
                per_run.experiment = experiment;
                per_run.job = None;
                time_average_job(&per_run.reader()?, code, last, &options, work_dir)
            });
            summary.print();
            if !summary.failed().is_empty() {
                return Err(format!("{} experiments failed", summary.failed().len()).into());
            }
        }
    }

    Ok(())
}
