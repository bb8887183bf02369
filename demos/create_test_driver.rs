//! Creates a sample multi-processor driver dataset for trying out ru_da_les.
//!
//! Writes `u`, `v`, `w` and `h` driver files for a 4-way y decomposition of a
//! 64 x 32 plane with single-cell halos, plus the time file, into
//! `test_driver/`, together with a `config.json` that reads it back.

use ndarray::{Array2, Axis};
use ru_da_les::collate::split_with_halo;
use ru_da_les::config::RunConfig;
use ru_da_les::decomposition::{Decomposition1d, GridShape};
use ru_da_les::field::{driver_path, time_file_name, FieldCode};
use ru_da_les::record::{RawRecordWriter, VALUE_SIZE};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

const TIMESTEPS: usize = 24;

fn snapshot(grid: &GridShape, code: FieldCode, t: usize) -> Array2<f64> {
    let phase = t as f64 * 0.25;
    Array2::from_shape_fn((grid.total_y(), grid.total_z()), |(j, k)| {
        let y = j as f64 / grid.total_y() as f64;
        let z = k as f64 / grid.total_z() as f64;
        match code {
            FieldCode::U => 5.0 * z + 0.3 * (2.0 * PI * y + phase).sin(),
            FieldCode::V => 0.2 * (2.0 * PI * z - phase).cos(),
            FieldCode::W => 0.1 * (2.0 * PI * y).sin() * (PI * z).sin() * phase.cos(),
            _ => 288.0 + 2.0 * z + 0.05 * (phase + y).sin(),
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = Path::new("test_driver");
    let experiment = 1;
    let grid = GridShape::with_unit_halo(64, 32)?;
    let decomposition = Decomposition1d::new(grid.width_y, 4, grid.ghost_y)?;

    println!("Creating test driver files in {}", output.display());
    fs::create_dir_all(output)?;

    let record_size = decomposition.padded_local_extent() * grid.total_z() * VALUE_SIZE;
    for code in [FieldCode::U, FieldCode::V, FieldCode::W, FieldCode::H] {
        let mut writers = decomposition
            .sub_domains()
            .iter()
            .map(|sub| RawRecordWriter::create(&driver_path(output, code, sub.rank, experiment), record_size))
            .collect::<Result<Vec<_>, _>>()?;

        for t in 0..TIMESTEPS {
            let global = snapshot(&grid, code, t).into_dyn();
            let parts = split_with_halo(&global.view(), 0, &decomposition)?;
            for (writer, part) in writers.iter_mut().zip(&parts) {
                writer.write_array(part)?;
            }
        }
        for writer in writers {
            writer.finish()?;
        }
        println!("   {code}: {} ranks x {TIMESTEPS} records", decomposition.count());
    }

    let times: Vec<f64> = (0..TIMESTEPS).map(|t| 100.0 + 2.5 * t as f64).collect();
    let mut time_file = RawRecordWriter::create(&output.join(time_file_name(experiment)), times.len() * VALUE_SIZE)?;
    time_file.write_values(&times)?;
    time_file.finish()?;

    let config = RunConfig {
        experiment,
        job: None,
        directory: output.to_path_buf(),
        grid,
        procy: decomposition.count(),
        scalar_count: 0,
        chunk_size: 8,
        threads: None,
    };
    fs::write(output.join("config.json"), config.to_json()?)?;

    // Sanity check: stitched width matches the global plane
    let reader = config.reader()?;
    let first = reader.read_single_timestep(FieldCode::U, 0)?;
    println!(
        "Done. Stitched u snapshot is {:?} (y extent {})",
        first.shape(),
        first.len_of(Axis(0))
    );
    println!("Try: ru_da_les info --config {}", output.join("config.json").display());
    Ok(())
}
