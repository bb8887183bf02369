//! Simple benchmark of the per-cell accumulator against a sequential loop.
//!
//! Folds synthetic (y,z) snapshots into running mean/variance state, once with
//! a plain nested loop and once through `StatAccumulator`, which updates cells
//! on the Rayon pool.

use ndarray::{Array2, Array3};
use ru_da_les::data_source::InMemorySource;
use ru_da_les::statistics::{compute_statistics_streaming, StreamingOptions};
use std::time::Instant;

fn synthetic(nt: usize, ny: usize, nz: usize) -> Array3<f64> {
    Array3::from_shape_fn((nt, ny, nz), |(t, j, k)| ((t * 31 + j * 7 + k) as f64 * 0.01).sin())
}

fn sequential_welford(data: &Array3<f64>) -> f64 {
    let (nt, ny, nz) = data.dim();
    let start = Instant::now();

    let mut mean = Array2::<f64>::zeros((ny, nz));
    let mut m2 = Array2::<f64>::zeros((ny, nz));
    for t in 0..nt {
        let n = (t + 1) as f64;
        for j in 0..ny {
            for k in 0..nz {
                let x = data[[t, j, k]];
                let delta = x - mean[[j, k]];
                mean[[j, k]] += delta / n;
                m2[[j, k]] += delta * (x - mean[[j, k]]);
            }
        }
    }

    let duration = start.elapsed();
    println!("   Mean of cell (0,0): {:.6}", mean[[0, 0]]);
    duration.as_secs_f64()
}

fn parallel_welford(data: &Array3<f64>) -> Result<f64, Box<dyn std::error::Error>> {
    let source = InMemorySource::new(data.clone());
    let start = Instant::now();
    let profiles = compute_statistics_streaming(&source, &StreamingOptions::with_chunk_size(16))?;
    let duration = start.elapsed();
    println!("   Mean of cell (0,0): {:.6}", profiles.mean[[0, 0]]);
    Ok(duration.as_secs_f64())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("ru_da_les accumulator benchmark");
    println!("===============================\n");

    let available_threads = rayon::current_num_threads();
    println!("System has {available_threads} logical CPU cores available\n");

    for (ny, nz) in [(256, 128), (512, 256), (1024, 256)] {
        let nt = 64;
        let data = synthetic(nt, ny, nz);
        println!("Testing {nt} snapshots of {ny} x {nz}:");
        println!("-------------------------------------------");

        println!("Sequential loop:");
        let seq_time = sequential_welford(&data);
        println!("   Duration: {seq_time:.3} seconds\n");

        println!("StatAccumulator ({available_threads} threads):");
        let par_time = parallel_welford(&data)?;
        println!("   Duration: {par_time:.3} seconds");

        println!("   Speedup: {:.2}x\n", seq_time / par_time);
    }

    Ok(())
}
