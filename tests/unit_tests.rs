//! Unit tests for the ru_da_les building blocks
//!
//! Decomposition arithmetic, record framing, field naming, halo stitching and
//! the statistics kernels, all without touching driver datasets on disk.

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Array3, ArrayD, Axis, IxDyn};
use ru_da_les::{
    collate::{split_with_halo, stitch_along_axis, StitchPlan},
    config::RunConfig,
    data_source::{InMemorySource, SnapshotSource},
    decomposition::{
        factor_processors, local_extent, optimal_point_count, round_to_multiple, Decomposition1d,
        Decomposition2d, GridShape, GridShape3,
    },
    errors::FieldIoError,
    field::{driver_file_name, restart_file_name, scalar_restart_file_name, time_file_name, FieldCode, FieldKind},
    logging::default_filter,
    parallel::ParallelConfig,
    record::{
        decode_values, encode_values, from_fortran_values, read_bracketed, to_fortran_values, write_bracketed,
        Framing, MARKER_SIZE,
    },
    statistics::{
        accumulate_range, compute_statistics_streaming, time_average_last, StatAccumulator, StreamingOptions,
    },
};
use std::io::Cursor;
use std::sync::atomic::AtomicBool;

#[test]
fn test_error_messages() {
    let err = FieldIoError::MissingField {
        field: "u0".to_string(),
    };
    assert!(format!("{err}").contains("Missing field 'u0'"));

    let err = FieldIoError::CorruptRecord {
        leading: 16,
        trailing: 8,
    };
    assert!(format!("{err}").contains("leading marker 16"));

    let err = FieldIoError::config("bad split");
    assert_eq!(format!("{err}"), "Configuration error: bad split");
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));

    let all_cores = ParallelConfig::all_cores();
    assert!(all_cores.num_threads.is_some_and(|n| n > 0));
}

#[test]
fn test_logging_filter_levels() {
    assert_eq!(default_filter(0), "ru_da_les=warn");
    assert_eq!(default_filter(1), "ru_da_les=info");
    assert_eq!(default_filter(2), "ru_da_les=debug");
    assert_eq!(default_filter(7), "ru_da_les=trace");
}

#[test]
fn test_local_extent_requires_exact_split() {
    assert_eq!(local_extent(1008, 16).expect("exact split"), 63);
    assert!(matches!(local_extent(10, 3), Err(FieldIoError::Configuration(_))));
    assert!(matches!(local_extent(10, 0), Err(FieldIoError::Configuration(_))));
    assert!(matches!(local_extent(0, 4), Err(FieldIoError::Configuration(_))));
}

#[test]
fn test_decomposition_1d_layout() {
    let decomposition = Decomposition1d::new(8, 2, 1).expect("valid decomposition");
    assert_eq!(decomposition.local_extent(), 4);
    assert_eq!(decomposition.padded_local_extent(), 6);
    assert_eq!(decomposition.padded_global_extent(), 10);

    let ranges: Vec<_> = decomposition
        .sub_domains()
        .iter()
        .map(|sub| sub.padded_range(decomposition.halo()))
        .collect();
    assert_eq!(ranges, vec![0..6, 4..10]);
}

#[test]
fn test_decomposition_2d_rank_order() {
    let decomposition = Decomposition2d::new(8, 6, 2, 3).expect("valid decomposition");
    let subs = decomposition.sub_domains();
    assert_eq!(subs.len(), 6);

    // x-rank outer, y-rank inner
    for (rank, sub) in subs.iter().enumerate() {
        assert_eq!(decomposition.rank_of(sub.rank_x, sub.rank_y), rank);
        assert_eq!(sub.x_offset, sub.rank_x * 4);
        assert_eq!(sub.y_offset, sub.rank_y * 2);
    }
    assert_eq!((subs[1].rank_x, subs[1].rank_y), (0, 1));
    assert_eq!((subs[3].rank_x, subs[3].rank_y), (1, 0));

    assert!(Decomposition2d::new(9, 6, 2, 3).is_err());
}

#[test]
fn test_grid_shapes() {
    let grid = GridShape::with_unit_halo(1008, 240).expect("valid grid");
    assert_eq!(grid.total_y(), 1010);
    assert_eq!(grid.total_z(), 242);
    assert!(GridShape::new(0, 10, 1, 1).is_err());

    let grid3 = GridShape3::new(16, 8, 4, 1, 2, 1).expect("valid grid");
    assert_eq!(grid3.interior(), [16, 8, 4]);
    assert_eq!(grid3.with_halo(), [18, 12, 5]);
}

#[test]
fn test_factor_processors() {
    assert_eq!(factor_processors(16).expect("square"), (4, 4));
    assert_eq!(factor_processors(1).expect("square"), (1, 1));
    assert_eq!(factor_processors(8).expect("powers of two"), (4, 2));
    assert_eq!(factor_processors(12).expect("powers of two"), (4, 3));
    assert_eq!(factor_processors(32).expect("powers of two"), (8, 4));
    assert!(matches!(factor_processors(7), Err(FieldIoError::Configuration(_))));
    assert!(factor_processors(0).is_err());
}

#[test]
fn test_optimal_point_count_and_rounding() {
    // base = 12, candidates 72..=120 in steps of 8; 104 gives the closest spacing
    assert_eq!(optimal_point_count(100.0, 1.0, 8, 3).expect("candidate exists"), 104);
    assert_eq!(optimal_point_count(64.0, 1.0, 16, 2).expect("candidate exists"), 64);
    assert!(optimal_point_count(100.0, 0.0, 8, 3).is_err());
    assert!(optimal_point_count(100.0, 1.0, 0, 3).is_err());

    assert_abs_diff_eq!(round_to_multiple(17.0, 5.0), 15.0);
    assert_abs_diff_eq!(round_to_multiple(18.0, 5.0), 20.0);
    assert_abs_diff_eq!(round_to_multiple(0.74, 0.25), 0.75);
}

#[test]
fn test_value_encoding() {
    let values = [1.5, -2.25, f64::MAX, 0.0];
    let bytes = encode_values(&values);
    assert_eq!(bytes.len(), 32);
    assert_eq!(decode_values(&bytes).expect("whole values"), values.to_vec());
    assert!(decode_values(&bytes[..7]).is_err());
}

#[test]
fn test_column_major_element_order() {
    let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    // First index varies fastest on disk
    assert_eq!(to_fortran_values(&a), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

    let rebuilt = from_fortran_values(&[2, 3], vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).expect("matching length");
    assert_eq!(rebuilt, a.into_dyn());
    assert!(from_fortran_values(&[2, 3], vec![1.0; 5]).is_err());
}

#[test]
fn test_bracketed_record_layout() {
    let mut buffer = Vec::new();
    write_bracketed(&mut buffer, &[12.5, 0.1]).expect("write to memory");
    assert_eq!(buffer.len(), Framing::Bracketed.framed_size(16));
    assert_eq!(Framing::Raw.framed_size(16), 16);

    let marker = i32::from_ne_bytes(buffer[..MARKER_SIZE].try_into().expect("four bytes"));
    assert_eq!(marker, 16);
    let trailing = i32::from_ne_bytes(buffer[buffer.len() - MARKER_SIZE..].try_into().expect("four bytes"));
    assert_eq!(trailing, 16);

    let mut cursor = Cursor::new(buffer);
    let record = read_bracketed(&mut cursor).expect("valid record");
    assert_eq!(record, Some(vec![12.5, 0.1]));
    assert_eq!(read_bracketed(&mut cursor).expect("clean end"), None);
}

#[test]
fn test_bracketed_marker_mismatch_is_corrupt() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&16_i32.to_ne_bytes());
    buffer.extend_from_slice(&encode_values(&[1.0, 2.0]));
    buffer.extend_from_slice(&8_i32.to_ne_bytes());

    let result = read_bracketed(&mut Cursor::new(buffer));
    assert!(matches!(
        result,
        Err(FieldIoError::CorruptRecord {
            leading: 16,
            trailing: 8
        })
    ));
}

#[test]
fn test_bracketed_truncation_is_corrupt() {
    let mut full = Vec::new();
    write_bracketed(&mut full, &[1.0, 2.0]).expect("in-memory write");

    // Stray bytes where the next leading marker should start
    let mut stray = full.clone();
    stray.extend_from_slice(&[0, 1]);
    let mut cursor = Cursor::new(stray);
    assert!(read_bracketed(&mut cursor).expect("first record").is_some());
    assert!(matches!(
        read_bracketed(&mut cursor),
        Err(FieldIoError::CorruptRecord {
            leading: -1,
            trailing: -1
        })
    ));

    // Payload cut short
    let short_payload = full[..MARKER_SIZE + 12].to_vec();
    assert!(matches!(
        read_bracketed(&mut Cursor::new(short_payload)),
        Err(FieldIoError::CorruptRecord {
            leading: 16,
            trailing: -1
        })
    ));

    // Trailing marker cut short
    let short_marker = full[..full.len() - 1].to_vec();
    assert!(matches!(
        read_bracketed(&mut Cursor::new(short_marker)),
        Err(FieldIoError::CorruptRecord {
            leading: 16,
            trailing: -1
        })
    ));
}

#[test]
fn test_field_codes_and_names() {
    assert_eq!(driver_file_name(FieldCode::U, 3, 7), "udriver_003.007");
    assert_eq!(driver_file_name(FieldCode::H, 12, 1), "hdriver_012.001");
    assert_eq!(time_file_name(5), "tdriver_000.005");
    assert_eq!(restart_file_name(1, 0, 1, 2), "initd00000001_000_001.002");
    assert_eq!(scalar_restart_file_name(42, 3, 0, 9), "inits00000042_003_000.009");

    assert_eq!("h".parse::<FieldCode>().expect("letter"), FieldCode::H);
    assert_eq!("thl".parse::<FieldCode>().expect("name"), FieldCode::H);
    assert_eq!("sv".parse::<FieldCode>().expect("name"), FieldCode::S);
    assert!("x".parse::<FieldCode>().is_err());
    assert!("uu".parse::<FieldCode>().is_err());

    assert_eq!(FieldCode::U.kind(3), FieldKind::Plane);
    assert_eq!(FieldCode::S.kind(3), FieldKind::MultiComponent(3));
    assert_eq!(FieldKind::MultiComponent(3).record_shape(&[6, 4]), vec![6, 4, 3]);
    assert_eq!(FieldKind::Plane.record_shape(&[6, 4]), vec![6, 4]);
}

#[test]
fn test_stitch_two_ranks_with_unit_halo() {
    let left = ArrayD::from_shape_vec(IxDyn(&[6]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("shape");
    let right = ArrayD::from_shape_vec(IxDyn(&[6]), vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0]).expect("shape");

    let stitched = stitch_along_axis(&[left.view(), right.view()], 0, 1).expect("stitch");
    let expected: Vec<f64> = (1..=10).map(f64::from).collect();
    assert_eq!(stitched.iter().copied().collect::<Vec<_>>(), expected);
}

#[test]
fn test_split_then_stitch_round_trip() {
    for halo in 0..=2 {
        for count in [1, 2, 4] {
            let global_extent = 4 * count;
            let decomposition = Decomposition1d::new(global_extent, count, halo).expect("exact split");
            let global = Array2::from_shape_fn((global_extent + 2 * halo, 3), |(j, k)| (j * 10 + k) as f64).into_dyn();

            let parts = split_with_halo(&global.view(), 0, &decomposition).expect("split");
            assert_eq!(parts.len(), count);
            assert!(parts.iter().all(|p| p.len_of(Axis(0)) == 4 + 2 * halo));

            let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
            let stitched = stitch_along_axis(&views, 0, halo).expect("stitch");
            assert_eq!(stitched, global, "halo={halo} count={count}");
        }
    }
}

#[test]
fn test_stitch_along_second_axis() {
    let decomposition = Decomposition1d::new(6, 3, 1).expect("exact split");
    let global = Array2::from_shape_fn((2, 8), |(i, j)| (i * 100 + j) as f64).into_dyn();
    let parts = split_with_halo(&global.view(), 1, &decomposition).expect("split");
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    assert_eq!(stitch_along_axis(&views, 1, 1).expect("stitch"), global);
}

#[test]
fn test_stitch_rejects_bad_input() {
    assert!(stitch_along_axis(&[], 0, 1).is_err());

    let plan = StitchPlan::new(2, 4, 1).expect("plan");
    assert_eq!(plan.stitched_extent(), 10);
    let wrong = ArrayD::<f64>::zeros(IxDyn(&[5]));
    let mut output = ArrayD::<f64>::zeros(IxDyn(&[10]));
    assert!(plan.place(0, &wrong.view(), &mut output.view_mut(), 0).is_err());
    assert!(plan.place(0, &wrong.view(), &mut output.view_mut(), 3).is_err());

    let global = ArrayD::<f64>::zeros(IxDyn(&[9]));
    let decomposition = Decomposition1d::new(8, 2, 1).expect("exact split");
    assert!(split_with_halo(&global.view(), 0, &decomposition).is_err());
}

fn synthetic_snapshots(nt: usize) -> Array3<f64> {
    Array3::from_shape_fn((nt, 5, 3), |(t, j, k)| {
        1.0e3 + (t as f64 * 0.37 + j as f64).sin() * (k as f64 + 1.0) + 0.01 * (t * t) as f64
    })
}

fn direct_mean_variance(data: &Array3<f64>) -> (Array2<f64>, Array2<f64>) {
    let n = data.len_of(Axis(0)) as f64;
    let mean = data.sum_axis(Axis(0)) / n;
    let mut variance = Array2::<f64>::zeros(mean.dim());
    for snapshot in data.outer_iter() {
        variance += &(&snapshot - &mean).mapv(|d| d * d);
    }
    (mean, variance / n)
}

#[test]
fn test_welford_matches_direct_computation() {
    let data = synthetic_snapshots(23);
    let (mean, variance) = direct_mean_variance(&data);
    let source = InMemorySource::new(data.clone());

    for chunk_size in [1, 7, 23] {
        let profiles = compute_statistics_streaming(&source, &StreamingOptions::with_chunk_size(chunk_size))
            .expect("streaming statistics");
        assert_eq!(profiles.count, 23);
        for ((a, b), (c, d)) in profiles
            .mean
            .iter()
            .zip(mean.iter())
            .zip(profiles.variance.iter().zip(variance.iter()))
        {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            assert_abs_diff_eq!(c, d, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_welford_profiles() {
    let data = synthetic_snapshots(10);
    let (mean, variance) = direct_mean_variance(&data);

    let mut accumulator = StatAccumulator::new(5, 3);
    accumulator.update_chunk(&data.view()).expect("matching shape");
    let profiles = accumulator.finish().expect("non-empty");

    assert_eq!(profiles.mean_profile.len(), 3);
    for k in 0..3 {
        let expected_mean = mean.column(k).sum() / 5.0;
        let expected_rms = (variance.column(k).sum() / 5.0).sqrt();
        assert_abs_diff_eq!(profiles.mean_profile[k], expected_mean, epsilon = 1e-9);
        assert_abs_diff_eq!(profiles.rms_profile[k], expected_rms, epsilon = 1e-9);
    }
    for (rms, var) in profiles.rms.iter().zip(profiles.variance.iter()) {
        assert_abs_diff_eq!(*rms, var.sqrt(), epsilon = 1e-12);
    }
}

#[test]
fn test_welford_edge_cases() {
    let empty = StatAccumulator::new(2, 2);
    assert!(empty.variance().is_none());
    assert!(matches!(empty.finish(), Err(FieldIoError::Statistics(_))));

    let mut accumulator = StatAccumulator::new(2, 2);
    let wrong = Array2::<f64>::zeros((3, 2));
    assert!(accumulator.update(&wrong.view()).is_err());
    assert_eq!(accumulator.count(), 0);

    let constant = Array2::from_elem((2, 2), 4.5);
    accumulator.update(&constant.view()).expect("matching shape");
    accumulator.update(&constant.view()).expect("matching shape");
    let profiles = accumulator.finish().expect("non-empty");
    assert!(profiles.variance.iter().all(|&v| v == 0.0));
    assert!(profiles.mean.iter().all(|&m| m == 4.5));
}

#[test]
fn test_welford_profiles_keep_non_finite_cells() {
    let mut accumulator = StatAccumulator::new(2, 2);
    let snapshot = array![[f64::NAN, 1.0], [4.0, 3.0]];
    accumulator.update(&snapshot.view()).expect("matching shape");
    let profiles = accumulator.finish().expect("non-empty");

    assert!(profiles.mean[[0, 0]].is_nan());
    assert_abs_diff_eq!(profiles.mean[[1, 0]], 4.0);
    // A NaN cell spoils its whole span-wise column
    assert!(profiles.mean_profile[0].is_nan());
    assert!(profiles.rms_profile[0].is_nan());
    assert_abs_diff_eq!(profiles.mean_profile[1], 2.0);
    assert_abs_diff_eq!(profiles.rms_profile[1], 0.0);

    let mut accumulator = StatAccumulator::new(2, 2);
    accumulator.update(&snapshot.view()).expect("matching shape");
    assert!(matches!(accumulator.finish_along(2), Err(FieldIoError::Statistics(_))));
}

#[test]
fn test_streaming_abort_and_options() {
    let source = InMemorySource::new(synthetic_snapshots(12));

    let abort = AtomicBool::new(true);
    let options = StreamingOptions::with_chunk_size(4).with_abort(&abort);
    assert!(matches!(
        compute_statistics_streaming(&source, &options),
        Err(FieldIoError::Aborted)
    ));

    assert!(accumulate_range(&source, 0..12, &StreamingOptions::with_chunk_size(0)).is_err());
    assert!(accumulate_range(&source, 3..3, &StreamingOptions::default())
        .expect("empty range")
        .is_none());

    let empty = InMemorySource::new(Array3::zeros((0, 5, 3)));
    assert!(compute_statistics_streaming(&empty, &StreamingOptions::default()).is_err());
}

#[test]
fn test_time_average_last() {
    let data = synthetic_snapshots(12);
    let source = InMemorySource::new(data.clone());

    let average = time_average_last(&source, 4, &StreamingOptions::with_chunk_size(3)).expect("average");
    let expected = data.slice(ndarray::s![8.., .., ..]).mean_axis(Axis(0)).expect("non-empty");
    for (a, b) in average.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }

    // Asking for more than available averages everything
    let all = time_average_last(&source, 100, &StreamingOptions::default()).expect("average");
    let expected = data.mean_axis(Axis(0)).expect("non-empty");
    for (a, b) in all.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
    assert_eq!(source.timestep_count().expect("in memory"), 12);
}

#[test]
fn test_run_config_json() {
    let text = r#"{
        "experiment": 1,
        "directory": "fields",
        "grid": { "width_y": 1008, "depth_z": 240, "ghost_y": 1, "ghost_z": 1 },
        "procy": 16,
        "scalar_count": 0,
        "chunk_size": 10,
        "threads": null
    }"#;
    let config = RunConfig::from_json(text).expect("valid config");
    assert_eq!(config.experiment, 1);
    assert_eq!(config.procy, 16);
    assert_eq!(config.grid.total_y(), 1010);
    assert_eq!(config.job, None);

    let reader = config.reader().expect("exact split");
    assert_eq!(reader.decomposition().local_extent(), 63);

    let round_trip = RunConfig::from_json(&config.to_json().expect("serialize")).expect("valid config");
    assert_eq!(round_trip, config);

    let minimal = r#"{"experiment": 2, "directory": ".", "procy": 1,
        "grid": {"width_y": 8, "depth_z": 4, "ghost_y": 1, "ghost_z": 1}}"#;
    let config = RunConfig::from_json(minimal).expect("defaults apply");
    assert_eq!(config.chunk_size, 10);
    assert_eq!(config.scalar_count, 0);

    let bad = minimal.replace("\"procy\": 1", "\"procy\": 0");
    assert!(matches!(RunConfig::from_json(&bad), Err(FieldIoError::Configuration(_))));
    assert!(matches!(RunConfig::from_json("{"), Err(FieldIoError::Serialization(_))));
}
