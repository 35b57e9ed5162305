// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::{Array3, Axis};

use super::*;
use crate::{
    fabric::ResultHandle,
    io::write::{read_raw_image, RawImageWriter},
    tests::FailingSink,
};

const NPIXEL: usize = 8;
const MOMENT_TILE_FOR_TESTS: usize = 4;

/// A cube whose plane `p` is filled with `values[p]`.
fn plane_cube(values: [f64; NUM_PLANES]) -> Array3<f64> {
    let mut cube = Array3::zeros((NUM_PLANES, NPIXEL, NPIXEL));
    for (plane, &value) in values.iter().enumerate() {
        cube.index_axis_mut(Axis(0), plane).fill(value);
    }
    cube
}

fn results_from(cubes: Vec<Array3<f64>>) -> Vec<(usize, ResultHandle)> {
    cubes
        .into_iter()
        .enumerate()
        .map(|(channel, cube)| (channel, ResultHandle::new(cube)))
        .collect()
}

#[test]
fn mean_and_std_of_a_known_sample() {
    // Plane 0 (I) takes the values 1, 2, 3, 4 across the four channels.
    let results = results_from(
        (1..=4)
            .map(|v| plane_cube([v as f64, 0.0, 0.0, 0.0]))
            .collect(),
    );
    let stack = StackedArray::from_results(&results).unwrap();
    let persisted = stack.persist(4).unwrap();

    let mean = persisted.reduce(Plane::I, Stat::Mean);
    let std = persisted.reduce(Plane::I, Stat::Std);
    for &v in mean.iter() {
        assert_abs_diff_eq!(v, 2.5, epsilon = 1e-12);
    }
    // Population standard deviation (ddof = 0) of [1, 2, 3, 4].
    for &v in std.iter() {
        assert_abs_diff_eq!(v, 1.25_f64.sqrt(), epsilon = 1e-12);
    }
}

#[test]
fn magnitude_combines_q_and_u() {
    let results = results_from(vec![plane_cube([0.0, 3.0, 4.0, 0.0])]);
    let stack = StackedArray::from_results(&results).unwrap();
    let persisted = stack.persist(MOMENT_TILE_FOR_TESTS).unwrap();

    let p = persisted.reduce(Plane::P, Stat::Mean);
    for &v in p.iter() {
        assert_abs_diff_eq!(v, 5.0, epsilon = 1e-12);
    }
    // A single channel has no spread.
    let p_std = persisted.reduce(Plane::P, Stat::Std);
    for &v in p_std.iter() {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
    }
}

/// A cube with per-pixel structure, for exercising the tiling.
fn structured_cube(channel: usize) -> Array3<f64> {
    let mut cube = Array3::zeros((NUM_PLANES, NPIXEL, NPIXEL));
    for plane in 0..NUM_PLANES {
        for y in 0..NPIXEL {
            for x in 0..NPIXEL {
                cube[[plane, y, x]] = (channel + 1) as f64 * (plane as f64 + 0.5)
                    + 0.1 * y as f64
                    + 0.01 * x as f64;
            }
        }
    }
    cube
}

#[test]
fn tiled_reduction_matches_direct_reduction() {
    let results = results_from((0..5).map(structured_cube).collect());
    let stack = StackedArray::from_results(&results).unwrap();
    // A tile size that doesn't divide the image exercises partial edge
    // tiles.
    let persisted = stack.persist(3).unwrap();

    for plane in [Plane::I, Plane::Q, Plane::U] {
        let plane_index = match plane {
            Plane::I => 0,
            Plane::Q => 1,
            Plane::U => 2,
            Plane::P => unreachable!(),
        };
        // Direct computation on one big stacked array.
        let mut direct = Array3::zeros((5, NPIXEL, NPIXEL));
        for (channel, (_, handle)) in results.iter().enumerate() {
            direct
                .index_axis_mut(Axis(0), channel)
                .assign(&handle.fetch().index_axis(Axis(0), plane_index));
        }
        let direct_mean = direct.mean_axis(Axis(0)).unwrap();
        let direct_std = direct.std_axis(Axis(0), 0.0);

        let tiled_mean = persisted.reduce(plane, Stat::Mean);
        let tiled_std = persisted.reduce(plane, Stat::Std);
        for (&a, &b) in tiled_mean.iter().zip(direct_mean.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (&a, &b) in tiled_std.iter().zip(direct_std.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}

#[test]
fn reduction_is_order_independent() {
    let cubes: Vec<_> = (0..4).map(structured_cube).collect();
    let forward = results_from(cubes.clone());
    let reversed = results_from(cubes.into_iter().rev().collect());

    let a = StackedArray::from_results(&forward)
        .unwrap()
        .persist(MOMENT_TILE_FOR_TESTS)
        .unwrap();
    let b = StackedArray::from_results(&reversed)
        .unwrap()
        .persist(MOMENT_TILE_FOR_TESTS)
        .unwrap();

    for plane in [Plane::I, Plane::Q, Plane::U, Plane::P] {
        for stat in [Stat::Mean, Stat::Std] {
            let ra = a.reduce(plane, stat);
            let rb = b.reduce(plane, stat);
            for (&x, &y) in ra.iter().zip(rb.iter()) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn reduction_of_a_persisted_stack_is_idempotent() {
    let results = results_from((0..3).map(structured_cube).collect());
    let persisted = StackedArray::from_results(&results)
        .unwrap()
        .persist(MOMENT_TILE_FOR_TESTS)
        .unwrap();

    let first = persisted.reduce(Plane::P, Stat::Std);
    let second = persisted.reduce(Plane::P, Stat::Std);
    assert_eq!(first, second);
}

#[test]
fn stacking_rejects_mismatched_shapes() {
    let results = vec![
        (0, ResultHandle::new(Array3::zeros((NUM_PLANES, 8, 8)))),
        (1, ResultHandle::new(Array3::zeros((NUM_PLANES, 8, 9)))),
    ];
    let err = StackedArray::from_results(&results).unwrap_err();
    assert!(matches!(err, MomentError::ShapeMismatch { channel: 1, .. }));
}

#[test]
fn stacking_rejects_wrong_plane_counts() {
    let results = vec![(0, ResultHandle::new(Array3::zeros((2, 8, 8))))];
    let err = StackedArray::from_results(&results).unwrap_err();
    assert!(matches!(err, MomentError::BadPlaneCount { got: 2 }));
}

#[test]
fn stacking_rejects_empty_input() {
    let err = StackedArray::from_results(&[]).unwrap_err();
    assert!(matches!(err, MomentError::NoChannels));
}

#[test]
fn persist_rejects_a_zero_tile() {
    let results = results_from(vec![structured_cube(0)]);
    let stack = StackedArray::from_results(&results).unwrap();
    assert!(matches!(stack.persist(0), Err(MomentError::BadTileSize)));
}

#[test]
fn write_moments_produces_all_eight_products() {
    let dir = tempfile::tempdir().unwrap();
    let results = results_from((0..3).map(structured_cube).collect());
    let persisted = StackedArray::from_results(&results)
        .unwrap()
        .persist(MOMENT_TILE_FOR_TESTS)
        .unwrap();

    let sink = FailingSink::new();
    let written =
        write_moments(&persisted, &RawImageWriter, dir.path(), Some(&sink)).unwrap();

    assert_eq!(written.len(), 8);
    for stat in ["Mean", "Std"] {
        for plane in ["I", "Q", "U", "P"] {
            let path = dir.path().join(format!("{stat}-{plane}.im"));
            assert!(path.exists(), "missing {}", path.display());
            let image = read_raw_image(&path).unwrap();
            assert_eq!(image.shape(), &[NPIXEL, NPIXEL]);
        }
    }

    // A broken sink doesn't stop the engine; every QA record and the flush
    // were still attempted.
    assert_eq!(sink.emits.lock().unwrap().len(), 8);
    assert_eq!(*sink.flushes.lock().unwrap(), 1);
}
