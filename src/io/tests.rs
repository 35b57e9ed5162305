// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use super::read::*;
use super::write::*;
use crate::constants::RAD2ARCSEC;

#[test]
fn raw_image_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.im");
    let image = Array2::from_shape_fn((5, 7), |(y, x)| y as f64 + 0.01 * x as f64);

    RawImageWriter.write(image.view(), &path).unwrap();
    let back = read_raw_image(&path).unwrap();
    assert_eq!(back, image);
}

#[test]
fn raw_image_reader_rejects_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-an-image");
    std::fs::write(&path, b"definitely not an image").unwrap();
    assert!(matches!(
        read_raw_image(&path),
        Err(WriteError::NotARawImage(_))
    ));
}

#[test]
fn tarball_collects_the_moment_images() {
    let dir = tempfile::tempdir().unwrap();
    let image = Array2::zeros((4, 4));
    let mut paths = vec![];
    for name in ["Mean-I.im", "Std-I.im"] {
        let path = dir.path().join(name);
        RawImageWriter.write(image.view(), &path).unwrap();
        paths.push(path);
    }

    let tarball = tarball_moments(dir.path(), &paths).unwrap();
    assert!(tarball.ends_with("moment.tar.gz"));
    let len = std::fs::metadata(&tarball).unwrap().len();
    assert!(len > 0);
}

#[test]
fn uv_cut_drops_long_baselines() {
    let mut vis = VisData {
        channel: 0,
        uv_lambda: vec![100.0, 500.0, 300.0, 451.0],
        timestamps: vec![0.0, 1.0, 2.0, 3.0],
    };
    vis.uv_cut(450.0);
    assert_eq!(vis.uv_lambda, vec![100.0, 300.0]);
    assert_eq!(vis.timestamps, vec![0.0, 2.0]);
}

#[test]
fn append_concatenates_snapshots() {
    let a = VisData {
        channel: 2,
        uv_lambda: vec![1.0],
        timestamps: vec![0.0],
    };
    let b = VisData {
        channel: 2,
        uv_lambda: vec![2.0],
        timestamps: vec![10.0],
    };
    let combined = a.append(&b);
    assert_eq!(combined.channel, 2);
    assert_eq!(combined.uv_lambda, vec![1.0, 2.0]);
    assert_eq!(combined.timestamps, vec![0.0, 10.0]);
}

#[test]
fn uv_advice_samples_the_beam() {
    let vis = VisData {
        channel: 0,
        uv_lambda: vec![100.0, 400.0],
        timestamps: vec![0.0, 1.0],
    };
    let advice = uv_advice(&vis, 450.0, 5.0, 512).unwrap();
    assert_eq!(advice.npixel, 512);
    // Longest baseline is 400 wavelengths: beam 1/400 rad, 5 pixels across.
    assert_abs_diff_eq!(
        advice.cell_arcsec,
        1.0 / 400.0 / 5.0 * RAD2ARCSEC,
        epsilon = 1e-9
    );
}

#[test]
fn uv_advice_rejects_empty_coverage() {
    let vis = VisData {
        channel: 4,
        uv_lambda: vec![],
        timestamps: vec![],
    };
    assert!(matches!(
        uv_advice(&vis, 450.0, 5.0, 512),
        Err(ReadError::EmptyUvCoverage { channel: 4 })
    ));
}

#[test]
fn instruments_map_to_feeds() {
    assert_eq!(PolDef::for_instrument("LOFAR"), PolDef::Linear);
    assert_eq!(PolDef::for_instrument("lofar"), PolDef::Linear);
    assert_eq!(PolDef::for_instrument("VLA"), PolDef::Circular);
    // Unknown instruments fall back to linear feeds.
    assert_eq!(PolDef::for_instrument("KAIRA"), PolDef::Linear);
}
