// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! General code used in many tests.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use ndarray::Array3;

use crate::{
    constants::NUM_PLANES,
    imaging::{ImageCube, Imager, TaskError},
    io::read::{PolDef, VisData},
    orchestrate::{ChannelData, SharedParams},
    qa::{QaRecord, Telemetry, TelemetryError},
};

pub(crate) fn test_shared(npixel: usize) -> Arc<SharedParams> {
    Arc::new(SharedParams {
        uv_cut: 450.0,
        npixel,
        cell_arcsec: 10.0,
        angular_resolution: 8.0,
        pixels_per_beam: 5.0,
        poldef: PolDef::Linear,
        iono: None,
        outputs: PathBuf::from("/tmp"),
        twod: false,
        plots: false,
    })
}

pub(crate) fn test_vis(channel: usize) -> VisData {
    VisData {
        channel,
        uv_lambda: vec![100.0, 200.0, 300.0],
        timestamps: vec![0.0, 1.0, 2.0],
    }
}

pub(crate) fn test_channel_data(channel: usize, npixel: usize) -> ChannelData {
    ChannelData {
        channel,
        vis1: test_vis(channel),
        vis2: test_vis(channel),
        shared: test_shared(npixel),
    }
}

/// A cube whose plane `p` is filled with `(channel + 1) * (p + 1)`.
pub(crate) fn constant_cube(channel: usize, npixel: usize) -> ImageCube {
    let mut cube = Array3::zeros((NUM_PLANES, npixel, npixel));
    for plane in 0..NUM_PLANES {
        cube.index_axis_mut(ndarray::Axis(0), plane)
            .fill(((channel + 1) * (plane + 1)) as f64);
    }
    cube
}

/// An imaging backend with injectable failures: the first `fail_first`
/// attempts per channel fail, and channels in `always_fail` never succeed.
pub(crate) struct FlakyImager {
    pub(crate) npixel: usize,
    pub(crate) fail_first: u32,
    pub(crate) always_fail: Vec<usize>,
    attempts: Mutex<HashMap<usize, u32>>,
}

impl FlakyImager {
    pub(crate) fn new(npixel: usize, fail_first: u32, always_fail: Vec<usize>) -> FlakyImager {
        FlakyImager {
            npixel,
            fail_first,
            always_fail,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn attempts(&self, channel: usize) -> u32 {
        *self.attempts.lock().unwrap().get(&channel).unwrap_or(&0)
    }
}

impl Imager for FlakyImager {
    fn image(&self, data: &ChannelData) -> Result<ImageCube, TaskError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(data.channel).or_insert(0);
            *n += 1;
            *n
        };
        if self.always_fail.contains(&data.channel) {
            return Err(TaskError::Imaging {
                channel: data.channel,
                reason: "injected permanent failure".to_string(),
            });
        }
        if attempt <= self.fail_first {
            return Err(TaskError::Imaging {
                channel: data.channel,
                reason: format!("injected transient failure on attempt {attempt}"),
            });
        }
        Ok(constant_cube(data.channel, self.npixel))
    }
}

/// A telemetry sink that fails every emission but records what was
/// attempted.
pub(crate) struct FailingSink {
    pub(crate) emits: Mutex<Vec<String>>,
    pub(crate) flushes: Mutex<u32>,
}

impl FailingSink {
    pub(crate) fn new() -> FailingSink {
        FailingSink {
            emits: Mutex::new(vec![]),
            flushes: Mutex::new(0),
        }
    }
}

impl Telemetry for FailingSink {
    fn emit(&self, _topic: &str, record: &QaRecord) -> Result<(), TelemetryError> {
        self.emits.lock().unwrap().push(record.label.clone());
        Err(TelemetryError::Sink("injected sink failure".to_string()))
    }

    fn flush(&self) -> Result<(), TelemetryError> {
        *self.flushes.lock().unwrap() += 1;
        Err(TelemetryError::Sink("injected flush failure".to_string()))
    }
}
