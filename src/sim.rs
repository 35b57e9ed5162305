// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Deterministic simulation collaborators.
//!
//! These stand in for the measurement-set reader, the imaging routine and
//! the ionosphere estimator so that the pipeline runs end-to-end without a
//! real cluster or real data. Observatory backends implement the same
//! traits.

use std::path::Path;

use ndarray::Array3;

use crate::{
    imaging::{ImageCube, Imager, TaskError},
    io::read::{PolDef, ReadError, StationInfo, VisData, VisLoader},
    iono::{IonoError, IonoEstimator, IonoSeries},
    orchestrate::ChannelData,
};

// A tiny splitmix-style generator; enough for reproducible fake uv tracks.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

fn unit(x: u64) -> f64 {
    (x >> 11) as f64 / (1_u64 << 53) as f64
}

/// Simulated measurement-set reader.
pub struct SimLoader {
    pub samples_per_channel: usize,
    pub num_stations: usize,
}

impl Default for SimLoader {
    fn default() -> SimLoader {
        SimLoader {
            samples_per_channel: 1024,
            num_stations: 24,
        }
    }
}

fn ms_seed(ms: &Path) -> u64 {
    ms.to_string_lossy()
        .bytes()
        .fold(0xcbf29ce484222325_u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x100000001b3)
        })
}

impl VisLoader for SimLoader {
    fn load(&self, ms: &Path, channel: usize, _poldef: PolDef) -> Result<VisData, ReadError> {
        let seed = ms_seed(ms) ^ (channel as u64).wrapping_mul(0xdeadbeef);
        let uv_lambda = (0..self.samples_per_channel)
            .map(|i| 600.0 * unit(mix(seed ^ i as u64)))
            .collect();
        let timestamps = (0..self.samples_per_channel).map(|i| i as f64).collect();
        Ok(VisData {
            channel,
            uv_lambda,
            timestamps,
        })
    }

    fn station_info(&self, ms: &Path) -> Result<StationInfo, ReadError> {
        let seed = ms_seed(ms);
        let names = (0..self.num_stations).map(|i| format!("CS{i:03}")).collect();
        let positions = (0..self.num_stations)
            .map(|i| {
                let base = mix(seed ^ i as u64);
                [
                    3.826e6 + 1e3 * unit(base),
                    4.61e5 + 1e3 * unit(mix(base)),
                    5.064e6 + 1e3 * unit(mix(mix(base))),
                ]
            })
            .collect();
        Ok(StationInfo { names, positions })
    }
}

/// Simulated imaging routine: a Gaussian blob whose amplitude encodes the
/// channel index, with fixed per-plane scalings. Deterministic and
/// idempotent, so retries are exercised faithfully.
pub struct SimImager;

/// Per-plane scalings applied to the blob (I, Q, U, V).
const PLANE_SCALES: [f64; 4] = [1.0, 0.3, 0.4, 0.01];

impl Imager for SimImager {
    fn image(&self, data: &ChannelData) -> Result<ImageCube, TaskError> {
        let npixel = data.shared.npixel;
        let amp = (data.channel + 1) as f64;
        let centre = (npixel as f64 - 1.0) / 2.0;
        let sigma = (npixel as f64 / 8.0).max(1.0);

        let mut cube = Array3::zeros((PLANE_SCALES.len(), npixel, npixel));
        for (plane, &scale) in PLANE_SCALES.iter().enumerate() {
            for y in 0..npixel {
                for x in 0..npixel {
                    let dy = y as f64 - centre;
                    let dx = x as f64 - centre;
                    let blob = (-(dy * dy + dx * dx) / (2.0 * sigma * sigma)).exp();
                    cube[[plane, y, x]] = amp * scale * blob;
                }
            }
        }
        Ok(cube)
    }
}

/// Simulated ionosphere estimator: a slowly varying rotation measure.
pub struct SimIono;

impl IonoEstimator for SimIono {
    fn estimate(&self, vis: &VisData, _stations: &StationInfo) -> Result<IonoSeries, IonoError> {
        let times: Vec<f64> = vis.timestamps.iter().copied().step_by(64).collect();
        let rm = times.iter().map(|t| 0.5 + 0.01 * (t / 300.0).sin()).collect();
        let time_indices = (0..times.len()).map(|i| i * 64).collect();
        Ok(IonoSeries {
            rm,
            times,
            time_indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn loader_is_deterministic() {
        let loader = SimLoader::default();
        let a = loader
            .load(Path::new("sim-1.ms"), 3, PolDef::Linear)
            .unwrap();
        let b = loader
            .load(Path::new("sim-1.ms"), 3, PolDef::Linear)
            .unwrap();
        assert_eq!(a.uv_lambda, b.uv_lambda);

        let c = loader
            .load(Path::new("sim-2.ms"), 3, PolDef::Linear)
            .unwrap();
        assert_ne!(a.uv_lambda, c.uv_lambda);
    }

    #[test]
    fn imager_amplitude_tracks_channel() {
        use std::sync::Arc;

        use crate::orchestrate::SharedParams;

        let shared = Arc::new(SharedParams {
            uv_cut: 450.0,
            npixel: 16,
            cell_arcsec: 10.0,
            angular_resolution: 8.0,
            pixels_per_beam: 5.0,
            poldef: PolDef::Linear,
            iono: None,
            outputs: "/tmp".into(),
            twod: false,
            plots: false,
        });
        let loader = SimLoader::default();
        let make = |channel| ChannelData {
            channel,
            vis1: loader
                .load(Path::new("sim-1.ms"), channel, PolDef::Linear)
                .unwrap(),
            vis2: loader
                .load(Path::new("sim-2.ms"), channel, PolDef::Linear)
                .unwrap(),
            shared: Arc::clone(&shared),
        };

        let cube0 = SimImager.image(&make(0)).unwrap();
        let cube4 = SimImager.image(&make(4)).unwrap();
        assert_eq!(cube0.shape(), &[4, 16, 16]);
        // The blob scales linearly with channel + 1.
        assert_abs_diff_eq!(cube4[[0, 8, 8]], 5.0 * cube0[[0, 8, 8]], epsilon = 1e-12);
    }
}
