// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Validated run parameters. Command-line arguments are sanity-checked once
//! here; everything downstream trusts these values.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::read::PolDef;

/// Parameters for one pipeline invocation. Constructed once from the CLI
/// arguments; immutable thereafter.
#[derive(Debug, Clone)]
pub struct MapsParams {
    /// Number of frequency channels in the subband.
    pub channels: usize,
    pub inputs: PathBuf,
    pub outputs: PathBuf,
    /// `<outputs>/MOMENTS`, where the moment images land.
    pub moments_dir: PathBuf,
    pub ms1: String,
    pub ms2: String,
    pub cluster_address: String,
    /// uv-distance cut \[wavelengths\].
    pub uv_cut: f64,
    /// Target angular resolution across the band \[arcmin FWHM\].
    pub angular_resolution: f64,
    /// Pixels sampling the observing beam.
    pub pixels_per_beam: f64,
    pub instrument: String,
    pub poldef: PolDef,
    /// Pixels along each spatial image axis.
    pub image_size: usize,
    /// Emit QA records to the telemetry queue.
    pub qa: bool,
    /// Ask imaging tasks for diagnostic plots.
    pub plots: bool,
    /// 2-D imaging instead of w-stacking.
    pub twod: bool,
    /// Correct for ionospheric Faraday rotation.
    pub iono: bool,
    /// The fabric's internal retry budget per task.
    pub task_retries: u32,
    /// The controller's outer resubmission-pass ceiling.
    pub max_resubmit_passes: u32,
    /// Worker threads in the local cluster.
    pub num_workers: usize,
}

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("The number of channels must be at least 1")]
    NoChannels,

    #[error("The uv cut must be positive and finite; got {0}")]
    BadUvCut(f64),

    #[error("The pixel sampling density must be positive and finite; got {0}")]
    BadPixelSampling(f64),

    #[error("The angular resolution must be positive and finite; got {0}")]
    BadAngularResolution(f64),

    #[error("The image size must be at least 1 pixel")]
    BadImageSize,

    #[error("At least 1 worker is required")]
    NoWorkers,
}

impl MapsParams {
    /// Check the value ranges that the rest of the pipeline assumes.
    pub(crate) fn validate(&self) -> Result<(), ParamsError> {
        if self.channels == 0 {
            return Err(ParamsError::NoChannels);
        }
        if !self.uv_cut.is_finite() || self.uv_cut <= 0.0 {
            return Err(ParamsError::BadUvCut(self.uv_cut));
        }
        if !self.pixels_per_beam.is_finite() || self.pixels_per_beam <= 0.0 {
            return Err(ParamsError::BadPixelSampling(self.pixels_per_beam));
        }
        if !self.angular_resolution.is_finite() || self.angular_resolution <= 0.0 {
            return Err(ParamsError::BadAngularResolution(self.angular_resolution));
        }
        if self.image_size == 0 {
            return Err(ParamsError::BadImageSize);
        }
        if self.num_workers == 0 {
            return Err(ParamsError::NoWorkers);
        }
        Ok(())
    }
}
