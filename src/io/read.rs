// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The contract with the measurement-set reader, plus the uv-space helpers
//! that inform the imaging grid.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::constants::RAD2ARCSEC;

/// The polarisation definition of the instrument. LOFAR (and most low
/// frequency aperture arrays) record linear feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize)]
pub enum PolDef {
    #[strum(serialize = "lin")]
    Linear,
    #[strum(serialize = "circ")]
    Circular,
}

impl PolDef {
    /// Map an instrument name to its polarisation definition.
    pub fn for_instrument(instrument: &str) -> PolDef {
        match instrument.to_uppercase().as_str() {
            "LOFAR" | "MWA" | "SKA-LOW" => PolDef::Linear,
            "VLA" | "ASKAP" => PolDef::Circular,
            other => {
                warn!("Unknown instrument '{other}'; assuming linear feeds");
                PolDef::Linear
            }
        }
    }
}

/// One channel's visibility subset, reduced to what the coordinating process
/// itself needs: the uv coverage and sample times. The full visibility
/// payload stays behind the loader/imager seam.
#[derive(Debug, Clone)]
pub struct VisData {
    pub channel: usize,
    /// uv distances of the samples \[wavelengths\].
    pub uv_lambda: Vec<f64>,
    /// Sample timestamps \[s since observation start\].
    pub timestamps: Vec<f64>,
}

impl VisData {
    /// Combine two snapshots of the same channel into one subset.
    pub fn append(&self, other: &VisData) -> VisData {
        let mut uv_lambda = self.uv_lambda.clone();
        uv_lambda.extend_from_slice(&other.uv_lambda);
        let mut timestamps = self.timestamps.clone();
        timestamps.extend_from_slice(&other.timestamps);
        VisData {
            channel: self.channel,
            uv_lambda,
            timestamps,
        }
    }

    /// Apply a uv-distance cut, dropping samples beyond `uv_max`.
    pub fn uv_cut(&mut self, uv_max: f64) {
        let (uv_lambda, timestamps) = self
            .uv_lambda
            .iter()
            .copied()
            .zip(self.timestamps.iter().copied())
            .filter(|&(uv, _)| uv <= uv_max)
            .unzip();
        self.uv_lambda = uv_lambda;
        self.timestamps = timestamps;
    }
}

/// Station metadata read once per run from the first measurement set.
#[derive(Debug, Clone)]
pub struct StationInfo {
    pub names: Vec<String>,
    /// ITRF positions \[m\].
    pub positions: Vec<[f64; 3]>,
}

/// Gridding advice derived from the uv coverage after the cut.
#[derive(Debug, Clone, Copy)]
pub struct UvAdvice {
    /// Pixels along each spatial image axis.
    pub npixel: usize,
    /// Pixel size \[arcsec\].
    pub cell_arcsec: f64,
}

/// Derive the image grid from the longest remaining baseline: the
/// synthesised beam FWHM is ~1/uv_max radians, sampled by `pixels_per_beam`
/// pixels.
pub fn uv_advice(
    vis: &VisData,
    uv_max: f64,
    pixels_per_beam: f64,
    npixel: usize,
) -> Result<UvAdvice, ReadError> {
    let max_seen = vis
        .uv_lambda
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_seen.is_finite() || max_seen <= 0.0 {
        return Err(ReadError::EmptyUvCoverage {
            channel: vis.channel,
        });
    }
    let uv_limit = max_seen.min(uv_max);
    let beam_rad = 1.0 / uv_limit;
    let cell_arcsec = beam_rad / pixels_per_beam * RAD2ARCSEC;
    debug!(
        "uv advice: uv_max {uv_limit:.1} wavelengths, cell {cell_arcsec:.2}\", {npixel} pixels"
    );
    Ok(UvAdvice {
        npixel,
        cell_arcsec,
    })
}

/// The measurement-set reader. An external collaborator; implementations
/// yield per-channel visibility subsets and, once per run, the station
/// metadata.
pub trait VisLoader: Send + Sync {
    /// Load one channel's visibility subset from a measurement set.
    fn load(&self, ms: &Path, channel: usize, poldef: PolDef) -> Result<VisData, ReadError>;

    /// Station names and ITRF positions from a measurement set.
    fn station_info(&self, ms: &Path) -> Result<StationInfo, ReadError>;
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Measurement set '{0}' could not be opened")]
    BadMeasurementSet(PathBuf),

    #[error("Channel {channel} is out of range for measurement set '{ms}'")]
    ChannelOutOfRange { ms: PathBuf, channel: usize },

    #[error("Channel {channel} has no uv coverage after the uv cut")]
    EmptyUvCoverage { channel: usize },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
