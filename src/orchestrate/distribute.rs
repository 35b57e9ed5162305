// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The channel data distributor.

use std::{path::PathBuf, sync::Arc};

use log::{debug, info};

use super::error::SetupError;
use crate::{
    fabric::{DataHandle, Fabric},
    io::read::{PolDef, VisData},
    iono::IonoProducts,
};

/// Scalar/array parameters shared by every imaging task in the run.
/// Constructed once, immutable thereafter.
#[derive(Debug, Clone)]
pub struct SharedParams {
    /// uv-distance cut \[wavelengths\].
    pub uv_cut: f64,
    /// Pixels along each spatial image axis. A contract between the
    /// distributor and the moment-reduction engine.
    pub npixel: usize,
    /// Pixel size \[arcsec\].
    pub cell_arcsec: f64,
    /// Target angular resolution across the band \[arcmin FWHM\].
    pub angular_resolution: f64,
    /// Pixels sampling the observing beam.
    pub pixels_per_beam: f64,
    pub poldef: PolDef,
    /// Ionospheric rotation-measure products; absent when correction is
    /// disabled.
    pub iono: Option<IonoProducts>,
    pub outputs: PathBuf,
    /// 2-D imaging instead of w-stacking.
    pub twod: bool,
    /// Emit diagnostic plots from the imaging tasks.
    pub plots: bool,
}

/// Everything one remote imaging task needs to run without further
/// coordination with the submitting process: the channel index, the two
/// visibility subsets for that channel, and the shared run parameters.
/// Immutable once scattered.
#[derive(Debug)]
pub struct ChannelData {
    pub channel: usize,
    pub vis1: VisData,
    pub vis2: VisData,
    pub shared: Arc<SharedParams>,
}

/// Package each channel's inputs and scatter them to the cluster. No retries
/// here: a distribution failure indicates a cluster-connectivity problem,
/// not a per-task condition, and is fatal. On success the coordinating
/// process holds only handles, not raw data.
pub fn distribute(
    fabric: &dyn Fabric,
    vis1: Vec<VisData>,
    vis2: Vec<VisData>,
    shared: Arc<SharedParams>,
) -> Result<Vec<DataHandle>, SetupError> {
    if vis1.len() != vis2.len() || vis1.is_empty() {
        return Err(SetupError::ChannelCountMismatch {
            got1: vis1.len(),
            got2: vis2.len(),
        });
    }

    info!("Scattering data for {} channels to workers", vis1.len());
    let mut handles = Vec::with_capacity(vis1.len());
    for (channel, (vis1, vis2)) in vis1.into_iter().zip(vis2.into_iter()).enumerate() {
        if vis1.channel != channel || vis2.channel != channel {
            return Err(SetupError::ChannelIndexMismatch {
                expected: channel,
                got: if vis1.channel != channel {
                    vis1.channel
                } else {
                    vis2.channel
                },
            });
        }
        let data = ChannelData {
            channel,
            vis1,
            vis2,
            shared: Arc::clone(&shared),
        };
        let handle = fabric.scatter(data)?;
        debug!("Scattered channel {channel}");
        handles.push(handle);
    }
    Ok(handles)
}
