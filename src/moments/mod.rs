// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The moment-reduction engine.
//!
//! The per-channel image cubes are combined into cross-channel moment
//! images (mean and standard deviation per plane group) through a virtual
//! stacked array that is rechunked into spatial tiles and persisted before
//! reduction. The channel axis is whole within every tile, so each
//! channel-wise reduction is local to one tile and per-worker memory stays
//! bounded by the tile size, not the image size.

mod error;
#[cfg(test)]
mod tests;

pub use error::MomentError;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::{prelude::*, Zip};
use rayon::prelude::*;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::NUM_PLANES,
    fabric::ResultHandle,
    io::write::ImageWriter,
    qa::{qa_image, Telemetry},
};

/// The plane groups reduced across the channel axis. I, Q and U are raw
/// planes of the image cubes; P is the linear-polarisation magnitude
/// `sqrt(Q^2 + U^2)` formed per channel before reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum Plane {
    I,
    Q,
    U,
    P,
}

/// The statistics computed across the channel axis. Both are elementwise
/// and order-independent; the standard deviation is the population standard
/// deviation (ddof = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum Stat {
    Mean,
    Std,
}

/// A virtual concatenation of the per-channel image cubes along a new
/// leading channel axis, shape `(channels, NUM_PLANES, height, width)`.
/// Nothing is materialized locally; the cubes stay behind their
/// cluster-resident handles until [`StackedArray::persist`].
#[derive(Debug)]
pub struct StackedArray {
    channels: Vec<ResultHandle>,
    height: usize,
    width: usize,
}

impl StackedArray {
    /// Stack the gathered results. The results must be in ascending channel
    /// order (the gather stage's invariant) and share one shape.
    pub fn from_results(results: &[(usize, ResultHandle)]) -> Result<StackedArray, MomentError> {
        let (_, first) = results.first().ok_or(MomentError::NoChannels)?;
        let shape = first.fetch().shape().to_vec();
        if shape[0] != NUM_PLANES {
            return Err(MomentError::BadPlaneCount { got: shape[0] });
        }
        for (channel, handle) in results {
            if handle.fetch().shape() != shape.as_slice() {
                return Err(MomentError::ShapeMismatch {
                    channel: *channel,
                    got: handle.fetch().shape().to_vec(),
                    expected: shape,
                });
            }
        }
        Ok(StackedArray {
            channels: results.iter().map(|(_, h)| h.clone()).collect(),
            height: shape[1],
            width: shape[2],
        })
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Rechunk the stack into `tile`x`tile` spatial tiles (channel and plane
    /// axes whole per tile) and persist it. This is a deliberate
    /// materialization point: it pins the chunked layout and lets all
    /// reductions read the same tiles without recomputation.
    pub fn persist(&self, tile: usize) -> Result<PersistedStack, MomentError> {
        if tile == 0 {
            return Err(MomentError::BadTileSize);
        }
        let num_channels = self.channels.len();
        let regions: Vec<(usize, usize)> = (0..self.height)
            .step_by(tile)
            .flat_map(|r0| (0..self.width).step_by(tile).map(move |c0| (r0, c0)))
            .collect();
        debug!(
            "Persisting stack of {num_channels} channels as {} tiles of up to {tile}x{tile}",
            regions.len()
        );

        let tiles: Vec<Tile> = regions
            .into_par_iter()
            .map(|(r0, c0)| {
                let r1 = (r0 + tile).min(self.height);
                let c1 = (c0 + tile).min(self.width);
                let mut data = Array4::zeros((num_channels, NUM_PLANES, r1 - r0, c1 - c0));
                for (channel, handle) in self.channels.iter().enumerate() {
                    data.slice_mut(s![channel, .., .., ..])
                        .assign(&handle.fetch().slice(s![.., r0..r1, c0..c1]));
                }
                Tile { r0, c0, data }
            })
            .collect();

        Ok(PersistedStack {
            tiles,
            num_channels,
            height: self.height,
            width: self.width,
        })
    }
}

struct Tile {
    r0: usize,
    c0: usize,
    /// `(channels, NUM_PLANES, tile_height, tile_width)`.
    data: Array4<f64>,
}

impl Tile {
    /// The plane-group values for this tile, shape
    /// `(channels, tile_height, tile_width)`.
    fn plane_values(&self, plane: Plane) -> Array3<f64> {
        match plane {
            Plane::I => self.data.index_axis(Axis(1), 0).to_owned(),
            Plane::Q => self.data.index_axis(Axis(1), 1).to_owned(),
            Plane::U => self.data.index_axis(Axis(1), 2).to_owned(),
            Plane::P => {
                let q = self.data.index_axis(Axis(1), 1);
                let u = self.data.index_axis(Axis(1), 2);
                let mut p = Array3::zeros(q.raw_dim());
                Zip::from(&mut p)
                    .and(&q)
                    .and(&u)
                    .for_each(|p, &q, &u| *p = (q * q + u * u).sqrt());
                p
            }
        }
    }
}

/// The rechunked, persisted stack: immutable shared state read by all
/// reductions. No locking is needed because no writer exists after the
/// persist step.
pub struct PersistedStack {
    tiles: Vec<Tile>,
    num_channels: usize,
    height: usize,
    width: usize,
}

impl PersistedStack {
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Compute one moment image: `stat` across the channel axis for `plane`.
    /// Tiles reduce independently in parallel; the result is a single
    /// spatial tensor, small enough for one process.
    pub fn reduce(&self, plane: Plane, stat: Stat) -> Array2<f64> {
        let blocks: Vec<(usize, usize, Array2<f64>)> = self
            .tiles
            .par_iter()
            .map(|tile| {
                let values = tile.plane_values(plane);
                let reduced = match stat {
                    Stat::Mean => values
                        .mean_axis(Axis(0))
                        .expect("stack has at least one channel"),
                    Stat::Std => values.std_axis(Axis(0), 0.0),
                };
                (tile.r0, tile.c0, reduced)
            })
            .collect();

        let mut out = Array2::zeros((self.height, self.width));
        for (r0, c0, block) in blocks {
            out.slice_mut(s![r0..r0 + block.nrows(), c0..c0 + block.ncols()])
                .assign(&block);
        }
        out
    }
}

/// Compute and write every moment image, emitting a QA record per product
/// when telemetry is enabled. Any reduction or write failure is fatal: the
/// engine produces all outputs or none, since downstream source-finding
/// depends on a complete moment set.
pub fn write_moments(
    stack: &PersistedStack,
    writer: &dyn ImageWriter,
    moments_dir: &Path,
    telemetry: Option<&dyn Telemetry>,
) -> Result<Vec<PathBuf>, MomentError> {
    info!("Calculating moment images over {} channels", stack.num_channels());
    let mut written = Vec::new();
    for stat in Stat::iter() {
        for plane in Plane::iter() {
            let label = format!("{stat}-{plane}");
            let image = stack.reduce(plane, stat);
            if let Some(sink) = telemetry {
                if let Err(e) = sink.emit("qa", &qa_image(&label, image.view())) {
                    warn!("QA emission for {label} failed: {e}");
                }
            }
            let path = moments_dir.join(format!("{label}.im"));
            writer.write(image.view(), &path)?;
            info!("Saved moment image {}", path.display());
            written.push(path);
        }
    }
    if let Some(sink) = telemetry {
        if let Err(e) = sink.flush() {
            warn!("QA flush failed: {e}");
        }
    }
    Ok(written)
}
