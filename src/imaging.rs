// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The contract with the external imaging routine.
//!
//! The routine that turns a channel's visibilities into an image cube is an
//! external collaborator; the orchestrator only cares about its input/output
//! contract. Implementations must be idempotent, as a task may be invoked
//! more than once for the same channel data under retry.

use ndarray::Array3;
use thiserror::Error;

use crate::orchestrate::ChannelData;

/// The tensor produced by one successful imaging task: `NUM_PLANES` physical
/// planes over a fixed spatial grid.
pub type ImageCube = Array3<f64>;

/// An imaging backend. Runs on the execution fabric's workers.
pub trait Imager: Send + Sync {
    /// Produce an image cube from one channel's data. May fail transiently;
    /// must be safe to invoke again for the same input.
    fn image(&self, data: &ChannelData) -> Result<ImageCube, TaskError>;
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Imaging failed on channel {channel}: {reason}")]
    Imaging { channel: usize, reason: String },

    #[error("Channel {channel} produced an image cube of shape {got:?}, expected {expected:?}")]
    BadShape {
        channel: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
}
