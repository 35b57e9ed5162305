// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::io::write::WriteError;

#[derive(Error, Debug)]
pub enum MomentError {
    #[error("Cannot stack: no channels were gathered")]
    NoChannels,

    #[error("Cannot stack: image cubes have {got} planes, expected {}", crate::constants::NUM_PLANES)]
    BadPlaneCount { got: usize },

    #[error("Cannot stack: channel {channel} has shape {got:?}, but the stack has shape {expected:?}")]
    ShapeMismatch {
        channel: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("The rechunk tile size must be non-zero")]
    BadTileSize,

    #[error(transparent)]
    Write(#[from] WriteError),
}
