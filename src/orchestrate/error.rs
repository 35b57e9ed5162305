// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use itertools::Itertools;
use thiserror::Error;

use crate::fabric::FabricError;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("The two measurement sets yielded different channel counts ({got1} vs {got2}), or no channels at all")]
    ChannelCountMismatch { got1: usize, got2: usize },

    #[error("Visibility subset at position {expected} reports channel index {got}")]
    ChannelIndexMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Fabric(#[from] FabricError),
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(
        "Channel(s) {} still failed after {passes} resubmission pass(es); aborting the run",
        channels.iter().join(", ")
    )]
    RetriesExhausted { channels: Vec<usize>, passes: u32 },

    #[error(transparent)]
    Fabric(#[from] FabricError),
}

#[derive(Error, Debug)]
pub enum GatherError {
    #[error("Cannot gather: no futures were submitted")]
    NoResults,

    #[error("Cannot gather: the future for channel {channel} is in state '{state}', not succeeded")]
    NotTerminalSuccess { channel: usize, state: &'static str },

    #[error("Channel {channel} produced an image cube of shape {got:?}, expected {expected:?}")]
    BadShape {
        channel: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
}
