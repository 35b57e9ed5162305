// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all pipeline-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("{0}")]
    Params(#[from] crate::params::ParamsError),

    #[error("{0}")]
    Setup(#[from] crate::orchestrate::SetupError),

    #[error("{0}")]
    Controller(#[from] crate::orchestrate::ControllerError),

    #[error("{0}")]
    Gather(#[from] crate::orchestrate::GatherError),

    #[error("{0}")]
    Moment(#[from] crate::moments::MomentError),

    #[error("{0}")]
    Fabric(#[from] crate::fabric::FabricError),

    #[error("{0}")]
    Read(#[from] crate::io::read::ReadError),

    #[error("{0}")]
    Write(#[from] crate::io::write::WriteError),

    #[error("{0}")]
    Iono(#[from] crate::iono::IonoError),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}
