// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Distributed spectral imaging and moment-map pipeline for LOFAR MSSS/MAPS
data: per-channel imaging jobs are scattered across a worker pool with
bounded retry, and the resulting image cubes are reduced into cross-channel
mean and standard-deviation moment images.
 */

pub mod cli;
pub mod constants;
pub mod fabric;
pub mod imaging;
pub mod io;
pub mod iono;
pub mod moments;
pub mod orchestrate;
pub mod params;
pub mod pipeline;
pub mod qa;
pub mod sim;
#[cfg(test)]
mod tests;

// Re-exports.
pub use cli::{LofarMaps, MapsError};
pub use params::MapsParams;

use crossbeam_utils::atomic::AtomicCell;

lazy_static::lazy_static! {
    /// Are progress bars enabled?
    pub static ref PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
}
